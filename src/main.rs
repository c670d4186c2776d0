use anyhow::Result;
use clap::Parser;
use indicatif::MultiProgress;
use jobmail_tracker::cli::{self, Cli, Commands, RunOptions};
use jobmail_tracker::config::Config;
use jobmail_tracker::error::TrackerError;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Exit code for a run that stopped before every email was examined
const EXIT_INTERRUPTED: i32 = 2;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: MultiProgress,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self
            .buffer
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "log buffer poisoned"))?;
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: MultiProgress,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(self.multi.clone())
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            display_error(&e);
            eprintln!("\nFor help, run: jobtracker --help");
            process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("jobmail_tracker=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobmail_tracker=info,warn"))
    };

    // MultiProgress is shared between the log writer and the progress bars
    let multi_progress = MultiProgress::new();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter {
            multi: multi_progress.clone(),
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    match cli.command {
        Commands::Run {
            mock,
            ref output,
            no_export,
        } => {
            if mock {
                println!("Running in MOCK mode - sample emails, no mailbox access");
            }
            if no_export {
                println!("Export disabled - no files will be written");
            }

            let options = RunOptions {
                mock,
                output: output.clone(),
                export: !no_export,
            };
            let report = cli::run_pipeline(&cli, options, multi_progress).await?;

            println!("\n========================================");
            println!("Run Summary");
            println!("========================================");
            println!("Run ID: {}", report.run_id);
            println!("Duration: {} seconds", report.duration_seconds);
            println!("Emails fetched: {}", report.emails_fetched);
            println!("Emails examined: {}", report.emails_examined);
            println!("Job-related: {}", report.applications_found);
            println!("Not job-related: {}", report.irrelevant);
            println!("Skipped (errors): {}", report.skipped);
            if let Some(path) = &report.applications_file {
                println!("Applications file: {}", path.display());
            }
            if let Some(path) = &report.statistics_file {
                println!("Statistics file: {}", path.display());
            }
            println!("========================================");

            if let Some(reason) = &report.interrupted {
                eprintln!("\nRun stopped early: {}", reason);
                eprintln!("Results above cover only the emails examined before the stop.");
                return Ok(EXIT_INTERRUPTED);
            }

            Ok(0)
        }

        Commands::InitConfig { ref output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(TrackerError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - mail.address: the mailbox to scan");
            println!("  - gateway.endpoint: the mail gateway URL");
            println!("  - fetch.start / fetch.end: date range (YYYY-MM-DD)");
            println!("  - llm.api_base, llm.model, llm.api_key: the language model to use");
            println!("  - export.file: where the applications CSV is written");

            Ok(0)
        }
    }
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    for cause in error.chain().skip(1) {
        eprintln!("  Caused by: {}", cause);
    }

    if let Some(tracker_err) = error.downcast_ref::<TrackerError>() {
        match tracker_err {
            TrackerError::AuthError(_) => {
                eprintln!("\nHint: The mail gateway rejected the login.");
                eprintln!("      Check mail.address and mail.provider in your config.");
            }
            TrackerError::GatewayHttpError { .. } | TrackerError::GatewayError { .. } => {
                eprintln!("\nHint: Make sure the mail gateway is running at gateway.endpoint.");
                eprintln!("      To try the pipeline without a mailbox, run: jobtracker run --mock");
            }
            TrackerError::NetworkError(_) => {
                eprintln!("\nHint: A network request failed or timed out.");
                eprintln!("      Try running the command again.");
            }
            TrackerError::LlmApiError { status: 401, .. }
            | TrackerError::LlmApiError { status: 403, .. } => {
                eprintln!("\nHint: The language model API rejected the key.");
                eprintln!("      Set llm.api_key (e.g. \"${{OPENAI_API_KEY}}\") in your config.");
            }
            TrackerError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: jobtracker init-config --force");
            }
            _ => {}
        }
    }
}
