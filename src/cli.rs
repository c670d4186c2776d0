//! Command-line interface

use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Result, TrackerError};
use crate::exporter;
use crate::gateway::{EmailQuery, GatewayClient, MailSource, SampleMailSource};
use crate::llm::ChatCompletionClient;
use crate::models::Email;
use crate::pipeline::{AnalysisOptions, AnalysisRun, JobAnalyzer, ProgressCallback, TextClassifier};
use crate::stats::ApplicationStats;

#[derive(Parser, Debug)]
#[command(name = "jobtracker")]
#[command(version = "0.1.0")]
#[command(about = "Classify job-application emails and export a tracking sheet", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch, classify and export job-application emails
    Run {
        /// Use the built-in sample emails instead of the mail gateway
        #[arg(long)]
        mock: bool,

        /// Applications CSV path (overrides export.file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the summary only, write no files
        #[arg(long)]
        no_export: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    spinner_style: ProgressStyle,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::with_multi_progress(MultiProgress::new())
    }

    /// Share a MultiProgress with the log writer so log lines print above the bars
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed:>6}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ");

        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self {
            multi,
            spinner_style,
            bar_style,
        }
    }

    /// Reporter that draws nothing
    pub fn hidden() -> Self {
        Self::with_multi_progress(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi
    }

    pub fn add_spinner(&self, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(self.spinner_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Finish a spinner and clear it from the multi-progress display
    pub fn finish_spinner(&self, pb: &ProgressBar, msg: &str) {
        pb.finish_and_clear();
        self.println(&format!("  ✓ {}", msg));
    }

    /// Await `fut` under `pb`, clearing the spinner if it fails
    pub async fn track<T, F>(&self, pb: &ProgressBar, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let result = fut.await;
        if result.is_err() {
            pb.finish_and_clear();
        }
        result
    }

    pub fn println(&self, msg: &str) {
        let _ = self.multi.println(msg);
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for the `run` subcommand
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mock: bool,
    pub output: Option<PathBuf>,
    pub export: bool,
}

/// Outcome of classifying and exporting one batch
#[derive(Debug)]
pub struct ProcessOutcome {
    pub run: AnalysisRun,
    pub stats: ApplicationStats,
    pub applications_file: Option<PathBuf>,
    pub statistics_file: Option<PathBuf>,
}

/// Run summary printed at the end
#[derive(Debug, Clone)]
pub struct Report {
    pub run_id: String,
    pub started_at: chrono::DateTime<Utc>,
    pub completed_at: chrono::DateTime<Utc>,
    pub duration_seconds: i64,
    pub emails_fetched: usize,
    pub emails_examined: usize,
    pub applications_found: usize,
    pub irrelevant: usize,
    pub skipped: usize,
    /// Why the batch stopped early, if it did
    pub interrupted: Option<String>,
    pub applications_file: Option<PathBuf>,
    pub statistics_file: Option<PathBuf>,
}

impl Report {
    fn new(run_id: String, started_at: chrono::DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            completed_at: started_at,
            duration_seconds: 0,
            emails_fetched: 0,
            emails_examined: 0,
            applications_found: 0,
            irrelevant: 0,
            skipped: 0,
            interrupted: None,
            applications_file: None,
            statistics_file: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }

    /// Record why the run stopped before any email was classified
    ///
    /// Only cancellation and deadline errors end a run this way; anything
    /// else is handed back as a failure.
    pub fn stop_before_analysis(&mut self, error: TrackerError) -> Result<()> {
        if !error.is_batch_fatal() {
            return Err(error);
        }
        warn!("Run stopped before analysis: {}", error);
        self.interrupted = Some(error.to_string());
        Ok(())
    }

    fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self.duration_seconds = (self.completed_at - self.started_at).num_seconds();
        self
    }
}

/// Cancel `token` on Ctrl-C
pub fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupt received, finishing after the current email");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

/// Fetch the emails to analyze, from the gateway or the sample set
pub async fn fetch_emails(
    config: &Config,
    mock: bool,
    deadline: Instant,
    cancel: &CancellationToken,
    reporter: &ProgressReporter,
) -> Result<Vec<Email>> {
    let query = EmailQuery::from_config(config, Utc::now());

    if mock {
        reporter.println("Using built-in sample emails");
        return SampleMailSource.fetch(&query).await;
    }

    config.require_mailbox()?;
    let client = GatewayClient::new(config)?;

    let login_spinner = reporter.add_spinner(&format!(
        "Starting login for {} ({})...",
        config.mail.address,
        config.provider().as_str()
    ));
    let session = reporter.track(&login_spinner, client.login()).await?;
    reporter.finish_spinner(&login_spinner, &format!("Login session {}", session.session_id));

    if session.needs_browser() {
        reporter.println(&format!(
            "Complete the login in your browser: {}",
            session.login_url
        ));
        let wait = Duration::from_secs(config.gateway.login_wait_secs);
        let wait_spinner = reporter.add_spinner("Waiting for login to complete...");
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => {
                wait_spinner.finish_and_clear();
                return Err(TrackerError::OperationCancelled(
                    "interrupted while waiting for login".to_string(),
                ));
            }
        }
        reporter.finish_spinner(&wait_spinner, "Login wait finished");
    }

    let fetch_spinner = reporter.add_spinner(&format!(
        "Fetching emails ({} to {})...",
        query.start.format("%Y-%m-%d"),
        query.end.format("%Y-%m-%d")
    ));
    let fetch = async {
        tokio::time::timeout_at(deadline, client.fetch(&query))
            .await
            .map_err(|_| TrackerError::DeadlineExceeded("fetching emails".to_string()))?
    };
    let emails = reporter.track(&fetch_spinner, fetch).await?;
    reporter.finish_spinner(&fetch_spinner, &format!("Fetched {} emails", emails.len()));

    Ok(emails)
}

/// Classify `emails`, print the summary and write the export files
///
/// An interrupted batch is not an error here: the partial outcomes are
/// summarized and exported, and the reason is kept in the returned run.
pub async fn process_emails(
    config: &Config,
    emails: &[Email],
    classifier: Box<dyn TextClassifier>,
    deadline: Instant,
    cancel: &CancellationToken,
    reporter: &ProgressReporter,
    export: bool,
) -> Result<ProcessOutcome> {
    let options = AnalysisOptions {
        call_delay: Duration::from_millis(config.analysis.delay_ms),
        deadline: Some(deadline),
    };
    let analyzer = JobAnalyzer::with_options(classifier, options);

    let classify_bar = reporter.add_progress_bar(emails.len() as u64, "Classifying emails...");
    let bar = classify_bar.clone();
    let progress: ProgressCallback = Arc::new(move || bar.inc(1));

    let run = analyzer.analyze_emails(emails, cancel, Some(progress)).await;

    classify_bar.finish_with_message(format!(
        "{} job-related of {} examined ({} skipped)",
        run.applications.len(),
        run.examined,
        run.skipped
    ));
    if let Some(reason) = &run.interrupted {
        warn!("Analysis stopped early: {}", reason);
    }

    let stats = ApplicationStats::from_applications(&run.applications);
    reporter.println("");
    reporter.println(exporter::render_summary(&stats).trim_end());

    let mut applications_file = None;
    let mut statistics_file = None;

    if export && !run.applications.is_empty() {
        let apps_path = PathBuf::from(&config.export.file);
        let stats_path = match &config.export.statistics_file {
            Some(path) => PathBuf::from(path),
            None => exporter::statistics_path(&apps_path, Local::now()),
        };

        exporter::export_applications(&apps_path, &run.applications).await?;
        reporter.println(&format!("  ✓ Applications exported to {}", apps_path.display()));
        applications_file = Some(apps_path);

        match exporter::export_statistics(&stats_path, &stats).await {
            Ok(()) => {
                reporter.println(&format!("  ✓ Statistics exported to {}", stats_path.display()));
                statistics_file = Some(stats_path);
            }
            Err(e) => warn!("Failed to export statistics: {}", e),
        }
    }

    let recent = exporter::render_recent_activity(&run.applications);
    if !recent.is_empty() {
        reporter.println("");
        reporter.println(recent.trim_end());
    }

    Ok(ProcessOutcome {
        run,
        stats,
        applications_file,
        statistics_file,
    })
}

/// Run the complete pipeline
pub async fn run_pipeline(cli: &Cli, options: RunOptions, multi: MultiProgress) -> Result<Report> {
    let reporter = ProgressReporter::with_multi_progress(multi);
    let started_at = Utc::now();
    let run_id = uuid::Uuid::new_v4().to_string();
    info!("Starting run {}", run_id);

    // Step 1: Load configuration
    let config_spinner = reporter.add_spinner("Loading configuration...");
    let mut config = Config::load(&cli.config).await?;
    if let Some(output) = &options.output {
        config.export.file = output.display().to_string();
    }
    reporter.finish_spinner(&config_spinner, &format!("Configuration loaded from {:?}", cli.config));

    let deadline = Instant::now() + Duration::from_secs(config.analysis.deadline_secs);
    let cancel = CancellationToken::new();
    let ctrl_c = cancel_on_ctrl_c(cancel.clone());

    let mut report = Report::new(run_id, started_at);

    // Step 2: Fetch emails
    let emails = match fetch_emails(&config, options.mock, deadline, &cancel, &reporter).await {
        Ok(emails) => emails,
        Err(e) => {
            ctrl_c.abort();
            report.stop_before_analysis(e)?;
            return Ok(report.finish());
        }
    };
    report.emails_fetched = emails.len();

    let outcome = if emails.is_empty() {
        reporter.println("No emails found, nothing to analyze");
        Ok(None)
    } else {
        // Step 3: Classify, summarize, export
        match ChatCompletionClient::new(&config.llm) {
            Ok(classifier) => {
                info!("Classifying with model {}", classifier.model());
                process_emails(
                    &config,
                    &emails,
                    Box::new(classifier),
                    deadline,
                    &cancel,
                    &reporter,
                    options.export,
                )
                .await
                .map(Some)
            }
            Err(e) => Err(e),
        }
    };
    ctrl_c.abort();

    if let Some(outcome) = outcome? {
        report.emails_examined = outcome.run.examined;
        report.applications_found = outcome.run.applications.len();
        report.irrelevant = outcome.run.irrelevant;
        report.skipped = outcome.run.skipped;
        report.interrupted = outcome.run.interrupted.as_ref().map(|e| e.to_string());
        report.applications_file = outcome.applications_file;
        report.statistics_file = outcome.statistics_file;
    }

    Ok(report.finish())
}
