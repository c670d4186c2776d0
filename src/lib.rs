//! Job-application email tracker
//!
//! Fetches recent mail, asks a language model which messages concern job
//! applications, extracts company, position and status from those, and
//! exports the outcomes plus summary statistics as CSV.
//!
//! # Overview
//!
//! - **Fetching**: JSON-RPC mail gateway client, or a built-in sample set
//! - **Classification**: relevance check then structured detail extraction
//! - **Normalization**: free-form status words mapped onto seven statuses
//! - **Statistics**: per-status and per-company tallies
//! - **Export**: applications and statistics CSV files
//!
//! # Example Usage
//!
//! ```no_run
//! use jobmail_tracker::{config::Config, llm::ChatCompletionClient, pipeline::JobAnalyzer};
//! use jobmail_tracker::gateway::{EmailQuery, MailSource, SampleMailSource};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!
//!     let query = EmailQuery::from_config(&config, chrono::Utc::now());
//!     let emails = SampleMailSource.fetch(&query).await?;
//!
//!     let analyzer = JobAnalyzer::new(Box::new(ChatCompletionClient::new(&config.llm)?));
//!     let run = analyzer
//!         .analyze_emails(&emails, &CancellationToken::new(), None)
//!         .await;
//!
//!     for app in &run.applications {
//!         println!("{} - {} ({})", app.company, app.position, app.status);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`cli`] - Command-line interface and run orchestration
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`exporter`] - CSV export and console summaries
//! - [`gateway`] - Mail gateway client and sample mail source
//! - [`llm`] - Chat-completion client
//! - [`models`] - Core data structures
//! - [`parser`] - Detail-response parsing
//! - [`pipeline`] - Batch classification
//! - [`prompt`] - Prompt construction
//! - [`stats`] - Aggregated statistics
//! - [`status`] - Status normalization

pub mod cli;
pub mod config;
pub mod error;
pub mod exporter;
pub mod gateway;
pub mod llm;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod stats;
pub mod status;

// Re-export commonly used types for convenience
pub use error::{Result, TrackerError};

// Core data models
pub use models::{Email, JobApplication, Status};

// Config types
pub use config::{
    AnalysisConfig, Config, ExportConfig, FetchConfig, GatewayConfig, LlmConfig, MailConfig,
    MailProvider,
};

// Collaborators
pub use gateway::{EmailQuery, GatewayClient, LoginSession, MailSource, SampleMailSource};
pub use llm::ChatCompletionClient;

// Pipeline
pub use pipeline::{AnalysisOptions, AnalysisRun, JobAnalyzer, TextClassifier};
pub use stats::ApplicationStats;
pub use status::normalize_status;

// CLI types (for binary usage)
pub use cli::{Cli, Commands, ProgressReporter, Report};
