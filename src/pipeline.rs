//! Sequential classification pipeline: relevance check, detail extraction,
//! status normalization and accumulation.
//!
//! One message is classified at a time. The only suspension points are the
//! calls into the [`TextClassifier`] and the fixed pause after each examined
//! message. Cancellation is checked at message boundaries; the optional
//! deadline is checked at message boundaries and also bounds every in-flight
//! classifier call.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, TrackerError};
use crate::models::{Email, JobApplication};
use crate::parser::parse_details;
use crate::prompt::{detail_prompt, relevance_prompt};
use crate::status::normalize_status;

/// Progress callback invoked once per examined message
pub type ProgressCallback = Arc<dyn Fn() + Send + Sync>;

/// Default pause between examined messages
pub const DEFAULT_CALL_DELAY: Duration = Duration::from_millis(500);

/// Text-in/text-out classifier (usually a language model)
#[async_trait]
pub trait TextClassifier: Send + Sync {
    /// Send a prompt and return the raw response text
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Tuning for a batch run
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Pause after each message that reached the classifier
    pub call_delay: Duration,
    /// Point in time after which the batch stops
    pub deadline: Option<Instant>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            call_delay: DEFAULT_CALL_DELAY,
            deadline: None,
        }
    }
}

/// Result of a batch run, complete or interrupted
#[derive(Debug, Default)]
pub struct AnalysisRun {
    /// Outcomes in input order, relevant messages only
    pub applications: Vec<JobApplication>,
    /// Messages that reached the relevance check
    pub examined: usize,
    /// Messages judged unrelated to job hunting
    pub irrelevant: usize,
    /// Messages dropped because of a classifier or parse error
    pub skipped: usize,
    /// Why the batch stopped early, if it did
    pub interrupted: Option<TrackerError>,
}

impl AnalysisRun {
    pub fn is_complete(&self) -> bool {
        self.interrupted.is_none()
    }
}

/// Interpret the relevance reply: "yes"/"是", or anything containing "是"
pub fn is_affirmative(response: &str) -> bool {
    let answer = response.trim().to_lowercase();
    answer == "是" || answer == "yes" || answer.contains('是')
}

/// Job-email analyzer driving a [`TextClassifier`]
pub struct JobAnalyzer {
    classifier: Box<dyn TextClassifier>,
    options: AnalysisOptions,
}

impl JobAnalyzer {
    pub fn new(classifier: Box<dyn TextClassifier>) -> Self {
        Self::with_options(classifier, AnalysisOptions::default())
    }

    pub fn with_options(classifier: Box<dyn TextClassifier>, options: AnalysisOptions) -> Self {
        Self {
            classifier,
            options,
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Ask the classifier whether the email concerns a job application
    pub async fn is_job_related(&self, email: &Email) -> Result<bool> {
        let response = self.call(&relevance_prompt(email)).await?;
        let relevant = is_affirmative(&response);
        debug!(
            "Relevance for '{}': {} (reply: {:?})",
            email.subject,
            relevant,
            response.trim()
        );
        Ok(relevant)
    }

    /// Extract the structured application details from a job-related email
    pub async fn analyze_job_email(&self, email: &Email) -> Result<JobApplication> {
        let response = self.call(&detail_prompt(email)).await?;
        let details = parse_details(&response)?;

        Ok(JobApplication {
            status: normalize_status(&details.status),
            company: details.company,
            position: details.position,
            location: details.location,
            description: details.description,
            email: email.clone(),
            extracted_at: Utc::now(),
        })
    }

    /// Classify a batch of emails in order
    ///
    /// Per-message classifier and parse errors are logged and the message is
    /// skipped. Cancellation and deadline exhaustion stop the batch; the
    /// outcomes collected so far are kept in the returned run.
    pub async fn analyze_emails(
        &self,
        emails: &[Email],
        cancel: &CancellationToken,
        on_progress: Option<ProgressCallback>,
    ) -> AnalysisRun {
        let total = emails.len();
        let mut run = AnalysisRun::default();

        for (index, email) in emails.iter().enumerate() {
            if cancel.is_cancelled() {
                run.interrupted = Some(TrackerError::OperationCancelled(format!(
                    "stopped before message {} of {}",
                    index + 1,
                    total
                )));
                break;
            }
            if self.deadline_passed() {
                run.interrupted = Some(TrackerError::DeadlineExceeded(format!(
                    "stopped before message {} of {}",
                    index + 1,
                    total
                )));
                break;
            }

            debug!("Analyzing email {}/{}: {}", index + 1, total, email.subject);
            run.examined += 1;

            match self.classify(email).await {
                Ok(Some(application)) => {
                    info!(
                        "Found job email: {} - {} ({})",
                        application.company, application.position, application.status
                    );
                    run.applications.push(application);
                }
                Ok(None) => run.irrelevant += 1,
                Err(e) if e.is_batch_fatal() => {
                    warn!("Stopping batch at '{}': {}", email.subject, e);
                    run.interrupted = Some(e);
                    break;
                }
                Err(e) => {
                    warn!("Skipping email '{}': {}", email.subject, e);
                    run.skipped += 1;
                }
            }

            if let Some(callback) = &on_progress {
                callback();
            }

            self.pause(cancel).await;
        }

        info!(
            "Analyzed {} of {} emails: {} job-related, {} unrelated, {} skipped",
            run.examined,
            total,
            run.applications.len(),
            run.irrelevant,
            run.skipped
        );
        run
    }

    async fn classify(&self, email: &Email) -> Result<Option<JobApplication>> {
        if !self.is_job_related(email).await? {
            return Ok(None);
        }
        self.analyze_job_email(email).await.map(Some)
    }

    async fn call(&self, prompt: &str) -> Result<String> {
        match self.options.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.classifier.complete(prompt))
                .await
                .map_err(|_| {
                    TrackerError::DeadlineExceeded("classifier call outlived the batch deadline".to_string())
                })?,
            None => self.classifier.complete(prompt).await,
        }
    }

    fn deadline_passed(&self) -> bool {
        self.options
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }

    async fn pause(&self, cancel: &CancellationToken) {
        if self.options.call_delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.options.call_delay) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
