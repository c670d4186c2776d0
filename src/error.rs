use thiserror::Error;

/// Type alias for Result with TrackerError
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Error types for the job-application tracker
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Mail gateway returned a JSON-RPC error object
    #[error("Gateway error {code}: {message}")]
    GatewayError { code: i64, message: String },

    /// Mail gateway answered with a non-success HTTP status
    #[error("Gateway HTTP error (HTTP {status}): {body}")]
    GatewayHttpError { status: u16, body: String },

    /// Mailbox login failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Language-model API returned a non-success status
    #[error("LLM API error (HTTP {status}): {body}")]
    LlmApiError { status: u16, body: String },

    /// Language-model API answered without any choices
    #[error("LLM returned no response")]
    EmptyLlmResponse,

    /// Quota or rate limit exhausted on the language-model API
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Network-related error (connection issues, per-call timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Classifier response could not be decoded into a detail record
    #[error("Failed to parse classifier response: {reason}, response: {raw}")]
    ResponseParseError { reason: String, raw: String },

    /// Batch was cancelled by the caller
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// Batch deadline exhausted
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Writing an output file failed
    #[error("Export error: {0}")]
    ExportError(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TrackerError {
    /// Errors that stop the whole batch instead of skipping one message
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            TrackerError::OperationCancelled(_) | TrackerError::DeadlineExceeded(_)
        )
    }

    /// Check if the error is transient (a later run could succeed)
    pub fn is_transient(&self) -> bool {
        match self {
            TrackerError::QuotaExceeded(_) | TrackerError::NetworkError(_) => true,
            TrackerError::LlmApiError { status, .. }
            | TrackerError::GatewayHttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TrackerError::NetworkError(format!("Request timed out: {}", error))
        } else if error.is_connect() {
            TrackerError::NetworkError(format!("Connection error: {}", error))
        } else if error.is_decode() {
            TrackerError::NetworkError(format!("Failed to decode response body: {}", error))
        } else {
            TrackerError::NetworkError(error.to_string())
        }
    }
}
