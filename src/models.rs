use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One email under analysis, as delivered by the mail collaborator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Email {
    #[serde(default)]
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub subject: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub body_text: String,
    #[serde(default)]
    pub body_html: String,
    #[serde(default)]
    pub message_id: String,
    #[serde(default)]
    pub folder: String,
}

/// Progress of a job application
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Applied,
    #[serde(rename = "OA")]
    OnlineAssessment,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
    Other,
}

impl Status {
    /// Every status, in display order
    pub const ALL: [Status; 7] = [
        Status::Applied,
        Status::OnlineAssessment,
        Status::Interview,
        Status::Offer,
        Status::Rejected,
        Status::Withdrawn,
        Status::Other,
    ];

    /// Token used in prompts and exported files
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Applied => "APPLIED",
            Status::OnlineAssessment => "OA",
            Status::Interview => "INTERVIEW",
            Status::Offer => "OFFER",
            Status::Rejected => "REJECTED",
            Status::Withdrawn => "WITHDRAWN",
            Status::Other => "OTHER",
        }
    }

    /// Human-readable label for summaries
    pub fn label(&self) -> &'static str {
        match self {
            Status::Applied => "Applied",
            Status::OnlineAssessment => "Online assessment",
            Status::Interview => "Interview",
            Status::Offer => "Offer received",
            Status::Rejected => "Rejected",
            Status::Withdrawn => "Withdrawn",
            Status::Other => "Other",
        }
    }

    /// Description handed to the classifier in the detail prompt
    pub fn prompt_description(&self) -> &'static str {
        match self {
            Status::Applied => "application submitted or resume received",
            Status::OnlineAssessment => "online assessment or written test invitation",
            Status::Interview => "interview invitation or scheduling",
            Status::Offer => "offer or hiring notice received",
            Status::Rejected => "rejected or not moving forward",
            Status::Withdrawn => "application withdrawn",
            Status::Other => "any other status",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of classifying one job-related email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobApplication {
    pub company: String,
    pub position: String,
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub email: Email,
    pub extracted_at: DateTime<Utc>,
}
