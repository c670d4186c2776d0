//! Prompt construction for the relevance check and the detail extraction

use crate::models::{Email, Status};

/// Body length (in characters) embedded in the relevance prompt
pub const RELEVANCE_BODY_LIMIT: usize = 1000;

/// Body length (in characters) embedded in the detail prompt
pub const DETAIL_BODY_LIMIT: usize = 2000;

/// Marker appended to truncated text
pub const ELLIPSIS: &str = "...";

/// Cut `text` to `max_chars` characters, appending [`ELLIPSIS`] when cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Prompt asking whether the email concerns a job application
pub fn relevance_prompt(email: &Email) -> String {
    format!(
        r#"
Decide whether the following email is about job hunting, recruiting, or interviews.

Email:
From: {}
Subject: {}
Body: {}

Answer only "yes" or "no" (是/否). Do not include anything else.
"#,
        email.from,
        email.subject,
        truncate_text(&email.body_text, RELEVANCE_BODY_LIMIT)
    )
}

/// Prompt asking for the structured application details as JSON
pub fn detail_prompt(email: &Email) -> String {
    let tokens = Status::ALL
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join("/");

    let descriptions = Status::ALL
        .iter()
        .map(|s| format!("- {}: {}", s.as_str(), s.prompt_description()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"
Analyze the following job-related email and extract the company name, the position and the current application status.

Email:
From: {}
Subject: {}
Date: {}
Body: {}

Return the result as a single JSON object with exactly these fields:
{{
  "company": "company name",
  "position": "position title",
  "status": "status ({})",
  "location": "work location (optional)",
  "description": "short description of the current status"
}}

Status values:
{}

Return valid JSON only, with no other text.
"#,
        email.from,
        email.subject,
        email.date.format("%Y-%m-%d"),
        truncate_text(&email.body_text, DETAIL_BODY_LIMIT),
        tokens,
        descriptions
    )
}
