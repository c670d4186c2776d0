//! Best-effort extraction of the detail JSON object from a classifier reply

use crate::error::{Result, TrackerError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer};

static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Fields extracted from the detail response, already cleaned
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtractedDetails {
    #[serde(default, deserialize_with = "nullable_string")]
    pub company: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub position: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub status: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub location: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
}

fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Slice from the first `{` to the last `}`, or the whole text when there is no such pair
pub fn extract_json(text: &str) -> &str {
    let Some(start) = text.find('{') else {
        return text;
    };
    match text.rfind('}') {
        Some(end) if end > start => &text[start..=end],
        _ => text,
    }
}

/// Collapse whitespace runs to one space and trim
pub fn clean_text(text: &str) -> String {
    WHITESPACE_RUNS.replace_all(text, " ").trim().to_string()
}

/// Decode a raw classifier reply into cleaned [`ExtractedDetails`]
pub fn parse_details(response: &str) -> Result<ExtractedDetails> {
    let candidate = extract_json(response);
    let raw: ExtractedDetails =
        serde_json::from_str(candidate).map_err(|e| TrackerError::ResponseParseError {
            reason: e.to_string(),
            raw: response.to_string(),
        })?;

    Ok(ExtractedDetails {
        company: clean_text(&raw.company),
        position: clean_text(&raw.position),
        status: clean_text(&raw.status),
        location: clean_text(&raw.location),
        description: clean_text(&raw.description),
    })
}
