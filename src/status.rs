//! Normalization of free-text status tokens into [`Status`]

use crate::models::Status;
use once_cell::sync::Lazy;
use regex::Regex;

/// Keyword table, checked in row order
static STATUS_KEYWORDS: &[(Status, &[&str])] = &[
    (Status::Applied, &["applied", "application", "申请", "已申请"]),
    (
        Status::OnlineAssessment,
        &["oa", "online_assessment", "笔试", "在线测试"],
    ),
    (Status::Interview, &["interview", "面试"]),
    (Status::Offer, &["offer", "accepted", "录用", "录取"]),
    (Status::Rejected, &["rejected", "declined", "拒绝", "未通过"]),
    (Status::Withdrawn, &["withdrawn", "撤回"]),
];

/// Keywords shorter than this (in bytes) only match exactly
const MIN_CONTAINED_KEYWORD_BYTES: usize = 3;

static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-]+").unwrap());

/// Fold a raw token: trim, lower-case, and turn whitespace/hyphen runs into `_`
fn fold_token(raw: &str) -> String {
    SEPARATOR_RUNS
        .replace_all(raw.trim(), "_")
        .to_lowercase()
}

/// Map a free-text status token to a [`Status`]
///
/// An exact keyword match wins. Otherwise the first table row with a keyword
/// contained in the token decides. Anything unmatched is [`Status::Other`].
pub fn normalize_status(raw: &str) -> Status {
    let token = fold_token(raw);
    if token.is_empty() {
        return Status::Other;
    }

    for (status, keywords) in STATUS_KEYWORDS {
        if keywords.iter().any(|k| *k == token) {
            return *status;
        }
    }

    STATUS_KEYWORDS
        .iter()
        .find(|(_, keywords)| {
            keywords
                .iter()
                .any(|k| k.len() >= MIN_CONTAINED_KEYWORD_BYTES && token.contains(k))
        })
        .map(|(status, _)| *status)
        .unwrap_or(Status::Other)
}
