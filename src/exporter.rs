//! CSV export and console summaries

use chrono::{DateTime, Local};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{Result, TrackerError};
use crate::models::JobApplication;
use crate::stats::{ApplicationStats, CONSOLE_TOP_COMPANIES, EXPORT_TOP_COMPANIES};

/// Timestamp format used for every date column
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Entries shown in the recent-activity listing
pub const RECENT_ACTIVITY_LIMIT: usize = 5;

pub const APPLICATION_HEADERS: [&str; 10] = [
    "Company",
    "Position",
    "Status",
    "Location",
    "Description",
    "Sender",
    "Subject",
    "Email Date",
    "Folder",
    "Extracted At",
];

/// Quote a field only when it holds a comma, a quote or a line break
fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn push_row(out: &mut String, fields: &[&str]) {
    let row: Vec<Cow<'_, str>> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&row.join(","));
    out.push('\n');
}

/// Render the applications table, one row per outcome in pipeline order
pub fn applications_csv(applications: &[JobApplication]) -> String {
    let mut out = String::new();
    push_row(&mut out, &APPLICATION_HEADERS);

    for app in applications {
        let email_date = app.email.date.format(DATE_FORMAT).to_string();
        let extracted_at = app.extracted_at.format(DATE_FORMAT).to_string();
        push_row(
            &mut out,
            &[
                &app.company,
                &app.position,
                app.status.as_str(),
                &app.location,
                &app.description,
                &app.email.from,
                &app.email.subject,
                &email_date,
                &app.email.folder,
                &extracted_at,
            ],
        );
    }

    out
}

/// Render the two stacked statistics tables
pub fn statistics_csv(stats: &ApplicationStats) -> String {
    let mut out = String::new();

    push_row(&mut out, &["Status statistics"]);
    push_row(&mut out, &["Status", "Count"]);
    for (status, count) in stats.status_counts() {
        push_row(&mut out, &[status.as_str(), &count.to_string()]);
    }

    out.push('\n');

    push_row(
        &mut out,
        &[&format!("Top companies (top {})", EXPORT_TOP_COMPANIES)],
    );
    push_row(&mut out, &["Company", "Applications"]);
    for (company, count) in stats.top_companies(EXPORT_TOP_COMPANIES) {
        push_row(&mut out, &[company, &count.to_string()]);
    }

    out
}

async fn write_file(path: &Path, content: String) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TrackerError::ExportError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|e| TrackerError::ExportError(format!("Failed to write {}: {}", path.display(), e)))
}

pub async fn export_applications(path: &Path, applications: &[JobApplication]) -> Result<()> {
    write_file(path, applications_csv(applications)).await?;
    info!("Exported {} applications to {}", applications.len(), path.display());
    Ok(())
}

pub async fn export_statistics(path: &Path, stats: &ApplicationStats) -> Result<()> {
    write_file(path, statistics_csv(stats)).await?;
    info!("Exported statistics to {}", path.display());
    Ok(())
}

/// Default statistics file: `job_statistics_YYYYMMDD_HHMMSS.csv` beside the applications file
pub fn statistics_path(applications_file: &Path, now: DateTime<Local>) -> PathBuf {
    let name = format!("job_statistics_{}.csv", now.format("%Y%m%d_%H%M%S"));
    match applications_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join(name),
        _ => PathBuf::from(name),
    }
}

/// Console summary: totals, per-status counts and the busiest companies
pub fn render_summary(stats: &ApplicationStats) -> String {
    if stats.total() == 0 {
        return "No job-related emails found\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "=== Job application summary ===");
    let _ = writeln!(out, "Found {} job-related emails", stats.total());
    let _ = writeln!(out);
    let _ = writeln!(out, "By status:");
    for (status, count) in stats.status_counts() {
        if count > 0 {
            let _ = writeln!(out, "  {}: {}", status.label(), count);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Companies involved: {}", stats.company_count());

    let top = stats.top_companies(CONSOLE_TOP_COMPANIES);
    if !top.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Most applied companies:");
        for (company, count) in top {
            let _ = writeln!(out, "  {}: {}", company, count);
        }
    }

    out
}

/// First few outcomes as one-liners, with a pointer to the file for the rest
pub fn render_recent_activity(applications: &[JobApplication]) -> String {
    let mut out = String::new();
    if applications.is_empty() {
        return out;
    }

    let _ = writeln!(out, "Recent activity:");
    for app in applications.iter().take(RECENT_ACTIVITY_LIMIT) {
        let _ = writeln!(
            out,
            "  • {} - {} ({}) [{}]",
            app.company,
            app.position,
            app.status,
            app.email.date.format("%m-%d")
        );
    }

    if applications.len() > RECENT_ACTIVITY_LIMIT {
        let _ = writeln!(
            out,
            "  ... {} more, see the CSV file for details",
            applications.len() - RECENT_ACTIVITY_LIMIT
        );
    }

    out
}
