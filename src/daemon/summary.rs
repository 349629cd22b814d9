//! Per-day usage summaries. A summary aggregates one day's activity
//! intervals and the screenshot manifest into a small report that is both
//! rendered to markdown and surfaced through a notification.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::io::AsyncWriteExt;

use crate::utils::percentage::duration_percentage;

use super::storage::entities::{ActivityIntervalEntity, ScreenshotRecordEntity};

const REPORT_DIR_NAME: &str = "reports";
const REPORT_FILE_NAME: &str = "summary.md";

/// Aggregated usage statistics for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total_active: Duration,
    pub total_inactive: Duration,
    /// Start of the first active interval of the day. This is the dynamic
    /// "day start", not midnight.
    pub first_activity: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub screenshot_count: usize,
}

impl DaySummary {
    pub fn tracked(&self) -> Duration {
        self.total_active + self.total_inactive
    }

    pub fn is_empty(&self) -> bool {
        self.tracked() == Duration::zero() && self.screenshot_count == 0
    }
}

/// Builds the summary for a day out of its stored intervals and screenshot
/// records. Total active duration is exactly the sum of active interval
/// durations.
pub fn build_summary(
    date: NaiveDate,
    intervals: &[ActivityIntervalEntity],
    screenshots: &[ScreenshotRecordEntity],
) -> DaySummary {
    let mut total_active = Duration::zero();
    let mut total_inactive = Duration::zero();
    let mut first_activity = None;
    let mut last_activity: Option<DateTime<Utc>> = None;

    for interval in intervals {
        if interval.active {
            total_active += interval.duration;
            first_activity.get_or_insert(interval.start);
            match last_activity {
                Some(previous) if previous >= interval.end() => {}
                _ => last_activity = Some(interval.end()),
            }
        } else {
            total_inactive += interval.duration;
        }
    }

    DaySummary {
        date,
        total_active,
        total_inactive,
        first_activity,
        last_activity,
        screenshot_count: screenshots.len(),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes();
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m {:02}s", duration.num_seconds() % 60)
    }
}

pub fn render_markdown(summary: &DaySummary) -> String {
    let mut report = String::new();
    report.push_str(&format!("# Daily summary for {}\n\n", summary.date));

    match (summary.first_activity, summary.last_activity) {
        (Some(first), Some(last)) => {
            report.push_str(&format!(
                "- First activity: {}\n",
                first.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            report.push_str(&format!(
                "- Last activity: {}\n",
                last.format("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        _ => report.push_str("- No activity observed\n"),
    }

    report.push_str(&format!(
        "- Active time: {}\n",
        format_duration(summary.total_active)
    ));
    report.push_str(&format!(
        "- Inactive time: {}\n",
        format_duration(summary.total_inactive)
    ));
    if summary.tracked() > Duration::zero() {
        report.push_str(&format!(
            "- Active share of tracked time: {:.0}%\n",
            *duration_percentage(summary.total_active, summary.tracked())
        ));
    }
    report.push_str(&format!(
        "- Screenshots captured: {}\n",
        summary.screenshot_count
    ));
    report
}

/// Writes the rendered report into `<day dir>/reports/summary.md` and
/// returns the path.
pub async fn write_report(day_dir: &Path, summary: &DaySummary) -> Result<PathBuf> {
    let report_dir = day_dir.join(REPORT_DIR_NAME);
    tokio::fs::create_dir_all(&report_dir).await?;

    let path = report_dir.join(REPORT_FILE_NAME);
    let mut file = tokio::fs::File::create(&path).await?;
    file.write_all(render_markdown(summary).as_bytes()).await?;
    file.flush().await?;
    Ok(path)
}
