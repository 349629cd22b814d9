use chrono::{DateTime, NaiveDate};

/// This is the standard way of converting a date into a day directory name.
pub fn date_to_day_dir(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// File stem used for screenshots. The monitor id is appended separately so
/// that multi-monitor captures of the same moment don't collide.
pub fn screenshot_file_name(moment: DateTime<chrono::Utc>, monitor_id: u32) -> String {
    format!(
        "screenshot_{}_monitor{monitor_id}.png",
        moment.format("%Y%m%d_%H%M%S")
    )
}
