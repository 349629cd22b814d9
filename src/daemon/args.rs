use std::path::PathBuf;

use chrono::NaiveTime;
use clap::Parser;
use tracing::level_filters::LevelFilter;

fn parse_summary_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| format!("Expected a time like 17:00: {e}"))
}

#[derive(Parser, Debug)]
pub struct DaemonArgs {
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    #[arg(long, default_value_t = 60, help = "Seconds between capture ticks")]
    pub interval: u64,
    #[arg(
        long = "idle-threshold",
        default_value_t = 120,
        help = "Seconds without input after which the user counts as inactive"
    )]
    pub idle_threshold: u32,
    #[arg(long, help = "Capture only the monitor with this id")]
    pub monitor: Option<u32>,
    #[arg(
        long = "all-monitors",
        help = "Capture every connected monitor instead of the primary one"
    )]
    pub all_monitors: bool,
    #[arg(
        long = "summary-time",
        value_parser = parse_summary_time,
        default_value = "17:00",
        help = "Local time of day after which the day summary is produced"
    )]
    pub summary_time: NaiveTime,
    #[arg(long = "no-notify", help = "Disable desktop notifications")]
    pub no_notify: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::screen_api::MonitorSelection;

    use super::DaemonArgs;

    #[test]
    fn default_values() {
        let args = DaemonArgs::parse_from(["snaptrack-daemon"]);
        assert_eq!(args.interval, 60);
        assert_eq!(args.idle_threshold, 120);
        assert!(!args.no_notify);

        let config: crate::daemon::DaemonConfig = args.into();
        assert_eq!(config.selection, MonitorSelection::Primary);
    }

    #[test]
    fn monitor_flags_map_to_selection() {
        let args = DaemonArgs::parse_from(["snaptrack-daemon", "--monitor", "3"]);
        let config: crate::daemon::DaemonConfig = args.into();
        assert_eq!(config.selection, MonitorSelection::Single(3));

        let args = DaemonArgs::parse_from(["snaptrack-daemon", "--all-monitors"]);
        let config: crate::daemon::DaemonConfig = args.into();
        assert_eq!(config.selection, MonitorSelection::All);
    }

    #[test]
    fn summary_time_must_be_a_time() {
        assert!(DaemonArgs::try_parse_from(["snaptrack-daemon", "--summary-time", "later"])
            .is_err());
        let args = DaemonArgs::parse_from(["snaptrack-daemon", "--summary-time", "18:30"]);
        assert_eq!(
            args.summary_time,
            chrono::NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );
    }
}
