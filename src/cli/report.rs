use std::{fmt::Display, future, sync::Arc};

use ansi_term::Style;
use anyhow::Result;
use chrono::{Duration, Local, NaiveDate, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};
use futures::{stream, Stream, StreamExt};
use now::DateTimeNow;

use crate::{
    daemon::{
        storage::{
            activity_storage::{ActivityStorage, LocalActivityStorage},
            image_store::ScreenshotStore,
        },
        summary::{build_summary, format_duration, write_report, DaySummary},
    },
    utils::{dir::create_application_default_path, percentage::duration_percentage},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(
        long = "start",
        short,
        help = "Start of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "End of the range. Examples are \"yesterday\", \"3 days ago\", \"15/03/2025\""
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(
        short,
        long,
        help = "Also write the rendered summary into the day folder"
    )]
    write: bool,
}

/// Command to process the `report` command: print (and optionally persist)
/// the day summaries between `start_date` and `end_date`. Defaults to today.
pub async fn process_report_command(
    ReportCommand {
        start_date,
        end_date,
        date_style,
        write,
    }: ReportCommand,
) -> Result<()> {
    let (start, end) = parse_range(start_date, end_date, date_style)?;

    let data_dir = create_application_default_path()?.join("data");
    // The merge window only matters for appends, reads ignore it.
    let storage = Arc::new(LocalActivityStorage::new(
        data_dir.clone(),
        Duration::seconds(120),
    )?);
    let store = Arc::new(ScreenshotStore::new(data_dir)?);

    let mut summaries = summaries_between(storage, store.clone(), start, end);

    let mut printed = 0usize;
    while let Some(result) = summaries.next().await {
        let summary = result?;
        if summary.is_empty() {
            continue;
        }
        print_summary(&summary);
        if write {
            let path = write_report(&store.day_dir(summary.date), &summary).await?;
            println!("  report written to {}", path.display());
        }
        printed += 1;
    }

    if printed == 0 {
        println!("No activity recorded between {start} and {end}");
    }
    Ok(())
}

/// Also provides sensible defaults for the `report` command.
fn parse_range(
    start_date: Option<String>,
    end_date: Option<String>,
    date_style: DateStyle,
) -> Result<(NaiveDate, NaiveDate)> {
    let now = Local::now();
    let dialect: chrono_english::Dialect = date_style.into();

    let start = match start_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate start date {e}"),
                )
                .into());
        }
        None => now.beginning_of_day(),
    };
    let end = match end_date.map(|s| parse_date_string(&s, now, dialect)) {
        Some(Ok(v)) => v.with_timezone(&Local),
        Some(Err(e)) => {
            return Err(Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate end date {e}"),
                )
                .into());
        }
        None => now,
    };

    // Reports cover whole days, keyed by the UTC day the storage uses.
    Ok((
        start.with_timezone(&Utc).date_naive(),
        end.with_timezone(&Utc).date_naive(),
    ))
}

/// Builds [DaySummary] values for every day between start (inclusive) and end
/// (inclusive). To do it in an efficient manner streams are used.
pub fn summaries_between(
    storage: Arc<impl ActivityStorage + Send + Sync + 'static>,
    store: Arc<ScreenshotStore>,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Stream<Item = Result<DaySummary>> {
    date_range(start, end)
        .map(move |day| {
            let storage = storage.clone();
            let store = store.clone();
            async move {
                let intervals = storage.get_data_for(day).await?;
                let screenshots = store.records_for(day).await?;
                Ok(build_summary(day, &intervals, &screenshots))
            }
        })
        .buffered(4)
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold((start, end), |(mut current, end)| {
        future::ready({
            if current <= end {
                let last_current = current;
                current = current.succ_opt().expect("End of time should never happen");
                Some((last_current, (current, end)))
            } else {
                None
            }
        })
    })
}

fn print_summary(summary: &DaySummary) {
    println!("{}", Style::new().bold().paint(summary.date.to_string()));
    match (summary.first_activity, summary.last_activity) {
        (Some(first), Some(last)) => {
            let first = first.with_timezone(&Local);
            let last = last.with_timezone(&Local);
            println!(
                "  active {} ({}%) from {} to {}",
                format_duration(summary.total_active),
                *duration_percentage(summary.total_active, summary.tracked()) as i32,
                first.format("%H:%M"),
                last.format("%H:%M"),
            );
        }
        _ => println!("  no activity observed"),
    }
    println!("  {} screenshots", summary.screenshot_count);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio_stream::StreamExt;

    use crate::daemon::storage::{
        activity_storage::{ActivityFileHandle, ActivityStorage, LocalActivityStorage},
        entities::ActivitySampleEntity,
        image_store::ScreenshotStore,
    };

    use super::{date_range, parse_range, summaries_between, DateStyle};

    #[test]
    fn range_parsing_follows_the_dialect() {
        // Midnight-local dates shift with the host timezone once converted
        // to UTC, so the assertions are on the range width instead of
        // absolute dates.
        let (start, end) = parse_range(
            Some("15/03/2025".into()),
            Some("17/03/2025".into()),
            DateStyle::Uk,
        )
        .unwrap();
        assert_eq!((end - start).num_days(), 2);

        let (start, end) = parse_range(
            Some("03/15/2025".into()),
            Some("03/17/2025".into()),
            DateStyle::Us,
        )
        .unwrap();
        assert_eq!((end - start).num_days(), 2);
    }

    #[test]
    fn relative_dates_are_understood() {
        let (start, end) =
            parse_range(Some("yesterday".into()), None, DateStyle::Uk).unwrap();
        assert!(start < end);
        assert!((end - start).num_days() <= 2);
    }

    #[test]
    fn missing_dates_default_to_today() {
        let (start, end) = parse_range(None, None, DateStyle::Uk).unwrap();
        assert!(start <= end);
        assert!((end - start).num_days() <= 1);
    }

    #[test]
    fn garbage_dates_are_rejected() {
        assert!(parse_range(Some("not a date".into()), None, DateStyle::Uk).is_err());
        assert!(parse_range(None, Some("soonish".into()), DateStyle::Us).is_err());
    }

    #[tokio::test]
    async fn date_range_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 3, 9).unwrap();

        let days: Vec<_> = date_range(start, end).collect().await;
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], start);
        assert_eq!(days[2], end);
    }

    #[tokio::test]
    async fn summaries_cover_each_day_in_range() -> Result<()> {
        let dir = tempdir()?;
        let storage = Arc::new(LocalActivityStorage::new(
            dir.path().to_owned(),
            Duration::seconds(120),
        )?);
        let store = Arc::new(ScreenshotStore::new(dir.path().to_owned())?);

        let day_one = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        let day_two = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();

        let mut handle = storage.create_or_append_record(day_one).await?;
        handle
            .append(vec![
                ActivitySampleEntity {
                    moment: Utc.with_ymd_and_hms(2025, 3, 7, 9, 0, 0).unwrap(),
                    active: true,
                },
                ActivitySampleEntity {
                    moment: Utc.with_ymd_and_hms(2025, 3, 7, 9, 1, 0).unwrap(),
                    active: true,
                },
            ])
            .await?;
        handle.flush().await?;

        let summaries: Vec<_> = summaries_between(storage, store, day_one, day_two)
            .collect()
            .await;

        assert_eq!(summaries.len(), 2);
        let first = summaries[0].as_ref().unwrap();
        assert_eq!(first.date, day_one);
        assert_eq!(first.total_active, chrono::Duration::seconds(60));

        let second = summaries[1].as_ref().unwrap();
        assert!(second.is_empty());
        Ok(())
    }
}
