use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use tracing::{debug, info};

use crate::daemon::{
    notify::Notifier,
    storage::{
        activity_storage::{ActivityFileHandle, ActivityStorage},
        entities::ActivitySampleEntity,
        image_store::ScreenshotStore,
        snapshot_event::SnapshotEvent,
    },
    summary::{build_summary, format_duration, write_report},
};

use super::module::EventProcessor;

/// Represents the saving module. It bridges
/// [ProcessingModule](super::ProcessingModule) with the two stores and owns
/// the day boundary: when events start arriving for a new day the previous
/// day is flushed and summarized, and a configured cutoff time produces the
/// summary early (the "end of workday" notification).
pub struct LocalSaver<R: ActivityStorage> {
    activity_storage: R,
    screenshot_store: ScreenshotStore,
    notifier: Box<dyn Notifier>,
    current_handle: Option<R::RecordFile>,
    summary_time: NaiveTime,
    summarized_today: bool,
}

impl<R: ActivityStorage> LocalSaver<R> {
    pub fn new(
        activity_storage: R,
        screenshot_store: ScreenshotStore,
        notifier: Box<dyn Notifier>,
        summary_time: NaiveTime,
    ) -> Self {
        Self {
            activity_storage,
            screenshot_store,
            notifier,
            current_handle: None,
            summary_time,
            summarized_today: false,
        }
    }

    /// Moves the active file handle onto `today`, closing out the previous
    /// day when the date changes.
    async fn roll_day(&mut self, today: NaiveDate) -> Result<()> {
        if let Some(open_date) = self.current_handle.as_ref().map(|h| h.get_date()) {
            if open_date != today {
                if let Some(mut file) = self.current_handle.take() {
                    file.flush().await?;
                }
                self.summarize(open_date).await?;
                self.summarized_today = false;
            }
        }

        if self.current_handle.is_none() {
            self.current_handle = Some(
                self.activity_storage
                    .create_or_append_record(today)
                    .await?,
            );
        }
        Ok(())
    }

    /// Produces the summary once the configured cutoff time of the day has
    /// passed. Later events keep extending the stored intervals, and the day
    /// rollover rewrites the summary with the complete data.
    async fn maybe_summarize_at_cutoff(&mut self, moment: DateTime<Utc>) -> Result<()> {
        if self.summarized_today {
            return Ok(());
        }
        if moment.with_timezone(&Local).time() < self.summary_time {
            return Ok(());
        }

        self.summarize(moment.date_naive()).await?;
        self.summarized_today = true;
        Ok(())
    }

    async fn summarize(&mut self, date: NaiveDate) -> Result<()> {
        let intervals = self.activity_storage.get_data_for(date).await?;
        let screenshots = self.screenshot_store.records_for(date).await?;
        let summary = build_summary(date, &intervals, &screenshots);

        if summary.is_empty() {
            debug!("Nothing recorded for {date}, skipping summary");
            return Ok(());
        }

        let path = write_report(&self.screenshot_store.day_dir(date), &summary).await?;
        info!("Wrote day summary to {path:?}");

        self.notifier.notify(
            "snaptrack",
            &format!(
                "Summary for {date}: {} active, {} screenshots",
                format_duration(summary.total_active),
                summary.screenshot_count
            ),
        );
        Ok(())
    }
}

impl<R: ActivityStorage> EventProcessor for LocalSaver<R> {
    async fn process_next(&mut self, event: SnapshotEvent) -> Result<()> {
        let today = event.timestamp.date_naive();
        self.roll_day(today).await?;

        for frame in &event.frames {
            self.screenshot_store
                .save_frame(event.timestamp, frame)
                .await?;
        }

        let handle = self
            .current_handle
            .as_mut()
            .ok_or_else(|| anyhow!("Activity file handle should be open after roll_day"))?;
        handle
            .append(vec![ActivitySampleEntity {
                moment: event.timestamp,
                active: event.active,
            }])
            .await?;

        self.maybe_summarize_at_cutoff(event.timestamp).await?;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        let Some(mut file) = self.current_handle.take() else {
            return Ok(());
        };
        file.flush().await?;
        let date = file.get_date();
        drop(file);
        self.summarize(date).await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, Duration, Local, NaiveTime, TimeZone, Utc};
    use image::RgbaImage;
    use tempfile::tempdir;

    use crate::daemon::{
        notify::MockNotifier,
        processing::module::EventProcessor,
        storage::{
            activity_storage::{ActivityStorage, LocalActivityStorage},
            image_store::ScreenshotStore,
            snapshot_event::{CapturedFrame, SnapshotEvent},
        },
    };

    use super::LocalSaver;

    const TEST_MERGE_WINDOW: Duration = Duration::seconds(120);

    fn end_of_day() -> NaiveTime {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap()
    }

    fn event(timestamp: DateTime<Utc>, active: bool, frames: u32) -> SnapshotEvent {
        SnapshotEvent {
            timestamp,
            active,
            locked: false,
            frames: (0..frames)
                .map(|monitor_id| CapturedFrame {
                    monitor_id,
                    image: RgbaImage::new(4, 4),
                })
                .collect(),
        }
    }

    fn saver(
        data_dir: &std::path::Path,
        notifier: MockNotifier,
        summary_time: NaiveTime,
    ) -> Result<LocalSaver<LocalActivityStorage>> {
        Ok(LocalSaver::new(
            LocalActivityStorage::new(data_dir.to_owned(), TEST_MERGE_WINDOW)?,
            ScreenshotStore::new(data_dir.to_owned())?,
            Box::new(notifier),
            summary_time,
        ))
    }

    #[tokio::test]
    async fn day_rollover_writes_summary_for_previous_day() -> Result<()> {
        let dir = tempdir()?;
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).return_const(());

        // A cutoff at the last second of the day never fires in this test,
        // only the rollover summarizes.
        let mut saver = saver(dir.path(), notifier, end_of_day())?;

        let day_one = Utc.with_ymd_and_hms(2025, 3, 7, 23, 58, 0).unwrap();
        saver.process_next(event(day_one, true, 1)).await?;
        saver
            .process_next(event(day_one + Duration::seconds(60), true, 1))
            .await?;

        let day_two = Utc.with_ymd_and_hms(2025, 3, 8, 0, 0, 0).unwrap();
        saver.process_next(event(day_two, true, 0)).await?;

        let report = dir.path().join("2025-03-07/reports/summary.md");
        let contents = tokio::fs::read_to_string(&report).await?;
        assert!(contents.contains("Daily summary for 2025-03-07"));
        assert!(contents.contains("Screenshots captured: 2"));
        Ok(())
    }

    #[tokio::test]
    async fn cutoff_time_triggers_summary_once() -> Result<()> {
        let dir = tempdir()?;
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).return_const(());

        let cutoff = NaiveTime::from_hms_opt(17, 0, 0).unwrap();
        let mut saver = saver(dir.path(), notifier, cutoff)?;

        // Build timestamps through Local so the test is independent of the
        // host timezone.
        let before = Local
            .with_ymd_and_hms(2025, 3, 7, 16, 59, 0)
            .unwrap()
            .with_timezone(&Utc);
        let after = Local
            .with_ymd_and_hms(2025, 3, 7, 17, 0, 30)
            .unwrap()
            .with_timezone(&Utc);
        let later = Local
            .with_ymd_and_hms(2025, 3, 7, 17, 1, 30)
            .unwrap()
            .with_timezone(&Utc);

        saver.process_next(event(before, true, 0)).await?;
        saver.process_next(event(after, true, 0)).await?;
        // A second post-cutoff event must not notify again.
        saver.process_next(event(later, true, 0)).await?;

        let report_dir = dir.path().join(format!(
            "{}/reports/summary.md",
            before.date_naive().format("%Y-%m-%d")
        ));
        assert!(report_dir.exists());
        Ok(())
    }

    #[tokio::test]
    async fn frames_are_persisted_for_active_events() -> Result<()> {
        let dir = tempdir()?;
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().return_const(());

        let mut saver = saver(dir.path(), notifier, end_of_day())?;

        // 00:30 UTC keeps the local time clear of the cutoff in every
        // timezone.
        let moment = Utc.with_ymd_and_hms(2025, 3, 7, 0, 30, 0).unwrap();
        saver.process_next(event(moment, true, 2)).await?;

        let store = ScreenshotStore::new(dir.path().to_owned())?;
        let records = store.records_for(moment.date_naive()).await?;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.path.exists()));
        Ok(())
    }

    #[tokio::test]
    async fn finalize_summarizes_current_day() -> Result<()> {
        let dir = tempdir()?;
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).return_const(());

        let mut saver = saver(dir.path(), notifier, end_of_day())?;

        let moment = Utc.with_ymd_and_hms(2025, 3, 7, 0, 30, 0).unwrap();
        saver.process_next(event(moment, true, 0)).await?;
        saver
            .process_next(event(moment + Duration::seconds(60), false, 0))
            .await?;
        saver.finalize().await?;

        let report = dir.path().join("2025-03-07/reports/summary.md");
        assert!(report.exists());

        let storage = LocalActivityStorage::new(dir.path().to_owned(), TEST_MERGE_WINDOW)?;
        let intervals = storage.get_data_for(moment.date_naive()).await?;
        assert_eq!(intervals.len(), 2);
        Ok(())
    }
}
