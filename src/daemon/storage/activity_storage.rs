use std::{
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{
        AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite,
        AsyncWriteExt, BufReader,
    },
};
use tracing::{debug, warn};

use crate::{fs::operations::seek_line_backwards, utils::time::date_to_day_dir};

use super::entities::{ActivityIntervalEntity, ActivitySampleEntity};

const ACTIVITY_FILE_NAME: &str = "activity.jsonl";

/// Interface for abstracting storage of activity intervals.
pub trait ActivityStorage {
    type RecordFile: ActivityFileHandle;

    /// Opens or creates the activity file that will be used for storing data.
    /// Data is written into one file per UTC day.
    fn create_or_append_record(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Self::RecordFile>>;

    /// Retrieves activity intervals recorded for a certain day.
    fn get_data_for(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<ActivityIntervalEntity>>> + Send;
}

impl<T: Deref> ActivityStorage for T
where
    T::Target: ActivityStorage,
{
    type RecordFile = <T::Target as ActivityStorage>::RecordFile;

    fn create_or_append_record(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Self::RecordFile>> {
        self.deref().create_or_append_record(date)
    }

    fn get_data_for(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<ActivityIntervalEntity>>> + Send {
        self.deref().get_data_for(date)
    }
}

pub trait ActivityFileHandle {
    fn append(&mut self, samples: Vec<ActivitySampleEntity>) -> impl Future<Output = Result<()>>;
    fn get_date(&self) -> NaiveDate;
    fn flush(&mut self) -> impl Future<Output = Result<()>>;
}

/// The main realization of [ActivityStorage]. Rooted at the data directory,
/// one `activity.jsonl` per day folder.
pub struct LocalActivityStorage {
    data_dir: PathBuf,
    merge_window: Duration,
}

impl LocalActivityStorage {
    pub fn new(data_dir: PathBuf, merge_window: Duration) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&data_dir)?;

        Ok(Self {
            data_dir,
            merge_window,
        })
    }

    fn activity_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(date_to_day_dir(date))
            .join(ACTIVITY_FILE_NAME)
    }

    async fn get_all_inner(&self, path: &Path) -> Result<Vec<ActivityIntervalEntity>> {
        async fn extract(
            path: &Path,
        ) -> std::result::Result<Vec<ActivityIntervalEntity>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut intervals = vec![];
            while let Ok(Some(v)) = lines.next_line().await {
                match serde_json::from_str::<ActivityIntervalEntity>(&v) {
                    Ok(v) => intervals.push(v),
                    Err(e) => {
                        // ignore illegal values. Might happen after shutdowns
                        warn!(
                            "During parsing in path {:?} found illegal json string {}:  {e}",
                            path, &v
                        )
                    }
                }
            }

            lines.into_inner().into_inner().unlock_async().await?;

            Ok(intervals)
        }

        match extract(path).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(e)?
                }
            }
        }
    }
}

impl ActivityStorage for LocalActivityStorage {
    type RecordFile = ActivityRecordFile<File>;

    async fn create_or_append_record(&self, date: NaiveDate) -> Result<Self::RecordFile> {
        let path = self.activity_path(date);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let v = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(path)
            .await?;

        Ok(ActivityRecordFile::new(v, date, self.merge_window))
    }

    async fn get_data_for(&self, date: NaiveDate) -> Result<Vec<ActivityIntervalEntity>> {
        let path = self.activity_path(date);
        let data = self.get_all_inner(&path).await?;
        Ok(data)
    }
}

pub struct ActivityRecordFile<F> {
    file: F,
    date: NaiveDate,
    merge_window: Duration,
}

impl<F: AsyncSeek + AsyncRead + AsyncWrite + fs4::tokio::AsyncFileExt + Unpin> ActivityFileHandle
    for ActivityRecordFile<F>
{
    async fn append(&mut self, samples: Vec<ActivitySampleEntity>) -> Result<()> {
        self.append_inner(samples).await
    }

    fn get_date(&self) -> NaiveDate {
        self.date
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F: AsyncSeek + AsyncRead + AsyncWrite + fs4::tokio::AsyncFileExt + Unpin>
    ActivityRecordFile<F>
{
    fn new(file: F, date: NaiveDate, merge_window: Duration) -> Self {
        Self {
            file,
            date,
            merge_window,
        }
    }

    /// Tries to read out the previous interval
    async fn extract_line_backwards(file: &mut F) -> Result<String, anyhow::Error> {
        seek_line_backwards(file, &mut vec![0; 1024]).await?;
        let mut last_line = String::new();
        file.read_to_string(&mut last_line).await?;
        Ok(last_line)
    }

    async fn append_inner(&mut self, samples: Vec<ActivitySampleEntity>) -> Result<()> {
        // Semi-safe acquire-release for a file
        self.file.lock_exclusive()?;
        let result = Self::append_with_file(&mut self.file, samples, self.merge_window).await;
        self.file.unlock_async().await?;
        result
    }

    async fn append_with_file(
        file: &mut F,
        samples: Vec<ActivitySampleEntity>,
        merge_window: Duration,
    ) -> Result<()> {
        // The process of appending a sample is as such.
        // 1. Get last interval from the file.
        // 2. Collapse the interval with the added samples.
        // 3. Overwrite last interval with updated interval and append new intervals.

        file.seek(std::io::SeekFrom::End(0)).await?;

        let last_line = Self::extract_line_backwards(file).await?;

        file.seek(std::io::SeekFrom::Current(-(last_line.len() as i64)))
            .await?;

        file.stream_position().await?;

        let last_interval: Option<ActivityIntervalEntity> = if last_line.is_empty() {
            None
        } else {
            match serde_json::from_str::<ActivityIntervalEntity>(&last_line) {
                Ok(v) => Some(v),
                Err(e) => {
                    // Might happen due to shutdown cutting off the write into a file.
                    warn!("Last record was corrupted {e}");
                    None
                }
            }
        };

        let collapsed = collapse_samples(last_interval, samples, merge_window);

        let mut buffer = Vec::<u8>::new();
        for interval in collapsed {
            serde_json::to_writer(&mut buffer, &interval)?;
            buffer.push(b'\n');
        }

        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Creates an optimal sequence of intervals. Samples that keep the same
/// activity state extend the previous interval as long as the gap between
/// them does not exceed `merge_window`; a state flip within the window
/// starts the next interval exactly where the previous one ended, so no
/// time is lost between ticks.
fn collapse_samples(
    last_interval: Option<ActivityIntervalEntity>,
    samples: impl IntoIterator<Item = ActivitySampleEntity>,
    merge_window: Duration,
) -> Vec<ActivityIntervalEntity> {
    let mut intervals = Vec::new();
    if let Some(last) = last_interval {
        intervals.push(last);
    }

    for sample in samples {
        match intervals.last_mut() {
            Some(interval)
                if interval.active == sample.active
                    && sample.moment - interval.end() <= merge_window =>
            {
                interval.set_end(sample.moment)
            }
            Some(previous_interval) if sample.moment - previous_interval.end() <= merge_window => {
                let mut next_interval: ActivityIntervalEntity = sample.into();
                next_interval.start = previous_interval.end();
                intervals.push(next_interval);
            }
            Some(_) | None => {
                intervals.push(sample.into());
            }
        }
    }

    intervals
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::{tempdir, tempfile};
    use tokio::io::{AsyncReadExt, AsyncSeekExt};

    use crate::daemon::storage::{
        activity_storage::{
            collapse_samples, ActivityFileHandle, ActivityStorage, LocalActivityStorage,
        },
        entities::{ActivityIntervalEntity, ActivitySampleEntity},
    };

    use super::ActivityRecordFile;

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    const TEST_MERGE_WINDOW: Duration = Duration::seconds(2);

    fn sample(offset_s: i64, active: bool) -> ActivitySampleEntity {
        ActivitySampleEntity {
            moment: Utc.from_utc_datetime(&TEST_START_DATE) + Duration::seconds(offset_s),
            active,
        }
    }

    #[tokio::test]
    async fn test_appender_basic() -> Result<()> {
        let file = tokio::fs::File::from_std(tempfile().unwrap());

        let mut record =
            ActivityRecordFile::new(file, Utc::now().date_naive(), TEST_MERGE_WINDOW);
        record.append_inner(vec![sample(0, true)]).await?;
        record.append_inner(vec![sample(1, false)]).await?;
        record.append_inner(vec![sample(2, false)]).await?;
        record.append_inner(vec![sample(3, false)]).await?;

        record.file.rewind().await?;
        let mut s = String::new();
        record.file.read_to_string(&mut s).await?;
        assert_eq!(s.lines().count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_appender_overwrites_last_interval() -> Result<()> {
        let mut previous = serde_json::to_string(&ActivityIntervalEntity {
            start: Utc::now() - Duration::seconds(3),
            duration: Duration::seconds(1),
            active: false,
        })?;

        previous.push('\n');

        previous += &serde_json::to_string(&ActivityIntervalEntity {
            start: Utc::now() - Duration::seconds(2),
            duration: Duration::seconds(1),
            active: true,
        })?;
        previous += "\n";

        let mut file = tempfile().unwrap();
        file.write_all(previous.as_bytes())?;
        let mut file = tokio::fs::File::from_std(file);
        file.seek(std::io::SeekFrom::End(0)).await?;

        let mut record =
            ActivityRecordFile::new(file, Utc::now().date_naive(), TEST_MERGE_WINDOW);

        record
            .append_inner(vec![ActivitySampleEntity {
                moment: Utc::now(),
                active: true,
            }])
            .await?;

        record.file.rewind().await?;
        let mut s = String::new();
        record.file.read_to_string(&mut s).await?;
        assert_eq!(s.lines().count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_activity_storage_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let storage = LocalActivityStorage::new(dir.path().to_owned(), TEST_MERGE_WINDOW)?;
        let mut record_file = storage
            .create_or_append_record(TEST_START_DATE.date())
            .await?;

        let samples = [sample(0, true), sample(1, true), sample(5, false)];
        record_file.append(vec![samples[0].clone()]).await?;
        record_file.append(vec![samples[1].clone()]).await?;
        record_file.append(vec![samples[2].clone()]).await?;
        record_file.flush().await?;

        let stored = storage.get_data_for(TEST_START_DATE.date()).await?;
        let collapsed = collapse_samples(None, samples.clone(), TEST_MERGE_WINDOW);

        assert_eq!(stored, collapsed);

        Ok(())
    }

    #[tokio::test]
    async fn test_missing_day_reads_as_empty() -> Result<()> {
        let dir = tempdir()?;
        let storage = LocalActivityStorage::new(dir.path().to_owned(), TEST_MERGE_WINDOW)?;

        let stored = storage.get_data_for(TEST_START_DATE.date()).await?;
        assert!(stored.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_collapsing_merges_same_state() -> Result<()> {
        let samples = [sample(0, true), sample(1, true), sample(5, true)];
        let values = collapse_samples(None, samples.clone(), TEST_MERGE_WINDOW);

        assert_eq!(values.len(), 2);
        assert_eq!(
            values[0],
            ActivityIntervalEntity::from(samples[0].clone())
                .with_duration(Duration::seconds(1)),
        );
        assert_eq!(
            values[1],
            ActivityIntervalEntity::from(samples[2].clone())
                .with_duration(Duration::seconds(0))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_collapsing_state_flip_bridges_gap() -> Result<()> {
        let samples = [sample(0, true), sample(1, true), sample(2, false)];
        let values = collapse_samples(None, samples.clone(), TEST_MERGE_WINDOW);

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].end(), values[1].start);
        assert!(!values[1].active);

        Ok(())
    }

    #[tokio::test]
    async fn test_collapsing_merges_gap_equal_to_window() -> Result<()> {
        // A tick landing exactly one window late still extends the interval.
        let samples = [sample(0, true), sample(2, true)];
        let values = collapse_samples(None, samples.clone(), TEST_MERGE_WINDOW);

        assert_eq!(values.len(), 1);
        assert_eq!(
            values[0],
            ActivityIntervalEntity::from(samples[0].clone())
                .with_duration(Duration::seconds(2))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_collapsing_respects_merge_window() -> Result<()> {
        let interval = ActivityIntervalEntity {
            start: Utc.from_utc_datetime(&TEST_START_DATE),
            duration: Duration::seconds(10),
            active: true,
        };

        let values = collapse_samples(
            Some(interval.clone()),
            [sample(15, true)],
            TEST_MERGE_WINDOW,
        );

        assert_eq!(values[0], interval.with_duration(Duration::seconds(10)));
        assert_eq!(
            values[1],
            ActivityIntervalEntity::from(sample(15, true))
                .with_duration(Duration::seconds(0))
        );

        Ok(())
    }
}
