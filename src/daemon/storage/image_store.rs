use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::{date_to_day_dir, screenshot_file_name};

use super::{entities::ScreenshotRecordEntity, snapshot_event::CapturedFrame};

const MANIFEST_FILE_NAME: &str = "screenshots.jsonl";
const SCREENSHOT_DIR_NAME: &str = "screenshots";

/// Writes captured frames into the per-day folder structure and keeps a
/// jsonl manifest of what was written next to the images.
pub struct ScreenshotStore {
    data_dir: PathBuf,
}

impl ScreenshotStore {
    pub fn new(data_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&data_dir)?;

        Ok(Self { data_dir })
    }

    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.data_dir.join(date_to_day_dir(date))
    }

    fn manifest_path(&self, date: NaiveDate) -> PathBuf {
        self.day_dir(date).join(MANIFEST_FILE_NAME)
    }

    /// Saves one frame as a png and records it in the day manifest.
    pub async fn save_frame(
        &self,
        timestamp: DateTime<Utc>,
        frame: &CapturedFrame,
    ) -> Result<ScreenshotRecordEntity> {
        let date = timestamp.date_naive();
        let screenshot_dir = self.day_dir(date).join(SCREENSHOT_DIR_NAME);
        tokio::fs::create_dir_all(&screenshot_dir).await?;

        let path = screenshot_dir.join(screenshot_file_name(timestamp, frame.monitor_id));
        frame.image.save(&path)?;
        debug!("Saved screenshot {path:?}");

        let record = ScreenshotRecordEntity {
            timestamp,
            monitor_id: frame.monitor_id,
            path,
        };
        self.append_manifest(date, &record).await?;
        Ok(record)
    }

    async fn append_manifest(&self, date: NaiveDate, record: &ScreenshotRecordEntity) -> Result<()> {
        let file = File::options()
            .create(true)
            .append(true)
            .open(self.manifest_path(date))
            .await?;

        let mut buffer = serde_json::to_vec(record)?;
        buffer.push(b'\n');

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        Self::write_line(file, &buffer).await
    }

    async fn write_line(mut file: File, buffer: &[u8]) -> Result<()> {
        let result = async {
            file.write_all(buffer).await?;
            file.flush().await?;
            Ok(())
        }
        .await;
        file.unlock_async().await?;
        result
    }

    /// Reads back the manifest for a certain day. A missing manifest means no
    /// screenshots were taken.
    pub async fn records_for(&self, date: NaiveDate) -> Result<Vec<ScreenshotRecordEntity>> {
        match Self::extract(&self.manifest_path(date)).await {
            Ok(records) => Ok(records),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e)?,
        }
    }

    async fn extract(path: &Path) -> Result<Vec<ScreenshotRecordEntity>, std::io::Error> {
        debug!("Extracting {path:?}");
        let file = File::open(path).await?;
        file.lock_shared()?;
        let buffer = BufReader::new(file);
        let mut lines = buffer.lines();
        let mut records = vec![];
        while let Ok(Some(v)) = lines.next_line().await {
            match serde_json::from_str::<ScreenshotRecordEntity>(&v) {
                Ok(v) => records.push(v),
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

        Ok(records)
    }
}
