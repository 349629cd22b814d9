use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The struct used for storing activity on disk. The intention is to only
/// save intervals so that an hour of uninterrupted work is a single line
/// instead of sixty samples.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone)]
pub struct ActivityIntervalEntity {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "duration_ser")]
    pub duration: Duration,
    pub active: bool,
}

impl ActivityIntervalEntity {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.duration
    }

    pub fn set_end(&mut self, v: DateTime<Utc>) {
        self.duration = v - self.start;
    }

    pub fn with_duration(self, duration: Duration) -> Self {
        Self { duration, ..self }
    }
}

mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        let duration = Duration::seconds(s);
        Ok(duration)
    }
}

/// A single activity observation at a certain point in time.
#[derive(PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize, Clone)]
pub struct ActivitySampleEntity {
    pub moment: DateTime<Utc>,
    pub active: bool,
}

impl From<ActivitySampleEntity> for ActivityIntervalEntity {
    fn from(ActivitySampleEntity { moment, active }: ActivitySampleEntity) -> Self {
        ActivityIntervalEntity {
            start: moment,
            duration: Duration::zero(),
            active,
        }
    }
}

/// One captured image plus its metadata, as stored in the per-day manifest.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ScreenshotRecordEntity {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    pub monitor_id: u32,
    pub path: PathBuf,
}
