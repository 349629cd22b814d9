use std::fmt;

use chrono::{DateTime, Utc};
use image::RgbaImage;

/// A frame captured from one monitor during a tick.
#[derive(Clone)]
pub struct CapturedFrame {
    pub monitor_id: u32,
    pub image: RgbaImage,
}

// Manual Debug so that logging an event doesn't dump megabytes of pixels.
impl fmt::Debug for CapturedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedFrame")
            .field("monitor_id", &self.monitor_id)
            .field("width", &self.image.width())
            .field("height", &self.image.height())
            .finish()
    }
}

/// One tick of the capture loop: the observed activity state plus any frames
/// taken. An inactive tick carries no frames but is still recorded so that
/// idle time shows up in the day summary.
#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    pub timestamp: DateTime<Utc>,
    pub active: bool,
    pub locked: bool,
    pub frames: Vec<CapturedFrame>,
}
