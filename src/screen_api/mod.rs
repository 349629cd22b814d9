//! Monitor enumeration and screenshot capture.
//! [XcapCapturer] is the main artifact of this module. It wraps the `xcap`
//! crate behind a trait so that the capture loop can be driven by mocks in
//! tests.

use std::{fmt::Display, sync::Arc};

use anyhow::{anyhow, Result};
use image::RgbaImage;
use xcap::Monitor;

/// Description of a single connected monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    pub id: u32,
    pub name: Arc<str>,
    pub width: u32,
    pub height: u32,
    pub primary: bool,
}

impl Display for MonitorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}x{}){}",
            self.name,
            self.width,
            self.height,
            if self.primary { " [primary]" } else { "" }
        )
    }
}

/// Which monitors a capture tick should photograph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonitorSelection {
    /// The primary monitor, or the first one when no monitor reports itself
    /// as primary.
    #[default]
    Primary,
    All,
    Single(u32),
}

impl MonitorSelection {
    /// Resolves the selection against an enumeration result. Requesting an id
    /// that is not connected is an error, everything else narrows the list.
    pub fn resolve(&self, mut monitors: Vec<MonitorInfo>) -> Result<Vec<MonitorInfo>> {
        if monitors.is_empty() {
            return Err(anyhow!("No monitors found"));
        }
        match self {
            MonitorSelection::All => Ok(monitors),
            MonitorSelection::Primary => {
                let index = monitors.iter().position(|m| m.primary).unwrap_or(0);
                Ok(vec![monitors.swap_remove(index)])
            }
            MonitorSelection::Single(id) => {
                let index = monitors
                    .iter()
                    .position(|m| m.id == *id)
                    .ok_or_else(|| anyhow!("Monitor with id {id} not found"))?;
                Ok(vec![monitors.swap_remove(index)])
            }
        }
    }
}

/// Contract for taking screenshots of connected monitors.
#[cfg_attr(test, mockall::automock)]
pub trait ScreenCapturer: Send + 'static {
    fn monitors(&mut self) -> Result<Vec<MonitorInfo>>;

    /// Captures a full frame of the monitor with the given id.
    fn capture(&mut self, monitor_id: u32) -> Result<RgbaImage>;
}

/// Production [ScreenCapturer] backed by `xcap`. Monitors are re-enumerated
/// on every call since displays can be plugged in or out while the daemon
/// runs.
pub struct XcapCapturer;

impl XcapCapturer {
    pub fn new() -> Self {
        Self
    }

    fn all_monitors() -> Result<Vec<Monitor>> {
        Ok(Monitor::all()?)
    }
}

impl Default for XcapCapturer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenCapturer for XcapCapturer {
    fn monitors(&mut self) -> Result<Vec<MonitorInfo>> {
        Ok(Self::all_monitors()?
            .iter()
            .map(|m| MonitorInfo {
                id: m.id(),
                name: m.name().into(),
                width: m.width(),
                height: m.height(),
                primary: m.is_primary(),
            })
            .collect())
    }

    fn capture(&mut self, monitor_id: u32) -> Result<RgbaImage> {
        let monitors = Self::all_monitors()?;
        let monitor = monitors
            .iter()
            .find(|m| m.id() == monitor_id)
            .ok_or_else(|| anyhow!("Monitor with id {monitor_id} is no longer connected"))?;
        // On macOS a failure here usually means the screen recording
        // permission was never granted.
        Ok(monitor.capture_image()?)
    }
}
