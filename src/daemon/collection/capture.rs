use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    daemon::storage::snapshot_event::{CapturedFrame, SnapshotEvent},
    screen_api::{MonitorSelection, ScreenCapturer},
    system_api::SystemMonitor,
    utils::clock::Clock,
};

use super::activity::IdleEvaluator;

pub struct CaptureModule {
    next: mpsc::Sender<SnapshotEvent>,
    system: Box<dyn SystemMonitor>,
    capturer: Box<dyn ScreenCapturer>,
    selection: MonitorSelection,
    shutdown: CancellationToken,
    idle_evaluator: IdleEvaluator,
    collection_frequency: Duration,
    time_provider: Box<dyn Clock>,
}

impl CaptureModule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        next: mpsc::Sender<SnapshotEvent>,
        system: Box<dyn SystemMonitor>,
        capturer: Box<dyn ScreenCapturer>,
        selection: MonitorSelection,
        shutdown: CancellationToken,
        idle_evaluator: IdleEvaluator,
        collection_frequency: Duration,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            system,
            capturer,
            selection,
            shutdown,
            idle_evaluator,
            collection_frequency,
            time_provider,
        }
    }

    fn capture_frames(&mut self) -> Vec<CapturedFrame> {
        let monitors = match self
            .capturer
            .monitors()
            .and_then(|m| self.selection.resolve(m))
        {
            Ok(monitors) => monitors,
            Err(e) => {
                error!("Failed to enumerate monitors {e:?}");
                return vec![];
            }
        };

        let mut frames = Vec::with_capacity(monitors.len());
        for monitor in monitors {
            // One unreadable monitor shouldn't stop the rest from being
            // captured.
            match self.capturer.capture(monitor.id) {
                Ok(image) => frames.push(CapturedFrame {
                    monitor_id: monitor.id,
                    image,
                }),
                Err(e) => warn!("Failed to capture monitor {monitor} {e:?}"),
            }
        }
        frames
    }

    fn collect_data(&mut self) -> Result<SnapshotEvent> {
        let locked = self.system.is_session_locked()?;
        let idle_ms = self.system.get_idle_time()?;
        let active = !locked && !self.idle_evaluator.is_idle(idle_ms);
        let timestamp = self.time_provider.time();

        // While the session is locked or idle tracking pauses, only the
        // activity state is recorded.
        let frames = if active { self.capture_frames() } else { vec![] };

        Ok(SnapshotEvent {
            timestamp,
            active,
            locked,
            frames,
        })
    }

    /// Executes the capture event loop.
    pub async fn run(mut self) -> Result<()> {
        let mut collection_point = self.time_provider.instant();
        loop {
            collection_point += self.collection_frequency;

            match self.collect_data() {
                Ok(event) => {
                    let span = info_span!("Processing captured data");
                    debug!("Sending message {:?}", event);
                    self.next
                        .send(event)
                        .instrument(span)
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                    info!("Successfully sent message")
                }
                Err(e) => {
                    error!("Encountered an error during collection {:?}", e)
                }
            }

            tokio::select! {
                // Cancelation means we stop execution of the event loop. Which means we also drop
                // the sender channel and consequently stop the processing module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(collection_point) => ()
            }
        }
    }
}
