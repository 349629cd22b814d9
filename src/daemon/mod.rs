use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use chrono::NaiveTime;
use collection::{activity::IdleEvaluator, capture::CaptureModule};
use notify::{DesktopNotifier, NoopNotifier, Notifier};
use processing::{local_save::LocalSaver, ProcessingModule};
use storage::{activity_storage::LocalActivityStorage, image_store::ScreenshotStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::{
    daemon::storage::snapshot_event::SnapshotEvent,
    screen_api::{MonitorSelection, ScreenCapturer, XcapCapturer},
    system_api::{GenericSystemMonitor, SystemMonitor},
    utils::clock::{Clock, DefaultClock},
};

use self::args::DaemonArgs;

pub mod args;
pub mod collection;
pub mod notify;
pub mod processing;
pub mod shutdown;
pub mod storage;
pub mod summary;

/// Runtime settings of the daemon, resolved from [DaemonArgs].
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub interval: Duration,
    pub idle_threshold_s: u32,
    pub selection: MonitorSelection,
    pub summary_time: NaiveTime,
    pub notifications: bool,
}

impl DaemonConfig {
    /// Window within which consecutive samples collapse into one interval.
    /// Twice the tick length tolerates a slow capture without splitting the
    /// timeline.
    fn merge_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.interval.as_secs() as i64 * 2)
    }
}

impl From<DaemonArgs> for DaemonConfig {
    fn from(args: DaemonArgs) -> Self {
        let selection = match (args.monitor, args.all_monitors) {
            (Some(id), _) => MonitorSelection::Single(id),
            (None, true) => MonitorSelection::All,
            (None, false) => MonitorSelection::Primary,
        };
        Self {
            interval: Duration::from_secs(args.interval),
            idle_threshold_s: args.idle_threshold,
            selection,
            summary_time: args.summary_time,
            notifications: !args.no_notify,
        }
    }
}

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf, config: DaemonConfig) -> Result<()> {
    std::env::set_current_dir("/")?;

    let (sender, receiver) = mpsc::channel::<SnapshotEvent>(10);
    let system = GenericSystemMonitor::new()?;
    let capturer = XcapCapturer::new();

    let mut notifier: Box<dyn Notifier> = if config.notifications {
        Box::new(DesktopNotifier::new())
    } else {
        Box::new(NoopNotifier)
    };
    notifier.notify("snaptrack", "Time tracking started");

    let shutdown_token = CancellationToken::new();

    let collector = create_collector(
        sender,
        system,
        capturer,
        &config,
        &shutdown_token,
        DefaultClock,
    );

    let processor = create_processor(dir.join("data"), &config, receiver, notifier)?;

    let (_, collection_result, processing_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        collector.run(),
        processor.run(),
    );

    if let Err(collection_result) = collection_result {
        error!("Capture module got an error {:?}", collection_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    Ok(())
}

fn create_collector(
    sender: mpsc::Sender<SnapshotEvent>,
    system: impl SystemMonitor,
    capturer: impl ScreenCapturer,
    config: &DaemonConfig,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> CaptureModule {
    CaptureModule::new(
        sender,
        Box::new(system),
        Box::new(capturer),
        config.selection,
        shutdown_token.clone(),
        IdleEvaluator::from_seconds(config.idle_threshold_s),
        config.interval,
        Box::new(clock),
    )
}

fn create_processor(
    data_dir: PathBuf,
    config: &DaemonConfig,
    receiver: mpsc::Receiver<SnapshotEvent>,
    notifier: Box<dyn Notifier>,
) -> Result<ProcessingModule<LocalSaver<LocalActivityStorage>>, anyhow::Error> {
    let activity_storage = LocalActivityStorage::new(data_dir.clone(), config.merge_window())?;
    let screenshot_store = ScreenshotStore::new(data_dir)?;
    let saver = LocalSaver::new(
        activity_storage,
        screenshot_store,
        notifier,
        config.summary_time,
    );
    Ok(ProcessingModule::new(receiver, saver))
}
