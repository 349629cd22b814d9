use anyhow::Result;
use module::EventProcessor;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info};

use super::storage::snapshot_event::SnapshotEvent;

pub mod local_save;
pub mod module;

/// Represents the consumer of capture events. This module is responsible for
/// receiving events and saving them using various means.
pub struct ProcessingModule<Processor> {
    receiver: Receiver<SnapshotEvent>,
    processor: Processor,
}

impl<P: EventProcessor> ProcessingModule<P> {
    pub fn new(receiver: Receiver<SnapshotEvent>, processor: P) -> Self {
        Self {
            receiver,
            processor,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(event) = self.receiver.recv().await {
            debug!("Processing event {:?}", event);
            match self.processor.process_next(event).await {
                Ok(_) => {
                    info!("Processed event")
                }
                Err(e) => {
                    error!("Error processing event: {e:?}")
                }
            }
        }

        let result = self.processor.finalize().await;
        self.receiver.close();
        result
    }
}
