use std::sync::Arc;

use tokio::sync::mpsc;

use crate::db::store::MessageStore;
use crate::models::message::Message;

use super::queue::PersistStats;

/// The single consumer of the persistence queue.
pub struct StorageWriter {
    store: Arc<dyn MessageStore>,
    rx: mpsc::Receiver<Arc<Message>>,
    stats: Arc<PersistStats>,
}

impl StorageWriter {
    pub fn new(store: Arc<dyn MessageStore>, rx: mpsc::Receiver<Arc<Message>>, stats: Arc<PersistStats>) -> Self {
        Self { store, rx, stats }
    }

    /// Insert queued messages one at a time, in queue order, until every
    /// producer is gone. A failed insert is logged and the message dropped.
    pub async fn run(mut self) {
        tracing::info!("storage writer started");

        while let Some(message) = self.rx.recv().await {
            match self.store.insert(&message).await {
                Ok(()) => self.stats.record_written(),
                Err(err) => {
                    self.stats.record_failed();
                    tracing::error!(
                        ?err,
                        sender = %message.sender(),
                        room_id = ?message.room_id(),
                        receiver = ?message.receiver(),
                        "failed to persist chat message, dropping it"
                    );
                }
            }
        }

        let stats = self.stats.snapshot();
        tracing::info!(written = stats.written, failed = stats.failed, "storage writer stopped");
    }
}
