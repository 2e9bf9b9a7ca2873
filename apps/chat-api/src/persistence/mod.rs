//! Write-behind persistence: hubs hand accepted messages to a bounded queue,
//! a single writer task drains it into the [`MessageStore`].
//!
//! Delivery never waits on storage. A message that cannot be queued, or whose
//! insert fails, is logged and counted, then dropped.

pub mod queue;
pub mod writer;

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::db::store::MessageStore;

pub use queue::{PersistStats, PersistStatsSnapshot, PersistenceQueue};
pub use writer::StorageWriter;

/// Create the queue and spawn its writer. The writer finishes once every
/// clone of the returned queue has been dropped and the backlog is written.
pub fn start(store: Arc<dyn MessageStore>, capacity: usize) -> (PersistenceQueue, JoinHandle<()>) {
    let (queue, rx) = PersistenceQueue::new(capacity);
    let writer = StorageWriter::new(store, rx, queue.stats());
    (queue, tokio::spawn(writer.run()))
}
