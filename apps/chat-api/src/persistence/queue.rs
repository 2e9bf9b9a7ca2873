use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::PersistError;
use crate::models::message::Message;

/// Counters shared by the queue producers and the writer.
#[derive(Debug, Default)]
pub struct PersistStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    written: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PersistStatsSnapshot {
    pub enqueued: u64,
    pub dropped: u64,
    pub written: u64,
    pub failed: u64,
}

impl PersistStats {
    pub fn snapshot(&self) -> PersistStatsSnapshot {
        PersistStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn record_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Producer side of the persistence queue. Cloneable: every hub holds one.
#[derive(Clone)]
pub struct PersistenceQueue {
    sender: mpsc::Sender<Arc<Message>>,
    stats: Arc<PersistStats>,
}

impl PersistenceQueue {
    /// Create a queue holding at most `capacity` pending messages, returning
    /// the receiver its single consumer drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Arc<Message>>) {
        let (sender, rx) = mpsc::channel(capacity);
        let queue = Self {
            sender,
            stats: Arc::new(PersistStats::default()),
        };
        (queue, rx)
    }

    /// Hand a message to the writer without waiting.
    ///
    /// A full queue drops the message and reports [`PersistError::Saturated`].
    pub fn enqueue(&self, message: Arc<Message>) -> Result<(), PersistError> {
        match self.sender.try_send(message) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PersistError::Saturated)
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Err(PersistError::Closed)
            }
        }
    }

    pub fn stats(&self) -> Arc<PersistStats> {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::message::{RoomId, UserId};

    fn msg(text: &str) -> Arc<Message> {
        Arc::new(Message::room(UserId(1), RoomId(1), text, Utc::now()))
    }

    #[test]
    fn enqueue_counts_accepted_messages() {
        let (queue, mut rx) = PersistenceQueue::new(4);
        queue.enqueue(msg("a")).unwrap();
        queue.enqueue(msg("b")).unwrap();

        assert_eq!(rx.try_recv().unwrap().text(), "a");
        assert_eq!(rx.try_recv().unwrap().text(), "b");
        assert_eq!(queue.stats().snapshot().enqueued, 2);
    }

    #[test]
    fn saturated_queue_drops_instead_of_blocking() {
        let (queue, mut rx) = PersistenceQueue::new(1);
        queue.enqueue(msg("kept")).unwrap();

        assert_eq!(queue.enqueue(msg("lost")), Err(PersistError::Saturated));

        let stats = queue.stats().snapshot();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.dropped, 1);
        assert_eq!(rx.try_recv().unwrap().text(), "kept");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn enqueue_after_writer_stopped_reports_closed() {
        let (queue, rx) = PersistenceQueue::new(4);
        drop(rx);
        assert_eq!(queue.enqueue(msg("late")), Err(PersistError::Closed));
        assert_eq!(queue.stats().snapshot().dropped, 1);
    }
}
