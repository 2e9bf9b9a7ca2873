use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::db::pool::DbPool;
use crate::db::schema::chatlog;
use crate::error::StoreError;
use crate::models::message::{Message, NewChatlogEntry};

/// Durable sink for chat messages: one insert per message.
///
/// Backed by Postgres in production and an in-memory log in tests.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: &Message) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementation
// ---------------------------------------------------------------------------

pub struct PgMessageStore {
    db: DbPool,
}

impl PgMessageStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn insert(&self, message: &Message) -> Result<(), StoreError> {
        use diesel_async::RunQueryDsl;

        let mut conn = self.db.get().await?;
        diesel::insert_into(chatlog::table)
            .values(NewChatlogEntry::from(message))
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation (for tests / running without a database)
// ---------------------------------------------------------------------------

pub struct MemoryMessageStore {
    log: Mutex<Vec<Message>>,
    failing: AtomicBool,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// A store that rejects every insert.
    pub fn failing() -> Self {
        let store = Self::new();
        store.set_failing(true);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.log.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn insert(&self, message: &Message) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        self.log.lock().push(message.clone());
        Ok(())
    }
}
