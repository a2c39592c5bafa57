//! Process-wide, time-expiring cache of materialized chat models.
//!
//! Expiry is passive: entries are checked against the injected clock on
//! access, no sweeper thread. Absent models are cached too (a negative
//! entry), and expire on the same TTL so a later build is observed.

use crate::chain::ChainModel;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Time source for TTL checks. Injected so tests can advance time
/// deterministically instead of sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The real clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A deserialized chain plus the text it was trained on; overlap rejection
/// at generation time needs the corpus alongside the table.
#[derive(Debug, Clone)]
pub struct CachedModel {
    pub chain: ChainModel,
    pub corpus: String,
}

struct CacheEntry {
    /// `None` is a negative entry: the chat has no persisted model.
    model: Option<Arc<CachedModel>>,
    inserted_at: Instant,
}

/// TTL cache keyed by chat id.
pub struct ModelCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<i64, CacheEntry>>,
}

impl ModelCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock, entries: Mutex::new(HashMap::new()) }
    }

    /// Look up a chat's entry. Outer `None` means miss or expired; inner
    /// `None` is a live negative entry.
    pub fn get(&self, chat_id: i64) -> Option<Option<Arc<CachedModel>>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        if let Some(entry) = entries.get(&chat_id) {
            if now.duration_since(entry.inserted_at) < self.ttl {
                return Some(entry.model.clone());
            }
            debug!("cache entry expired for chat-id:{chat_id}");
            entries.remove(&chat_id);
        }
        None
    }

    pub fn put(&self, chat_id: i64, model: Option<Arc<CachedModel>>) {
        let entry = CacheEntry { model, inserted_at: self.clock.now() };
        self.entries.lock().unwrap().insert(chat_id, entry);
    }

    pub fn invalidate(&self, chat_id: i64) {
        self.entries.lock().unwrap().remove(&chat_id);
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().unwrap().clear();
    }
}
