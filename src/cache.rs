//! Bounded cache of built message trees

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::ParserConfig;

/// How a cached tree was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Built without a crypto service
    Raw,
    /// Built with signatures checked and armor decrypted
    Decrypted,
}

/// Cache key: message identity plus decode mode
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub message_id: String,
    pub mode: DecodeMode,
}

impl CacheKey {
    #[must_use]
    pub fn new(message_id: impl Into<String>, mode: DecodeMode) -> Self {
        Self {
            message_id: message_id.into(),
            mode,
        }
    }
}

/// Most-recent-first cache holding at most `capacity` entries.
///
/// A single lock covers each lookup and each splice, so the cache can be
/// shared between threads.
#[derive(Debug)]
pub struct ParseCache<V> {
    entries: Mutex<VecDeque<(CacheKey, Arc<V>)>>,
    capacity: usize,
}

impl<V> Default for ParseCache<V> {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CACHE_CAPACITY)
    }
}

impl<V> ParseCache<V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    #[must_use]
    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(config.cache_capacity)
    }

    /// Look up `key`. Lookups do not change the entry order.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let entries = self.entries.lock();
        entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| Arc::clone(v))
    }

    /// Insert `value` as the newest entry, replacing any entry for `key`
    /// and dropping the oldest entries beyond capacity.
    pub fn put(&self, key: CacheKey, value: Arc<V>) {
        let mut entries = self.entries.lock();
        entries.retain(|(k, _)| *k != key);
        entries.push_front((key, value));
        entries.truncate(self.capacity);
    }

    /// Remove the entry for `key`; returns whether one existed
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(k, _)| k != key);
        entries.len() != before
    }

    /// Remove every entry of `message_id`, whatever its mode
    pub fn invalidate_message(&self, message_id: &str) {
        self.entries
            .lock()
            .retain(|(k, _)| k.message_id != message_id);
    }

    /// Remove every entry built in `mode`
    pub fn invalidate_mode(&self, mode: DecodeMode) {
        self.entries.lock().retain(|(k, _)| k.mode != mode);
    }

    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
