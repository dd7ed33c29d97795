//! Idempotency ledger preventing duplicate side effects from retried
//! webhook deliveries.
//!
//! Keys are only marked after the side effect is confirmed, so a crash
//! between processing and marking re-runs the delivery instead of silently
//! dropping it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Key-to-seen mapping with at most one successful processing per key for
/// the lifetime of the entry.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns true if `key` has already been marked and has not expired.
    async fn seen(&self, key: &str) -> bool;

    /// Record `key` as processed.
    async fn mark(&self, key: &str);
}

/// In-memory ledger with TTL-based expiry keyed on mark time.
///
/// Expired keys are pruned opportunistically on access, so memory stays
/// bounded by the delivery rate within one TTL window rather than by an
/// arbitrary clear-all threshold.
pub struct InMemoryIdempotencyStore {
    entries: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

/// Default retention: 24 hours, comfortably past any sane retry schedule.
pub const DEFAULT_IDEMPOTENCY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

impl InMemoryIdempotencyStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live (unexpired) keys.
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock().expect("idempotency lock poisoned");
        let ttl = self.ttl;
        let now = Instant::now();
        entries.retain(|_, marked_at| now.duration_since(*marked_at) < ttl);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDEMPOTENCY_TTL)
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn seen(&self, key: &str) -> bool {
        let entries = self.entries.lock().expect("idempotency lock poisoned");
        match entries.get(key) {
            Some(marked_at) => Instant::now().duration_since(*marked_at) < self.ttl,
            None => false,
        }
    }

    async fn mark(&self, key: &str) {
        let mut entries = self.entries.lock().expect("idempotency lock poisoned");
        let now = Instant::now();
        let ttl = self.ttl;
        entries.retain(|_, marked_at| now.duration_since(*marked_at) < ttl);
        entries.insert(key.to_string(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unmarked_key_is_not_seen() {
        let store = InMemoryIdempotencyStore::default();
        assert!(!store.seen("broker:e1:trade.closed").await);
    }

    #[tokio::test]
    async fn test_marked_key_is_seen() {
        let store = InMemoryIdempotencyStore::default();
        store.mark("broker:e1:trade.closed").await;
        assert!(store.seen("broker:e1:trade.closed").await);
        assert!(!store.seen("broker:e2:trade.closed").await);
    }

    #[tokio::test]
    async fn test_keys_expire_after_ttl() {
        let store = InMemoryIdempotencyStore::new(Duration::from_millis(20));
        store.mark("broker:e1:trade.closed").await;
        assert!(store.seen("broker:e1:trade.closed").await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!store.seen("broker:e1:trade.closed").await);
    }

    #[tokio::test]
    async fn test_expired_keys_are_pruned_on_mark() {
        let store = InMemoryIdempotencyStore::new(Duration::from_millis(20));
        store.mark("broker:e1:trade.closed").await;
        store.mark("broker:e2:trade.closed").await;

        tokio::time::sleep(Duration::from_millis(40)).await;
        store.mark("broker:e3:trade.closed").await;

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_remark_refreshes_expiry() {
        let store = InMemoryIdempotencyStore::new(Duration::from_millis(60));
        store.mark("broker:e1:trade.closed").await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.mark("broker:e1:trade.closed").await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store.seen("broker:e1:trade.closed").await);
    }
}
