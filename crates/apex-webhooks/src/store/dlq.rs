//! Dead letter queue storage.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::DlqEntry;

/// Append/list/delete collection of failed event payloads.
///
/// The store exclusively owns its entries; callers receive clones.
#[async_trait]
pub trait DlqStore: Send + Sync {
    /// Append a failed event.
    async fn append(&self, entry: DlqEntry);

    /// Look up an entry by id.
    async fn get(&self, id: Uuid) -> Option<DlqEntry>;

    /// Remove an entry, returning it if present.
    async fn remove(&self, id: Uuid) -> Option<DlqEntry>;

    /// Increment the attempt counter after a failed replay.
    async fn record_attempt(&self, id: Uuid);

    /// Most-recent-first bounded view of the queue.
    async fn list(&self, limit: usize) -> Vec<DlqEntry>;

    /// Number of entries currently held.
    async fn len(&self) -> usize;
}

/// In-memory DLQ bounded by capacity; the oldest entry is dropped when full.
pub struct InMemoryDlqStore {
    entries: Mutex<VecDeque<DlqEntry>>,
    capacity: usize,
}

/// Default number of entries retained.
pub const DEFAULT_DLQ_CAPACITY: usize = 1000;

impl InMemoryDlqStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }
}

impl Default for InMemoryDlqStore {
    fn default() -> Self {
        Self::new(DEFAULT_DLQ_CAPACITY)
    }
}

#[async_trait]
impl DlqStore for InMemoryDlqStore {
    async fn append(&self, entry: DlqEntry) {
        let mut entries = self.entries.lock().expect("dlq lock poisoned");
        if entries.len() == self.capacity {
            if let Some(dropped) = entries.pop_front() {
                tracing::warn!(
                    target: "dlq",
                    dlq_id = %dropped.id,
                    kind = %dropped.kind,
                    "DLQ at capacity, dropping oldest entry"
                );
            }
        }
        entries.push_back(entry);
    }

    async fn get(&self, id: Uuid) -> Option<DlqEntry> {
        let entries = self.entries.lock().expect("dlq lock poisoned");
        entries.iter().find(|e| e.id == id).cloned()
    }

    async fn remove(&self, id: Uuid) -> Option<DlqEntry> {
        let mut entries = self.entries.lock().expect("dlq lock poisoned");
        let pos = entries.iter().position(|e| e.id == id)?;
        entries.remove(pos)
    }

    async fn record_attempt(&self, id: Uuid) {
        let mut entries = self.entries.lock().expect("dlq lock poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.id == id) {
            entry.attempts += 1;
        }
    }

    async fn list(&self, limit: usize) -> Vec<DlqEntry> {
        let entries = self.entries.lock().expect("dlq lock poisoned");
        entries.iter().rev().take(limit).cloned().collect()
    }

    async fn len(&self) -> usize {
        self.entries.lock().expect("dlq lock poisoned").len()
    }
}
