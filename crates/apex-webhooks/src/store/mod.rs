//! Injected storage interfaces for the idempotency ledger and the DLQ.
//!
//! The handlers only see trait objects, so a durable deployment can swap the
//! in-memory implementations for a persistent key-value store without
//! touching the orchestration layer.

pub mod dlq;
pub mod idempotency;

pub use dlq::{DlqStore, InMemoryDlqStore};
pub use idempotency::{IdempotencyStore, InMemoryIdempotencyStore};
