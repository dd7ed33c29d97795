//! Broker webhook ingestion pipeline with replay protection.
//!
//! Provides HMAC-SHA256 signature verification over raw request bodies,
//! a timestamp freshness gate, an idempotency ledger, and a dead letter
//! queue whose destructive operations require two-eyes (dual-control)
//! approval.

pub mod crypto;
pub mod downstream;
pub mod error;
pub mod freshness;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;
pub mod two_eyes;

pub use downstream::{Downstream, EventHandler, HttpDownstream, NoopDownstream, NoopHandler};
pub use error::WebhookError;
pub use models::{DlqEntry, InboundEvent};
pub use router::{ops_router, OpsState};
pub use store::{DlqStore, IdempotencyStore, InMemoryDlqStore, InMemoryIdempotencyStore};
