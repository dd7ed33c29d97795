//! Business services for webhook ingestion and DLQ administration.

pub mod dlq_service;
pub mod ingest_service;

pub use dlq_service::DlqService;
pub use ingest_service::{IngestOutcome, IngestService};
