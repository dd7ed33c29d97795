//! HTTP handlers for the webhook and DLQ admin endpoints.

pub mod broker;
pub mod dlq;
