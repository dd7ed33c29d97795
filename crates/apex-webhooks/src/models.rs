//! Domain entities for webhook ingestion and the dead letter queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Event source tag used to namespace idempotency keys.
pub const BROKER_SOURCE: &str = "broker";

/// An inbound broker event, immutable once accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip)]
    pub payload: serde_json::Value,
    #[serde(skip, default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Parse a raw webhook body into an event.
    ///
    /// Requires a string `id`; a missing `type` is recorded as empty, so
    /// untyped events still dedup on their id. The full JSON document is
    /// retained as the opaque payload.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let payload: serde_json::Value = serde_json::from_slice(raw).ok()?;
        let id = payload.get("id")?.as_str()?.to_string();
        let event_type = payload
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        Some(Self {
            id,
            event_type,
            payload,
            received_at: Utc::now(),
        })
    }

    /// Composite idempotency key: `source:event_id:event_type`.
    pub fn idempotency_key(&self) -> String {
        format!("{}:{}:{}", BROKER_SOURCE, self.id, self.event_type)
    }
}

/// A failed event held for manual inspection or retry.
///
/// Exclusively owned by the DLQ store; destroyed on successful replay or
/// explicit operator deletion.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DlqEntry {
    pub id: Uuid,
    /// Event type of the failed event.
    pub kind: String,
    /// Originating system (e.g. `broker`).
    pub source: String,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    /// Number of delivery attempts, incremented on each failed replay.
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

impl DlqEntry {
    /// Create a fresh entry for a failed event.
    pub fn new(kind: impl Into<String>, source: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            source: source.into(),
            payload,
            attempts: 0,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_event() {
        let evt = InboundEvent::parse(br#"{"id":"e1","type":"trade.closed","volume":12}"#)
            .expect("valid event");
        assert_eq!(evt.id, "e1");
        assert_eq!(evt.event_type, "trade.closed");
        assert_eq!(evt.payload["volume"], 12);
    }

    #[test]
    fn test_parse_rejects_bad_json() {
        assert!(InboundEvent::parse(b"{not json").is_none());
    }

    #[test]
    fn test_parse_rejects_missing_id() {
        assert!(InboundEvent::parse(br#"{"type":"trade.closed"}"#).is_none());
        assert!(InboundEvent::parse(br#"{"id":7,"type":"trade.closed"}"#).is_none());
    }

    #[test]
    fn test_parse_defaults_missing_type() {
        let evt = InboundEvent::parse(br#"{"id":"e1"}"#).expect("id-only event");
        assert_eq!(evt.event_type, "");
        assert_eq!(evt.idempotency_key(), "broker:e1:");
    }

    #[test]
    fn test_idempotency_key_shape() {
        let evt = InboundEvent::parse(br#"{"id":"e1","type":"trade.closed"}"#).unwrap();
        assert_eq!(evt.idempotency_key(), "broker:e1:trade.closed");
    }

    #[test]
    fn test_new_dlq_entry_starts_at_zero_attempts() {
        let entry = DlqEntry::new("trade.closed", "broker", serde_json::json!({"id": "e1"}));
        assert_eq!(entry.attempts, 0);
        assert_eq!(entry.source, "broker");
    }
}
