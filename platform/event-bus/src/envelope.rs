//! # Event Envelope
//!
//! The unit carried over the transport: `{ channel, data }`.
//!
//! `eventId` and `occurredAt` are metadata for logs and dead-letter
//! correlation. They play no part in ordering; per-aggregate order is carried
//! by the `version` field inside `data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard envelope wrapping every published event
///
/// # Examples
///
/// ```rust
/// use event_bus::Envelope;
/// use serde_json::json;
///
/// let envelope = Envelope::new("order.cancelled", json!({"id": "o1", "version": 1}));
/// let bytes = envelope.to_bytes().unwrap();
/// let decoded: Envelope<serde_json::Value> = Envelope::from_bytes(&bytes).unwrap();
/// assert_eq!(decoded.channel, "order.cancelled");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Channel the event is published on; must match the payload's contract
    pub channel: String,

    /// Unique identifier of this publication
    pub event_id: Uuid,

    /// When the publisher created the envelope
    pub occurred_at: DateTime<Utc>,

    /// Event-kind-specific payload
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(channel: impl Into<String>, data: T) -> Self {
        Self {
            channel: channel.into(),
            event_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            data,
        }
    }

    /// Create an envelope with explicit event_id (useful for testing)
    pub fn with_event_id(mut self, event_id: Uuid) -> Self {
        self.event_id = event_id;
        self
    }
}

impl<T: Serialize> Envelope<T> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl<T: serde::de::DeserializeOwned> Envelope<T> {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Validate the envelope frame of an undecoded message
///
/// Checks that `channel` is a non-empty string, that `eventId` parses as a
/// UUID and that `data` is an object. The payload itself is validated by the
/// event contract.
pub fn validate_envelope_fields(envelope: &serde_json::Value) -> Result<(), String> {
    let channel = envelope
        .get("channel")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid channel")?;

    if channel.is_empty() {
        return Err("channel cannot be empty".to_string());
    }

    let event_id = envelope
        .get("eventId")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid eventId")?;
    Uuid::parse_str(event_id).map_err(|e| format!("eventId is not a UUID: {e}"))?;

    envelope
        .get("occurredAt")
        .and_then(|v| v.as_str())
        .ok_or("Missing or invalid occurredAt")?;

    if !envelope.get("data").is_some_and(|d| d.is_object()) {
        return Err("data must be an object".to_string());
    }

    Ok(())
}
