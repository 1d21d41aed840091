//! # Platform Event Contracts
//!
//! The compile-time catalog every service builds against: one [`Channel`] per
//! event kind and exactly one payload schema per channel.
//!
//! A kind is a marker type implementing [`EventContract`]. Publishers and
//! listeners are generic over the marker, so a payload can only ever be
//! published on, or decoded from, the channel its contract names.
//!
//! ## Evolution rules
//!
//! Schemas change additively: a new field must be optional
//! (`#[serde(default)]`). Fields are never removed or retyped on an existing
//! channel. Unknown fields are ignored when decoding so older consumers keep
//! accepting newer payloads.

mod channel;
pub mod events;
pub mod registry;

pub use channel::{Channel, DEAD_LETTER_PREFIX};
pub use events::expiration::{ExpirationComplete, ExpirationCompleteData};
pub use events::orders::{
    OrderCancelled, OrderCancelledData, OrderCreated, OrderCreatedData, OrderStatus, TicketIdRef,
    TicketRef,
};
pub use events::payments::{PaymentCreated, PaymentCreatedData};
pub use events::tickets::{TicketCreated, TicketCreatedData, TicketUpdated, TicketUpdatedData};
pub use registry::{descriptor, stream_subjects, ContractDescriptor, REGISTRY};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// Payload did not match the schema of its channel
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("payload on {channel} does not match its schema: {reason}")]
    Malformed { channel: Channel, reason: String },

    #[error("payload on {channel} has invalid {field}: {reason}")]
    InvalidField {
        channel: Channel,
        field: &'static str,
        reason: String,
    },

    #[error("envelope for {actual} delivered to a {expected} consumer")]
    ChannelMismatch { expected: Channel, actual: String },
}

/// One event kind: its fixed channel and payload type
pub trait EventContract: Send + Sync + 'static {
    const CHANNEL: Channel;

    type Data: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Field-level rules serde cannot express
    fn validate(_data: &Self::Data) -> Result<(), SchemaError> {
        Ok(())
    }
}

/// Payload of an event that moves a replicated aggregate forward
pub trait Versioned {
    /// Identity of the aggregate the event applies to
    fn aggregate_id(&self) -> &str;

    /// Version of the aggregate after the event; 0 at creation
    fn version(&self) -> i64;
}

/// Decode and validate a payload against the contract of `E`
pub fn decode<E: EventContract>(data: serde_json::Value) -> Result<E::Data, SchemaError> {
    let decoded: E::Data = serde_json::from_value(data).map_err(|e| SchemaError::Malformed {
        channel: E::CHANNEL,
        reason: e.to_string(),
    })?;
    E::validate(&decoded)?;
    Ok(decoded)
}

pub(crate) fn require_non_empty(
    channel: Channel,
    field: &'static str,
    value: &str,
) -> Result<(), SchemaError> {
    if value.trim().is_empty() {
        return Err(SchemaError::InvalidField {
            channel,
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

pub(crate) fn require_version(
    channel: Channel,
    version: i64,
    min: i64,
) -> Result<(), SchemaError> {
    if version < min {
        return Err(SchemaError::InvalidField {
            channel,
            field: "version",
            reason: format!("must be at least {min}, got {version}"),
        });
    }
    Ok(())
}

pub(crate) fn require_price(channel: Channel, field: &'static str, price: f64) -> Result<(), SchemaError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(SchemaError::InvalidField {
            channel,
            field,
            reason: format!("must be a positive amount, got {price}"),
        });
    }
    Ok(())
}
