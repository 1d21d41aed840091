//! Order events. The order aggregate is owned by the orders service.

use crate::{require_non_empty, require_price, require_version, Channel, EventContract, SchemaError, Versioned};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order exists, ticket not yet reserved
    #[serde(rename = "created")]
    Created,
    /// Cancelled by the user, by expiration, or because the ticket was taken
    #[serde(rename = "cancelled")]
    Cancelled,
    /// Ticket reserved, waiting for payment
    #[serde(rename = "awaiting:payment")]
    AwaitingPayment,
    #[serde(rename = "complete")]
    Complete,
}

impl OrderStatus {
    /// Whether an order in this status still holds its ticket
    pub fn is_active(self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }
}

/// Ticket as embedded in an order event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketRef {
    pub id: String,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketIdRef {
    pub id: String,
}

#[derive(Debug, Clone, Copy)]
pub struct OrderCreated;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedData {
    pub id: String,
    pub version: i64,
    pub status: OrderStatus,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ticket: TicketRef,
}

impl EventContract for OrderCreated {
    const CHANNEL: Channel = Channel::OrderCreated;
    type Data = OrderCreatedData;

    fn validate(data: &Self::Data) -> Result<(), SchemaError> {
        require_non_empty(Self::CHANNEL, "id", &data.id)?;
        if data.version != 0 {
            return Err(SchemaError::InvalidField {
                channel: Self::CHANNEL,
                field: "version",
                reason: format!("a created order starts at version 0, got {}", data.version),
            });
        }
        require_non_empty(Self::CHANNEL, "userId", &data.user_id)?;
        require_non_empty(Self::CHANNEL, "ticket.id", &data.ticket.id)?;
        require_price(Self::CHANNEL, "ticket.price", data.ticket.price)
    }
}

impl Versioned for OrderCreatedData {
    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[derive(Debug, Clone, Copy)]
pub struct OrderCancelled;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub id: String,
    pub version: i64,
    pub ticket: TicketIdRef,
}

impl EventContract for OrderCancelled {
    const CHANNEL: Channel = Channel::OrderCancelled;
    type Data = OrderCancelledData;

    fn validate(data: &Self::Data) -> Result<(), SchemaError> {
        require_non_empty(Self::CHANNEL, "id", &data.id)?;
        require_version(Self::CHANNEL, data.version, 1)?;
        require_non_empty(Self::CHANNEL, "ticket.id", &data.ticket.id)
    }
}

impl Versioned for OrderCancelledData {
    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}
