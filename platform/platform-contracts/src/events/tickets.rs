//! Ticket catalog events. The ticket aggregate is owned by the tickets service.

use crate::{require_non_empty, require_price, require_version, Channel, EventContract, SchemaError, Versioned};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub struct TicketCreated;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketCreatedData {
    pub id: String,
    pub version: i64,
    pub title: String,
    pub price: f64,
    pub user_id: String,
}

impl EventContract for TicketCreated {
    const CHANNEL: Channel = Channel::TicketCreated;
    type Data = TicketCreatedData;

    fn validate(data: &Self::Data) -> Result<(), SchemaError> {
        require_non_empty(Self::CHANNEL, "id", &data.id)?;
        if data.version != 0 {
            return Err(SchemaError::InvalidField {
                channel: Self::CHANNEL,
                field: "version",
                reason: format!("a created ticket starts at version 0, got {}", data.version),
            });
        }
        require_non_empty(Self::CHANNEL, "title", &data.title)?;
        require_price(Self::CHANNEL, "price", data.price)?;
        require_non_empty(Self::CHANNEL, "userId", &data.user_id)
    }
}

impl Versioned for TicketCreatedData {
    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TicketUpdated;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdatedData {
    pub id: String,
    pub version: i64,
    pub title: String,
    pub price: f64,
    pub user_id: String,
    /// Order currently holding the ticket, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

impl EventContract for TicketUpdated {
    const CHANNEL: Channel = Channel::TicketUpdated;
    type Data = TicketUpdatedData;

    fn validate(data: &Self::Data) -> Result<(), SchemaError> {
        require_non_empty(Self::CHANNEL, "id", &data.id)?;
        require_version(Self::CHANNEL, data.version, 1)?;
        require_non_empty(Self::CHANNEL, "title", &data.title)?;
        require_price(Self::CHANNEL, "price", data.price)?;
        require_non_empty(Self::CHANNEL, "userId", &data.user_id)
    }
}

impl Versioned for TicketUpdatedData {
    fn aggregate_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}
