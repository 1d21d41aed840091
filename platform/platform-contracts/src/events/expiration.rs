use crate::{require_non_empty, Channel, EventContract, SchemaError};
use serde::{Deserialize, Serialize};

/// The reservation window of an order has elapsed
#[derive(Debug, Clone, Copy)]
pub struct ExpirationComplete;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpirationCompleteData {
    pub order_id: String,
}

impl EventContract for ExpirationComplete {
    const CHANNEL: Channel = Channel::ExpirationComplete;
    type Data = ExpirationCompleteData;

    fn validate(data: &Self::Data) -> Result<(), SchemaError> {
        require_non_empty(Self::CHANNEL, "orderId", &data.order_id)
    }
}
