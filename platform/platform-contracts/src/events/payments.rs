use crate::{require_non_empty, Channel, EventContract, SchemaError};
use serde::{Deserialize, Serialize};

/// A charge for an order succeeded
#[derive(Debug, Clone, Copy)]
pub struct PaymentCreated;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreatedData {
    pub id: String,
    pub order_id: String,
    /// Charge identifier issued by the payment gateway
    pub charge_id: String,
}

impl EventContract for PaymentCreated {
    const CHANNEL: Channel = Channel::PaymentCreated;
    type Data = PaymentCreatedData;

    fn validate(data: &Self::Data) -> Result<(), SchemaError> {
        require_non_empty(Self::CHANNEL, "id", &data.id)?;
        require_non_empty(Self::CHANNEL, "orderId", &data.order_id)?;
        require_non_empty(Self::CHANNEL, "chargeId", &data.charge_id)
    }
}
