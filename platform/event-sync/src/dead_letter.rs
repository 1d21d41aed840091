//! Deliveries a listener has given up on

use chrono::{DateTime, Utc};
use event_bus::{BusError, BusResult, EventBus, PublishAck};
use platform_contracts::Channel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record published on `dlq.<channel>` for manual inspection or resync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub channel: String,
    pub queue_group: String,
    pub event_id: Uuid,
    /// Delivery attempt at which the listener gave up
    pub attempt: u32,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
    /// The envelope exactly as it was delivered
    pub envelope: serde_json::Value,
}

impl DeadLetter {
    pub(crate) async fn publish(&self, bus: &dyn EventBus, channel: Channel) -> BusResult<PublishAck> {
        let payload =
            serde_json::to_vec(self).map_err(|e| BusError::SerializationError(e.to_string()))?;
        let ack = bus.publish(&channel.dead_letter(), payload).await?;

        tracing::error!(
            event_id = %self.event_id,
            channel = %self.channel,
            queue_group = %self.queue_group,
            attempt = self.attempt,
            error = %self.reason,
            "Event moved to DLQ after failure"
        );
        Ok(ack)
    }
}
