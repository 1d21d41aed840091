//! Typed announcement of local state changes

use event_bus::{BusError, Envelope, EventBus, PublishAck};
use platform_contracts::{EventContract, SchemaError};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Default window for the substrate to acknowledge a publish
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The payload breaks its contract; a caller bug, never retried
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Not durably accepted by the transport; safe to retry with the same data
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl PublishError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Schema(_) => false,
            PublishError::Bus(e) => e.is_retryable(),
        }
    }
}

/// Publishes events of kind `E` on the channel its contract names
///
/// Cheap to clone; every publisher shares the process-wide bus handle.
pub struct Publisher<E> {
    bus: Arc<dyn EventBus>,
    timeout: Duration,
    _contract: PhantomData<fn(E)>,
}

impl<E> Clone for Publisher<E> {
    fn clone(&self) -> Self {
        Self {
            bus: self.bus.clone(),
            timeout: self.timeout,
            _contract: PhantomData,
        }
    }
}

impl<E: EventContract> Publisher<E> {
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self {
            bus,
            timeout: DEFAULT_PUBLISH_TIMEOUT,
            _contract: PhantomData,
        }
    }

    /// Override the acknowledgement window, usually with `BusConfig::publish_timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Announce `data` and wait until the substrate stored it
    ///
    /// On error the caller's own state change stands. Publishing the same data
    /// again is safe because listeners are idempotent.
    pub async fn publish(&self, data: &E::Data) -> Result<PublishAck, PublishError> {
        E::validate(data)?;

        let channel = E::CHANNEL.as_str();
        let envelope = Envelope::new(channel, data);
        let payload = envelope
            .to_bytes()
            .map_err(|e| BusError::SerializationError(e.to_string()))?;

        let ack = tokio::time::timeout(self.timeout, self.bus.publish(channel, payload))
            .await
            .map_err(|_| BusError::PublishTimeoutError {
                channel: channel.to_string(),
                timeout: self.timeout,
            })??;

        tracing::debug!(
            channel = %channel,
            event_id = %envelope.event_id,
            sequence = ack.sequence,
            "Event published"
        );
        Ok(ack)
    }
}
