//! A single arrival of a message at a subscriber

use crate::BusResult;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Transport-specific acknowledgement handle of one delivery
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Mark the delivery as fully processed
    async fn ack(&self) -> BusResult<()>;

    /// Ask for redelivery, optionally after `delay`
    async fn nak(&self, delay: Option<Duration>) -> BusResult<()>;
}

/// One delivery of a message to one member of a queue group
///
/// A delivery lives only for the duration of one handler invocation. It ends
/// either in [`Delivery::ack`] or, implicitly, in a timeout after which the
/// same payload arrives again as a new `Delivery` with a higher `attempt`.
#[derive(Clone)]
pub struct Delivery {
    /// Channel the message was published on
    pub channel: String,
    /// Raw message payload
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery
    pub attempt: u32,
    acker: Arc<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        channel: impl Into<String>,
        payload: Vec<u8>,
        attempt: u32,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            channel: channel.into(),
            payload,
            attempt,
            acker,
        }
    }

    pub fn is_redelivery(&self) -> bool {
        self.attempt > 1
    }

    pub async fn ack(&self) -> BusResult<()> {
        self.acker.ack().await
    }

    pub async fn nak(&self, delay: Option<Duration>) -> BusResult<()> {
        self.acker.nak(delay).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("channel", &self.channel)
            .field("payload_len", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish()
    }
}
