//! # EventBus Transport
//!
//! The single connection every service holds to the messaging substrate.
//!
//! ## Guarantees
//!
//! The bus is an at-least-once, durable, ordered-per-channel log:
//! - `publish` resolves only after the substrate has durably stored the message
//! - `subscribe` joins a durable **queue group**: every message on the channel is
//!   handed to exactly one member of the group, while distinct groups each get
//!   their own copy
//! - a delivery that is not acknowledged within the group's ack wait is
//!   redelivered as a fresh [`Delivery`] carrying the identical payload
//!
//! ## Implementations
//!
//! - **NatsBus**: production implementation on NATS JetStream (durable pull consumers)
//! - **InMemoryBus**: test/dev double with the same queue-group and redelivery semantics
//!
//! ## Lifecycle
//!
//! [`connect`] is called once at service startup and the returned handle is
//! cloned into every publisher and listener. [`EventBus::close`] is called once
//! at shutdown.
//!
//! ```rust,no_run
//! use event_bus::{BusConfig, EventBus, SubscribeOptions};
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = event_bus::connect(&BusConfig::from_env()?).await?;
//!
//! let mut deliveries = bus
//!     .subscribe("order.created", SubscribeOptions::new("payments-service"))
//!     .await?;
//!
//! bus.publish("order.created", br#"{"channel":"order.created"}"#.to_vec()).await?;
//!
//! while let Some(delivery) = deliveries.next().await {
//!     // persist first, then acknowledge
//!     delivery.ack().await?;
//! }
//!
//! bus.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod consumer_retry;
mod delivery;
mod envelope;
mod inmemory_bus;
mod nats_bus;

pub use config::{BusConfig, BusType};
pub use delivery::{Acknowledger, Delivery};
pub use envelope::{validate_envelope_fields, Envelope};
pub use inmemory_bus::InMemoryBus;
pub use nats_bus::NatsBus;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default time a delivery may stay unacknowledged before it is redelivered
pub const DEFAULT_ACK_WAIT: Duration = Duration::from_secs(30);

/// Errors that can occur when using the event bus
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("failed to publish to {channel}: {reason}")]
    PublishError { channel: String, reason: String },

    #[error("publish to {channel} was not acknowledged within {timeout:?}")]
    PublishTimeoutError { channel: String, timeout: Duration },

    #[error("failed to subscribe to {channel}: {reason}")]
    SubscribeError { channel: String, reason: String },

    #[error("failed to acknowledge delivery: {0}")]
    AckError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("invalid channel: {0}")]
    InvalidChannel(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("event bus is closed")]
    Closed,
}

impl BusError {
    /// Whether the caller may retry the same operation with the same data
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BusError::ConnectionError(_)
                | BusError::PublishError { .. }
                | BusError::PublishTimeoutError { .. }
                | BusError::AckError(_)
        )
    }
}

/// Result type for event bus operations
pub type BusResult<T> = Result<T, BusError>;

/// Confirmation that the substrate durably stored a published message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    /// Channel the message was stored on
    pub channel: String,
    /// Position of the message in the substrate's log
    pub sequence: u64,
    /// The substrate recognised the message as a duplicate of an earlier publish
    pub duplicate: bool,
}

/// Parameters of a durable, queue-grouped subscription
#[derive(Debug, Clone)]
pub struct SubscribeOptions {
    /// Consumer group name. Stable across restarts so a restarted service
    /// resumes its own backlog.
    pub queue_group: String,
    /// How long a delivery may stay unacknowledged before redelivery
    pub ack_wait: Duration,
}

impl SubscribeOptions {
    pub fn new(queue_group: impl Into<String>) -> Self {
        Self {
            queue_group: queue_group.into(),
            ack_wait: DEFAULT_ACK_WAIT,
        }
    }

    pub fn with_ack_wait(mut self, ack_wait: Duration) -> Self {
        self.ack_wait = ack_wait;
        self
    }
}

/// Core transport abstraction
///
/// Implementations are safe for concurrent publish and subscribe calls from
/// any number of tasks.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one message and wait for the substrate's durable-storage ack
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> BusResult<PublishAck>;

    /// Join `options.queue_group` on `channel` and stream its deliveries
    ///
    /// Each returned delivery must be acknowledged with [`Delivery::ack`] once
    /// the consumer has persisted its effect; otherwise it is redelivered after
    /// `options.ack_wait`.
    async fn subscribe(
        &self,
        channel: &str,
        options: SubscribeOptions,
    ) -> BusResult<BoxStream<'static, Delivery>>;

    /// Flush outstanding publishes and stop consuming
    ///
    /// Idempotent. After close, `publish` and `subscribe` fail with
    /// [`BusError::Closed`] and open delivery streams end. The underlying
    /// connection is released when the last clone of the handle is dropped.
    async fn close(&self) -> BusResult<()>;
}

impl fmt::Debug for dyn EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventBus")
    }
}

/// Reject channel names the substrate cannot route
///
/// Channels are dot-separated tokens; wildcards and whitespace are reserved.
pub fn validate_channel(channel: &str) -> BusResult<()> {
    if channel.is_empty() {
        return Err(BusError::InvalidChannel("channel cannot be empty".to_string()));
    }
    let invalid = channel.split('.').any(|token| {
        token.is_empty()
            || token == "*"
            || token == ">"
            || token.chars().any(|c| c.is_whitespace())
    });
    if invalid {
        return Err(BusError::InvalidChannel(channel.to_string()));
    }
    Ok(())
}

/// Resolves once the bus owning `shutdown` has been closed
pub(crate) async fn wait_closed(mut shutdown: tokio::sync::watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Establish the process-wide bus handle
///
/// NATS connections are retried with exponential backoff according to
/// `config.connect_retry`; exhausting the attempts yields
/// [`BusError::ConnectionError`].
pub async fn connect(config: &BusConfig) -> BusResult<Arc<dyn EventBus>> {
    match config.bus_type {
        BusType::Nats => {
            tracing::info!(url = %config.nats_url, stream = %config.stream_name, "Connecting to NATS");
            let bus = NatsBus::connect(config).await?;
            Ok(Arc::new(bus))
        }
        BusType::InMemory => {
            tracing::info!("Using in-memory event bus");
            Ok(Arc::new(InMemoryBus::new()))
        }
    }
}
