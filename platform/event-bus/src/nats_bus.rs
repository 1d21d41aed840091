//! NATS JetStream implementation of the EventBus trait

use crate::consumer_retry::retry_with_backoff;
use crate::{
    validate_channel, wait_closed, Acknowledger, BusConfig, BusError, BusResult, Delivery, EventBus,
    PublishAck, SubscribeOptions,
};
use async_nats::jetstream::consumer::{pull, AckPolicy, DeliverPolicy};
use async_nats::jetstream::context::PublishErrorKind;
use async_nats::jetstream::{self, stream, AckKind};
use async_nats::Client;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// How long the stream retains messages for consumers that are offline
const STREAM_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 14);

/// EventBus implementation on NATS JetStream
///
/// Channels are NATS subjects captured by one JetStream stream. A queue group
/// is a durable pull consumer with explicit acks, filtered to one channel;
/// every process that subscribes with the same group pulls from the same
/// consumer, so each message is handed to exactly one of them.
///
/// # Example
/// ```rust,no_run
/// use event_bus::{BusConfig, EventBus, NatsBus};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = BusConfig::from_env()?.with_stream_subjects(["order.>"]);
/// let bus = NatsBus::connect(&config).await?;
///
/// bus.publish("order.created", b"{}".to_vec()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NatsBus {
    client: Client,
    jetstream: jetstream::Context,
    stream_name: String,
    publish_timeout: Duration,
    closed: Arc<AtomicBool>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl NatsBus {
    /// Connect to the server with the configured retry policy and ensure the
    /// platform stream exists
    pub async fn connect(config: &BusConfig) -> BusResult<Self> {
        let url = config.nats_url.clone();
        let client = retry_with_backoff(
            || {
                let url = url.clone();
                async move {
                    async_nats::ConnectOptions::new()
                        .connection_timeout(Duration::from_secs(5))
                        .connect(url)
                        .await
                }
            },
            &config.connect_retry,
            "nats_connect",
        )
        .await
        .map_err(|e| BusError::ConnectionError(e.to_string()))?;

        let bus = Self::new(client, config);
        bus.ensure_stream(&config.stream_subjects).await?;
        Ok(bus)
    }

    /// Wrap an already-connected client
    pub fn new(client: Client, config: &BusConfig) -> Self {
        let mut jetstream = jetstream::new(client.clone());
        jetstream.set_timeout(config.publish_timeout);
        let (shutdown, _) = watch::channel(false);

        Self {
            client,
            jetstream,
            stream_name: config.stream_name.clone(),
            publish_timeout: config.publish_timeout,
            closed: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(shutdown),
        }
    }

    /// Get a reference to the underlying NATS client
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn ensure_stream(&self, subjects: &[String]) -> BusResult<()> {
        if subjects.is_empty() {
            return Ok(());
        }

        self.jetstream
            .get_or_create_stream(stream::Config {
                name: self.stream_name.clone(),
                subjects: subjects.to_vec(),
                max_age: STREAM_MAX_AGE,
                ..Default::default()
            })
            .await
            .map_err(|e| BusError::ConnectionError(format!("failed to ensure stream: {e}")))?;

        tracing::info!(stream = %self.stream_name, subjects = ?subjects, "JetStream stream ready");
        Ok(())
    }
}

/// Durable consumer name for a queue group on one channel
///
/// Durable names may not contain `.`, `*`, `>`, whitespace or path separators.
pub(crate) fn durable_name(queue_group: &str, channel: &str) -> String {
    format!("{queue_group}-{channel}")
        .chars()
        .map(|c| match c {
            '.' | '*' | '>' | '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

#[async_trait]
impl EventBus for NatsBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> BusResult<PublishAck> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        validate_channel(channel)?;

        let map_err = |e: jetstream::context::PublishError| match e.kind() {
            PublishErrorKind::TimedOut => BusError::PublishTimeoutError {
                channel: channel.to_string(),
                timeout: self.publish_timeout,
            },
            _ => BusError::PublishError {
                channel: channel.to_string(),
                reason: e.to_string(),
            },
        };

        let ack = self
            .jetstream
            .publish(channel.to_string(), payload.into())
            .await
            .map_err(map_err)?
            .await
            .map_err(map_err)?;

        Ok(PublishAck {
            channel: channel.to_string(),
            sequence: ack.sequence,
            duplicate: ack.duplicate,
        })
    }

    async fn subscribe(
        &self,
        channel: &str,
        options: SubscribeOptions,
    ) -> BusResult<BoxStream<'static, Delivery>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        validate_channel(channel)?;

        let subscribe_err = |reason: String| BusError::SubscribeError {
            channel: channel.to_string(),
            reason,
        };

        let stream = self
            .jetstream
            .get_stream(&self.stream_name)
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        let durable = durable_name(&options.queue_group, channel);
        let consumer: jetstream::consumer::PullConsumer = stream
            .get_or_create_consumer(
                &durable,
                pull::Config {
                    durable_name: Some(durable.clone()),
                    filter_subject: channel.to_string(),
                    ack_policy: AckPolicy::Explicit,
                    ack_wait: options.ack_wait,
                    deliver_policy: DeliverPolicy::All,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        tracing::info!(channel = %channel, consumer = %durable, "Joined durable queue group");

        let closed = wait_closed(self.shutdown.subscribe());

        let deliveries = messages
            .filter_map(|result| async move {
                match result {
                    Ok(message) => Some(to_delivery(message)),
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to pull message from JetStream");
                        None
                    }
                }
            })
            .take_until(closed);

        Ok(deliveries.boxed())
    }

    /// Flush the client and end every delivery stream of this bus
    ///
    /// Unacked deliveries are redelivered to the queue group after their ack
    /// wait. The TCP connection stays open until the client is dropped.
    async fn close(&self) -> BusResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let _ = self.shutdown.send(true);

        self.client
            .flush()
            .await
            .map_err(|e| BusError::ConnectionError(e.to_string()))?;

        tracing::info!("NATS bus flushed, delivery streams stopped");
        Ok(())
    }
}

fn to_delivery(message: jetstream::Message) -> Delivery {
    let attempt = message
        .info()
        .map(|info| u32::try_from(info.delivered).unwrap_or(u32::MAX))
        .unwrap_or(1);
    let channel = message.message.subject.to_string();
    let payload = message.message.payload.to_vec();

    Delivery::new(channel, payload, attempt, Arc::new(NatsAcker { message }))
}

struct NatsAcker {
    message: jetstream::Message,
}

#[async_trait]
impl Acknowledger for NatsAcker {
    async fn ack(&self) -> BusResult<()> {
        self.message
            .ack()
            .await
            .map_err(|e| BusError::AckError(e.to_string()))
    }

    async fn nak(&self, delay: Option<Duration>) -> BusResult<()> {
        self.message
            .ack_with(AckKind::Nak(delay))
            .await
            .map_err(|e| BusError::AckError(e.to_string()))
    }
}
