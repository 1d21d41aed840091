//! Durable, queue-grouped consumption of one event kind

use crate::{
    DeadLetter, Disposition, GuardRejection, HandlerError, ListenerOptions, MessageHandler,
    MessageOutcome,
};
use chrono::Utc;
use event_bus::{validate_envelope_fields, BusResult, Delivery, Envelope, EventBus};
use futures::StreamExt;
use platform_contracts::{decode, Channel, EventContract, SchemaError};
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Consumes the channel of `E` and runs `H` for every delivery
///
/// A delivery is acknowledged only after the handler returned, so its effect
/// is persisted before the substrate forgets the message. Anything the
/// handler could not finish stays unacknowledged and comes back after the ack
/// wait.
pub struct Listener<E, H> {
    bus: Arc<dyn EventBus>,
    handler: H,
    options: ListenerOptions,
    _contract: PhantomData<fn(E)>,
}

/// Envelope metadata kept for dead-lettering
struct Frame {
    event_id: Uuid,
    envelope: serde_json::Value,
}

impl<E, H> Listener<E, H>
where
    E: EventContract,
    H: MessageHandler<E>,
{
    pub fn new(bus: Arc<dyn EventBus>, handler: H, options: ListenerOptions) -> Self {
        Self {
            bus,
            handler,
            options,
            _contract: PhantomData,
        }
    }

    pub fn channel(&self) -> Channel {
        E::CHANNEL
    }

    pub fn options(&self) -> &ListenerOptions {
        &self.options
    }

    /// Join the queue group and process deliveries on a background task
    ///
    /// Subscription errors are returned to the caller. Once running, handler
    /// failures are logged and never stop the task; it ends when the bus is
    /// closed or the handle is aborted.
    pub async fn listen(self) -> BusResult<ListenerHandle> {
        let channel = E::CHANNEL;
        let queue_group = self.options.queue_group.clone();
        let max_in_flight = self.options.max_in_flight.max(1);

        let deliveries = self
            .bus
            .subscribe(channel.as_str(), self.options.subscribe_options())
            .await?;

        tracing::info!(
            channel = %channel,
            queue_group = %queue_group,
            max_in_flight,
            "Listener started"
        );

        let listener = Arc::new(self);
        let task = tokio::spawn({
            let queue_group = queue_group.clone();
            async move {
                deliveries
                    .for_each_concurrent(max_in_flight, |delivery| {
                        let listener = listener.clone();
                        async move {
                            listener.on_message(delivery).await;
                        }
                    })
                    .await;

                tracing::warn!(channel = %channel, queue_group = %queue_group, "Listener stopped");
            }
        });

        Ok(ListenerHandle {
            channel,
            queue_group,
            task,
        })
    }

    /// Validate, apply and acknowledge one delivery
    pub async fn on_message(&self, delivery: Delivery) -> MessageOutcome {
        let span = tracing::info_span!(
            "process_event",
            channel = %E::CHANNEL,
            queue_group = %self.options.queue_group,
            event_id = tracing::field::Empty,
            attempt = delivery.attempt,
        );
        self.process(delivery).instrument(span).await
    }

    async fn process(&self, delivery: Delivery) -> MessageOutcome {
        let (frame, data) = match self.decode(&delivery.payload) {
            Ok(decoded) => decoded,
            Err(reason) => {
                tracing::error!(error = %reason, "Dropping event that does not match its schema");
                acknowledge(&delivery).await;
                return MessageOutcome::Rejected;
            }
        };
        tracing::Span::current().record("event_id", tracing::field::display(frame.event_id));

        let started = Instant::now();
        let result = self.handler.handle(data).await;
        let elapsed = started.elapsed();
        if elapsed > self.options.ack_wait {
            tracing::warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                ack_wait_ms = self.options.ack_wait.as_millis() as u64,
                "Handler outlived the ack wait, event may already be redelivered"
            );
        }

        match result {
            Ok(Disposition::Applied) => {
                acknowledge(&delivery).await;
                tracing::info!("Event applied");
                MessageOutcome::Applied
            }
            Ok(Disposition::Duplicate) => {
                acknowledge(&delivery).await;
                tracing::debug!("Duplicate event acknowledged");
                MessageOutcome::Duplicate
            }
            Err(HandlerError::Version(GuardRejection::Stale { local, incoming })) => {
                acknowledge(&delivery).await;
                tracing::debug!(
                    local_version = local,
                    version = incoming,
                    "Stale event acknowledged without effect"
                );
                MessageOutcome::Duplicate
            }
            Err(HandlerError::Version(GuardRejection::Gap { expected, incoming })) => {
                tracing::warn!(
                    expected_version = expected,
                    version = incoming,
                    "Version gap, leaving event unacknowledged"
                );
                let reason = GuardRejection::Gap { expected, incoming }.to_string();
                self.defer_or_dead_letter(&delivery, frame, reason, MessageOutcome::Deferred)
                    .await
            }
            Err(e) => {
                tracing::error!(error = %e, "Event handler failed, leaving event unacknowledged");
                let reason = e.to_string();
                self.defer_or_dead_letter(&delivery, frame, reason, MessageOutcome::Failed)
                    .await
            }
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<(Frame, E::Data), String> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|e| format!("payload is not JSON: {e}"))?;
        validate_envelope_fields(&value)?;

        let envelope: Envelope<serde_json::Value> =
            serde_json::from_value(value.clone()).map_err(|e| format!("invalid envelope: {e}"))?;
        if envelope.channel != E::CHANNEL.as_str() {
            return Err(SchemaError::ChannelMismatch {
                expected: E::CHANNEL,
                actual: envelope.channel,
            }
            .to_string());
        }

        let data = decode::<E>(envelope.data).map_err(|e| e.to_string())?;
        let frame = Frame {
            event_id: envelope.event_id,
            envelope: value,
        };
        Ok((frame, data))
    }

    /// Leave the delivery for redelivery, or give up on it once the
    /// dead-letter threshold is reached
    async fn defer_or_dead_letter(
        &self,
        delivery: &Delivery,
        frame: Frame,
        reason: String,
        outcome: MessageOutcome,
    ) -> MessageOutcome {
        let Some(limit) = self.options.dead_letter_after else {
            return outcome;
        };
        if delivery.attempt < limit {
            return outcome;
        }

        let letter = DeadLetter {
            channel: E::CHANNEL.to_string(),
            queue_group: self.options.queue_group.clone(),
            event_id: frame.event_id,
            attempt: delivery.attempt,
            reason,
            failed_at: Utc::now(),
            envelope: frame.envelope,
        };

        match letter.publish(self.bus.as_ref(), E::CHANNEL).await {
            Ok(_) => {
                acknowledge(delivery).await;
                MessageOutcome::DeadLettered
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Failed to publish dead letter, event stays unacknowledged"
                );
                outcome
            }
        }
    }
}

async fn acknowledge(delivery: &Delivery) {
    if let Err(e) = delivery.ack().await {
        tracing::warn!(error = %e, "Failed to acknowledge delivery, it will be redelivered");
    }
}

/// Running listener task
#[derive(Debug)]
pub struct ListenerHandle {
    channel: Channel,
    queue_group: String,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn queue_group(&self) -> &str {
        &self.queue_group
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop processing; in-flight deliveries stay unacked and are redelivered
    pub fn abort(&self) {
        self.task.abort();
    }

    /// Wait until the delivery stream ends, normally after the bus is closed
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            if e.is_panic() {
                tracing::error!(
                    channel = %self.channel,
                    queue_group = %self.queue_group,
                    "Listener task panicked"
                );
            }
        }
    }
}
