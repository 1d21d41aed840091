//! In-memory implementation of the EventBus trait for testing and development

use crate::{
    validate_channel, wait_closed, Acknowledger, BusError, BusResult, Delivery, EventBus,
    PublishAck, SubscribeOptions,
};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// EventBus implementation with in-process queues
///
/// Mirrors the JetStream semantics the platform relies on, so listeners can be
/// tested without a server:
/// - every channel keeps its full log; a queue group joining late starts from
///   the first message, a group that already exists continues where it was
/// - each message goes to exactly one member of a queue group
/// - an unacknowledged delivery is redelivered after the group's ack wait
///
/// # Example
/// ```rust
/// use event_bus::{EventBus, InMemoryBus, SubscribeOptions};
/// use futures::StreamExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let bus = InMemoryBus::new();
///
/// let mut stream = bus.subscribe("ticket.created", SubscribeOptions::new("orders-service")).await?;
/// bus.publish("ticket.created", b"hello".to_vec()).await?;
///
/// let delivery = stream.next().await.unwrap();
/// assert_eq!(delivery.payload, b"hello");
/// delivery.ack().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<Inner>,
}

struct Inner {
    channels: Mutex<HashMap<String, ChannelState>>,
    next_sequence: AtomicU64,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

#[derive(Default)]
struct ChannelState {
    log: Vec<(u64, Arc<Vec<u8>>)>,
    groups: HashMap<String, Arc<GroupState>>,
}

#[derive(Clone)]
struct Pending {
    sequence: u64,
    payload: Arc<Vec<u8>>,
    attempt: u32,
}

/// One queue group on one channel
struct GroupState {
    channel: String,
    ack_wait: Duration,
    sender: mpsc::UnboundedSender<Pending>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Pending>>,
    tracking: Mutex<Tracking>,
}

#[derive(Default)]
struct Tracking {
    acked: HashSet<u64>,
    /// sequence -> attempt currently awaiting its ack
    in_flight: HashMap<u64, u32>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl GroupState {
    fn new(channel: &str, ack_wait: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            channel: channel.to_string(),
            ack_wait,
            sender,
            receiver: tokio::sync::Mutex::new(receiver),
            tracking: Mutex::new(Tracking::default()),
        }
    }

    fn enqueue(&self, pending: Pending) {
        // The receiver lives as long as the group
        let _ = self.sender.send(pending);
    }

    /// Record that `pending` is being handed out; false if it needs no delivery
    fn begin_attempt(&self, pending: &Pending) -> bool {
        let mut tracking = lock(&self.tracking);
        if tracking.acked.contains(&pending.sequence) {
            return false;
        }
        tracking.in_flight.insert(pending.sequence, pending.attempt);
        true
    }

    /// Take the attempt out of flight if it is still the one awaiting an ack
    fn settle_attempt(&self, sequence: u64, attempt: u32) -> bool {
        let mut tracking = lock(&self.tracking);
        if tracking.in_flight.get(&sequence) == Some(&attempt) {
            tracking.in_flight.remove(&sequence);
            true
        } else {
            false
        }
    }

    fn ack(&self, sequence: u64) {
        let mut tracking = lock(&self.tracking);
        tracking.in_flight.remove(&sequence);
        tracking.acked.insert(sequence);
    }

    fn redeliver_after(self: Arc<Self>, pending: Pending, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            self.enqueue(Pending {
                attempt: pending.attempt + 1,
                ..pending
            });
        });
    }

    fn arm_ack_timer(self: Arc<Self>, pending: Pending) {
        tokio::spawn(async move {
            tokio::time::sleep(self.ack_wait).await;
            if self.settle_attempt(pending.sequence, pending.attempt) {
                tracing::debug!(
                    channel = %self.channel,
                    sequence = pending.sequence,
                    attempt = pending.attempt,
                    "Ack wait expired, redelivering"
                );
                self.enqueue(Pending {
                    attempt: pending.attempt + 1,
                    ..pending
                });
            }
        });
    }
}

struct InMemoryAcker {
    group: Arc<GroupState>,
    pending: Pending,
}

#[async_trait]
impl Acknowledger for InMemoryAcker {
    async fn ack(&self) -> BusResult<()> {
        self.group.ack(self.pending.sequence);
        Ok(())
    }

    async fn nak(&self, delay: Option<Duration>) -> BusResult<()> {
        if self
            .group
            .settle_attempt(self.pending.sequence, self.pending.attempt)
        {
            self.group
                .clone()
                .redeliver_after(self.pending.clone(), delay.unwrap_or_default());
        }
        Ok(())
    }
}

impl InMemoryBus {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                channels: Mutex::new(HashMap::new()),
                next_sequence: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                shutdown,
            }),
        }
    }

    /// Every payload ever published on `channel`, in publish order
    pub fn published(&self, channel: &str) -> Vec<Vec<u8>> {
        lock(&self.inner.channels)
            .get(channel)
            .map(|state| {
                state
                    .log
                    .iter()
                    .map(|(_, payload)| payload.as_ref().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn join_group(&self, channel: &str, options: &SubscribeOptions) -> Arc<GroupState> {
        let mut channels = lock(&self.inner.channels);
        let state = channels.entry(channel.to_string()).or_default();

        if let Some(group) = state.groups.get(&options.queue_group) {
            return group.clone();
        }

        let group = Arc::new(GroupState::new(channel, options.ack_wait));
        for (sequence, payload) in &state.log {
            group.enqueue(Pending {
                sequence: *sequence,
                payload: payload.clone(),
                attempt: 1,
            });
        }
        state
            .groups
            .insert(options.queue_group.clone(), group.clone());
        group
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> BusResult<PublishAck> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        validate_channel(channel)?;

        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::SeqCst);
        let payload = Arc::new(payload);

        let mut channels = lock(&self.inner.channels);
        let state = channels.entry(channel.to_string()).or_default();
        state.log.push((sequence, payload.clone()));
        for group in state.groups.values() {
            group.enqueue(Pending {
                sequence,
                payload: payload.clone(),
                attempt: 1,
            });
        }

        Ok(PublishAck {
            channel: channel.to_string(),
            sequence,
            duplicate: false,
        })
    }

    async fn subscribe(
        &self,
        channel: &str,
        options: SubscribeOptions,
    ) -> BusResult<BoxStream<'static, Delivery>> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        validate_channel(channel)?;

        let group = self.join_group(channel, &options);
        let shutdown = self.inner.shutdown.subscribe();

        let stream = async_stream::stream! {
            loop {
                let next = {
                    let mut receiver = group.receiver.lock().await;
                    tokio::select! {
                        pending = receiver.recv() => pending,
                        _ = wait_closed(shutdown.clone()) => None,
                    }
                };

                let Some(pending) = next else { break };
                if !group.begin_attempt(&pending) {
                    continue;
                }

                group.clone().arm_ack_timer(pending.clone());
                let acker = InMemoryAcker {
                    group: group.clone(),
                    pending: pending.clone(),
                };
                yield Delivery::new(
                    group.channel.clone(),
                    pending.payload.as_ref().clone(),
                    pending.attempt,
                    Arc::new(acker),
                );
            }
        };

        Ok(stream.boxed())
    }

    async fn close(&self) -> BusResult<()> {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            let _ = self.inner.shutdown.send(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn next(stream: &mut BoxStream<'static, Delivery>) -> Delivery {
        tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended")
    }

    async fn assert_idle(stream: &mut BoxStream<'static, Delivery>) {
        let result = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
        assert!(result.is_err(), "should timeout, no more deliveries");
    }

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = InMemoryBus::new();
        let mut stream = bus
            .subscribe("order.created", SubscribeOptions::new("payments"))
            .await
            .unwrap();

        let payload = b"test message".to_vec();
        let ack = bus.publish("order.created", payload.clone()).await.unwrap();
        assert_eq!(ack.channel, "order.created");

        let delivery = next(&mut stream).await;
        assert_eq!(delivery.channel, "order.created");
        assert_eq!(delivery.payload, payload);
        assert_eq!(delivery.attempt, 1);
        delivery.ack().await.unwrap();
    }

    #[tokio::test]
    async fn test_multiple_messages_in_order() {
        let bus = InMemoryBus::new();
        let mut stream = bus
            .subscribe("ticket.updated", SubscribeOptions::new("orders"))
            .await
            .unwrap();

        for i in 0..5 {
            let payload = format!("message {}", i).into_bytes();
            bus.publish("ticket.updated", payload).await.unwrap();
        }

        for i in 0..5 {
            let delivery = next(&mut stream).await;
            assert_eq!(delivery.payload, format!("message {}", i).into_bytes());
            delivery.ack().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let bus = InMemoryBus::new();
        let mut stream = bus
            .subscribe("order.created", SubscribeOptions::new("payments"))
            .await
            .unwrap();

        bus.publish("order.cancelled", b"other".to_vec()).await.unwrap();
        bus.publish("order.created", b"mine".to_vec()).await.unwrap();

        let delivery = next(&mut stream).await;
        assert_eq!(delivery.payload, b"mine");
        delivery.ack().await.unwrap();
        assert_idle(&mut stream).await;
    }

    #[tokio::test]
    async fn test_distinct_queue_groups_each_receive_a_copy() {
        let bus = InMemoryBus::new();
        let mut tickets = bus
            .subscribe("order.created", SubscribeOptions::new("tickets"))
            .await
            .unwrap();
        let mut payments = bus
            .subscribe("order.created", SubscribeOptions::new("payments"))
            .await
            .unwrap();

        bus.publish("order.created", b"broadcast".to_vec()).await.unwrap();

        let a = next(&mut tickets).await;
        let b = next(&mut payments).await;
        assert_eq!(a.payload, b"broadcast");
        assert_eq!(b.payload, b"broadcast");
    }

    #[tokio::test]
    async fn test_shared_queue_group_delivers_once() {
        let bus = InMemoryBus::new();
        let options = SubscribeOptions::new("payments");
        let replica_a = bus.subscribe("order.created", options.clone()).await.unwrap();
        let replica_b = bus.subscribe("order.created", options).await.unwrap();

        for i in 0..10 {
            bus.publish("order.created", vec![i]).await.unwrap();
        }

        let mut merged = futures::stream::select(replica_a, replica_b);
        let mut seen = Vec::new();
        for _ in 0..10 {
            let delivery = tokio::time::timeout(Duration::from_secs(1), merged.next())
                .await
                .expect("timeout")
                .expect("stream ended");
            seen.push(delivery.payload[0]);
            delivery.ack().await.unwrap();
        }

        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<u8>>());
        let extra = tokio::time::timeout(Duration::from_millis(100), merged.next()).await;
        assert!(extra.is_err(), "no message may reach both replicas");
    }

    #[tokio::test]
    async fn test_new_group_replays_retained_log() {
        let bus = InMemoryBus::new();
        bus.publish("ticket.created", b"early".to_vec()).await.unwrap();

        let mut stream = bus
            .subscribe("ticket.created", SubscribeOptions::new("late-service"))
            .await
            .unwrap();

        let delivery = next(&mut stream).await;
        assert_eq!(delivery.payload, b"early");
    }

    #[tokio::test]
    async fn test_rejoining_group_resumes_backlog() {
        let bus = InMemoryBus::new();
        let options = SubscribeOptions::new("orders");

        let mut first = bus.subscribe("ticket.created", options.clone()).await.unwrap();
        bus.publish("ticket.created", b"one".to_vec()).await.unwrap();
        next(&mut first).await.ack().await.unwrap();
        drop(first);

        bus.publish("ticket.created", b"two".to_vec()).await.unwrap();

        let mut restarted = bus.subscribe("ticket.created", options).await.unwrap();
        let delivery = next(&mut restarted).await;
        assert_eq!(delivery.payload, b"two");
        delivery.ack().await.unwrap();
        assert_idle(&mut restarted).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacked_delivery_is_redelivered_after_ack_wait() {
        let bus = InMemoryBus::new();
        let options = SubscribeOptions::new("payments").with_ack_wait(Duration::from_secs(5));
        let mut stream = bus.subscribe("order.created", options).await.unwrap();

        bus.publish("order.created", b"once".to_vec()).await.unwrap();

        let first = next(&mut stream).await;
        assert_eq!(first.attempt, 1);

        let second = tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .expect("timeout waiting for redelivery")
            .expect("stream ended");
        assert_eq!(second.payload, first.payload);
        assert_eq!(second.attempt, 2);
        assert!(second.is_redelivery());
        second.ack().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_acked_delivery_is_not_redelivered() {
        let bus = InMemoryBus::new();
        let options = SubscribeOptions::new("payments").with_ack_wait(Duration::from_secs(5));
        let mut stream = bus.subscribe("order.created", options).await.unwrap();

        bus.publish("order.created", b"once".to_vec()).await.unwrap();
        next(&mut stream).await.ack().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(30), stream.next()).await;
        assert!(result.is_err(), "acked message must not come back");
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_ack_after_redelivery_is_harmless() {
        let bus = InMemoryBus::new();
        let options = SubscribeOptions::new("payments").with_ack_wait(Duration::from_secs(1));
        let mut stream = bus.subscribe("order.created", options).await.unwrap();

        bus.publish("order.created", b"slow".to_vec()).await.unwrap();
        let first = next(&mut stream).await;

        let second = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("timeout")
            .expect("stream ended");

        first.ack().await.unwrap();
        second.ack().await.unwrap();
        first.ack().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(30), stream.next()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_nak_requeues_immediately() {
        let bus = InMemoryBus::new();
        let mut stream = bus
            .subscribe("order.cancelled", SubscribeOptions::new("payments"))
            .await
            .unwrap();

        bus.publish("order.cancelled", b"retry me".to_vec()).await.unwrap();

        let first = next(&mut stream).await;
        first.nak(None).await.unwrap();

        let second = next(&mut stream).await;
        assert_eq!(second.payload, b"retry me");
        assert_eq!(second.attempt, 2);
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_rejects_publish() {
        let bus = InMemoryBus::new();
        let mut stream = bus
            .subscribe("order.created", SubscribeOptions::new("payments"))
            .await
            .unwrap();

        bus.close().await.unwrap();
        bus.close().await.unwrap();

        let end = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("stream should end on close");
        assert!(end.is_none());

        let result = bus.publish("order.created", b"late".to_vec()).await;
        assert!(matches!(result, Err(BusError::Closed)));
    }

    #[tokio::test]
    async fn test_invalid_channel_is_rejected() {
        let bus = InMemoryBus::new();
        let result = bus.publish("order.*", b"x".to_vec()).await;
        assert!(matches!(result, Err(BusError::InvalidChannel(_))));
    }

    #[tokio::test]
    async fn test_published_log() {
        let bus = InMemoryBus::new();
        bus.publish("payment.created", b"a".to_vec()).await.unwrap();
        bus.publish("payment.created", b"b".to_vec()).await.unwrap();

        assert_eq!(bus.published("payment.created"), vec![b"a".to_vec(), b"b".to_vec()]);
        assert!(bus.published("order.created").is_empty());
    }
}
