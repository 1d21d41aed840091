//! Delayed publication of expiration events

use chrono::{DateTime, Utc};
use event_bus::consumer_retry::{retry_with_backoff, RetryConfig};
use event_bus::EventBus;
use event_sync::Publisher;
use platform_contracts::{ExpirationComplete, ExpirationCompleteData};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One timer per order; fires `ExpirationComplete` when the order expires
pub struct ExpirationScheduler {
    publisher: Publisher<ExpirationComplete>,
    scheduled: Mutex<HashSet<String>>,
    retry: RetryConfig,
}

impl ExpirationScheduler {
    pub fn new(bus: Arc<dyn EventBus>, publish_timeout: Duration) -> Self {
        Self {
            publisher: Publisher::new(bus).with_timeout(publish_timeout),
            scheduled: Mutex::new(HashSet::new()),
            retry: RetryConfig {
                max_attempts: 10,
                initial_backoff: Duration::from_millis(500),
                max_backoff: Duration::from_secs(30),
            },
        }
    }

    fn scheduled(&self) -> MutexGuard<'_, HashSet<String>> {
        self.scheduled.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_scheduled(&self, order_id: &str) -> bool {
        self.scheduled().contains(order_id)
    }

    /// Schedule the expiration of `order_id` at `expires_at`
    ///
    /// Returns `false` while a timer for the order is pending in this
    /// process. An `expires_at` in the past fires immediately.
    pub fn schedule(self: &Arc<Self>, order_id: &str, expires_at: DateTime<Utc>) -> bool {
        if !self.scheduled().insert(order_id.to_string()) {
            return false;
        }

        let delay = (expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tracing::info!(order_id = %order_id, delay_ms = delay.as_millis() as u64, "Expiration scheduled");

        let scheduler = self.clone();
        let order_id = order_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(order_id).await;
        });
        true
    }

    /// Publish the expiration, retrying until the bus accepts it
    ///
    /// Each round is a bounded backoff burst; rounds repeat without limit
    /// because the triggering `order.created` is already acknowledged.
    async fn fire(&self, order_id: String) {
        let data = ExpirationCompleteData {
            order_id: order_id.clone(),
        };

        let mut round = 0u32;
        loop {
            round += 1;
            let published = retry_with_backoff(
                || self.publisher.publish(&data),
                &self.retry,
                "expiration_publish",
            )
            .await;

            match published {
                Ok(_) => {
                    tracing::info!(order_id = %order_id, "Order expired");
                    break;
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(
                        order_id = %order_id,
                        error = %e,
                        "Expiration cannot be announced, giving up"
                    );
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        order_id = %order_id,
                        round,
                        error = %e,
                        "Expiration not announced yet, will keep retrying"
                    );
                    tokio::time::sleep(self.retry.max_backoff).await;
                }
            }
        }

        self.scheduled().remove(&order_id);
    }
}
