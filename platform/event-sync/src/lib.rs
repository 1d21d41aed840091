//! # Event Sync
//!
//! Typed publish/subscribe on top of [`event_bus`], plus the version guard that
//! lets a service apply remote events to its local replica of an aggregate in
//! order and exactly once in effect.
//!
//! - [`Publisher<E>`] announces a local state change on the channel of `E`
//! - [`Listener<E, H>`] consumes channel `E` in a durable queue group and runs
//!   a [`MessageHandler`] per delivery, acknowledging only after it persisted
//! - [`VersionGuard`] orders events per aggregate by their `version`
//! - [`Replica`] turns a service's [`ReplicaStore`] into a guarded handler
//!
//! ```rust,no_run
//! use event_sync::{Listener, ListenerOptions, Publisher, Replica};
//! use platform_contracts::{OrderCreated, OrderCreatedData};
//! # use std::sync::Arc;
//! # async fn example(
//! #     bus: Arc<dyn event_bus::EventBus>,
//! #     store: Arc<impl event_sync::ReplicaStore<OrderCreated>>,
//! #     data: OrderCreatedData,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let listener = Listener::<OrderCreated, _>::new(
//!     bus.clone(),
//!     Replica::new(store),
//!     ListenerOptions::new("payments-service"),
//! );
//! let handle = listener.listen().await?;
//!
//! Publisher::<OrderCreated>::new(bus).publish(&data).await?;
//! # handle.abort();
//! # Ok(())
//! # }
//! ```

mod dead_letter;
mod handler;
mod listener;
mod options;
mod publisher;
mod replica;
mod version_guard;

pub use dead_letter::DeadLetter;
pub use handler::{Disposition, HandlerError, MessageHandler};
pub use listener::{Listener, ListenerHandle};
pub use options::ListenerOptions;
pub use publisher::{PublishError, Publisher, DEFAULT_PUBLISH_TIMEOUT};
pub use replica::{Replica, ReplicaStore, StoreError};
pub use version_guard::{GuardRejection, VersionGuard, COLD_VERSION};

/// What a listener did with one delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Handler persisted the event; acked
    Applied,
    /// Event was already applied by an earlier delivery; acked without effect
    Duplicate,
    /// Payload does not match the channel's schema; acked and dropped
    Rejected,
    /// Event is ahead of the local replica; left unacked for redelivery
    Deferred,
    /// Handler or store failed; left unacked for redelivery
    Failed,
    /// Given up on after the dead-letter threshold; copied to the dead-letter channel and acked
    DeadLettered,
}

impl MessageOutcome {
    /// Whether the delivery was acknowledged
    pub fn is_acked(self) -> bool {
        !matches!(self, MessageOutcome::Deferred | MessageOutcome::Failed)
    }
}
