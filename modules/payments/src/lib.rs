pub mod gateway;
pub mod models;
pub mod repo;
pub mod service;

pub use gateway::{GatewayError, InMemoryGateway, PaymentGateway};
pub use models::{OrderReplica, Payment};
pub use repo::{OrderReplicaStore, PaymentRepo};
pub use service::PaymentService;

use event_bus::{BusResult, EventBus};
use event_sync::{Listener, ListenerHandle, ListenerOptions, PublishError, Replica, StoreError};
use platform_contracts::{OrderCancelled, OrderCreated};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "payments-service";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("not authorized")]
    NotAuthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The payment is recorded but was not announced; retry the request
    #[error("payment saved but not announced: {0}")]
    Publish(#[from] PublishError),
}

/// Start the order replica listeners
pub async fn start_listeners(
    bus: Arc<dyn EventBus>,
    orders: Arc<OrderReplicaStore>,
    options: ListenerOptions,
) -> BusResult<Vec<ListenerHandle>> {
    let replica = Replica::new(orders);

    let created = Listener::<OrderCreated, _>::new(bus.clone(), replica.clone(), options.clone())
        .listen()
        .await?;
    let cancelled = Listener::<OrderCancelled, _>::new(bus, replica, options)
        .listen()
        .await?;

    Ok(vec![created, cancelled])
}
