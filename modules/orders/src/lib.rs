pub mod config;
pub mod consumers;
pub mod models;
pub mod repo;
pub mod service;

pub use config::OrdersConfig;
pub use consumers::{CancelOnExpiration, CompleteOnPayment};
pub use models::{Order, TicketReplica};
pub use repo::{OrderRepo, TicketReplicaStore};
pub use service::OrderService;

use event_bus::{BusResult, EventBus};
use event_sync::{Listener, ListenerHandle, ListenerOptions, PublishError, Replica, StoreError};
use platform_contracts::{ExpirationComplete, PaymentCreated, TicketCreated, TicketUpdated};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "orders-service";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("not authorized")]
    NotAuthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The change is saved but was not announced; retry the request
    #[error("change saved but not announced: {0}")]
    Publish(#[from] PublishError),
}

/// Start the ticket replica and the order reaction listeners
pub async fn start_listeners(
    bus: Arc<dyn EventBus>,
    service: Arc<OrderService>,
    options: ListenerOptions,
) -> BusResult<Vec<ListenerHandle>> {
    let replica = Replica::new(service.tickets().clone());

    let handles = vec![
        Listener::<TicketCreated, _>::new(bus.clone(), replica.clone(), options.clone())
            .listen()
            .await?,
        Listener::<TicketUpdated, _>::new(bus.clone(), replica, options.clone())
            .listen()
            .await?,
        Listener::<ExpirationComplete, _>::new(
            bus.clone(),
            CancelOnExpiration(service.clone()),
            options.clone(),
        )
        .listen()
        .await?,
        Listener::<PaymentCreated, _>::new(bus, CompleteOnPayment(service), options)
            .listen()
            .await?,
    ];
    Ok(handles)
}
