pub mod consumers;
pub mod models;
pub mod repo;
pub mod service;

pub use consumers::{ReleaseOnOrderCancelled, ReserveOnOrderCreated};
pub use models::Ticket;
pub use repo::TicketRepo;
pub use service::TicketService;

use event_bus::{BusResult, EventBus};
use event_sync::{Listener, ListenerHandle, ListenerOptions, PublishError, StoreError};
use platform_contracts::{OrderCancelled, OrderCreated};
use std::sync::Arc;

/// Queue group name of the service before any prefix
pub const SERVICE_NAME: &str = "tickets-service";

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

/// Start every listener of the service
pub async fn start_listeners(
    bus: Arc<dyn EventBus>,
    service: Arc<TicketService>,
    options: ListenerOptions,
) -> BusResult<Vec<ListenerHandle>> {
    let reserve = Listener::<OrderCreated, _>::new(
        bus.clone(),
        ReserveOnOrderCreated(service.clone()),
        options.clone(),
    )
    .listen()
    .await?;

    let release = Listener::<OrderCancelled, _>::new(bus, ReleaseOnOrderCancelled(service), options)
        .listen()
        .await?;

    Ok(vec![reserve, release])
}
