pub mod scheduler;

pub use scheduler::ExpirationScheduler;

use async_trait::async_trait;
use event_bus::{BusResult, EventBus};
use event_sync::{Disposition, HandlerError, Listener, ListenerHandle, ListenerOptions, MessageHandler};
use platform_contracts::{OrderCreated, OrderCreatedData};
use std::sync::Arc;

pub const SERVICE_NAME: &str = "expiration-service";

/// Schedules the expiration of every new order
pub struct ScheduleOnOrderCreated(pub Arc<ExpirationScheduler>);

#[async_trait]
impl MessageHandler<OrderCreated> for ScheduleOnOrderCreated {
    async fn handle(&self, data: OrderCreatedData) -> Result<Disposition, HandlerError> {
        if self.0.schedule(&data.id, data.expires_at) {
            Ok(Disposition::Applied)
        } else {
            Ok(Disposition::Duplicate)
        }
    }
}

pub async fn start_listeners(
    bus: Arc<dyn EventBus>,
    scheduler: Arc<ExpirationScheduler>,
    options: ListenerOptions,
) -> BusResult<Vec<ListenerHandle>> {
    let handle = Listener::<OrderCreated, _>::new(bus, ScheduleOnOrderCreated(scheduler), options)
        .listen()
        .await?;
    Ok(vec![handle])
}
