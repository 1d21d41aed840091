//! Reactions to order events

use crate::service::TicketService;
use async_trait::async_trait;
use event_sync::{Disposition, HandlerError, MessageHandler};
use platform_contracts::{OrderCancelled, OrderCancelledData, OrderCreated, OrderCreatedData};
use std::sync::Arc;

/// Reserves the ticket of every new order
pub struct ReserveOnOrderCreated(pub Arc<TicketService>);

#[async_trait]
impl MessageHandler<OrderCreated> for ReserveOnOrderCreated {
    async fn handle(&self, data: OrderCreatedData) -> Result<Disposition, HandlerError> {
        self.0.reserve(&data).await
    }
}

/// Releases the ticket of every cancelled order
pub struct ReleaseOnOrderCancelled(pub Arc<TicketService>);

#[async_trait]
impl MessageHandler<OrderCancelled> for ReleaseOnOrderCancelled {
    async fn handle(&self, data: OrderCancelledData) -> Result<Disposition, HandlerError> {
        self.0.release(&data).await
    }
}
