//! Order lifecycle. Persist first, then announce.

use crate::models::Order;
use crate::repo::{OrderRepo, TicketReplicaStore};
use crate::ServiceError;
use chrono::Utc;
use event_bus::EventBus;
use event_sync::{Disposition, HandlerError, Publisher, StoreError};
use platform_contracts::{
    ExpirationCompleteData, OrderCancelled, OrderCreated, OrderStatus, PaymentCreatedData,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct OrderService {
    orders: Arc<OrderRepo>,
    tickets: Arc<TicketReplicaStore>,
    created: Publisher<OrderCreated>,
    cancelled: Publisher<OrderCancelled>,
    expiration_window: Duration,
}

impl OrderService {
    pub fn new(
        orders: Arc<OrderRepo>,
        tickets: Arc<TicketReplicaStore>,
        bus: Arc<dyn EventBus>,
        publish_timeout: Duration,
        expiration_window: Duration,
    ) -> Self {
        Self {
            orders,
            tickets,
            created: Publisher::new(bus.clone()).with_timeout(publish_timeout),
            cancelled: Publisher::new(bus).with_timeout(publish_timeout),
            expiration_window,
        }
    }

    pub fn tickets(&self) -> &Arc<TicketReplicaStore> {
        &self.tickets
    }

    /// Place an order for a ticket the replica knows and no other order holds
    pub async fn create_order(&self, user_id: &str, ticket_id: &str) -> Result<Order, ServiceError> {
        let ticket = self
            .tickets
            .get(ticket_id)
            .ok_or_else(|| ServiceError::NotFound(format!("ticket {ticket_id}")))?;

        let window = chrono::Duration::from_std(self.expiration_window)
            .map_err(|e| ServiceError::BadRequest(format!("invalid expiration window: {e}")))?;
        let order = Order {
            id: Uuid::new_v4().to_string(),
            version: 0,
            status: OrderStatus::Created,
            user_id: user_id.to_string(),
            expires_at: Utc::now() + window,
            ticket_id: ticket.id,
            price: ticket.price,
        };

        if !self.orders.insert_if_ticket_free(order.clone())? {
            return Err(ServiceError::BadRequest(
                "ticket is already reserved".to_string(),
            ));
        }
        self.created.publish(&order.created_event()).await?;

        tracing::info!(order_id = %order.id, ticket_id = %order.ticket_id, "Order created");
        Ok(order)
    }

    pub fn get_order(&self, order_id: &str, user_id: &str) -> Result<Order, ServiceError> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))?;
        if order.user_id != user_id {
            return Err(ServiceError::NotAuthorized);
        }
        Ok(order)
    }

    pub fn list_orders(&self, user_id: &str) -> Vec<Order> {
        self.orders.list_for_user(user_id)
    }

    /// Cancel on behalf of the order's owner
    ///
    /// Cancelling an already cancelled order announces it again.
    pub async fn cancel_order(&self, order_id: &str, user_id: &str) -> Result<Order, ServiceError> {
        let order = self.get_order(order_id, user_id)?;
        match order.status {
            OrderStatus::Complete => Err(ServiceError::BadRequest(
                "cannot cancel a paid order".to_string(),
            )),
            OrderStatus::Cancelled => {
                self.cancelled.publish(&order.cancelled_event()).await?;
                Ok(order)
            }
            OrderStatus::Created | OrderStatus::AwaitingPayment => {
                let order = self.mark_cancelled(order)?;
                self.cancelled.publish(&order.cancelled_event()).await?;
                tracing::info!(order_id = %order.id, "Order cancelled");
                Ok(order)
            }
        }
    }

    /// Cancel an order whose reservation window elapsed, unless it was paid
    pub async fn expire(&self, data: &ExpirationCompleteData) -> Result<Disposition, HandlerError> {
        let order = self
            .orders
            .get(&data.order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", data.order_id)))?;

        match order.status {
            OrderStatus::Complete => {
                tracing::debug!(order_id = %order.id, "Paid order expired, nothing to do");
                Ok(Disposition::Duplicate)
            }
            OrderStatus::Cancelled => {
                self.announce_cancelled(&order).await?;
                Ok(Disposition::Duplicate)
            }
            OrderStatus::Created | OrderStatus::AwaitingPayment => {
                let order = self.mark_cancelled(order)?;
                self.announce_cancelled(&order).await?;
                tracing::info!(order_id = %order.id, "Order expired and cancelled");
                Ok(Disposition::Applied)
            }
        }
    }

    /// Record a successful payment
    ///
    /// A cancelled order stays cancelled: its ticket is already released.
    /// The charge is reported for refund and the event acknowledged.
    pub async fn complete(&self, data: &PaymentCreatedData) -> Result<Disposition, HandlerError> {
        let order = self
            .orders
            .get(&data.order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {}", data.order_id)))?;
        match order.status {
            OrderStatus::Complete => return Ok(Disposition::Duplicate),
            OrderStatus::Cancelled => {
                tracing::error!(
                    order_id = %order.id,
                    payment_id = %data.id,
                    charge_id = %data.charge_id,
                    "Payment received for a cancelled order, charge needs a refund"
                );
                return Ok(Disposition::Duplicate);
            }
            OrderStatus::Created | OrderStatus::AwaitingPayment => {}
        }

        let order = Order {
            version: order.version + 1,
            status: OrderStatus::Complete,
            ..order
        };
        self.orders.save(order.clone())?;
        tracing::info!(order_id = %order.id, charge_id = %data.charge_id, "Order paid");
        Ok(Disposition::Applied)
    }

    fn mark_cancelled(&self, order: Order) -> Result<Order, StoreError> {
        let order = Order {
            version: order.version + 1,
            status: OrderStatus::Cancelled,
            ..order
        };
        self.orders.save(order.clone())?;
        Ok(order)
    }

    async fn announce_cancelled(&self, order: &Order) -> Result<(), HandlerError> {
        self.cancelled
            .publish(&order.cancelled_event())
            .await
            .map_err(HandlerError::failed)?;
        Ok(())
    }
}
