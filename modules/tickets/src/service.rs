//! Ticket operations. Every change is persisted first and announced second.

use crate::models::Ticket;
use crate::repo::TicketRepo;
use crate::ServiceError;
use event_bus::EventBus;
use event_sync::{Disposition, HandlerError, Publisher, StoreError};
use platform_contracts::{OrderCancelledData, OrderCreatedData, TicketCreated, TicketUpdated};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct TicketService {
    repo: Arc<TicketRepo>,
    created: Publisher<TicketCreated>,
    updated: Publisher<TicketUpdated>,
}

impl TicketService {
    pub fn new(repo: Arc<TicketRepo>, bus: Arc<dyn EventBus>, publish_timeout: Duration) -> Self {
        Self {
            repo,
            created: Publisher::new(bus.clone()).with_timeout(publish_timeout),
            updated: Publisher::new(bus).with_timeout(publish_timeout),
        }
    }

    pub fn repo(&self) -> &Arc<TicketRepo> {
        &self.repo
    }

    pub async fn create_ticket(
        &self,
        user_id: &str,
        title: &str,
        price: f64,
    ) -> Result<Ticket, ServiceError> {
        validate_listing(title, price)?;

        let ticket = Ticket {
            id: Uuid::new_v4().to_string(),
            version: 0,
            title: title.to_string(),
            price,
            user_id: user_id.to_string(),
            order_id: None,
        };
        self.repo.insert(ticket.clone())?;
        self.created.publish(&ticket.created_event()).await?;

        tracing::info!(ticket_id = %ticket.id, "Ticket created");
        Ok(ticket)
    }

    pub async fn update_ticket(
        &self,
        id: &str,
        user_id: &str,
        title: &str,
        price: f64,
    ) -> Result<Ticket, ServiceError> {
        let current = self
            .repo
            .get(id)
            .ok_or_else(|| ServiceError::NotFound(format!("ticket {id}")))?;
        if current.user_id != user_id {
            return Err(ServiceError::NotAuthorized);
        }
        if current.is_reserved() {
            return Err(ServiceError::BadRequest(
                "cannot edit a reserved ticket".to_string(),
            ));
        }
        validate_listing(title, price)?;

        let ticket = Ticket {
            version: current.version + 1,
            title: title.to_string(),
            price,
            ..current
        };
        self.repo.save(ticket.clone())?;
        self.updated.publish(&ticket.updated_event()).await?;

        tracing::info!(ticket_id = %ticket.id, version = ticket.version, "Ticket updated");
        Ok(ticket)
    }

    pub fn get_ticket(&self, id: &str) -> Result<Ticket, ServiceError> {
        self.repo
            .get(id)
            .ok_or_else(|| ServiceError::NotFound(format!("ticket {id}")))
    }

    /// Hold the ticket of a new order
    ///
    /// Redelivery of an order that already holds the ticket re-announces the
    /// ticket, in case the first announcement was lost after the save. A
    /// ticket held by another order fails, so the delivery is retried after
    /// that order's cancellation has been applied.
    pub async fn reserve(&self, order: &OrderCreatedData) -> Result<Disposition, HandlerError> {
        let current = self
            .repo
            .get(&order.ticket.id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", order.ticket.id)))?;

        match current.order_id.as_deref() {
            Some(holder) if holder == order.id => {
                self.announce(&current).await?;
                Ok(Disposition::Duplicate)
            }
            // The release of the holder may still be in flight on the other
            // channel; leave the order unacked until it lands.
            Some(holder) => {
                tracing::warn!(
                    ticket_id = %current.id,
                    holder = %holder,
                    order_id = %order.id,
                    "Ticket still held by another order, deferring reservation"
                );
                Err(HandlerError::failed(format!(
                    "ticket {} is held by order {holder}",
                    current.id
                )))
            }
            None => {
                let ticket = Ticket {
                    version: current.version + 1,
                    order_id: Some(order.id.clone()),
                    ..current
                };
                self.repo.save(ticket.clone())?;
                self.announce(&ticket).await?;
                tracing::info!(ticket_id = %ticket.id, order_id = %order.id, "Ticket reserved");
                Ok(Disposition::Applied)
            }
        }
    }

    /// Free the ticket of a cancelled order
    pub async fn release(&self, order: &OrderCancelledData) -> Result<Disposition, HandlerError> {
        let current = self
            .repo
            .get(&order.ticket.id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", order.ticket.id)))?;

        match current.order_id.as_deref() {
            Some(holder) if holder == order.id => {
                let ticket = Ticket {
                    version: current.version + 1,
                    order_id: None,
                    ..current
                };
                self.repo.save(ticket.clone())?;
                self.announce(&ticket).await?;
                tracing::info!(ticket_id = %ticket.id, order_id = %order.id, "Ticket released");
                Ok(Disposition::Applied)
            }
            None => {
                self.announce(&current).await?;
                Ok(Disposition::Duplicate)
            }
            Some(_) => Ok(Disposition::Duplicate),
        }
    }

    async fn announce(&self, ticket: &Ticket) -> Result<(), HandlerError> {
        if ticket.version == 0 {
            return Ok(());
        }
        self.updated
            .publish(&ticket.updated_event())
            .await
            .map_err(HandlerError::failed)?;
        Ok(())
    }
}

fn validate_listing(title: &str, price: f64) -> Result<(), ServiceError> {
    if title.trim().is_empty() {
        return Err(ServiceError::BadRequest("title is required".to_string()));
    }
    if !price.is_finite() || price <= 0.0 {
        return Err(ServiceError::BadRequest(
            "price must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
