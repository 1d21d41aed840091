//! In-process storage: the service's own orders and its ticket replica

use crate::models::{Order, TicketReplica};
use async_trait::async_trait;
use event_sync::{ReplicaStore, StoreError};
use platform_contracts::{TicketCreated, TicketCreatedData, TicketUpdated, TicketUpdatedData};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct OrderRepo {
    orders: Mutex<HashMap<String, Order>>,
}

impl OrderRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Order> {
        lock(&self.orders).get(id).cloned()
    }

    pub fn list_for_user(&self, user_id: &str) -> Vec<Order> {
        let mut orders: Vec<Order> = lock(&self.orders)
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.expires_at);
        orders
    }

    /// Insert a new order unless another order still holds its ticket
    ///
    /// Returns `false` when the ticket is taken. Check and insert happen under
    /// one lock so two concurrent orders cannot both win the ticket.
    pub fn insert_if_ticket_free(&self, order: Order) -> Result<bool, StoreError> {
        let mut orders = lock(&self.orders);
        if let Some(existing) = orders.get(&order.id) {
            return Err(StoreError::VersionConflict {
                aggregate_id: order.id.clone(),
                expected: None,
                found: Some(existing.version),
            });
        }
        let taken = orders
            .values()
            .any(|o| o.ticket_id == order.ticket_id && o.status.is_active());
        if taken {
            return Ok(false);
        }
        orders.insert(order.id.clone(), order);
        Ok(true)
    }

    /// Store `order` only if the stored copy is still at `order.version - 1`
    pub fn save(&self, order: Order) -> Result<(), StoreError> {
        let mut orders = lock(&self.orders);
        let found = orders.get(&order.id).map(|o| o.version);
        let expected = order.version - 1;
        if found != Some(expected) {
            return Err(StoreError::VersionConflict {
                aggregate_id: order.id.clone(),
                expected: Some(expected),
                found,
            });
        }
        orders.insert(order.id.clone(), order);
        Ok(())
    }
}

#[derive(Default)]
pub struct TicketReplicaStore {
    tickets: Mutex<HashMap<String, TicketReplica>>,
}

impl TicketReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<TicketReplica> {
        lock(&self.tickets).get(id).cloned()
    }
}

#[async_trait]
impl ReplicaStore<TicketCreated> for TicketReplicaStore {
    type Snapshot = TicketReplica;

    async fn load_version(&self, aggregate_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(lock(&self.tickets).get(aggregate_id).map(|t| t.version))
    }

    async fn apply(
        &self,
        aggregate_id: &str,
        data: &TicketCreatedData,
    ) -> Result<TicketReplica, StoreError> {
        let mut tickets = lock(&self.tickets);
        if let Some(existing) = tickets.get(aggregate_id) {
            return Err(StoreError::VersionConflict {
                aggregate_id: aggregate_id.to_string(),
                expected: None,
                found: Some(existing.version),
            });
        }
        let ticket = TicketReplica {
            id: data.id.clone(),
            version: data.version,
            title: data.title.clone(),
            price: data.price,
            order_id: None,
        };
        tickets.insert(aggregate_id.to_string(), ticket.clone());
        Ok(ticket)
    }
}

#[async_trait]
impl ReplicaStore<TicketUpdated> for TicketReplicaStore {
    type Snapshot = TicketReplica;

    async fn load_version(&self, aggregate_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(lock(&self.tickets).get(aggregate_id).map(|t| t.version))
    }

    async fn apply(
        &self,
        aggregate_id: &str,
        data: &TicketUpdatedData,
    ) -> Result<TicketReplica, StoreError> {
        let mut tickets = lock(&self.tickets);
        let ticket = tickets
            .get_mut(aggregate_id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {aggregate_id}")))?;
        if ticket.version != data.version - 1 {
            return Err(StoreError::VersionConflict {
                aggregate_id: aggregate_id.to_string(),
                expected: Some(data.version - 1),
                found: Some(ticket.version),
            });
        }
        ticket.version = data.version;
        ticket.title = data.title.clone();
        ticket.price = data.price;
        ticket.order_id = data.order_id.clone();
        Ok(ticket.clone())
    }
}
