//! In-process storage: the order replica and recorded payments

use crate::models::{OrderReplica, Payment};
use async_trait::async_trait;
use event_sync::{ReplicaStore, StoreError};
use platform_contracts::{
    OrderCancelled, OrderCancelledData, OrderCreated, OrderCreatedData, OrderStatus,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct OrderReplicaStore {
    orders: Mutex<HashMap<String, OrderReplica>>,
}

impl OrderReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<OrderReplica> {
        lock(&self.orders).get(id).cloned()
    }
}

#[async_trait]
impl ReplicaStore<OrderCreated> for OrderReplicaStore {
    type Snapshot = OrderReplica;

    async fn load_version(&self, aggregate_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(lock(&self.orders).get(aggregate_id).map(|o| o.version))
    }

    async fn apply(
        &self,
        aggregate_id: &str,
        data: &OrderCreatedData,
    ) -> Result<OrderReplica, StoreError> {
        let mut orders = lock(&self.orders);
        if let Some(existing) = orders.get(aggregate_id) {
            return Err(StoreError::VersionConflict {
                aggregate_id: aggregate_id.to_string(),
                expected: None,
                found: Some(existing.version),
            });
        }
        let order = OrderReplica {
            id: data.id.clone(),
            version: data.version,
            status: data.status,
            user_id: data.user_id.clone(),
            price: data.ticket.price,
        };
        orders.insert(aggregate_id.to_string(), order.clone());
        Ok(order)
    }
}

#[async_trait]
impl ReplicaStore<OrderCancelled> for OrderReplicaStore {
    type Snapshot = OrderReplica;

    async fn load_version(&self, aggregate_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(lock(&self.orders).get(aggregate_id).map(|o| o.version))
    }

    async fn apply(
        &self,
        aggregate_id: &str,
        data: &OrderCancelledData,
    ) -> Result<OrderReplica, StoreError> {
        let mut orders = lock(&self.orders);
        let order = orders
            .get_mut(aggregate_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {aggregate_id}")))?;
        if order.version != data.version - 1 {
            return Err(StoreError::VersionConflict {
                aggregate_id: aggregate_id.to_string(),
                expected: Some(data.version - 1),
                found: Some(order.version),
            });
        }
        order.version = data.version;
        order.status = OrderStatus::Cancelled;
        Ok(order.clone())
    }
}

#[derive(Default)]
pub struct PaymentRepo {
    payments: Mutex<Vec<Payment>>,
    /// Orders with a charge in flight
    claims: Mutex<HashSet<String>>,
}

impl PaymentRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_order(&self, order_id: &str) -> Option<Payment> {
        lock(&self.payments)
            .iter()
            .find(|p| p.order_id == order_id)
            .cloned()
    }

    /// Take the single payment slot of an order before charging it
    ///
    /// Returns `false` if the order is already paid or another charge for it
    /// is in flight.
    pub fn claim(&self, order_id: &str) -> bool {
        let payments = lock(&self.payments);
        if payments.iter().any(|p| p.order_id == order_id) {
            return false;
        }
        lock(&self.claims).insert(order_id.to_string())
    }

    /// Give the slot back after a charge that did not go through
    pub fn release_claim(&self, order_id: &str) {
        lock(&self.claims).remove(order_id);
    }

    /// Record a payment; at most one per order. Clears the order's claim.
    pub fn insert(&self, payment: Payment) -> Result<(), StoreError> {
        let mut payments = lock(&self.payments);
        if payments.iter().any(|p| p.order_id == payment.order_id) {
            return Err(StoreError::VersionConflict {
                aggregate_id: payment.order_id.clone(),
                expected: None,
                found: None,
            });
        }
        lock(&self.claims).remove(&payment.order_id);
        payments.push(payment);
        Ok(())
    }
}
