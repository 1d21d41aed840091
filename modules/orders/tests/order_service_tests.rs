use event_bus::{Envelope, EventBus, InMemoryBus};
use event_sync::{Disposition, HandlerError, ListenerOptions, Publisher, StoreError};
use orders_rs::{start_listeners, OrderRepo, OrderService, ServiceError, TicketReplicaStore};
use platform_contracts::{
    ExpirationComplete, ExpirationCompleteData, OrderCancelledData, OrderCreatedData, OrderStatus,
    PaymentCreated, PaymentCreatedData, TicketCreated, TicketCreatedData, TicketUpdated,
    TicketUpdatedData,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    bus: Arc<InMemoryBus>,
    service: Arc<OrderService>,
}

impl Harness {
    fn new() -> Self {
        let bus = Arc::new(InMemoryBus::new());
        let service = Arc::new(OrderService::new(
            Arc::new(OrderRepo::new()),
            Arc::new(TicketReplicaStore::new()),
            bus.clone(),
            Duration::from_secs(5),
            Duration::from_secs(900),
        ));
        Self { bus, service }
    }

    fn shared_bus(&self) -> Arc<dyn EventBus> {
        self.bus.clone()
    }

    async fn start(&self) -> Vec<event_sync::ListenerHandle> {
        start_listeners(
            self.shared_bus(),
            self.service.clone(),
            ListenerOptions::new("orders-service"),
        )
        .await
        .unwrap()
    }

    async fn list_ticket(&self, id: &str) {
        Publisher::<TicketCreated>::new(self.shared_bus())
            .publish(&TicketCreatedData {
                id: id.to_string(),
                version: 0,
                title: "concert".to_string(),
                price: 20.0,
                user_id: "seller".to_string(),
            })
            .await
            .unwrap();

        let tickets = self.service.tickets().clone();
        let id = id.to_string();
        wait_until(move || tickets.get(&id).is_some()).await;
    }

    fn created(&self) -> Vec<OrderCreatedData> {
        decode_all(&self.bus, "order.created")
    }

    fn cancelled(&self) -> Vec<OrderCancelledData> {
        decode_all(&self.bus, "order.cancelled")
    }
}

fn decode_all<T: serde::de::DeserializeOwned>(bus: &InMemoryBus, channel: &str) -> Vec<T> {
    bus.published(channel)
        .iter()
        .map(|bytes| Envelope::<T>::from_bytes(bytes).unwrap().data)
        .collect()
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(60), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn test_create_order_for_replicated_ticket() {
    let harness = Harness::new();
    let _listeners = harness.start().await;
    harness.list_ticket("t1").await;

    let order = harness.service.create_order("buyer", "t1").await.unwrap();

    assert_eq!(order.version, 0);
    assert_eq!(order.status, OrderStatus::Created);
    assert_eq!(order.price, 20.0);
    assert!(order.expires_at > chrono::Utc::now() + chrono::Duration::minutes(14));
    assert_eq!(harness.created(), vec![order.created_event()]);
}

#[tokio::test]
async fn test_create_order_for_unknown_ticket() {
    let harness = Harness::new();

    let err = harness.service.create_order("buyer", "t1").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn test_ticket_cannot_be_ordered_twice() {
    let harness = Harness::new();
    let _listeners = harness.start().await;
    harness.list_ticket("t1").await;

    let first = harness.service.create_order("buyer", "t1").await.unwrap();
    let err = harness.service.create_order("other", "t1").await.unwrap_err();
    assert!(matches!(err, ServiceError::BadRequest(ref m) if m == "ticket is already reserved"));

    harness.service.cancel_order(&first.id, "buyer").await.unwrap();
    assert!(harness.service.create_order("other", "t1").await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_order() {
    let harness = Harness::new();
    let _listeners = harness.start().await;
    harness.list_ticket("t1").await;
    let order = harness.service.create_order("buyer", "t1").await.unwrap();

    let err = harness.service.cancel_order(&order.id, "other").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotAuthorized));

    let cancelled = harness.service.cancel_order(&order.id, "buyer").await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.version, 1);

    let events = harness.cancelled();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].version, 1);
    assert_eq!(events[0].ticket.id, "t1");
}

#[tokio::test(start_paused = true)]
async fn test_expiration_cancels_unpaid_order_once() {
    let harness = Harness::new();
    let _listeners = harness.start().await;
    harness.list_ticket("t1").await;
    let order = harness.service.create_order("buyer", "t1").await.unwrap();
    let expired = ExpirationCompleteData {
        order_id: order.id.clone(),
    };

    assert_eq!(harness.service.expire(&expired).await.unwrap(), Disposition::Applied);
    assert_eq!(harness.service.expire(&expired).await.unwrap(), Disposition::Duplicate);

    let order = harness.service.get_order(&order.id, "buyer").unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.version, 1);
    // The duplicate re-announces the same version
    let versions: Vec<i64> = harness.cancelled().iter().map(|c| c.version).collect();
    assert_eq!(versions, vec![1, 1]);
}

#[tokio::test(start_paused = true)]
async fn test_paid_order_ignores_expiration() {
    let harness = Harness::new();
    let listeners = harness.start().await;
    harness.list_ticket("t1").await;
    let order = harness.service.create_order("buyer", "t1").await.unwrap();

    Publisher::<PaymentCreated>::new(harness.shared_bus())
        .publish(&PaymentCreatedData {
            id: "p1".to_string(),
            order_id: order.id.clone(),
            charge_id: "ch_1".to_string(),
        })
        .await
        .unwrap();
    let service = harness.service.clone();
    let id = order.id.clone();
    wait_until(move || {
        service.get_order(&id, "buyer").unwrap().status == OrderStatus::Complete
    })
    .await;

    Publisher::<ExpirationComplete>::new(harness.shared_bus())
        .publish(&ExpirationCompleteData {
            order_id: order.id.clone(),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(
        harness.service.get_order(&order.id, "buyer").unwrap().status,
        OrderStatus::Complete
    );
    assert!(harness.cancelled().is_empty());

    for listener in listeners {
        listener.abort();
    }
}

#[tokio::test(start_paused = true)]
async fn test_late_payment_keeps_order_cancelled() {
    let harness = Harness::new();
    let _listeners = harness.start().await;
    harness.list_ticket("t1").await;
    let order = harness.service.create_order("buyer", "t1").await.unwrap();
    harness
        .service
        .expire(&ExpirationCompleteData {
            order_id: order.id.clone(),
        })
        .await
        .unwrap();

    let outcome = harness
        .service
        .complete(&PaymentCreatedData {
            id: "p1".to_string(),
            order_id: order.id.clone(),
            charge_id: "ch_1".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, Disposition::Duplicate);
    let order = harness.service.get_order(&order.id, "buyer").unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.version, 1);
}

#[tokio::test]
async fn test_expiration_of_unknown_order_is_retried() {
    let harness = Harness::new();

    let err = harness
        .service
        .expire(&ExpirationCompleteData {
            order_id: "missing".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, HandlerError::Store(StoreError::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_ticket_replica_follows_updates_in_order() {
    let harness = Harness::new();
    let _listeners = harness.start().await;
    let publisher = Publisher::<TicketUpdated>::new(harness.shared_bus());
    let update = |version: i64, price: f64| TicketUpdatedData {
        id: "t1".to_string(),
        version,
        title: "concert".to_string(),
        price,
        user_id: "seller".to_string(),
        order_id: None,
    };

    // Version 2 overtakes version 1 and must wait for it
    publisher.publish(&update(2, 40.0)).await.unwrap();
    harness.list_ticket("t1").await;
    publisher.publish(&update(1, 30.0)).await.unwrap();

    let tickets = harness.service.tickets().clone();
    wait_until(move || tickets.get("t1").is_some_and(|t| t.version == 2)).await;
    assert_eq!(harness.service.tickets().get("t1").unwrap().price, 40.0);
}
