//! Listener behaviour against a real NATS JetStream server
//!
//! Requires: docker run -p 4222:4222 nats:2.10-alpine -js
//! Run with: cargo test -p e2e-tests --test nats_listener_e2e -- --ignored --test-threads=1

use event_bus::{BusConfig, BusType, EventBus};
use event_sync::{ListenerOptions, Publisher};
use orders_rs::{OrderRepo, OrderService, TicketReplicaStore};
use platform_contracts::{TicketCreated, TicketCreatedData, TicketUpdated, TicketUpdatedData};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

async fn connect() -> Arc<dyn EventBus> {
    dotenvy::dotenv().ok();
    let config = BusConfig {
        bus_type: BusType::Nats,
        nats_url: std::env::var("NATS_URL").unwrap_or_else(|_| "nats://localhost:4222".into()),
        stream_name: "TICKETING_E2E".to_string(),
        ..BusConfig::default()
    }
    .with_stream_subjects(platform_contracts::stream_subjects());

    event_bus::connect(&config)
        .await
        .expect("NATS server must be running on localhost:4222")
}

fn order_service(bus: Arc<dyn EventBus>) -> Arc<OrderService> {
    Arc::new(OrderService::new(
        Arc::new(OrderRepo::new()),
        Arc::new(TicketReplicaStore::new()),
        bus,
        Duration::from_secs(5),
        Duration::from_secs(900),
    ))
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(20), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
#[ignore] // Requires NATS server
#[serial]
async fn test_nats_replica_converges_despite_reordering() {
    let bus = connect().await;
    let service = order_service(bus.clone());
    let group = format!("orders-e2e-{}", Uuid::new_v4());
    let listeners = orders_rs::start_listeners(
        bus.clone(),
        service.clone(),
        ListenerOptions::new(group).with_ack_wait(Duration::from_secs(1)),
    )
    .await
    .unwrap();

    let ticket_id = format!("tkt_{}", Uuid::new_v4().simple());
    let update = |version: i64, price: f64| TicketUpdatedData {
        id: ticket_id.clone(),
        version,
        title: "concert".to_string(),
        price,
        user_id: "seller".to_string(),
        order_id: None,
    };

    // version 2 arrives before 1 and 0; it is redelivered until they land
    let updates = Publisher::<TicketUpdated>::new(bus.clone());
    updates.publish(&update(2, 30.0)).await.unwrap();
    updates.publish(&update(1, 25.0)).await.unwrap();
    Publisher::<TicketCreated>::new(bus.clone())
        .publish(&TicketCreatedData {
            id: ticket_id.clone(),
            version: 0,
            title: "concert".to_string(),
            price: 20.0,
            user_id: "seller".to_string(),
        })
        .await
        .unwrap();

    let tickets = service.tickets().clone();
    let id = ticket_id.clone();
    wait_until(move || tickets.get(&id).map(|t| t.version) == Some(2)).await;
    assert_eq!(service.tickets().get(&ticket_id).unwrap().price, 30.0);

    bus.close().await.unwrap();
    for listener in listeners {
        listener.join().await;
    }
}
