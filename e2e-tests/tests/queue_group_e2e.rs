//! Queue-group delivery across independent listeners on one bus
//!
//! Run with: cargo test -p e2e-tests --test queue_group_e2e

use async_trait::async_trait;
use event_bus::{EventBus, InMemoryBus};
use event_sync::{
    Disposition, HandlerError, Listener, ListenerHandle, ListenerOptions, MessageHandler, Publisher,
};
use platform_contracts::{TicketCreated, TicketCreatedData};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Seen(Arc<Mutex<Vec<String>>>);

impl Seen {
    fn ids(&self) -> Vec<String> {
        let mut ids = self.0.lock().unwrap().clone();
        ids.sort();
        ids
    }

    fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageHandler<TicketCreated> for Seen {
    async fn handle(&self, data: TicketCreatedData) -> Result<Disposition, HandlerError> {
        self.0.lock().unwrap().push(data.id);
        Ok(Disposition::Applied)
    }
}

async fn join(bus: &Arc<dyn EventBus>, group: &str, seen: &Seen) -> ListenerHandle {
    Listener::<TicketCreated, _>::new(bus.clone(), seen.clone(), ListenerOptions::new(group))
        .listen()
        .await
        .unwrap()
}

async fn publish_tickets(bus: &Arc<dyn EventBus>, count: usize) -> Vec<String> {
    let publisher = Publisher::<TicketCreated>::new(bus.clone());
    let mut ids = Vec::new();
    for n in 0..count {
        let id = format!("t{n:02}");
        publisher
            .publish(&TicketCreatedData {
                id: id.clone(),
                version: 0,
                title: format!("show {n}"),
                price: 10.0 + n as f64,
                user_id: "seller".to_string(),
            })
            .await
            .unwrap();
        ids.push(id);
    }
    ids
}

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(30), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn test_distinct_groups_each_receive_every_event() {
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
    let orders = Seen::default();
    let payments = Seen::default();
    let _a = join(&bus, "orders-service", &orders).await;
    let _b = join(&bus, "payments-service", &payments).await;

    let ids = publish_tickets(&bus, 5).await;

    wait_until(|| orders.len() == 5 && payments.len() == 5).await;
    assert_eq!(orders.ids(), ids);
    assert_eq!(payments.ids(), ids);
}

#[tokio::test(start_paused = true)]
async fn test_members_of_one_group_share_the_work() {
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
    let first = Seen::default();
    let second = Seen::default();
    let _a = join(&bus, "orders-service", &first).await;
    let _b = join(&bus, "orders-service", &second).await;

    let ids = publish_tickets(&bus, 20).await;

    wait_until(|| first.len() + second.len() == 20).await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    let mut handled: Vec<String> = first.ids().into_iter().chain(second.ids()).collect();
    handled.sort();
    assert_eq!(handled, ids, "each event is handled by exactly one member");
}

#[tokio::test(start_paused = true)]
async fn test_late_group_replays_retained_events() {
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
    let ids = publish_tickets(&bus, 3).await;

    let late = Seen::default();
    let _listener = join(&bus, "late-service", &late).await;

    wait_until(|| late.len() == 3).await;
    assert_eq!(late.ids(), ids);
}

#[tokio::test(start_paused = true)]
async fn test_close_ends_listeners() {
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
    let seen = Seen::default();
    let listener = join(&bus, "orders-service", &seen).await;

    bus.close().await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), listener.join())
        .await
        .expect("listener did not stop after close");
}
