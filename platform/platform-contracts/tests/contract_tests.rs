/// Contract tests for the event catalog
///
/// Every channel has a golden envelope under `golden/`. These tests check that
/// each golden example decodes against the schema of its channel, so a schema
/// change that would break existing consumers fails here first.

use platform_contracts::{
    decode, Channel, EventContract, ExpirationComplete, OrderCancelled, OrderCreated, OrderStatus,
    PaymentCreated, TicketCreated, TicketUpdated, Versioned,
};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

fn golden_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("golden")
}

fn load_golden(channel: Channel) -> Value {
    let path = golden_dir().join(format!("{channel}.json"));
    let contents =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read file: {:?}", path));
    serde_json::from_str(&contents).unwrap_or_else(|_| panic!("Failed to parse JSON: {:?}", path))
}

fn golden_data<E: EventContract>() -> E::Data {
    let example = load_golden(E::CHANNEL);

    assert_eq!(
        example.get("channel").and_then(|v| v.as_str()),
        Some(E::CHANNEL.as_str()),
        "golden example is filed under the wrong channel"
    );
    assert!(example.get("eventId").is_some(), "Missing eventId");
    assert!(example.get("occurredAt").is_some(), "Missing occurredAt");

    let data = example.get("data").cloned().expect("Missing data");
    decode::<E>(data).unwrap_or_else(|e| panic!("golden example rejected: {e}"))
}

#[test]
fn test_every_channel_has_a_golden_example() {
    for channel in Channel::ALL {
        let path = golden_dir().join(format!("{channel}.json"));
        assert!(path.exists(), "Missing golden example for {channel}");
    }
}

#[test]
fn test_ticket_created_golden() {
    let data = golden_data::<TicketCreated>();
    assert_eq!(data.version(), 0);
    assert_eq!(data.price, 45.5);
}

#[test]
fn test_ticket_updated_golden() {
    let data = golden_data::<TicketUpdated>();
    assert_eq!(data.version(), 1);
    assert_eq!(data.order_id.as_deref(), Some("ord_77a1"));
}

#[test]
fn test_order_created_golden() {
    let data = golden_data::<OrderCreated>();
    assert_eq!(data.status, OrderStatus::Created);
    assert_eq!(data.ticket.id, "tkt_5f2b9c");
    assert!(data.expires_at > chrono::DateTime::<chrono::Utc>::UNIX_EPOCH);
}

#[test]
fn test_order_cancelled_golden() {
    let data = golden_data::<OrderCancelled>();
    assert_eq!(data.aggregate_id(), "ord_77a1");
    assert_eq!(data.version(), 1);
}

#[test]
fn test_expiration_complete_golden() {
    let data = golden_data::<ExpirationComplete>();
    assert_eq!(data.order_id, "ord_77a1");
}

#[test]
fn test_payment_created_golden() {
    let data = golden_data::<PaymentCreated>();
    assert_eq!(data.order_id, "ord_77a1");
    assert_eq!(data.charge_id, "ch_9f8e7d");
}

#[test]
fn test_golden_payload_is_rejected_on_another_channel() {
    let payment = load_golden(Channel::PaymentCreated)["data"].clone();
    assert!(decode::<OrderCancelled>(payment).is_err());
}
