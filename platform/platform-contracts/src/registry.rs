//! Static catalog of every channel the platform publishes on.
//!
//! Services read it at startup to size the transport stream and in tests to
//! check that every channel has a schema.

use crate::{
    Channel, EventContract, ExpirationComplete, OrderCancelled, OrderCreated, PaymentCreated,
    TicketCreated, TicketUpdated, DEAD_LETTER_PREFIX,
};

/// Registry entry for one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractDescriptor {
    pub channel: Channel,
    /// Name of the event kind as it appears in logs
    pub kind: &'static str,
    /// Bumped on additive changes to the payload schema
    pub schema_version: u32,
    /// Payload carries an aggregate id and version checked by replicas
    pub versioned: bool,
}

pub const REGISTRY: &[ContractDescriptor] = &[
    ContractDescriptor {
        channel: TicketCreated::CHANNEL,
        kind: "TicketCreated",
        schema_version: 1,
        versioned: true,
    },
    ContractDescriptor {
        channel: TicketUpdated::CHANNEL,
        kind: "TicketUpdated",
        schema_version: 1,
        versioned: true,
    },
    ContractDescriptor {
        channel: OrderCreated::CHANNEL,
        kind: "OrderCreated",
        schema_version: 1,
        versioned: true,
    },
    ContractDescriptor {
        channel: OrderCancelled::CHANNEL,
        kind: "OrderCancelled",
        schema_version: 1,
        versioned: true,
    },
    ContractDescriptor {
        channel: ExpirationComplete::CHANNEL,
        kind: "ExpirationComplete",
        schema_version: 1,
        versioned: false,
    },
    ContractDescriptor {
        channel: PaymentCreated::CHANNEL,
        kind: "PaymentCreated",
        schema_version: 1,
        versioned: false,
    },
];

/// Look up the registry entry of a channel
pub fn descriptor(channel: Channel) -> &'static ContractDescriptor {
    let index = match channel {
        Channel::TicketCreated => 0,
        Channel::TicketUpdated => 1,
        Channel::OrderCreated => 2,
        Channel::OrderCancelled => 3,
        Channel::ExpirationComplete => 4,
        Channel::PaymentCreated => 5,
    };
    &REGISTRY[index]
}

/// Subject filters that capture every registered channel plus dead letters
pub fn stream_subjects() -> Vec<String> {
    let mut subjects: Vec<String> = Vec::new();
    for entry in REGISTRY {
        let prefix = entry
            .channel
            .as_str()
            .split('.')
            .next()
            .unwrap_or_default();
        let subject = format!("{prefix}.>");
        if !subjects.contains(&subject) {
            subjects.push(subject);
        }
    }
    subjects.push(format!("{DEAD_LETTER_PREFIX}.>"));
    subjects
}
