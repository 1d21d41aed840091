use chrono::{DateTime, Utc};
use platform_contracts::{OrderCancelledData, OrderCreatedData, OrderStatus, TicketIdRef, TicketRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub version: i64,
    pub status: OrderStatus,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub ticket_id: String,
    /// Ticket price at the time the order was placed
    pub price: f64,
}

impl Order {
    pub fn created_event(&self) -> OrderCreatedData {
        OrderCreatedData {
            id: self.id.clone(),
            version: self.version,
            status: self.status,
            user_id: self.user_id.clone(),
            expires_at: self.expires_at,
            ticket: TicketRef {
                id: self.ticket_id.clone(),
                price: self.price,
            },
        }
    }

    pub fn cancelled_event(&self) -> OrderCancelledData {
        OrderCancelledData {
            id: self.id.clone(),
            version: self.version,
            ticket: TicketIdRef {
                id: self.ticket_id.clone(),
            },
        }
    }
}

/// Local copy of a ticket owned by the tickets service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketReplica {
    pub id: String,
    pub version: i64,
    pub title: String,
    pub price: f64,
    /// Order the tickets service has reserved the ticket for
    pub order_id: Option<String>,
}
