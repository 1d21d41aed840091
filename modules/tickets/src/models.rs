use platform_contracts::{TicketCreatedData, TicketUpdatedData};
use serde::{Deserialize, Serialize};

/// Authoritative ticket record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub version: i64,
    pub title: String,
    pub price: f64,
    pub user_id: String,
    /// Order holding the ticket; a reserved ticket cannot be edited
    pub order_id: Option<String>,
}

impl Ticket {
    pub fn is_reserved(&self) -> bool {
        self.order_id.is_some()
    }

    pub fn created_event(&self) -> TicketCreatedData {
        TicketCreatedData {
            id: self.id.clone(),
            version: self.version,
            title: self.title.clone(),
            price: self.price,
            user_id: self.user_id.clone(),
        }
    }

    pub fn updated_event(&self) -> TicketUpdatedData {
        TicketUpdatedData {
            id: self.id.clone(),
            version: self.version,
            title: self.title.clone(),
            price: self.price,
            user_id: self.user_id.clone(),
            order_id: self.order_id.clone(),
        }
    }
}
