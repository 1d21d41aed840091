use chrono::{DateTime, Utc};
use platform_contracts::{OrderStatus, PaymentCreatedData};
use serde::{Deserialize, Serialize};

// ============================================================================
// ORDER REPLICA
// ============================================================================

/// Local copy of an order owned by the orders service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderReplica {
    pub id: String,
    pub version: i64,
    pub status: OrderStatus,
    pub user_id: String,
    pub price: f64,
}

// ============================================================================
// PAYMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    /// Charge identifier issued by the gateway
    pub charge_id: String,
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn created_event(&self) -> PaymentCreatedData {
        PaymentCreatedData {
            id: self.id.clone(),
            order_id: self.order_id.clone(),
            charge_id: self.charge_id.clone(),
        }
    }
}

/// Convert a decimal price to minor currency units
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minor_units_rounds_to_cents() {
        assert_eq!(to_minor_units(20.0), 2000);
        assert_eq!(to_minor_units(45.5), 4550);
        assert_eq!(to_minor_units(0.1 + 0.2), 30);
    }
}
