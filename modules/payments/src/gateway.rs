//! Charging cards through an external processor

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charge {
    pub id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub source: String,
}

/// Processor integration used by the payments service
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge `amount_minor` to the card behind `source` and return the charge id
    async fn charge(
        &self,
        amount_minor: i64,
        currency: &str,
        source: &str,
    ) -> Result<String, GatewayError>;
}

/// Gateway for development and tests
///
/// Sources starting with `fail_` are declined; every other charge succeeds
/// and is recorded.
#[derive(Default)]
pub struct InMemoryGateway {
    charges: Mutex<Vec<Charge>>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn charges(&self) -> Vec<Charge> {
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn charge(
        &self,
        amount_minor: i64,
        currency: &str,
        source: &str,
    ) -> Result<String, GatewayError> {
        if source.starts_with("fail_") {
            tracing::warn!(source = %source, "Charge declined (triggered by source)");
            return Err(GatewayError::Declined("insufficient funds".to_string()));
        }

        let charge = Charge {
            id: format!("ch_{}", Uuid::new_v4().simple()),
            amount_minor,
            currency: currency.to_string(),
            source: source.to_string(),
        };
        tracing::info!(
            charge_id = %charge.id,
            amount = amount_minor,
            currency = %currency,
            "Charge succeeded"
        );

        let id = charge.id.clone();
        self.charges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(charge);
        Ok(id)
    }
}
