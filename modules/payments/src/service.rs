use crate::gateway::PaymentGateway;
use crate::models::{to_minor_units, Payment};
use crate::repo::{OrderReplicaStore, PaymentRepo};
use crate::ServiceError;
use chrono::Utc;
use event_bus::EventBus;
use event_sync::Publisher;
use platform_contracts::{OrderStatus, PaymentCreated};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const CURRENCY: &str = "usd";

pub struct PaymentService {
    orders: Arc<OrderReplicaStore>,
    payments: Arc<PaymentRepo>,
    gateway: Arc<dyn PaymentGateway>,
    created: Publisher<PaymentCreated>,
}

impl PaymentService {
    pub fn new(
        orders: Arc<OrderReplicaStore>,
        payments: Arc<PaymentRepo>,
        gateway: Arc<dyn PaymentGateway>,
        bus: Arc<dyn EventBus>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            orders,
            payments,
            gateway,
            created: Publisher::new(bus).with_timeout(publish_timeout),
        }
    }

    pub fn orders(&self) -> &Arc<OrderReplicaStore> {
        &self.orders
    }

    /// Charge the owner of an order for its ticket
    ///
    /// The order is read from the local replica, so an order placed moments
    /// ago may not be known yet and is reported as not found.
    pub async fn create_charge(
        &self,
        order_id: &str,
        user_id: &str,
        token: &str,
    ) -> Result<Payment, ServiceError> {
        let order = self
            .orders
            .get(order_id)
            .ok_or_else(|| ServiceError::NotFound(format!("order {order_id}")))?;
        if order.user_id != user_id {
            return Err(ServiceError::NotAuthorized);
        }
        if order.status == OrderStatus::Cancelled {
            return Err(ServiceError::BadRequest(
                "cannot pay for a cancelled order".to_string(),
            ));
        }
        if !self.payments.claim(order_id) {
            return Err(ServiceError::BadRequest("order is already paid".to_string()));
        }

        let amount_minor = to_minor_units(order.price);
        let charge_id = match self.gateway.charge(amount_minor, CURRENCY, token).await {
            Ok(charge_id) => charge_id,
            Err(e) => {
                self.payments.release_claim(order_id);
                return Err(e.into());
            }
        };

        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            charge_id,
            amount_minor,
            created_at: Utc::now(),
        };
        self.payments.insert(payment.clone())?;
        self.created.publish(&payment.created_event()).await?;

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            amount = amount_minor,
            "Payment created"
        );
        Ok(payment)
    }
}
