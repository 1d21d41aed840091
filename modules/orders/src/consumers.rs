//! Reactions to expiration and payment events

use crate::service::OrderService;
use async_trait::async_trait;
use event_sync::{Disposition, HandlerError, MessageHandler};
use platform_contracts::{
    ExpirationComplete, ExpirationCompleteData, PaymentCreated, PaymentCreatedData,
};
use std::sync::Arc;

pub struct CancelOnExpiration(pub Arc<OrderService>);

#[async_trait]
impl MessageHandler<ExpirationComplete> for CancelOnExpiration {
    async fn handle(&self, data: ExpirationCompleteData) -> Result<Disposition, HandlerError> {
        self.0.expire(&data).await
    }
}

pub struct CompleteOnPayment(pub Arc<OrderService>);

#[async_trait]
impl MessageHandler<PaymentCreated> for CompleteOnPayment {
    async fn handle(&self, data: PaymentCreatedData) -> Result<Disposition, HandlerError> {
        self.0.complete(&data).await
    }
}
