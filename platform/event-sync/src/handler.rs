use crate::{GuardRejection, StoreError};
use async_trait::async_trait;
use platform_contracts::EventContract;

/// Successful result of handling one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The event changed local state, which is now persisted
    Applied,
    /// The event had already been applied; nothing changed
    Duplicate,
}

/// Handler failure. Decides whether the delivery is acked.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Rejected by the version guard. Stale events are acked, gaps are not.
    #[error(transparent)]
    Version(#[from] GuardRejection),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Any other failure; the delivery is redelivered
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(reason: impl std::fmt::Display) -> Self {
        HandlerError::Failed(reason.to_string())
    }
}

/// Service logic run for every decoded event of kind `E`
///
/// Must be idempotent: running it again for the same event leaves the same
/// end state. Returning `Err` leaves the delivery unacknowledged unless the
/// error is a stale version.
#[async_trait]
pub trait MessageHandler<E: EventContract>: Send + Sync + 'static {
    async fn handle(&self, data: E::Data) -> Result<Disposition, HandlerError>;
}
