//! Version-guarded apply of remote events to a service-owned replica

use crate::{Disposition, HandlerError, MessageHandler, VersionGuard};
use async_trait::async_trait;
use platform_contracts::{EventContract, Versioned};
use std::fmt::Debug;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The stored version moved between read and write
    #[error("{aggregate_id} was modified concurrently: expected version {expected:?}, found {found:?}")]
    VersionConflict {
        aggregate_id: String,
        expected: Option<i64>,
        found: Option<i64>,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Storage of one service's copy of a remote aggregate
///
/// `apply` must persist the snapshot and its new version as one unit, and
/// only if the stored version is still `data.version() - 1` (or the aggregate
/// is absent, for version 0). Otherwise it returns
/// [`StoreError::VersionConflict`] and changes nothing.
#[async_trait]
pub trait ReplicaStore<E>: Send + Sync + 'static
where
    E: EventContract,
    E::Data: Versioned,
{
    type Snapshot: Debug + Send;

    async fn load_version(&self, aggregate_id: &str) -> Result<Option<i64>, StoreError>;

    async fn apply(&self, aggregate_id: &str, data: &E::Data) -> Result<Self::Snapshot, StoreError>;
}

/// [`MessageHandler`] that runs the version guard before a replica store
pub struct Replica<S> {
    store: Arc<S>,
}

impl<S> Replica<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S> Clone for Replica<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

#[async_trait]
impl<E, S> MessageHandler<E> for Replica<S>
where
    E: EventContract,
    E::Data: Versioned,
    S: ReplicaStore<E>,
{
    async fn handle(&self, data: E::Data) -> Result<Disposition, HandlerError> {
        let aggregate_id = data.aggregate_id().to_string();
        let local = self.store.load_version(&aggregate_id).await?;
        VersionGuard::check(local, data.version())?;

        let snapshot = self.store.apply(&aggregate_id, &data).await?;
        tracing::debug!(
            aggregate_id = %aggregate_id,
            version = data.version(),
            snapshot = ?snapshot,
            "Replica updated"
        );
        Ok(Disposition::Applied)
    }
}
