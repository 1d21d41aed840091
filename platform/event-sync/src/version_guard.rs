//! Per-aggregate ordering of replicated events

/// Version of an aggregate the local replica has never seen
pub const COLD_VERSION: i64 = -1;

/// Why an incoming event may not be applied to the local replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuardRejection {
    /// Already applied by an earlier delivery
    #[error("stale version {incoming}: replica is already at {local}")]
    Stale { local: i64, incoming: i64 },

    /// One or more earlier events have not been applied yet
    #[error("version gap: expected {expected}, got {incoming}")]
    Gap { expected: i64, incoming: i64 },
}

/// Accepts exactly the next version of an aggregate
///
/// Applying only `local + 1` makes the versions a replica goes through
/// strictly increasing by one, whatever order or how often the transport
/// delivers events.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionGuard;

impl VersionGuard {
    /// `local` is `None` when the replica does not hold the aggregate yet
    pub fn check(local: Option<i64>, incoming: i64) -> Result<(), GuardRejection> {
        let local = local.unwrap_or(COLD_VERSION);
        let expected = local + 1;

        if incoming == expected {
            Ok(())
        } else if incoming < expected {
            Err(GuardRejection::Stale { local, incoming })
        } else {
            Err(GuardRejection::Gap { expected, incoming })
        }
    }
}
