//! Payload schemas, grouped by the service that owns the aggregate

pub mod expiration;
pub mod orders;
pub mod payments;
pub mod tickets;
