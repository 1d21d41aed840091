//! In-process ticket storage with version-conditional writes

use crate::models::Ticket;
use event_sync::StoreError;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
pub struct TicketRepo {
    tickets: Mutex<HashMap<String, Ticket>>,
}

impl TicketRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, HashMap<String, Ticket>> {
        self.tickets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &str) -> Option<Ticket> {
        self.rows().get(id).cloned()
    }

    pub fn list(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.rows().values().cloned().collect();
        tickets.sort_by(|a, b| a.id.cmp(&b.id));
        tickets
    }

    pub fn insert(&self, ticket: Ticket) -> Result<(), StoreError> {
        let mut rows = self.rows();
        if let Some(existing) = rows.get(&ticket.id) {
            return Err(StoreError::VersionConflict {
                aggregate_id: ticket.id.clone(),
                expected: None,
                found: Some(existing.version),
            });
        }
        rows.insert(ticket.id.clone(), ticket);
        Ok(())
    }

    /// Store `ticket` only if the stored copy is still at `ticket.version - 1`
    pub fn save(&self, ticket: Ticket) -> Result<(), StoreError> {
        let mut rows = self.rows();
        let found = rows.get(&ticket.id).map(|t| t.version);
        let expected = ticket.version - 1;
        if found != Some(expected) {
            return Err(StoreError::VersionConflict {
                aggregate_id: ticket.id.clone(),
                expected: Some(expected),
                found,
            });
        }
        rows.insert(ticket.id.clone(), ticket);
        Ok(())
    }
}
