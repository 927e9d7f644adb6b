//! Remaining-quantity bookkeeping for ticket types.

use std::sync::Arc;

use crate::TicketError;
use crate::ticket::record::TicketType;
use crate::ticket::storage::TicketStore;

/// Reserves and releases units of a ticket type.
///
/// Both operations are optimistic retry loops over
/// [`TicketStore::compare_and_swap_quantity`]: read the current quantity,
/// then swap it for the adjusted value only if nobody changed it in between.
/// A failed swap means another caller made progress, so the loop cannot
/// livelock; it yields to the runtime and re-reads.
pub struct Inventory<S: TicketStore> {
    store: Arc<S>,
}

impl<S: TicketStore> Inventory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Takes one unit of `ticket_type_id`.
    ///
    /// # Errors
    ///
    /// * `NotFound` - no such ticket type
    /// * `OutOfStock` - the quantity is 0; nothing is mutated
    pub async fn reserve(&self, ticket_type_id: &str) -> Result<TicketType, TicketError> {
        loop {
            let current = self
                .store
                .get_ticket_type(ticket_type_id)
                .await?
                .ok_or(TicketError::NotFound)?;

            if current.remaining_quantity == 0 {
                tracing::debug!(ticket_type_id, "ticket type sold out");
                return Err(TicketError::OutOfStock);
            }

            let expected = current.remaining_quantity;
            if let Some(updated) = self
                .store
                .compare_and_swap_quantity(ticket_type_id, expected, expected - 1)
                .await?
            {
                tracing::debug!(
                    ticket_type_id,
                    remaining = updated.remaining_quantity,
                    "reserved ticket unit"
                );
                return Ok(updated);
            }

            tokio::task::yield_now().await;
        }
    }

    /// Returns one unit of `ticket_type_id`, undoing a [`reserve`](Self::reserve).
    pub async fn release(&self, ticket_type_id: &str) -> Result<TicketType, TicketError> {
        loop {
            let current = self
                .store
                .get_ticket_type(ticket_type_id)
                .await?
                .ok_or(TicketError::NotFound)?;

            let expected = current.remaining_quantity;
            let new = expected.checked_add(1).ok_or_else(|| {
                TicketError::from_storage_message("Remaining quantity overflow on release")
            })?;

            if let Some(updated) = self
                .store
                .compare_and_swap_quantity(ticket_type_id, expected, new)
                .await?
            {
                tracing::debug!(
                    ticket_type_id,
                    remaining = updated.remaining_quantity,
                    "released ticket unit"
                );
                return Ok(updated);
            }

            tokio::task::yield_now().await;
        }
    }

    /// Current remaining quantity, `NotFound` for an unknown ticket type.
    pub async fn remaining(&self, ticket_type_id: &str) -> Result<u32, TicketError> {
        self.store
            .get_ticket_type(ticket_type_id)
            .await?
            .map(|t| t.remaining_quantity)
            .ok_or(TicketError::NotFound)
    }
}
