//! Pluggable storage backends for ticket persistence.
//!
//! The core talks to storage through four narrow traits, one per record
//! type, bundled by [`TicketStorage`]. The available backends depend on the
//! enabled features.

use crate::TicketError;
use crate::ticket::record::{Customer, Purchase, TicketType, Token};
use async_trait::async_trait;

// Always available
mod memory;
pub use memory::MemoryStorage;

// Feature-gated storage backends
#[cfg(feature = "sqlite-storage")]
mod sqlite;
#[cfg(feature = "sqlite-storage")]
pub use sqlite::SqliteStorage;

/// Statistics about a storage backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub customers: usize,
    pub ticket_types: usize,
    pub purchases: usize,
    /// Total number of token records, active or not
    pub tokens: usize,
    /// Number of invalidated tokens still awaiting purge
    pub inactive_tokens: usize,
    /// Additional backend-specific information
    pub backend_info: String,
}

/// Customer lookups.
///
/// Customers are owned by the surrounding system; the core only needs
/// [`CustomerStore::customer_exists`]. The remaining methods let callers and tests
/// manage the records.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Returns whether a customer with `id` exists.
    async fn customer_exists(&self, id: &str) -> Result<bool, TicketError>;

    /// Retrieves a customer.
    async fn get_customer(&self, id: &str) -> Result<Option<Customer>, TicketError>;

    /// Stores a new customer, `AlreadyExists` if the id is taken.
    async fn create_customer(&self, customer: &Customer) -> Result<(), TicketError>;

    /// Removes a customer. Returns whether a record was removed.
    async fn delete_customer(&self, id: &str) -> Result<bool, TicketError>;
}

/// Ticket type records and their remaining quantity.
///
/// # Atomicity
///
/// [`TicketStore::compare_and_swap_quantity`] is the only primitive the
/// inventory uses to change quantities. It must be atomic with respect to
/// every other call on the same ticket type; everything else can be
/// implemented naively.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Retrieves a ticket type.
    async fn get_ticket_type(&self, id: &str) -> Result<Option<TicketType>, TicketError>;

    /// Returns whether a ticket type with `id` exists.
    async fn ticket_type_exists(&self, id: &str) -> Result<bool, TicketError> {
        Ok(self.get_ticket_type(id).await?.is_some())
    }

    /// Stores a new ticket type, `AlreadyExists` if the id is taken.
    async fn create_ticket_type(&self, ticket_type: &TicketType) -> Result<(), TicketError>;

    /// Updates the descriptive fields of a ticket type, `NotFound` if absent.
    ///
    /// Only `event_id`, `kind` and `unit_price` are written. The stored
    /// `remaining_quantity` is left alone; it changes only through
    /// [`compare_and_swap_quantity`](TicketStore::compare_and_swap_quantity).
    async fn update_ticket_type(&self, ticket_type: &TicketType) -> Result<(), TicketError>;

    /// Removes a ticket type. Returns whether a record was removed.
    async fn delete_ticket_type(&self, id: &str) -> Result<bool, TicketError>;

    /// Atomically sets the remaining quantity to `new` if it currently equals `expected`.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(ticket_type))` - The swap happened; the updated record
    /// * `Ok(None)` - The current quantity differs from `expected`; nothing changed
    /// * `Err(TicketError::NotFound)` - No ticket type with `id`
    async fn compare_and_swap_quantity(
        &self,
        id: &str,
        expected: u32,
        new: u32,
    ) -> Result<Option<TicketType>, TicketError>;
}

/// The purchase ledger.
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Retrieves a purchase.
    async fn get_purchase(&self, id: &str) -> Result<Option<Purchase>, TicketError>;

    /// Stores a new purchase, `AlreadyExists` if the id is taken.
    async fn create_purchase(&self, purchase: &Purchase) -> Result<(), TicketError>;

    /// Replaces a purchase, `NotFound` if absent.
    async fn update_purchase(&self, purchase: &Purchase) -> Result<(), TicketError>;
}

/// Admission token records.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Retrieves a token.
    async fn get_token(&self, id: &str) -> Result<Option<Token>, TicketError>;

    /// Stores a new token, `AlreadyExists` if the id is taken.
    async fn create_token(&self, token: &Token) -> Result<(), TicketError>;

    /// Replaces a token in a single write, `NotFound` if absent.
    async fn update_token(&self, token: &Token) -> Result<(), TicketError>;

    /// Lists every token with `active == false`.
    async fn list_inactive_tokens(&self) -> Result<Vec<Token>, TicketError>;

    /// Removes a token. Returns whether a record was removed.
    async fn delete_token(&self, id: &str) -> Result<bool, TicketError>;
}

/// A complete storage backend.
///
/// # Example Implementation
///
/// Backends implement the four record traits and then this one:
///
/// ```rust,ignore
/// #[async_trait]
/// impl TicketStorage for MyStorage {
///     async fn init(&self) -> Result<(), TicketError> {
///         self.create_tables().await
///     }
///
///     async fn get_stats(&self) -> Result<StorageStats, TicketError> {
///         self.count_rows().await
///     }
/// }
/// ```
#[async_trait]
pub trait TicketStorage: CustomerStore + TicketStore + PurchaseStore + TokenStore {
    /// Optional one-time initialization (schema creation, connection checks).
    async fn init(&self) -> Result<(), TicketError> {
        Ok(())
    }

    /// Returns statistics about the backend.
    async fn get_stats(&self) -> Result<StorageStats, TicketError>;
}
