//! In-memory storage backend implementation.
//!
//! This backend keeps every table in a `HashMap` behind a tokio `RwLock`.
//! It's ideal for testing, development, and single-instance deployments
//! where persistence across restarts is not required.

use super::{CustomerStore, PurchaseStore, StorageStats, TicketStorage, TicketStore, TokenStore};
use crate::TicketError;
use crate::ticket::record::{Customer, Purchase, TicketType, Token};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;

/// A simple in-memory storage implementation.
///
/// # Features
///
/// - **Thread-safe**: one tokio `RwLock` per table
/// - **Atomic quantity swaps**: the compare-and-swap runs under the ticket
///   table's write lock, so concurrent reservations serialize
/// - **No persistence**: data is lost when the application restarts
///
/// # Example
///
/// ```rust
/// use ticket_gate::ticket::storage::{MemoryStorage, TicketStore};
/// use ticket_gate::ticket::TicketType;
///
/// # async fn example() -> Result<(), ticket_gate::TicketError> {
/// let storage = MemoryStorage::new();
/// storage
///     .create_ticket_type(&TicketType::new("tt-1", "ev-1", "standing", 4500, 10))
///     .await?;
///
/// let swapped = storage.compare_and_swap_quantity("tt-1", 10, 9).await?;
/// assert_eq!(swapped.map(|t| t.remaining_quantity), Some(9));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    customers: RwLock<HashMap<String, Customer>>,
    ticket_types: RwLock<HashMap<String, TicketType>>,
    purchases: RwLock<HashMap<String, Purchase>>,
    tokens: RwLock<HashMap<String, Token>>,
}

impl MemoryStorage {
    /// Creates a new in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_new<V: Clone>(
    table: &mut HashMap<String, V>,
    id: &str,
    value: &V,
) -> Result<(), TicketError> {
    match table.entry(id.to_string()) {
        Entry::Occupied(_) => Err(TicketError::AlreadyExists),
        Entry::Vacant(slot) => {
            slot.insert(value.clone());
            Ok(())
        }
    }
}

fn replace_existing<V: Clone>(
    table: &mut HashMap<String, V>,
    id: &str,
    value: &V,
) -> Result<(), TicketError> {
    match table.get_mut(id) {
        Some(existing) => {
            *existing = value.clone();
            Ok(())
        }
        None => Err(TicketError::NotFound),
    }
}

#[async_trait]
impl CustomerStore for MemoryStorage {
    async fn customer_exists(&self, id: &str) -> Result<bool, TicketError> {
        Ok(self.customers.read().await.contains_key(id))
    }

    async fn get_customer(&self, id: &str) -> Result<Option<Customer>, TicketError> {
        Ok(self.customers.read().await.get(id).cloned())
    }

    async fn create_customer(&self, customer: &Customer) -> Result<(), TicketError> {
        insert_new(&mut *self.customers.write().await, &customer.id, customer)
    }

    async fn delete_customer(&self, id: &str) -> Result<bool, TicketError> {
        Ok(self.customers.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl TicketStore for MemoryStorage {
    async fn get_ticket_type(&self, id: &str) -> Result<Option<TicketType>, TicketError> {
        Ok(self.ticket_types.read().await.get(id).cloned())
    }

    async fn ticket_type_exists(&self, id: &str) -> Result<bool, TicketError> {
        Ok(self.ticket_types.read().await.contains_key(id))
    }

    async fn create_ticket_type(&self, ticket_type: &TicketType) -> Result<(), TicketError> {
        insert_new(
            &mut *self.ticket_types.write().await,
            &ticket_type.id,
            ticket_type,
        )
    }

    async fn update_ticket_type(&self, ticket_type: &TicketType) -> Result<(), TicketError> {
        let mut ticket_types = self.ticket_types.write().await;
        let existing = ticket_types
            .get_mut(&ticket_type.id)
            .ok_or(TicketError::NotFound)?;
        existing.event_id.clone_from(&ticket_type.event_id);
        existing.kind.clone_from(&ticket_type.kind);
        existing.unit_price = ticket_type.unit_price;
        Ok(())
    }

    async fn delete_ticket_type(&self, id: &str) -> Result<bool, TicketError> {
        Ok(self.ticket_types.write().await.remove(id).is_some())
    }

    async fn compare_and_swap_quantity(
        &self,
        id: &str,
        expected: u32,
        new: u32,
    ) -> Result<Option<TicketType>, TicketError> {
        let mut ticket_types = self.ticket_types.write().await;
        let ticket_type = ticket_types.get_mut(id).ok_or(TicketError::NotFound)?;
        if ticket_type.remaining_quantity != expected {
            return Ok(None);
        }
        ticket_type.remaining_quantity = new;
        Ok(Some(ticket_type.clone()))
    }
}

#[async_trait]
impl PurchaseStore for MemoryStorage {
    async fn get_purchase(&self, id: &str) -> Result<Option<Purchase>, TicketError> {
        Ok(self.purchases.read().await.get(id).cloned())
    }

    async fn create_purchase(&self, purchase: &Purchase) -> Result<(), TicketError> {
        insert_new(&mut *self.purchases.write().await, &purchase.id, purchase)
    }

    async fn update_purchase(&self, purchase: &Purchase) -> Result<(), TicketError> {
        replace_existing(&mut *self.purchases.write().await, &purchase.id, purchase)
    }
}

#[async_trait]
impl TokenStore for MemoryStorage {
    async fn get_token(&self, id: &str) -> Result<Option<Token>, TicketError> {
        Ok(self.tokens.read().await.get(id).cloned())
    }

    async fn create_token(&self, token: &Token) -> Result<(), TicketError> {
        insert_new(&mut *self.tokens.write().await, &token.id, token)
    }

    async fn update_token(&self, token: &Token) -> Result<(), TicketError> {
        replace_existing(&mut *self.tokens.write().await, &token.id, token)
    }

    async fn list_inactive_tokens(&self) -> Result<Vec<Token>, TicketError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.values().filter(|t| !t.active).cloned().collect())
    }

    async fn delete_token(&self, id: &str) -> Result<bool, TicketError> {
        Ok(self.tokens.write().await.remove(id).is_some())
    }
}

#[async_trait]
impl TicketStorage for MemoryStorage {
    async fn get_stats(&self) -> Result<StorageStats, TicketError> {
        let customers = self.customers.read().await.len();
        let ticket_types = self.ticket_types.read().await.len();
        let purchases = self.purchases.read().await.len();
        let (tokens, inactive_tokens) = {
            let tokens = self.tokens.read().await;
            (tokens.len(), tokens.values().filter(|t| !t.active).count())
        };

        Ok(StorageStats {
            customers,
            ticket_types,
            purchases,
            tokens,
            inactive_tokens,
            backend_info: "In-memory HashMap storage".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ticket_type(quantity: u32) -> TicketType {
        TicketType::new("tt-1", "ev-1", "standing", 4500, quantity)
    }

    #[tokio::test]
    async fn test_memory_storage_customer_operations() -> Result<(), TicketError> {
        let storage = MemoryStorage::new();
        let customer = Customer::new("c-1", "Ada", "Lovelace", "ada@example.com");

        assert!(!storage.customer_exists("c-1").await?);
        storage.create_customer(&customer).await?;
        assert!(storage.customer_exists("c-1").await?);
        assert_eq!(storage.get_customer("c-1").await?, Some(customer.clone()));

        let result = storage.create_customer(&customer).await;
        assert!(matches!(result, Err(TicketError::AlreadyExists)));

        assert!(storage.delete_customer("c-1").await?);
        assert!(!storage.delete_customer("c-1").await?);
        assert!(!storage.customer_exists("c-1").await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_storage_compare_and_swap() -> Result<(), TicketError> {
        let storage = MemoryStorage::new();
        storage.create_ticket_type(&ticket_type(2)).await?;

        // Stale expectation leaves the record untouched
        assert!(storage.compare_and_swap_quantity("tt-1", 5, 4).await?.is_none());
        assert_eq!(
            storage.get_ticket_type("tt-1").await?.unwrap().remaining_quantity,
            2
        );

        let updated = storage.compare_and_swap_quantity("tt-1", 2, 1).await?;
        assert_eq!(updated.unwrap().remaining_quantity, 1);

        let result = storage.compare_and_swap_quantity("missing", 1, 0).await;
        assert!(matches!(result, Err(TicketError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_storage_update_requires_existing() -> Result<(), TicketError> {
        let storage = MemoryStorage::new();

        let result = storage.update_ticket_type(&ticket_type(1)).await;
        assert!(matches!(result, Err(TicketError::NotFound)));

        let result = storage.update_purchase(&Purchase::new("p-1", "c-1", "tt-1")).await;
        assert!(matches!(result, Err(TicketError::NotFound)));

        let result = storage.update_token(&Token::new("t-1", "p-1:mac", 0)).await;
        assert!(matches!(result, Err(TicketError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_storage_update_keeps_remaining_quantity() -> Result<(), TicketError> {
        let storage = MemoryStorage::new();
        storage.create_ticket_type(&ticket_type(2)).await?;

        let mut stale = storage.get_ticket_type("tt-1").await?.unwrap();
        storage.compare_and_swap_quantity("tt-1", 2, 1).await?;

        stale.unit_price = 5000;
        stale.kind = "seated".to_string();
        storage.update_ticket_type(&stale).await?;

        let stored = storage.get_ticket_type("tt-1").await?.unwrap();
        assert_eq!(stored.unit_price, 5000);
        assert_eq!(stored.kind, "seated");
        assert_eq!(stored.remaining_quantity, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_storage_token_operations() -> Result<(), TicketError> {
        let storage = MemoryStorage::new();
        let mut token = Token::new("t-1", "p-1:mac", 100);
        storage.create_token(&token).await?;
        storage.create_token(&Token::new("t-2", "p-2:mac", 100)).await?;

        assert!(storage.list_inactive_tokens().await?.is_empty());

        token.active = false;
        token.updated_at = 200;
        storage.update_token(&token).await?;

        let inactive = storage.list_inactive_tokens().await?;
        assert_eq!(inactive, vec![token]);

        assert!(storage.delete_token("t-1").await?);
        assert!(storage.get_token("t-1").await?.is_none());
        assert!(storage.get_token("t-2").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_storage_stats() -> Result<(), TicketError> {
        let storage = MemoryStorage::new();

        let stats = storage.get_stats().await?;
        assert_eq!(stats.tokens, 0);
        assert!(stats.backend_info.contains("In-memory"));

        storage.create_ticket_type(&ticket_type(1)).await?;
        storage.create_purchase(&Purchase::new("p-1", "c-1", "tt-1")).await?;
        let mut token = Token::new("t-1", "p-1:mac", 0);
        token.active = false;
        storage.create_token(&token).await?;

        let stats = storage.get_stats().await?;
        assert_eq!(stats.ticket_types, 1);
        assert_eq!(stats.purchases, 1);
        assert_eq!(stats.tokens, 1);
        assert_eq!(stats.inactive_tokens, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_memory_storage_concurrent_swaps() -> Result<(), TicketError> {
        let storage = Arc::new(MemoryStorage::new());
        storage.create_ticket_type(&ticket_type(1)).await?;

        // Everyone expects 1; only one swap may win
        let mut handles = vec![];
        for _ in 0..10 {
            let storage = Arc::clone(&storage);
            handles.push(tokio::spawn(async move {
                storage.compare_and_swap_quantity("tt-1", 1, 0).await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap()?.is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);

        Ok(())
    }
}
