//! SQLite storage backend implementation.
//!
//! This module provides a persistent SQLite backend for ticket data.
//! It's ideal for single-instance deployments that must survive restarts.

use super::{CustomerStore, PurchaseStore, StorageStats, TicketStorage, TicketStore, TokenStore};
use crate::TicketError;
use crate::ticket::record::{Customer, Purchase, TicketType, Token};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::sync::{Arc, Mutex, MutexGuard};

/// SQLite-based storage backend.
///
/// # Features
///
/// - **Persistent storage**: Data survives application restarts
/// - **Atomic quantity swaps**: conditional `UPDATE ... WHERE remaining_quantity = ?`
/// - **Inactive-token index**: `token(active, updated_at)` serves the `active = 0` lookups
/// - **Thread-safe**: Uses `Arc<Mutex<Connection>>` for concurrent access
///
/// # Example
///
/// ```rust
/// use ticket_gate::ticket::storage::SqliteStorage;
/// use std::sync::Arc;
///
/// # fn example() -> Result<(), ticket_gate::TicketError> {
/// // File-based storage
/// let storage = Arc::new(SqliteStorage::new("ticket_gate.db")?);
///
/// // Or use in-memory SQLite (for testing)
/// let memory_storage = Arc::new(SqliteStorage::new(":memory:")?);
/// # Ok(())
/// # }
/// ```
pub struct SqliteStorage {
    connection: Arc<Mutex<Connection>>,
}

fn db_error(e: rusqlite::Error) -> TicketError {
    TicketError::from_storage_message(e.to_string())
}

fn insert_error(e: rusqlite::Error) -> TicketError {
    match e {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            TicketError::AlreadyExists
        }
        _ => db_error(e),
    }
}

fn price_to_sql(unit_price: u64) -> Result<i64, TicketError> {
    i64::try_from(unit_price)
        .map_err(|_| TicketError::from_storage_message("Unit price exceeds SQLite integer range"))
}

fn row_to_ticket_type(row: &Row<'_>) -> rusqlite::Result<TicketType> {
    let unit_price: i64 = row.get(3)?;
    Ok(TicketType {
        id: row.get(0)?,
        event_id: row.get(1)?,
        kind: row.get(2)?,
        unit_price: unit_price.max(0) as u64,
        remaining_quantity: row.get(4)?,
    })
}

fn row_to_token(row: &Row<'_>) -> rusqlite::Result<Token> {
    Ok(Token {
        id: row.get(0)?,
        signed_value: row.get(1)?,
        active: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn expect_one_row(changes: usize) -> Result<(), TicketError> {
    if changes == 0 {
        Err(TicketError::NotFound)
    } else {
        Ok(())
    }
}

impl SqliteStorage {
    /// Create a new SQLite storage backend.
    ///
    /// # Arguments
    ///
    /// * `db_path` - Path to the SQLite database file, or ":memory:" for an in-memory database
    ///
    /// The schema is created by [`TicketStorage::init`], which the server
    /// builder calls.
    pub fn new(db_path: &str) -> Result<Self, TicketError> {
        let connection = if db_path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(db_path)
        };

        let connection = connection.map_err(TicketError::from_storage_error)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, TicketError> {
        self.connection
            .lock()
            .map_err(|_| TicketError::from_storage_message("SQLite connection mutex poisoned"))
    }

    /// Create the database schema if it doesn't exist.
    fn init_schema(&self) -> Result<(), TicketError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS customer (
                id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ticket_type (
                id TEXT PRIMARY KEY,
                event_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                unit_price INTEGER NOT NULL,
                remaining_quantity INTEGER NOT NULL CHECK (remaining_quantity >= 0)
            );

            CREATE TABLE IF NOT EXISTS purchase (
                id TEXT PRIMARY KEY,
                customer_id TEXT NOT NULL,
                ticket_type_id TEXT NOT NULL,
                token_id TEXT
            );

            CREATE TABLE IF NOT EXISTS token (
                id TEXT PRIMARY KEY,
                signed_value TEXT NOT NULL,
                active INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_token_active_updated_at ON token (active, updated_at);
            "#,
        )
        .map_err(db_error)
    }
}

#[async_trait]
impl CustomerStore for SqliteStorage {
    async fn customer_exists(&self, id: &str) -> Result<bool, TicketError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT 1 FROM customer WHERE id = ?1")
            .map_err(db_error)?;
        stmt.exists(params![id]).map_err(db_error)
    }

    async fn get_customer(&self, id: &str) -> Result<Option<Customer>, TicketError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, first_name, last_name, email FROM customer WHERE id = ?1",
            params![id],
            |row| {
                Ok(Customer {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    email: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(db_error)
    }

    async fn create_customer(&self, customer: &Customer) -> Result<(), TicketError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO customer (id, first_name, last_name, email) VALUES (?1, ?2, ?3, ?4)",
            params![
                customer.id,
                customer.first_name,
                customer.last_name,
                customer.email
            ],
        )
        .map_err(insert_error)?;
        Ok(())
    }

    async fn delete_customer(&self, id: &str) -> Result<bool, TicketError> {
        let conn = self.conn()?;
        let changes = conn
            .execute("DELETE FROM customer WHERE id = ?1", params![id])
            .map_err(db_error)?;
        Ok(changes > 0)
    }
}

#[async_trait]
impl TicketStore for SqliteStorage {
    async fn get_ticket_type(&self, id: &str) -> Result<Option<TicketType>, TicketError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, event_id, kind, unit_price, remaining_quantity FROM ticket_type WHERE id = ?1",
            params![id],
            row_to_ticket_type,
        )
        .optional()
        .map_err(db_error)
    }

    async fn create_ticket_type(&self, ticket_type: &TicketType) -> Result<(), TicketError> {
        let unit_price = price_to_sql(ticket_type.unit_price)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO ticket_type (id, event_id, kind, unit_price, remaining_quantity) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                ticket_type.id,
                ticket_type.event_id,
                ticket_type.kind,
                unit_price,
                ticket_type.remaining_quantity
            ],
        )
        .map_err(insert_error)?;
        Ok(())
    }

    async fn update_ticket_type(&self, ticket_type: &TicketType) -> Result<(), TicketError> {
        let unit_price = price_to_sql(ticket_type.unit_price)?;
        let conn = self.conn()?;
        let changes = conn
            .execute(
                "UPDATE ticket_type SET event_id = ?2, kind = ?3, unit_price = ?4 WHERE id = ?1",
                params![
                    ticket_type.id,
                    ticket_type.event_id,
                    ticket_type.kind,
                    unit_price
                ],
            )
            .map_err(db_error)?;
        expect_one_row(changes)
    }

    async fn delete_ticket_type(&self, id: &str) -> Result<bool, TicketError> {
        let conn = self.conn()?;
        let changes = conn
            .execute("DELETE FROM ticket_type WHERE id = ?1", params![id])
            .map_err(db_error)?;
        Ok(changes > 0)
    }

    async fn compare_and_swap_quantity(
        &self,
        id: &str,
        expected: u32,
        new: u32,
    ) -> Result<Option<TicketType>, TicketError> {
        let conn = self.conn()?;

        // The connection mutex is held across both statements
        let changes = conn
            .execute(
                "UPDATE ticket_type SET remaining_quantity = ?3 \
                 WHERE id = ?1 AND remaining_quantity = ?2",
                params![id, expected, new],
            )
            .map_err(db_error)?;

        let current = conn
            .query_row(
                "SELECT id, event_id, kind, unit_price, remaining_quantity FROM ticket_type WHERE id = ?1",
                params![id],
                row_to_ticket_type,
            )
            .optional()
            .map_err(db_error)?;

        match (changes, current) {
            (_, None) => Err(TicketError::NotFound),
            (0, Some(_)) => Ok(None),
            (_, Some(ticket_type)) => Ok(Some(ticket_type)),
        }
    }
}

#[async_trait]
impl PurchaseStore for SqliteStorage {
    async fn get_purchase(&self, id: &str) -> Result<Option<Purchase>, TicketError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, customer_id, ticket_type_id, token_id FROM purchase WHERE id = ?1",
            params![id],
            |row| {
                Ok(Purchase {
                    id: row.get(0)?,
                    customer_id: row.get(1)?,
                    ticket_type_id: row.get(2)?,
                    token_id: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(db_error)
    }

    async fn create_purchase(&self, purchase: &Purchase) -> Result<(), TicketError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO purchase (id, customer_id, ticket_type_id, token_id) VALUES (?1, ?2, ?3, ?4)",
            params![
                purchase.id,
                purchase.customer_id,
                purchase.ticket_type_id,
                purchase.token_id
            ],
        )
        .map_err(insert_error)?;
        Ok(())
    }

    async fn update_purchase(&self, purchase: &Purchase) -> Result<(), TicketError> {
        let conn = self.conn()?;
        let changes = conn
            .execute(
                "UPDATE purchase SET customer_id = ?2, ticket_type_id = ?3, token_id = ?4 WHERE id = ?1",
                params![
                    purchase.id,
                    purchase.customer_id,
                    purchase.ticket_type_id,
                    purchase.token_id
                ],
            )
            .map_err(db_error)?;
        expect_one_row(changes)
    }
}

#[async_trait]
impl TokenStore for SqliteStorage {
    async fn get_token(&self, id: &str) -> Result<Option<Token>, TicketError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, signed_value, active, updated_at FROM token WHERE id = ?1",
            params![id],
            row_to_token,
        )
        .optional()
        .map_err(db_error)
    }

    async fn create_token(&self, token: &Token) -> Result<(), TicketError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO token (id, signed_value, active, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![token.id, token.signed_value, token.active, token.updated_at],
        )
        .map_err(insert_error)?;
        Ok(())
    }

    async fn update_token(&self, token: &Token) -> Result<(), TicketError> {
        let conn = self.conn()?;
        let changes = conn
            .execute(
                "UPDATE token SET signed_value = ?2, active = ?3, updated_at = ?4 WHERE id = ?1",
                params![token.id, token.signed_value, token.active, token.updated_at],
            )
            .map_err(db_error)?;
        expect_one_row(changes)
    }

    async fn list_inactive_tokens(&self) -> Result<Vec<Token>, TicketError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT id, signed_value, active, updated_at FROM token WHERE active = 0")
            .map_err(db_error)?;
        let tokens = stmt
            .query_map([], row_to_token)
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;
        Ok(tokens)
    }

    async fn delete_token(&self, id: &str) -> Result<bool, TicketError> {
        let conn = self.conn()?;
        let changes = conn
            .execute("DELETE FROM token WHERE id = ?1", params![id])
            .map_err(db_error)?;
        Ok(changes > 0)
    }
}

#[async_trait]
impl TicketStorage for SqliteStorage {
    async fn init(&self) -> Result<(), TicketError> {
        self.init_schema()
    }

    async fn get_stats(&self) -> Result<StorageStats, TicketError> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<usize, TicketError> {
            conn.query_row(sql, [], |row| row.get(0)).map_err(db_error)
        };

        let customers = count("SELECT COUNT(*) FROM customer")?;
        let ticket_types = count("SELECT COUNT(*) FROM ticket_type")?;
        let purchases = count("SELECT COUNT(*) FROM purchase")?;
        let tokens = count("SELECT COUNT(*) FROM token")?;
        let inactive_tokens = count("SELECT COUNT(*) FROM token WHERE active = 0")?;

        // Get additional SQLite-specific stats
        let page_count: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .unwrap_or(0);
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .unwrap_or(4096);

        Ok(StorageStats {
            customers,
            ticket_types,
            purchases,
            tokens,
            inactive_tokens,
            backend_info: format!(
                "SQLite storage ({} bytes, {} pages)",
                page_count * page_size,
                page_count
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> Result<SqliteStorage, TicketError> {
        let storage = SqliteStorage::new(":memory:")?;
        storage.init().await?;
        Ok(storage)
    }

    #[tokio::test]
    async fn test_sqlite_storage_customer_operations() -> Result<(), TicketError> {
        let storage = storage().await?;
        let customer = Customer::new("c-1", "Grace", "Hopper", "grace@example.com");

        assert!(!storage.customer_exists("c-1").await?);
        storage.create_customer(&customer).await?;
        assert!(storage.customer_exists("c-1").await?);
        assert_eq!(storage.get_customer("c-1").await?, Some(customer.clone()));

        let result = storage.create_customer(&customer).await;
        assert!(matches!(result, Err(TicketError::AlreadyExists)));

        assert!(storage.delete_customer("c-1").await?);
        assert!(!storage.delete_customer("c-1").await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_storage_compare_and_swap() -> Result<(), TicketError> {
        let storage = storage().await?;
        let ticket_type = TicketType::new("tt-1", "ev-1", "vip", 12_000, 2);
        storage.create_ticket_type(&ticket_type).await?;
        assert_eq!(storage.get_ticket_type("tt-1").await?, Some(ticket_type));

        assert!(storage.compare_and_swap_quantity("tt-1", 3, 2).await?.is_none());

        let updated = storage.compare_and_swap_quantity("tt-1", 2, 1).await?;
        assert_eq!(updated.map(|t| t.remaining_quantity), Some(1));

        let result = storage.compare_and_swap_quantity("missing", 1, 0).await;
        assert!(matches!(result, Err(TicketError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_storage_update_keeps_remaining_quantity() -> Result<(), TicketError> {
        let storage = storage().await?;
        storage
            .create_ticket_type(&TicketType::new("tt-1", "ev-1", "vip", 12_000, 2))
            .await?;

        let mut stale = storage.get_ticket_type("tt-1").await?.unwrap();
        storage.compare_and_swap_quantity("tt-1", 2, 1).await?;

        stale.unit_price = 15_000;
        storage.update_ticket_type(&stale).await?;

        let stored = storage.get_ticket_type("tt-1").await?.unwrap();
        assert_eq!(stored.unit_price, 15_000);
        assert_eq!(stored.remaining_quantity, 1);

        let missing = TicketType::new("missing", "ev-1", "vip", 1, 1);
        let result = storage.update_ticket_type(&missing).await;
        assert!(matches!(result, Err(TicketError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_storage_purchase_operations() -> Result<(), TicketError> {
        let storage = storage().await?;
        let mut purchase = Purchase::new("p-1", "c-1", "tt-1");

        storage.create_purchase(&purchase).await?;
        assert_eq!(storage.get_purchase("p-1").await?, Some(purchase.clone()));

        purchase.token_id = Some("t-1".to_string());
        storage.update_purchase(&purchase).await?;
        assert_eq!(
            storage.get_purchase("p-1").await?.and_then(|p| p.token_id),
            Some("t-1".to_string())
        );

        let missing = Purchase::new("p-2", "c-1", "tt-1");
        let result = storage.update_purchase(&missing).await;
        assert!(matches!(result, Err(TicketError::NotFound)));

        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_storage_token_operations() -> Result<(), TicketError> {
        let storage = storage().await?;
        let mut token = Token::new("t-1", "p-1:mac", 100);
        storage.create_token(&token).await?;
        storage.create_token(&Token::new("t-2", "p-2:mac", 100)).await?;

        assert!(storage.list_inactive_tokens().await?.is_empty());

        token.active = false;
        token.updated_at = 250;
        storage.update_token(&token).await?;
        assert_eq!(storage.list_inactive_tokens().await?, vec![token.clone()]);
        assert_eq!(storage.get_token("t-1").await?, Some(token));

        assert!(storage.delete_token("t-1").await?);
        assert!(storage.get_token("t-1").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_storage_stats() -> Result<(), TicketError> {
        let storage = storage().await?;
        storage
            .create_ticket_type(&TicketType::new("tt-1", "ev-1", "vip", 100, 1))
            .await?;
        let mut token = Token::new("t-1", "p-1:mac", 0);
        token.active = false;
        storage.create_token(&token).await?;

        let stats = storage.get_stats().await?;
        assert_eq!(stats.ticket_types, 1);
        assert_eq!(stats.tokens, 1);
        assert_eq!(stats.inactive_tokens, 1);
        assert!(stats.backend_info.contains("SQLite"));

        Ok(())
    }

    #[tokio::test]
    async fn test_sqlite_storage_rejects_oversized_price() -> Result<(), TicketError> {
        let storage = storage().await?;
        let result = storage
            .create_ticket_type(&TicketType::new("tt-1", "ev-1", "vip", u64::MAX, 1))
            .await;
        assert!(matches!(result, Err(TicketError::StorageError(_))));
        Ok(())
    }
}
