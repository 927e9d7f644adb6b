use thiserror::Error;

/// Generic message shown to a gate operator when a ticket is rejected.
///
/// Verification failures are collapsed into this single string so that a
/// rejected token does not reveal which check failed.
pub const REJECTION_MESSAGE: &str = "Invalid or expired ticket";

/// Error types that can occur while issuing, verifying or purging tickets.
///
/// # Error Categories
///
/// - **Expected outcomes**: `NotFound`, `OutOfStock`, `InvalidToken`, `AlreadyExists`
/// - **System errors**: `KeyError`, `StorageError`
///
/// Expected outcomes are part of normal operation and are returned to the
/// caller as typed results. System errors indicate misconfiguration or a
/// failing storage backend.
///
/// # Example
///
/// ```rust
/// use ticket_gate::{TicketError, TicketServer};
///
/// # async fn example() -> Result<(), TicketError> {
/// let server = TicketServer::builder()
///     .with_secret(b"door-secret")
///     .build_and_init()
///     .await?;
///
/// match server.verify("not-a-token").await {
///     Ok(admission) => println!("admit purchase {}", admission.purchase.id),
///     Err(TicketError::InvalidToken) | Err(TicketError::NotFound) => {
///         println!("{}", ticket_gate::ticket::REJECTION_MESSAGE)
///     }
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// A referenced entity (ticket type, customer, purchase or token) does not exist.
    #[error("Entity not found")]
    NotFound,

    /// The ticket type has no remaining units.
    ///
    /// Returned by the inventory without mutating anything. The purchase
    /// can be retried later if units are released.
    #[error("Ticket type sold out")]
    OutOfStock,

    /// The presented token is malformed or its signature does not verify.
    ///
    /// This also covers tokens whose purchase still exists but whose ticket
    /// type or customer has been removed out of band.
    #[error("Invalid token")]
    InvalidToken,

    /// A record with the same id already exists in storage.
    #[error("Entity already exists")]
    AlreadyExists,

    /// The signing key is missing or unusable.
    ///
    /// This is a startup failure: a server cannot be built without a usable
    /// key, so it is never produced by an individual request.
    #[error("Key error: {0}")]
    KeyError(String),

    /// A storage backend operation failed.
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl TicketError {
    /// Create a storage error from any error type.
    pub fn from_storage_error<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Self::StorageError(err.to_string())
    }

    /// Create a storage error from a message.
    pub fn from_storage_message<S: Into<String>>(msg: S) -> Self {
        Self::StorageError(msg.into())
    }

    /// Returns `true` for outcomes that are part of normal operation.
    ///
    /// These are logged at debug level and never treated as faults.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::NotFound | Self::OutOfStock | Self::InvalidToken | Self::AlreadyExists
        )
    }

    /// Short machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::OutOfStock => "out_of_stock",
            Self::InvalidToken => "invalid_token",
            Self::AlreadyExists => "already_exists",
            Self::KeyError(_) => "key_error",
            Self::StorageError(_) => "storage_error",
        }
    }

    /// Message suitable for a gate display after a failed verification.
    ///
    /// `NotFound` and `InvalidToken` map to the same [`REJECTION_MESSAGE`].
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::NotFound | Self::InvalidToken => REJECTION_MESSAGE,
            Self::OutOfStock => "Sold out",
            Self::AlreadyExists => "Duplicate request",
            Self::KeyError(_) | Self::StorageError(_) => "Service unavailable",
        }
    }
}
