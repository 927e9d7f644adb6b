//! Records persisted by the storage backends.

use serde::{Deserialize, Serialize};

/// A purchasable admission category with a finite number of units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketType {
    /// Unique ticket type identifier
    pub id: String,
    /// The event this ticket type admits to
    pub event_id: String,
    /// Human readable category, e.g. "standing" or "vip"
    pub kind: String,
    /// Price of one unit in minor currency units
    pub unit_price: u64,
    /// Units still available for purchase
    pub remaining_quantity: u32,
}

impl TicketType {
    pub fn new(
        id: impl Into<String>,
        event_id: impl Into<String>,
        kind: impl Into<String>,
        unit_price: u64,
        remaining_quantity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            event_id: event_id.into(),
            kind: kind.into(),
            unit_price,
            remaining_quantity,
        }
    }
}

/// A ticket buyer. The core only ever asks whether one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl Customer {
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }
}

/// One purchased unit of a ticket type.
///
/// Immutable after creation except for attaching `token_id` once the
/// admission token has been minted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: String,
    pub customer_id: String,
    pub ticket_type_id: String,
    /// Id of the admission token, `None` until it has been minted
    pub token_id: Option<String>,
}

impl Purchase {
    pub fn new(
        id: impl Into<String>,
        customer_id: impl Into<String>,
        ticket_type_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            customer_id: customer_id.into(),
            ticket_type_id: ticket_type_id.into(),
            token_id: None,
        }
    }
}

/// A signed admission token.
///
/// `signed_value` is the string presented at the gate:
/// `"<purchase_id>:<base64 mac>"`. A token starts active and is flipped to
/// inactive exactly once, after admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub signed_value: String,
    pub active: bool,
    /// Unix timestamp (seconds) of the last state change
    pub updated_at: i64,
}

impl Token {
    /// Creates a new active token.
    pub fn new(id: impl Into<String>, signed_value: impl Into<String>, issued_at: i64) -> Self {
        Self {
            id: id.into(),
            signed_value: signed_value.into(),
            active: true,
            updated_at: issued_at,
        }
    }
}

/// The result of a successful purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedTicket {
    /// The purchase, with `token_id` attached
    pub purchase: Purchase,
    /// The freshly minted, active token
    pub token: Token,
}

impl IssuedTicket {
    /// The token string to hand to the customer (e.g. encoded in a QR code).
    pub fn token_string(&self) -> &str {
        &self.token.signed_value
    }
}

/// The result of a successful verification at the gate.
///
/// A verified token still needs to be checked for prior use: an admission
/// whose token has been invalidated (or already purged) resolves to the
/// same purchase but [`Admission::is_active`] returns `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admission {
    pub purchase: Purchase,
    /// Current token record, `None` once the janitor has purged it
    pub token: Option<Token>,
}

impl Admission {
    /// Whether the ticket may still be used for entry.
    pub fn is_active(&self) -> bool {
        self.token.as_ref().is_some_and(|t| t.active)
    }
}
