//! # Ticket Gate
//!
//! A Rust library for selling a finite number of tickets and admitting their
//! holders exactly once.
//!
//! A purchase atomically takes one unit from a ticket type's inventory,
//! records the purchase and mints a signed admission token. At the door the
//! token string is verified without trusting anything the client sends
//! besides the string itself, and then invalidated. Invalidated tokens are
//! purged once they have outlived a retention window.
//!
//! ## Features
//!
//! - **HMAC-SHA256 tokens**: `"<purchase_id>:<base64 mac>"`, verified in constant time
//! - **No overselling**: per-ticket-type compare-and-swap with optimistic retry
//! - **Compensation**: any failure after a unit is reserved releases it again
//! - **Idempotent invalidation**: marking a used token twice is harmless
//! - **Pluggable storage**: in-memory by default, SQLite behind `sqlite-storage`
//! - **Background sweeping**: optional strategies trigger the token janitor
//! - **Metrics**: optional counters behind the `metrics` feature
//!
//! ## Quick Start
//!
//! ```rust
//! use ticket_gate::{Customer, CustomerStore, TicketError, TicketServer, TicketStore, TicketType};
//!
//! # async fn example() -> Result<(), TicketError> {
//! let server = TicketServer::builder()
//!     .with_secret(b"door-secret")
//!     .build_and_init()
//!     .await?;
//!
//! // Ticket types and customers are managed by the surrounding system
//! server
//!     .storage()
//!     .create_ticket_type(&TicketType::new("T1", "E1", "standing", 4500, 100))
//!     .await?;
//! server
//!     .storage()
//!     .create_customer(&Customer::new("C1", "Ada", "Lovelace", "ada@example.com"))
//!     .await?;
//!
//! let issued = server.purchase("C1", "T1").await?;
//!
//! // At the door
//! match server.verify(issued.token_string()).await {
//!     Ok(admission) if admission.is_active() => {
//!         server.invalidate(&issued.token.id).await?;
//!         println!("Welcome!");
//!     }
//!     Ok(_) => println!("Ticket already used"),
//!     Err(e) => println!("{}", e.public_message()),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! The retention window defaults to one week and can be set with the
//! `TICKET_GATE_RETENTION_SECS` environment variable, a [`ticket::ConfigPreset`]
//! or the builder. The signing secret can be read from
//! `TICKET_GATE_SECRET_KEY`:
//!
//! ```bash
//! export TICKET_GATE_SECRET_KEY="change-me"
//! export TICKET_GATE_RETENTION_SECS=604800
//! ```
//!
//! ## Architecture
//!
//! - **[`TicketServer`]**: facade over one storage backend
//! - **[`ticket::PurchaseIssuer`]**: reserve, record and sign as one logical transaction
//! - **[`ticket::VerificationGate`]**: verification and invalidation
//! - **[`ticket::TokenJanitor`]**: purges invalidated tokens
//! - **[`TicketError`]**: typed outcomes for every failure mode

pub mod ticket;

// Re-export commonly used types
pub use ticket::{
    Admission, Customer, CustomerStore, IssuedTicket, MemoryStorage, Purchase, PurchaseStore,
    TicketConfig, TicketError, TicketServer, TicketServerBuilder, TicketStorage, TicketStore,
    TicketType, Token, TokenStore,
};
