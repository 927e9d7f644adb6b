// Core architecture components
mod config;
mod error;
mod record;
mod time_utils;
mod token_codec;

// Purchase, gate and janitor
mod gate;
mod inventory;
mod issuer;
pub mod janitor;
mod server;
mod server_builder;

// Storage backends
pub mod storage;

// Signature algorithms
pub mod signature;

// Metrics (optional feature)
#[cfg(feature = "metrics")]
pub mod metrics;

// Core components exports
pub use config::{ConfigPreset, RETENTION_ENV, SECRET_KEY_ENV, TicketConfig, secret_key_from_env};
pub use error::{REJECTION_MESSAGE, TicketError};
pub use record::{Admission, Customer, IssuedTicket, Purchase, TicketType, Token};
pub use time_utils::TimeProviderFn;
pub use token_codec::{TOKEN_SEPARATOR, TokenCodec};

// Transaction components exports
pub use gate::VerificationGate;
pub use inventory::Inventory;
pub use issuer::{IdGeneratorFn, PurchaseIssuer};
pub use server::TicketServer;
pub use server_builder::TicketServerBuilder;

// Janitor exports
pub use janitor::{
    BoxedSweepStrategy, CustomSweepStrategy, HybridSweepStrategy, SweepReport, SweepStrategy,
    TokenJanitor,
};

// Storage exports
pub use storage::{
    CustomerStore, MemoryStorage, PurchaseStore, StorageStats, TicketStorage, TicketStore,
    TokenStore,
};

// Signature algorithm exports
pub use signature::{DefaultSignatureAlgorithm, SignatureAlgorithm, create_default_algorithm};

// Metrics exports (optional feature)
#[cfg(feature = "metrics")]
pub use metrics::{
    InMemoryMetricsCollector, MetricEvent, MetricsCollector, NoOpMetricsCollector,
    RejectionMetrics, TicketMetrics,
};
