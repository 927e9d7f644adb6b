use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::ticket::config::{TicketConfig, secret_key_from_env};
use crate::ticket::gate::VerificationGate;
use crate::ticket::issuer::{IdGeneratorFn, PurchaseIssuer, uuid_generator};
use crate::ticket::janitor::{
    BoxedSweepStrategy, CustomSweepStrategy, HybridSweepStrategy, TokenJanitor,
};
use crate::ticket::storage::{MemoryStorage, TicketStorage};
use crate::ticket::time_utils::{TimeProviderFn, system_time_provider};
use crate::ticket::token_codec::TokenCodec;
use crate::ticket::{TicketError, TicketServer};

#[cfg(feature = "metrics")]
use crate::ticket::metrics::{MetricsCollector, NoOpMetricsCollector};

/// A builder for creating a `TicketServer` instance.
///
/// This builder defaults to `MemoryStorage`, the configuration from
/// [`TicketConfig::default`], UUID v4 ids, the system clock and no
/// background sweeping. A signing secret is required.
#[must_use = "The builder does nothing unless `.build_and_init()` is called."]
pub struct TicketServerBuilder<S: TicketStorage> {
    storage: Arc<S>,
    secret: Option<Result<Vec<u8>, TicketError>>,
    config: TicketConfig,
    id_generator: Option<IdGeneratorFn>,
    time_provider: Option<TimeProviderFn>,
    sweep_strategy: Option<BoxedSweepStrategy>,
    #[cfg(feature = "metrics")]
    metrics_collector: Option<Arc<dyn MetricsCollector>>,
}

impl TicketServerBuilder<MemoryStorage> {
    /// Creates a new builder backed by `MemoryStorage`.
    pub(crate) fn new() -> Self {
        Self {
            storage: Arc::new(MemoryStorage::new()),
            secret: None,
            config: TicketConfig::default(),
            id_generator: None,
            time_provider: None,
            sweep_strategy: None,
            #[cfg(feature = "metrics")]
            metrics_collector: None,
        }
    }
}

impl<S: TicketStorage + 'static> TicketServerBuilder<S> {
    /// Specifies a custom storage backend to use instead of the default `MemoryStorage`.
    pub fn with_storage<T: TicketStorage + 'static>(
        self,
        storage: Arc<T>,
    ) -> TicketServerBuilder<T> {
        TicketServerBuilder {
            storage,
            secret: self.secret,
            config: self.config,
            id_generator: self.id_generator,
            time_provider: self.time_provider,
            sweep_strategy: self.sweep_strategy,
            #[cfg(feature = "metrics")]
            metrics_collector: self.metrics_collector,
        }
    }

    /// Sets the token signing secret.
    pub fn with_secret(mut self, secret: &[u8]) -> Self {
        self.secret = Some(Ok(secret.to_vec()));
        self
    }

    /// Reads the signing secret from `TICKET_GATE_SECRET_KEY`.
    ///
    /// A missing variable surfaces as a `KeyError` from `build_and_init`.
    pub fn with_secret_from_env(mut self) -> Self {
        self.secret = Some(secret_key_from_env());
        self
    }

    /// Replaces the whole configuration, e.g. with a preset.
    ///
    /// ```rust
    /// # use ticket_gate::TicketServer;
    /// # use ticket_gate::ticket::{ConfigPreset, TicketConfig};
    /// # async fn example() -> Result<(), ticket_gate::TicketError> {
    /// let server = TicketServer::builder()
    ///     .with_secret(b"door-secret")
    ///     .with_config(TicketConfig::from(ConfigPreset::Development))
    ///     .build_and_init()
    ///     .await?;
    /// assert_eq!(server.retention_window().as_secs(), 24 * 3600);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config(mut self, config: TicketConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets how long invalidated tokens are kept before they may be purged.
    pub fn with_retention_window(mut self, retention_window: Duration) -> Self {
        self.config.retention_window = retention_window;
        self
    }

    /// Overrides the id generator used for purchases and tokens.
    ///
    /// Generated ids must be unique and must not contain `:`.
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Some(Arc::new(generator));
        self
    }

    /// Overrides the clock (Unix seconds) used for token timestamps and sweeps.
    pub fn with_time_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Result<i64, TicketError> + Send + Sync + 'static,
    {
        self.time_provider = Some(Arc::new(provider));
        self
    }

    /// Enables background sweeping after `count_threshold` invalidations or
    /// `time_threshold`, whichever comes first.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use std::time::Duration;
    /// # use ticket_gate::TicketServer;
    /// # async fn example() -> Result<(), ticket_gate::TicketError> {
    /// // Sweep every 500 invalidations or every hour
    /// let server = TicketServer::builder()
    ///     .with_secret(b"door-secret")
    ///     .with_hybrid_sweep_thresholds(500, Duration::from_secs(3600))
    ///     .build_and_init()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_hybrid_sweep_thresholds(
        mut self,
        count_threshold: u32,
        time_threshold: Duration,
    ) -> Self {
        let strategy = HybridSweepStrategy::new(count_threshold, time_threshold);
        self.sweep_strategy = Some(Box::new(strategy));
        self
    }

    /// Enables background sweeping driven by a user-provided closure.
    ///
    /// The closure is called after each invalidation that flipped a token.
    pub fn with_custom_sweep_strategy<F, Fut>(mut self, strategy_fn: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let strategy = CustomSweepStrategy::new(strategy_fn);
        self.sweep_strategy = Some(Box::new(strategy));
        self
    }

    /// Sets the metrics collector. Defaults to a no-op collector.
    #[cfg(feature = "metrics")]
    pub fn with_metrics_collector(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.metrics_collector = Some(collector);
        self
    }

    /// Builds and initializes the `TicketServer`.
    ///
    /// Fails with `KeyError` when no usable secret was provided, and with the
    /// backend's error when `init()` fails.
    pub async fn build_and_init(self) -> Result<TicketServer<S>, TicketError> {
        let secret = self
            .secret
            .unwrap_or_else(|| Err(TicketError::KeyError("No signing secret configured".into())))?;
        let codec = Arc::new(TokenCodec::new(&secret)?);

        for warning in self.config.validate() {
            tracing::warn!(%warning, "ticket config warning");
        }
        tracing::debug!(config = %self.config.summary(), "ticket server configured");

        let id_generator = self.id_generator.unwrap_or_else(uuid_generator);
        let time_provider = self.time_provider.unwrap_or_else(system_time_provider);

        let server = TicketServer {
            issuer: PurchaseIssuer::new(
                Arc::clone(&self.storage),
                Arc::clone(&codec),
                id_generator,
                Arc::clone(&time_provider),
            ),
            gate: VerificationGate::new(
                Arc::clone(&self.storage),
                Arc::clone(&codec),
                Arc::clone(&time_provider),
            ),
            janitor: Arc::new(TokenJanitor::new(Arc::clone(&self.storage))),
            storage: self.storage,
            codec,
            retention_window: self.config.retention_window,
            time_provider,
            sweep_strategy: self.sweep_strategy,
            #[cfg(feature = "metrics")]
            metrics_collector: self
                .metrics_collector
                .unwrap_or_else(|| Arc::new(NoOpMetricsCollector::new())),
        };
        server.init().await?;
        Ok(server)
    }
}
