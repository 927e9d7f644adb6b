use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "metrics")]
use std::time::Instant;

use super::gate::VerificationGate;
use super::issuer::PurchaseIssuer;
use super::janitor::{BoxedSweepStrategy, SweepReport, TokenJanitor};
use super::record::{Admission, IssuedTicket, Token};
use super::storage::{MemoryStorage, TicketStorage};
use super::time_utils::TimeProviderFn;
use super::token_codec::TokenCodec;
use super::{TicketError, TicketServerBuilder};

#[cfg(feature = "metrics")]
use super::metrics::{MetricEvent, MetricsCollector};

/// The entry point of the crate: issues, verifies and retires tickets over
/// one storage backend.
///
/// To create an instance, use the `TicketServer::builder()` method.
///
/// # Example
///
/// ```rust
/// use ticket_gate::{Customer, CustomerStore, TicketServer, TicketStore, TicketType};
///
/// # async fn example() -> Result<(), ticket_gate::TicketError> {
/// let server = TicketServer::builder()
///     .with_secret(b"door-secret")
///     .build_and_init()
///     .await?;
///
/// let storage = server.storage();
/// storage.create_ticket_type(&TicketType::new("T1", "E1", "standing", 4500, 1)).await?;
/// storage.create_customer(&Customer::new("C1", "Ada", "Lovelace", "ada@example.com")).await?;
///
/// let issued = server.purchase("C1", "T1").await?;
/// let admission = server.verify(issued.token_string()).await?;
/// assert!(admission.is_active());
///
/// server.invalidate(&issued.token.id).await?;
/// assert!(!server.verify(issued.token_string()).await?.is_active());
/// # Ok(())
/// # }
/// ```
pub struct TicketServer<S: TicketStorage> {
    pub(crate) storage: Arc<S>,
    pub(crate) codec: Arc<TokenCodec>,
    pub(crate) issuer: PurchaseIssuer<S>,
    pub(crate) gate: VerificationGate<S>,
    pub(crate) janitor: Arc<TokenJanitor<S>>,
    pub(crate) retention_window: Duration,
    pub(crate) time_provider: TimeProviderFn,
    pub(crate) sweep_strategy: Option<BoxedSweepStrategy>,
    #[cfg(feature = "metrics")]
    pub(crate) metrics_collector: Arc<dyn MetricsCollector>,
}

impl TicketServer<MemoryStorage> {
    /// Creates a new `TicketServerBuilder`.
    ///
    /// The builder defaults to `MemoryStorage`. Provide a different backend
    /// with `.with_storage()`.
    pub fn builder() -> TicketServerBuilder<MemoryStorage> {
        TicketServerBuilder::new()
    }
}

impl<S: TicketStorage + 'static> TicketServer<S> {
    /// Initializes the storage backend (e.g., creates database tables).
    pub(crate) async fn init(&self) -> Result<(), TicketError> {
        self.storage.init().await
    }

    /// Buys one unit of `ticket_type_id` for `customer_id`.
    ///
    /// See [`PurchaseIssuer::purchase`] for the failure semantics.
    pub async fn purchase(
        &self,
        customer_id: &str,
        ticket_type_id: &str,
    ) -> Result<IssuedTicket, TicketError> {
        #[cfg(feature = "metrics")]
        let start_time = Instant::now();

        let result = self.issuer.purchase(customer_id, ticket_type_id).await;

        #[cfg(feature = "metrics")]
        {
            let event = match &result {
                Ok(_) => MetricEvent::PurchaseIssued {
                    duration: start_time.elapsed(),
                },
                Err(e) => MetricEvent::PurchaseRejected {
                    error_code: e.code(),
                },
            };
            self.metrics_collector.record_event(event).await;
        }

        result
    }

    /// Authenticates a presented token string.
    ///
    /// Does not invalidate; call [`invalidate`](Self::invalidate) after
    /// admitting.
    pub async fn verify(&self, token: &str) -> Result<Admission, TicketError> {
        #[cfg(feature = "metrics")]
        let start_time = Instant::now();

        let result = self.gate.verify(token).await;

        #[cfg(feature = "metrics")]
        self.metrics_collector
            .record_event(MetricEvent::VerificationAttempt {
                duration: start_time.elapsed(),
                success: result.is_ok(),
                error_code: result.as_ref().err().map(TicketError::code),
            })
            .await;

        result
    }

    /// Marks a token as used. Idempotent.
    ///
    /// When this call flips the token and a sweep strategy is configured,
    /// the strategy may trigger a background sweep.
    pub async fn invalidate(&self, token_id: &str) -> Result<Token, TicketError> {
        let (token, changed) = self.gate.invalidate_tracked(token_id).await?;

        if changed {
            #[cfg(feature = "metrics")]
            self.metrics_collector
                .record_event(MetricEvent::TokenInvalidated)
                .await;

            self.maybe_trigger_sweep().await;
        }

        Ok(token)
    }

    /// Purges inactive tokens older than the retention window, now.
    pub async fn sweep(&self) -> Result<SweepReport, TicketError> {
        let now = (self.time_provider)()?;
        self.sweep_at(now).await
    }

    /// Purges inactive tokens older than the retention window as of `now`
    /// (Unix seconds).
    pub async fn sweep_at(&self, now: i64) -> Result<SweepReport, TicketError> {
        #[cfg(feature = "metrics")]
        let start_time = Instant::now();

        let report = self.janitor.sweep(now, self.retention_window).await?;

        #[cfg(feature = "metrics")]
        self.metrics_collector
            .record_event(MetricEvent::SweepCompleted {
                purged: report.purged,
                failed: report.failed,
                duration: start_time.elapsed(),
            })
            .await;

        Ok(report)
    }

    /// Check the sweep strategy and spawn a background sweep if needed.
    async fn maybe_trigger_sweep(&self) {
        let Some(strategy) = &self.sweep_strategy else {
            return;
        };
        if strategy.should_sweep().await {
            self.spawn_background_sweep();
            strategy.mark_as_swept().await;
        }
    }

    fn spawn_background_sweep(&self) {
        let janitor = Arc::clone(&self.janitor);
        let time_provider = Arc::clone(&self.time_provider);
        let retention = self.retention_window;

        #[cfg(feature = "metrics")]
        let metrics_clone = Arc::clone(&self.metrics_collector);

        tokio::spawn(async move {
            #[cfg(feature = "metrics")]
            let start_time = Instant::now();

            let result = match time_provider() {
                Ok(now) => janitor.sweep(now, retention).await,
                Err(e) => Err(e),
            };

            match result {
                #[cfg(feature = "metrics")]
                Ok(report) => {
                    metrics_clone
                        .record_event(MetricEvent::SweepCompleted {
                            purged: report.purged,
                            failed: report.failed,
                            duration: start_time.elapsed(),
                        })
                        .await;
                }
                #[cfg(not(feature = "metrics"))]
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "background sweep failed"),
            }
        });
    }

    /// Returns the configured retention window for inactive tokens.
    pub fn retention_window(&self) -> Duration {
        self.retention_window
    }

    /// Returns a reference to the storage backend.
    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Returns the token codec, e.g. to re-derive a token string.
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Returns a snapshot of the collected metrics.
    #[cfg(feature = "metrics")]
    pub async fn metrics(&self) -> Result<super::metrics::TicketMetrics, TicketError> {
        self.metrics_collector.get_metrics().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::record::{Customer, TicketType};
    use crate::ticket::storage::{CustomerStore, TicketStore, TokenStore};
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

    const WEEK: i64 = 7 * 24 * 60 * 60;

    async fn seed(server: &TicketServer<MemoryStorage>, quantity: u32) {
        let storage = server.storage();
        storage
            .create_ticket_type(&TicketType::new("T1", "E1", "standing", 4500, quantity))
            .await
            .unwrap();
        storage
            .create_customer(&Customer::new("C1", "Ada", "Lovelace", "ada@example.com"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_uses_configured_clock_and_window() -> Result<(), TicketError> {
        let clock = Arc::new(AtomicI64::new(1_000_000));
        let clock_clone = Arc::clone(&clock);
        let server = TicketServer::builder()
            .with_secret(b"secret")
            .with_time_provider(move || Ok(clock_clone.load(Ordering::SeqCst)))
            .with_retention_window(Duration::from_secs(WEEK as u64))
            .build_and_init()
            .await?;
        seed(&server, 1).await;

        let issued = server.purchase("C1", "T1").await?;
        server.invalidate(&issued.token.id).await?;

        clock.fetch_add(WEEK, Ordering::SeqCst);
        assert_eq!(server.sweep().await?.purged, 0);

        clock.fetch_add(1, Ordering::SeqCst);
        assert_eq!(server.sweep().await?.purged, 1);
        assert!(server.storage().get_token(&issued.token.id).await?.is_none());

        // The purchase survives with a dangling token id
        let admission = server.verify(issued.token_string()).await?;
        assert_eq!(admission.token, None);
        assert!(!admission.is_active());

        Ok(())
    }

    #[tokio::test]
    async fn test_custom_sweep_strategy_runs_after_invalidation() -> Result<(), TicketError> {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = Arc::clone(&calls);

        let server = TicketServer::builder()
            .with_secret(b"secret")
            .with_retention_window(Duration::ZERO)
            .with_custom_sweep_strategy(move || {
                let calls = Arc::clone(&calls_clone);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    true
                }
            })
            .build_and_init()
            .await?;
        seed(&server, 1).await;

        let issued = server.purchase("C1", "T1").await?;
        server.invalidate(&issued.token.id).await?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Repeated invalidation changes nothing and does not consult the strategy
        server.invalidate(&issued.token.id).await?;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        Ok(())
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_background_sweep_failure_is_logged() -> Result<(), TicketError> {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let clock_broken = Arc::new(AtomicBool::new(false));
        let clock_flag = Arc::clone(&clock_broken);
        let server = TicketServer::builder()
            .with_secret(b"secret")
            .with_time_provider(move || {
                if clock_flag.load(Ordering::SeqCst) {
                    Err(TicketError::from_storage_message("clock unavailable"))
                } else {
                    Ok(1_000)
                }
            })
            .with_custom_sweep_strategy(|| async { true })
            .build_and_init()
            .await?;
        seed(&server, 1).await;

        let issued = server.purchase("C1", "T1").await?;
        server.invalidate(&issued.token.id).await?;

        // The spawned sweep has not run yet on this single-threaded runtime
        clock_broken.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("background sweep failed"), "{output}");
        assert!(output.contains("error=Storage error: clock unavailable"), "{output}");

        Ok(())
    }

    #[cfg(feature = "metrics")]
    #[tokio::test]
    async fn test_server_records_metrics() -> Result<(), TicketError> {
        use crate::ticket::metrics::InMemoryMetricsCollector;

        let server = TicketServer::builder()
            .with_secret(b"secret")
            .with_metrics_collector(Arc::new(InMemoryMetricsCollector::new()))
            .build_and_init()
            .await?;
        seed(&server, 1).await;

        let issued = server.purchase("C1", "T1").await?;
        let _ = server.purchase("C1", "T1").await;
        server.verify(issued.token_string()).await?;
        let _ = server.verify("bogus").await;
        server.invalidate(&issued.token.id).await?;

        let metrics = server.metrics().await?;
        assert_eq!(metrics.purchases_issued, 1);
        assert_eq!(metrics.purchase_rejections.out_of_stock, 1);
        assert_eq!(metrics.verification_rejections.invalid_token, 1);
        assert_eq!(metrics.verification_successes, 1);
        assert_eq!(metrics.verification_failures, 1);
        assert_eq!(metrics.tokens_invalidated, 1);

        Ok(())
    }
}
