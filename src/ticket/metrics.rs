//! Monitoring and metrics collection for ticket operations.
//!
//! This module provides a pluggable metrics system for tracking purchases,
//! gate verifications, invalidations and janitor sweeps. Metrics collection
//! is optional and can be enabled via the `metrics` feature.

use crate::TicketError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Core metrics tracked by the ticket server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketMetrics {
    /// Number of tickets issued
    pub purchases_issued: u64,
    /// Number of purchase attempts rejected
    pub purchases_rejected: u64,
    /// Total number of gate verification attempts
    pub verification_attempts: u64,
    /// Number of verifications that resolved to a purchase
    pub verification_successes: u64,
    /// Number of verifications that were rejected
    pub verification_failures: u64,
    /// Number of tokens flipped from active to inactive
    pub tokens_invalidated: u64,
    /// Number of completed janitor sweeps
    pub sweeps: u64,
    /// Total number of tokens purged across all sweeps
    pub tokens_purged: u64,
    /// Purchase rejections by reason
    pub purchase_rejections: RejectionMetrics,
    /// Gate verification rejections by reason
    pub verification_rejections: RejectionMetrics,
    /// Average verification time (microseconds)
    pub avg_verification_time_us: u64,
}

/// Rejection counts by error category, for a single operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionMetrics {
    pub out_of_stock: u64,
    pub not_found: u64,
    pub invalid_token: u64,
    pub storage_errors: u64,
    pub other: u64,
}

/// Events that can be tracked by the metrics system.
#[derive(Debug, Clone)]
pub enum MetricEvent {
    /// A ticket was issued
    PurchaseIssued {
        /// Time taken by the whole purchase transaction
        duration: Duration,
    },
    /// A purchase attempt failed
    PurchaseRejected {
        /// [`TicketError::code`] of the failure
        error_code: &'static str,
    },
    /// A token was presented at the gate
    VerificationAttempt {
        /// Time taken to verify
        duration: Duration,
        /// Whether the token resolved to a purchase
        success: bool,
        /// [`TicketError::code`] when the attempt failed
        error_code: Option<&'static str>,
    },
    /// A token was flipped to inactive
    TokenInvalidated,
    /// A janitor sweep finished
    SweepCompleted {
        /// Number of tokens deleted
        purged: usize,
        /// Number of deletions that failed
        failed: usize,
        /// Time taken
        duration: Duration,
    },
}

/// Trait for metrics collection backends.
///
/// # Thread Safety
///
/// All methods must be thread-safe as they may be called concurrently from
/// multiple tasks.
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    /// Record a metric event.
    ///
    /// This method should be fast and non-blocking as it is called on the
    /// request path.
    async fn record_event(&self, event: MetricEvent);

    /// Get a point-in-time snapshot of all collected metrics.
    async fn get_metrics(&self) -> Result<TicketMetrics, TicketError>;

    /// Reset all metrics to zero.
    async fn reset_metrics(&self) -> Result<(), TicketError>;
}

/// Simple in-memory metrics collector backed by atomic counters.
///
/// # Example
///
/// ```rust
/// use ticket_gate::ticket::{InMemoryMetricsCollector, MetricEvent, MetricsCollector};
///
/// # async fn example() -> Result<(), ticket_gate::TicketError> {
/// let collector = InMemoryMetricsCollector::new();
/// collector.record_event(MetricEvent::TokenInvalidated).await;
///
/// let metrics = collector.get_metrics().await?;
/// assert_eq!(metrics.tokens_invalidated, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct InMemoryMetricsCollector {
    purchases_issued: AtomicU64,
    purchases_rejected: AtomicU64,
    verification_attempts: AtomicU64,
    verification_successes: AtomicU64,
    verification_failures: AtomicU64,
    tokens_invalidated: AtomicU64,
    sweeps: AtomicU64,
    tokens_purged: AtomicU64,

    purchase_rejections: RejectionCounters,
    verification_rejections: RejectionCounters,

    verification_time_total: AtomicU64,
}

#[derive(Debug, Default)]
struct RejectionCounters {
    out_of_stock: AtomicU64,
    not_found: AtomicU64,
    invalid_token: AtomicU64,
    storage_errors: AtomicU64,
    other: AtomicU64,
}

impl RejectionCounters {
    fn count(&self, error_code: &str) {
        let counter = match error_code {
            "out_of_stock" => &self.out_of_stock,
            "not_found" => &self.not_found,
            "invalid_token" => &self.invalid_token,
            "storage_error" => &self.storage_errors,
            _ => &self.other,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RejectionMetrics {
        RejectionMetrics {
            out_of_stock: self.out_of_stock.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            invalid_token: self.invalid_token.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
            other: self.other.load(Ordering::Relaxed),
        }
    }

    fn counters(&self) -> [&AtomicU64; 5] {
        [
            &self.out_of_stock,
            &self.not_found,
            &self.invalid_token,
            &self.storage_errors,
            &self.other,
        ]
    }
}

impl InMemoryMetricsCollector {
    /// Create a new in-memory metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self) -> impl Iterator<Item = &AtomicU64> {
        [
            &self.purchases_issued,
            &self.purchases_rejected,
            &self.verification_attempts,
            &self.verification_successes,
            &self.verification_failures,
            &self.tokens_invalidated,
            &self.sweeps,
            &self.tokens_purged,
            &self.verification_time_total,
        ]
        .into_iter()
        .chain(self.purchase_rejections.counters())
        .chain(self.verification_rejections.counters())
    }
}

#[async_trait]
impl MetricsCollector for InMemoryMetricsCollector {
    async fn record_event(&self, event: MetricEvent) {
        match event {
            MetricEvent::PurchaseIssued { .. } => {
                self.purchases_issued.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::PurchaseRejected { error_code } => {
                self.purchases_rejected.fetch_add(1, Ordering::Relaxed);
                self.purchase_rejections.count(error_code);
            }
            MetricEvent::VerificationAttempt {
                duration,
                success,
                error_code,
            } => {
                self.verification_attempts.fetch_add(1, Ordering::Relaxed);
                self.verification_time_total
                    .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
                if success {
                    self.verification_successes.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.verification_failures.fetch_add(1, Ordering::Relaxed);
                    self.verification_rejections
                        .count(error_code.unwrap_or("other"));
                }
            }
            MetricEvent::TokenInvalidated => {
                self.tokens_invalidated.fetch_add(1, Ordering::Relaxed);
            }
            MetricEvent::SweepCompleted { purged, .. } => {
                self.sweeps.fetch_add(1, Ordering::Relaxed);
                self.tokens_purged
                    .fetch_add(purged as u64, Ordering::Relaxed);
            }
        }
    }

    async fn get_metrics(&self) -> Result<TicketMetrics, TicketError> {
        let verification_attempts = self.verification_attempts.load(Ordering::Relaxed);

        Ok(TicketMetrics {
            purchases_issued: self.purchases_issued.load(Ordering::Relaxed),
            purchases_rejected: self.purchases_rejected.load(Ordering::Relaxed),
            verification_attempts,
            verification_successes: self.verification_successes.load(Ordering::Relaxed),
            verification_failures: self.verification_failures.load(Ordering::Relaxed),
            tokens_invalidated: self.tokens_invalidated.load(Ordering::Relaxed),
            sweeps: self.sweeps.load(Ordering::Relaxed),
            tokens_purged: self.tokens_purged.load(Ordering::Relaxed),
            purchase_rejections: self.purchase_rejections.snapshot(),
            verification_rejections: self.verification_rejections.snapshot(),
            avg_verification_time_us: if verification_attempts > 0 {
                self.verification_time_total.load(Ordering::Relaxed) / verification_attempts
            } else {
                0
            },
        })
    }

    async fn reset_metrics(&self) -> Result<(), TicketError> {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// No-op metrics collector that discards all metrics.
///
/// This is what the server uses unless a collector is configured.
#[derive(Debug, Default)]
pub struct NoOpMetricsCollector;

impl NoOpMetricsCollector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsCollector for NoOpMetricsCollector {
    async fn record_event(&self, _event: MetricEvent) {}

    async fn get_metrics(&self) -> Result<TicketMetrics, TicketError> {
        Ok(TicketMetrics::default())
    }

    async fn reset_metrics(&self) -> Result<(), TicketError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_metrics_collector() -> Result<(), TicketError> {
        let collector = InMemoryMetricsCollector::new();

        collector
            .record_event(MetricEvent::PurchaseIssued {
                duration: Duration::from_micros(300),
            })
            .await;
        collector
            .record_event(MetricEvent::PurchaseRejected {
                error_code: "out_of_stock",
            })
            .await;
        collector
            .record_event(MetricEvent::VerificationAttempt {
                duration: Duration::from_micros(100),
                success: true,
                error_code: None,
            })
            .await;
        collector
            .record_event(MetricEvent::VerificationAttempt {
                duration: Duration::from_micros(300),
                success: false,
                error_code: Some("invalid_token"),
            })
            .await;
        collector.record_event(MetricEvent::TokenInvalidated).await;
        collector
            .record_event(MetricEvent::SweepCompleted {
                purged: 3,
                failed: 0,
                duration: Duration::from_millis(1),
            })
            .await;

        let metrics = collector.get_metrics().await?;
        assert_eq!(metrics.purchases_issued, 1);
        assert_eq!(metrics.purchases_rejected, 1);
        assert_eq!(metrics.purchase_rejections.out_of_stock, 1);
        assert_eq!(metrics.verification_attempts, 2);
        assert_eq!(metrics.verification_successes, 1);
        assert_eq!(metrics.verification_failures, 1);
        assert_eq!(metrics.verification_rejections.invalid_token, 1);
        assert_eq!(metrics.purchase_rejections.invalid_token, 0);
        assert_eq!(metrics.avg_verification_time_us, 200);
        assert_eq!(metrics.tokens_invalidated, 1);
        assert_eq!(metrics.sweeps, 1);
        assert_eq!(metrics.tokens_purged, 3);

        Ok(())
    }

    #[tokio::test]
    async fn test_metrics_reset() -> Result<(), TicketError> {
        let collector = InMemoryMetricsCollector::new();
        collector.record_event(MetricEvent::TokenInvalidated).await;
        collector
            .record_event(MetricEvent::PurchaseRejected {
                error_code: "mystery",
            })
            .await;
        assert_eq!(collector.get_metrics().await?.purchase_rejections.other, 1);

        collector.reset_metrics().await?;
        assert_eq!(collector.get_metrics().await?, TicketMetrics::default());

        Ok(())
    }

    #[tokio::test]
    async fn test_not_found_is_counted_per_operation() -> Result<(), TicketError> {
        let collector = InMemoryMetricsCollector::new();
        collector
            .record_event(MetricEvent::PurchaseRejected {
                error_code: "not_found",
            })
            .await;
        for _ in 0..2 {
            collector
                .record_event(MetricEvent::VerificationAttempt {
                    duration: Duration::from_micros(10),
                    success: false,
                    error_code: Some("not_found"),
                })
                .await;
        }

        let metrics = collector.get_metrics().await?;
        assert_eq!(metrics.purchase_rejections.not_found, 1);
        assert_eq!(metrics.verification_rejections.not_found, 2);

        collector.reset_metrics().await?;
        assert_eq!(collector.get_metrics().await?, TicketMetrics::default());

        Ok(())
    }

    #[tokio::test]
    async fn test_noop_metrics_collector() -> Result<(), TicketError> {
        let collector = NoOpMetricsCollector::new();
        collector.record_event(MetricEvent::TokenInvalidated).await;
        assert_eq!(collector.get_metrics().await?, TicketMetrics::default());
        Ok(())
    }
}
