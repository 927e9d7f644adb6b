//! Purging of invalidated tokens and the strategies that trigger it.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::TicketError;
use crate::ticket::storage::TokenStore;
use crate::ticket::time_utils;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Inactive tokens examined
    pub scanned: usize,
    /// Tokens deleted
    pub purged: usize,
    /// Deletions that failed; those tokens are retried on the next sweep
    pub failed: usize,
}

/// Deletes inactive tokens that have outlived the retention window.
///
/// Active tokens are never touched, and neither are the purchases that
/// reference a purged token.
pub struct TokenJanitor<S: TokenStore> {
    store: Arc<S>,
}

impl<S: TokenStore> TokenJanitor<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Purges every inactive token with `updated_at < now - retention`.
    ///
    /// Best effort per record: a failed delete is logged and counted and the
    /// sweep moves on. Only a failure to list the candidates is an error.
    pub async fn sweep(&self, now: i64, retention: Duration) -> Result<SweepReport, TicketError> {
        let inactive = self.store.list_inactive_tokens().await?;
        let mut report = SweepReport {
            scanned: inactive.len(),
            ..SweepReport::default()
        };

        for token in inactive
            .iter()
            .filter(|t| time_utils::is_past_retention(t.updated_at, now, retention))
        {
            match self.store.delete_token(&token.id).await {
                Ok(true) => report.purged += 1,
                // Already gone, e.g. a concurrent sweep got there first
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(token_id = %token.id, error = %e, "failed to purge token");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            purged = report.purged,
            failed = report.failed,
            "token sweep finished"
        );
        Ok(report)
    }
}

/// Strategy for deciding when the server should sweep in the background.
///
/// The server consults the strategy after every invalidation that actually
/// flipped a token. When it answers `true`, a sweep is spawned on the tokio
/// runtime and [`mark_as_swept`](SweepStrategy::mark_as_swept) is called.
#[async_trait]
pub trait SweepStrategy: Send + Sync {
    /// Determines whether a sweep should be triggered now.
    async fn should_sweep(&self) -> bool;

    /// Resets internal state once a sweep has been triggered.
    async fn mark_as_swept(&self);
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Triggers a sweep after a number of invalidations or after a time
/// interval, whichever comes first.
pub struct HybridSweepStrategy {
    count_threshold: u32,
    time_threshold: Duration,
    invalidation_count: AtomicU32,
    last_sweep_time: AtomicU64,
}

impl HybridSweepStrategy {
    /// Creates a new hybrid strategy.
    ///
    /// # Arguments
    ///
    /// * `count_threshold` - Number of invalidations before sweeping
    /// * `time_threshold` - Maximum time between sweeps
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use ticket_gate::ticket::HybridSweepStrategy;
    ///
    /// // Sweep every 500 invalidations or every hour
    /// let strategy = HybridSweepStrategy::new(500, Duration::from_secs(3600));
    /// ```
    pub fn new(count_threshold: u32, time_threshold: Duration) -> Self {
        Self {
            count_threshold,
            time_threshold,
            invalidation_count: AtomicU32::new(0),
            last_sweep_time: AtomicU64::new(unix_now()),
        }
    }
}

impl Default for HybridSweepStrategy {
    /// 1000 invalidations or one hour.
    fn default() -> Self {
        Self::new(1000, Duration::from_secs(3600))
    }
}

#[async_trait]
impl SweepStrategy for HybridSweepStrategy {
    async fn should_sweep(&self) -> bool {
        let count = self.invalidation_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count >= self.count_threshold {
            return true;
        }

        let elapsed = unix_now().saturating_sub(self.last_sweep_time.load(Ordering::SeqCst));
        elapsed >= self.time_threshold.as_secs()
    }

    async fn mark_as_swept(&self) {
        self.invalidation_count.store(0, Ordering::SeqCst);
        self.last_sweep_time.store(unix_now(), Ordering::SeqCst);
    }
}

/// Sweep strategy backed by a user-provided async closure.
///
/// State management is left entirely to the closure.
pub struct CustomSweepStrategy<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    strategy_fn: F,
}

impl<F, Fut> CustomSweepStrategy<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    pub fn new(strategy_fn: F) -> Self {
        Self { strategy_fn }
    }
}

#[async_trait]
impl<F, Fut> SweepStrategy for CustomSweepStrategy<F, Fut>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    async fn should_sweep(&self) -> bool {
        (self.strategy_fn)().await
    }

    async fn mark_as_swept(&self) {}
}

/// Type alias for boxed sweep strategies.
pub type BoxedSweepStrategy = Box<dyn SweepStrategy>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::record::Token;
    use crate::ticket::storage::MemoryStorage;
    use std::sync::atomic::AtomicBool;

    const DAY: i64 = 24 * 60 * 60;
    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    fn inactive(id: &str, updated_at: i64) -> Token {
        Token {
            active: false,
            ..Token::new(id, format!("{id}:mac"), updated_at)
        }
    }

    #[tokio::test]
    async fn test_sweep_respects_retention_window() -> Result<(), TicketError> {
        let storage = Arc::new(MemoryStorage::new());
        let now = 100 * DAY;

        storage.create_token(&inactive("old", now - 8 * DAY)).await?;
        storage.create_token(&inactive("recent", now - DAY)).await?;
        // Active tokens survive regardless of age
        storage.create_token(&Token::new("active", "p:mac", 0)).await?;

        let janitor = TokenJanitor::new(Arc::clone(&storage));
        let report = janitor.sweep(now, WEEK).await?;

        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                purged: 1,
                failed: 0
            }
        );
        assert!(storage.get_token("old").await?.is_none());
        assert!(storage.get_token("recent").await?.is_some());
        assert!(storage.get_token("active").await?.is_some());

        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_boundary_is_exclusive() -> Result<(), TicketError> {
        let storage = Arc::new(MemoryStorage::new());
        let now = 100 * DAY;
        storage.create_token(&inactive("edge", now - 7 * DAY)).await?;

        let janitor = TokenJanitor::new(Arc::clone(&storage));
        assert_eq!(janitor.sweep(now, WEEK).await?.purged, 0);
        assert_eq!(janitor.sweep(now + 1, WEEK).await?.purged, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_hybrid_strategy_count_threshold() {
        let strategy = HybridSweepStrategy::new(3, Duration::from_secs(3600));

        assert!(!strategy.should_sweep().await);
        assert!(!strategy.should_sweep().await);
        assert!(strategy.should_sweep().await);

        strategy.mark_as_swept().await;
        assert!(!strategy.should_sweep().await);
    }

    #[tokio::test]
    async fn test_hybrid_strategy_time_threshold() {
        let strategy = HybridSweepStrategy::new(100, Duration::from_secs(2));
        assert!(!strategy.should_sweep().await);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert!(strategy.should_sweep().await);
    }

    #[tokio::test]
    async fn test_custom_strategy() {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);

        let strategy = CustomSweepStrategy::new(move || {
            let flag = Arc::clone(&flag_clone);
            async move { flag.load(Ordering::SeqCst) }
        });

        assert!(!strategy.should_sweep().await);
        strategy.mark_as_swept().await;

        flag.store(true, Ordering::SeqCst);
        assert!(strategy.should_sweep().await);
    }
}
