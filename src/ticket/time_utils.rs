//! Time utilities for safe timestamp handling.
//!
//! Token timestamps are stored as seconds since the Unix epoch. These helpers
//! avoid the panics of direct `SystemTime` arithmetic.

use crate::ticket::error::TicketError;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A function that provides the current Unix timestamp in seconds.
pub type TimeProviderFn = Arc<dyn Fn() -> Result<i64, TicketError> + Send + Sync>;

/// Get current timestamp in seconds since Unix epoch.
///
/// In the extremely rare case where system time is before Unix epoch,
/// it returns an error instead of panicking.
pub(crate) fn current_timestamp() -> Result<i64, TicketError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| TicketError::from_storage_message("System time is before Unix epoch"))
}

/// The default time provider, backed by the system clock.
pub(crate) fn system_time_provider() -> TimeProviderFn {
    Arc::new(current_timestamp)
}

/// Latest `updated_at` that is still old enough to be purged.
///
/// A record is eligible when `now - updated_at > retention`, i.e. when
/// `updated_at < cutoff(now, retention)`.
pub(crate) fn retention_cutoff(now: i64, retention: Duration) -> i64 {
    let retention_secs = i64::try_from(retention.as_secs()).unwrap_or(i64::MAX);
    now.saturating_sub(retention_secs)
}

/// Check whether a record last updated at `updated_at` has outlived `retention`.
pub(crate) fn is_past_retention(updated_at: i64, now: i64, retention: Duration) -> bool {
    updated_at < retention_cutoff(now, retention)
}
