use std::time::Duration;

use crate::ticket::error::TicketError;

/// Environment variable holding the token retention window in seconds.
pub const RETENTION_ENV: &str = "TICKET_GATE_RETENTION_SECS";

/// Environment variable holding the token signing secret.
pub const SECRET_KEY_ENV: &str = "TICKET_GATE_SECRET_KEY";

const ONE_DAY_SECS: u64 = 24 * 60 * 60;
const ONE_WEEK_SECS: u64 = 7 * ONE_DAY_SECS;

/// Predefined configuration presets for common deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPreset {
    /// Production configuration.
    ///
    /// Invalidated tokens are kept for one week before they can be purged,
    /// long enough to answer "was this ticket already used?" after an event.
    Production,

    /// Development configuration.
    ///
    /// Invalidated tokens are kept for one day.
    Development,

    /// Configuration for automated tests.
    ///
    /// Invalidated tokens become purgeable after one minute.
    Testing,

    /// Load configuration from environment variables.
    ///
    /// Reads `TICKET_GATE_RETENTION_SECS` (default: one week).
    FromEnv,
}

/// Configuration for the ticket server.
///
/// The signing secret is deliberately not part of this struct: it is
/// handed to the builder directly (or read with [`secret_key_from_env`]) so
/// that configuration values can be logged and printed freely.
///
/// # Example
///
/// ```rust
/// use ticket_gate::ticket::{ConfigPreset, TicketConfig};
/// use std::time::Duration;
///
/// let config = TicketConfig::from(ConfigPreset::Production);
/// assert_eq!(config.retention_window, Duration::from_secs(7 * 24 * 3600));
///
/// let config = TicketConfig {
///     retention_window: Duration::from_secs(3 * 24 * 3600),
/// };
/// assert!(config.validate().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketConfig {
    /// Minimum age of an invalidated token before the janitor may purge it.
    pub retention_window: Duration,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            retention_window: Duration::from_secs(
                std::env::var(RETENTION_ENV)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(ONE_WEEK_SECS),
            ),
        }
    }
}

impl TicketConfig {
    /// Validates the configuration and returns any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.retention_window.as_secs() < 3600 {
            warnings.push(
                "Very short retention window (< 1 hour) discards used-ticket history quickly"
                    .to_string(),
            );
        }
        if self.retention_window.as_secs() > 90 * ONE_DAY_SECS {
            warnings.push(
                "Long retention window (> 90 days) lets invalidated tokens accumulate".to_string(),
            );
        }

        warnings
    }

    /// Returns a summary of the current configuration.
    pub fn summary(&self) -> String {
        format!(
            "TicketConfig {{ Retention Window: {}s }}",
            self.retention_window.as_secs()
        )
    }
}

impl From<ConfigPreset> for TicketConfig {
    fn from(preset: ConfigPreset) -> Self {
        match preset {
            ConfigPreset::Production => Self {
                retention_window: Duration::from_secs(ONE_WEEK_SECS),
            },
            ConfigPreset::Development => Self {
                retention_window: Duration::from_secs(ONE_DAY_SECS),
            },
            ConfigPreset::Testing => Self {
                retention_window: Duration::from_secs(60),
            },
            ConfigPreset::FromEnv => Self::default(),
        }
    }
}

/// Reads the signing secret from `TICKET_GATE_SECRET_KEY`.
///
/// A missing or empty variable is a [`TicketError::KeyError`]; the server
/// refuses to start without a key.
pub fn secret_key_from_env() -> Result<Vec<u8>, TicketError> {
    let key = std::env::var(SECRET_KEY_ENV)
        .map_err(|e| TicketError::KeyError(format!("{SECRET_KEY_ENV}: {e}")))?;
    if key.is_empty() {
        return Err(TicketError::KeyError(format!("{SECRET_KEY_ENV} is empty")));
    }
    Ok(key.into_bytes())
}
