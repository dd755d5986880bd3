//! Plain-data retry configuration, loadable with serde.
//!
//! [`RetryConfig`] mirrors the numeric half of [`RetryPolicy`] so it can live
//! in a config file. Missing fields take the default policy's values.
//!
//! ```rust
//! # #[cfg(feature = "serde")]
//! # {
//! use crdb_retry::{DbError, RetryConfig, RetryPolicy};
//! use std::time::Duration;
//!
//! let config: RetryConfig = serde_json::from_str(r#"{ "max_attempts": 8 }"#).unwrap();
//! let policy = RetryPolicy::<DbError>::from_config(&config).unwrap();
//!
//! assert_eq!(policy.max_attempts(), 8);
//! assert_eq!(policy.base_delay(), Duration::from_millis(200));
//! # }
//! ```

use std::time::Duration;

use crate::classify::HasSqlState;
use crate::retry::error::PolicyError;
use crate::retry::policy::RetryPolicy;

/// Numeric retry settings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Proportional jitter in `[0, 1]`.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::<()>::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: u64::try_from(RetryPolicy::<()>::DEFAULT_BASE_DELAY.as_millis())
                .unwrap_or(u64::MAX),
            backoff_multiplier: RetryPolicy::<()>::DEFAULT_BACKOFF_MULTIPLIER,
            jitter_factor: RetryPolicy::<()>::DEFAULT_JITTER_FACTOR,
        }
    }
}

impl<E: 'static> RetryPolicy<E> {
    /// Apply the numeric settings of `config`, keeping this policy's classifier.
    pub fn configured(self, config: &RetryConfig) -> Result<Self, PolicyError> {
        let policy = self
            .with_max_attempts(config.max_attempts)
            .with_delay(Duration::from_millis(config.base_delay_ms))
            .with_backoff_multiplier(config.backoff_multiplier)
            .with_jitter(config.jitter_factor);
        policy.validate()?;
        Ok(policy)
    }
}

impl<E: HasSqlState + 'static> RetryPolicy<E> {
    /// Build a validated policy from `config` with the SQLSTATE classifier.
    pub fn from_config(config: &RetryConfig) -> Result<Self, PolicyError> {
        Self::default().configured(config)
    }
}

impl<E> From<&RetryPolicy<E>> for RetryConfig {
    fn from(policy: &RetryPolicy<E>) -> Self {
        Self {
            max_attempts: policy.max_attempts(),
            base_delay_ms: u64::try_from(policy.base_delay().as_millis()).unwrap_or(u64::MAX),
            backoff_multiplier: policy.backoff_multiplier(),
            jitter_factor: policy.jitter_factor(),
        }
    }
}
