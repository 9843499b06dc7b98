//! Runtime configuration for rstest-steps.
//!
//! The module exposes the default step timeout, applied to steps registered
//! without an explicit [`Step::with_timeout`](crate::Step::with_timeout). The
//! value comes from an in-process override when set, otherwise from the
//! `RSTEST_STEPS_DEFAULT_TIMEOUT_MS` environment variable.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the default step timeout in milliseconds.
pub const DEFAULT_TIMEOUT_ENV: &str = "RSTEST_STEPS_DEFAULT_TIMEOUT_MS";

const OVERRIDE_UNSET: u64 = u64::MAX;

static DEFAULT_TIMEOUT_OVERRIDE: AtomicU64 = AtomicU64::new(OVERRIDE_UNSET);

fn parse_timeout_millis(value: &str) -> Result<Option<Duration>, ConfigError> {
    let millis: u64 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidTimeout {
            variable: DEFAULT_TIMEOUT_ENV,
            value: value.to_string(),
        })?;
    Ok((millis > 0).then(|| Duration::from_millis(millis)))
}

fn env_default_timeout() -> Result<Option<Duration>, ConfigError> {
    std::env::var(DEFAULT_TIMEOUT_ENV)
        .ok()
        .map_or(Ok(None), |value| parse_timeout_millis(&value))
}

fn override_state() -> Option<Option<Duration>> {
    match DEFAULT_TIMEOUT_OVERRIDE.load(Ordering::Relaxed) {
        OVERRIDE_UNSET => None,
        0 => Some(None),
        millis => Some(Some(Duration::from_millis(millis))),
    }
}

/// Determine the default step timeout.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTimeout`] when no override is set and the
/// environment variable does not hold a whole number of milliseconds.
pub fn default_timeout() -> Result<Option<Duration>, ConfigError> {
    override_state().map_or_else(env_default_timeout, Ok)
}

/// Override the default step timeout for the current process.
///
/// `None` or a zero duration disables the default timeout regardless of the
/// environment. Non-zero durations shorter than a millisecond round up to one
/// millisecond. Call [`clear_default_timeout_override`] to restore
/// environment driven behaviour.
pub fn set_default_timeout(timeout: Option<Duration>) {
    let millis = timeout.filter(|t| !t.is_zero()).map_or(0, |t| {
        u64::try_from(t.as_millis().max(1)).unwrap_or(OVERRIDE_UNSET - 1)
    });
    DEFAULT_TIMEOUT_OVERRIDE.store(millis, Ordering::Relaxed);
}

/// Remove any in-process override for the default step timeout.
pub fn clear_default_timeout_override() {
    DEFAULT_TIMEOUT_OVERRIDE.store(OVERRIDE_UNSET, Ordering::Relaxed);
}

/// Settings consumed by the [`ScenarioRunner`](crate::ScenarioRunner).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rstest_steps::RunnerConfig;
///
/// let config = RunnerConfig::default().with_default_timeout(Duration::from_secs(5));
/// assert_eq!(config.default_timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunnerConfig {
    default_timeout: Option<Duration>,
}

impl RunnerConfig {
    /// Build a configuration from the process override and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the environment holds an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            default_timeout: default_timeout()?,
        })
    }

    /// Apply `timeout` to steps without their own deadline. Zero disables it.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Returns the deadline applied to steps without their own.
    #[must_use]
    pub const fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }
}
