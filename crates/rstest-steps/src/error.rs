//! Error types raised while registering and running scenario steps.
//!
//! Errors fall into two groups. Scenario-fatal errors ([`ScenarioError`])
//! stop a scenario before any step runs and are reported as a single failing
//! scenario result. Step-local errors ([`StepFailure`]) are attached to the
//! failing step's result and drive the cascading short-circuit for the steps
//! after it.

use std::time::Duration;

use thiserror::Error;

use crate::panic::PanicError;

/// Type-erased error accepted from step actions, background routines and
/// scenario bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the step registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// A step was registered with an empty or whitespace-only name.
    #[error("step name must not be empty")]
    EmptyName,
}

/// Raised by the step executor when a step's deadline elapses before its
/// action completes.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rstest_steps::StepTimeoutError;
///
/// let error = StepTimeoutError::new(Duration::from_millis(50));
/// assert_eq!(error.timeout(), Duration::from_millis(50));
/// assert_eq!(error.to_string(), "Test execution time exceeded: 50ms");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Test execution time exceeded: {}ms", .timeout.as_millis())]
pub struct StepTimeoutError {
    timeout: Duration,
}

impl StepTimeoutError {
    /// Create a timeout error for the configured deadline.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the timeout that elapsed.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Attached to every step declared after the first failing step.
///
/// # Examples
///
/// ```
/// use rstest_steps::PrecedingStepFailureError;
///
/// let error = PrecedingStepFailureError::new("a user logs in");
/// assert_eq!(
///     error.to_string(),
///     "Failed to execute preceding step \"a user logs in\"."
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to execute preceding step \"{step_name}\".")]
pub struct PrecedingStepFailureError {
    step_name: String,
}

impl PrecedingStepFailureError {
    /// Create the error naming the step that failed first.
    #[must_use]
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
        }
    }

    /// Returns the name of the step that failed first.
    #[must_use]
    pub fn step_name(&self) -> &str {
        &self.step_name
    }
}

/// Reason a single step reported a failure.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StepFailure {
    /// The step action returned an error.
    #[error(transparent)]
    Action(BoxError),
    /// The step action panicked.
    #[error(transparent)]
    Panic(#[from] PanicError),
    /// The step deadline elapsed before the action completed.
    #[error(transparent)]
    Timeout(#[from] StepTimeoutError),
    /// The step was not executed because an earlier step failed.
    #[error(transparent)]
    PrecedingStep(#[from] PrecedingStepFailureError),
}

impl StepFailure {
    /// Returns `true` when the failure was caused by an elapsed deadline.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns the action error when the failure wraps one.
    #[must_use]
    pub fn action_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Action(error) => Some(error.as_ref()),
            _ => None,
        }
    }
}

/// Error returned when a scenario cannot be resolved by the discovery
/// collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to resolve scenario \"{scenario}\": {reason}")]
pub struct DiscoveryError {
    scenario: String,
    reason: String,
}

impl DiscoveryError {
    /// Create a discovery error for the named scenario.
    #[must_use]
    pub fn new(scenario: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            reason: reason.into(),
        }
    }

    /// Returns the display name of the scenario that failed to resolve.
    #[must_use]
    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    /// Returns the reason resolution failed.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors that abort a whole scenario before any step executes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScenarioError {
    /// The scenario could not be resolved.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    /// Constructing the scenario fixture failed.
    #[error("failed to construct scenario fixture: {0}")]
    FixtureConstruction(#[source] BoxError),
    /// A background routine failed.
    #[error("background routine {index} failed: {source}")]
    Background {
        /// One-based position of the background routine.
        index: usize,
        /// Error raised by the routine.
        #[source]
        source: BoxError,
    },
    /// The scenario body failed while registering steps.
    #[error("scenario body failed: {0}")]
    Invocation(#[source] BoxError),
}

/// Errors raised while reading runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A timeout variable did not hold a whole number of milliseconds.
    #[error("invalid value \"{value}\" for {variable}: expected a whole number of milliseconds")]
    InvalidTimeout {
        /// Name of the environment variable.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },
}
