//! The step record registered by scenario bodies.
//!
//! A [`Step`] pairs a display name with a deferred action. Registration hands
//! back a `&mut Step` so callers can chain [`Step::with_timeout`] or
//! [`Step::skip`]; once the registry is extracted no further configuration is
//! possible.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{BoxError, RegistryError};

/// Result returned by step actions.
pub type ActionResult = Result<(), BoxError>;

/// Boxed future returned by asynchronous step actions.
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send + 'static>>;

type SyncAction = Box<dyn FnOnce(&CancellationToken) -> ActionResult + Send + 'static>;
type AsyncAction = Box<dyn FnOnce(CancellationToken) -> ActionFuture + Send + 'static>;
type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// Deferred work carried by a step.
///
/// Actions receive a [`CancellationToken`] that is cancelled when the step
/// deadline elapses. The executor cannot preempt a running action, so
/// long-running actions should poll the token and return early.
pub(crate) enum StepAction {
    Sync(SyncAction),
    Async(AsyncAction),
}

/// Deadline configured on a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Deadline {
    /// Nothing configured; the runner's default timeout applies.
    #[default]
    Unset,
    /// Explicitly disabled with a zero timeout.
    Disabled,
    After(Duration),
}

impl Deadline {
    fn from_timeout(timeout: Duration) -> Self {
        if timeout.is_zero() {
            Self::Disabled
        } else {
            Self::After(timeout)
        }
    }

    /// Resolve against the runner's default timeout.
    pub(crate) const fn or_default(self, default: Option<Duration>) -> Option<Duration> {
        match self {
            Self::Unset => default,
            Self::Disabled => None,
            Self::After(timeout) => Some(timeout),
        }
    }
}

/// A named unit of deferred work registered during a scenario body.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use rstest_steps::Step;
///
/// let mut step = Step::new("the basket is empty", |_| Ok(())).unwrap();
/// step.with_timeout(Duration::from_millis(50));
/// assert_eq!(step.name(), "the basket is empty");
/// assert_eq!(step.timeout(), Some(Duration::from_millis(50)));
/// assert_eq!(step.skip_reason(), None);
/// ```
pub struct Step {
    name: String,
    action: StepAction,
    deadline: Deadline,
    skip_reason: Option<String>,
    teardown: Option<Teardown>,
}

impl Step {
    /// Create a step with a synchronous action.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] when `name` is empty or only
    /// whitespace.
    pub fn new<A>(name: impl Into<String>, action: A) -> Result<Self, RegistryError>
    where
        A: FnOnce(&CancellationToken) -> ActionResult + Send + 'static,
    {
        Self::from_action(name.into(), StepAction::Sync(Box::new(action)))
    }

    /// Create a step with an asynchronous action.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] when `name` is empty or only
    /// whitespace.
    pub fn new_async<A, Fut>(name: impl Into<String>, action: A) -> Result<Self, RegistryError>
    where
        A: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let action: AsyncAction = Box::new(move |token| Box::pin(action(token)));
        Self::from_action(name.into(), StepAction::Async(action))
    }

    fn from_action(name: String, action: StepAction) -> Result<Self, RegistryError> {
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        Ok(Self {
            name,
            action,
            deadline: Deadline::Unset,
            skip_reason: None,
            teardown: None,
        })
    }

    /// Set the deadline for the step action.
    ///
    /// A zero duration disables the deadline, including any default timeout
    /// configured on the runner.
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.deadline = Deadline::from_timeout(timeout);
        self
    }

    /// Set the deadline in milliseconds. Zero disables it.
    pub fn with_timeout_millis(&mut self, millis: u64) -> &mut Self {
        self.with_timeout(Duration::from_millis(millis))
    }

    /// Mark the step as skipped. Its action will never run.
    pub fn skip(&mut self, reason: impl Into<String>) -> &mut Self {
        self.skip_reason = Some(reason.into());
        self
    }

    /// Register cleanup to run after the scenario's last step.
    ///
    /// Teardowns only run for steps whose action was executed, in reverse
    /// registration order.
    pub fn with_teardown(&mut self, teardown: impl FnOnce() + Send + 'static) -> &mut Self {
        self.teardown = Some(Box::new(teardown));
        self
    }

    /// Returns the display name of the step.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configured deadline, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        match self.deadline {
            Deadline::After(timeout) => Some(timeout),
            Deadline::Unset | Deadline::Disabled => None,
        }
    }

    /// Whether the deadline was explicitly disabled with a zero timeout.
    #[must_use]
    pub const fn timeout_disabled(&self) -> bool {
        matches!(self.deadline, Deadline::Disabled)
    }

    /// Returns the skip reason, if the step is skipped.
    #[must_use]
    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }

    /// Whether the step action is asynchronous.
    #[must_use]
    pub const fn is_async(&self) -> bool {
        matches!(self.action, StepAction::Async(_))
    }

    /// Whether a teardown was registered for the step.
    #[must_use]
    pub const fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    pub(crate) fn into_parts(self) -> StepParts {
        StepParts {
            name: self.name,
            action: self.action,
            deadline: self.deadline,
            skip_reason: self.skip_reason,
            teardown: self.teardown,
        }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("is_async", &self.is_async())
            .field("deadline", &self.deadline)
            .field("skip_reason", &self.skip_reason)
            .field("has_teardown", &self.has_teardown())
            .finish()
    }
}

/// Owned pieces of a step, consumed by the executor.
pub(crate) struct StepParts {
    pub(crate) name: String,
    pub(crate) action: StepAction,
    pub(crate) deadline: Deadline,
    pub(crate) skip_reason: Option<String>,
    pub(crate) teardown: Option<Teardown>,
}
