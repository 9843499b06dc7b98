//! Execution of a single step.
//!
//! Steps without a deadline run on the calling task. Asynchronous actions
//! with a deadline also run on the calling task, raced against a timer, so
//! task-local facilities such as `spawn_local` behave the same with or
//! without a deadline. Synchronous actions with a deadline run on the
//! blocking pool while the caller waits on the timer.
//!
//! # Limitations
//!
//! When a deadline elapses the executor reports a [`StepTimeoutError`] and
//! cancels the action's token. An asynchronous action is dropped at its next
//! suspension point. A synchronous action cannot be preempted: it keeps
//! running until it returns or notices the cancelled token, and its eventual
//! outcome is discarded.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use futures::FutureExt as _;
use tokio::task::JoinError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{StepFailure, StepTimeoutError};
use crate::panic::PanicError;
use crate::step::{ActionFuture, ActionResult, Step, StepAction, StepParts};

/// Outcome of executing one step.
#[derive(Debug)]
#[must_use]
pub enum StepOutcome {
    /// The action returned successfully.
    Passed,
    /// The action failed, panicked or exceeded its deadline.
    Failed(StepFailure),
    /// The step was skipped and its action never ran.
    Skipped(String),
}

impl StepOutcome {
    /// Whether the outcome is a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of one step together with the time it took.
#[derive(Debug)]
#[must_use]
pub struct StepResult {
    outcome: StepOutcome,
    elapsed: Duration,
}

impl StepResult {
    /// Returns the outcome.
    pub const fn outcome(&self) -> &StepOutcome {
        &self.outcome
    }

    /// Returns the time spent running the action.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Consume the result, returning the outcome.
    pub fn into_outcome(self) -> StepOutcome {
        self.outcome
    }
}

/// Stateless executor for individual steps.
///
/// # Examples
///
/// ```
/// use rstest_steps::{Step, StepExecutor, StepOutcome};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let step = Step::new("adds numbers", |_| Ok(())).unwrap();
/// let result = StepExecutor::new().execute(step).await;
/// assert!(matches!(result.outcome(), StepOutcome::Passed));
/// # });
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct StepExecutor {
    default_timeout: Option<Duration>,
}

impl StepExecutor {
    /// Create an executor with no default timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_timeout: None,
        }
    }

    /// Apply `timeout` to steps registered without a deadline of their own.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Execute `step`, discarding any teardown it registered.
    pub async fn execute(&self, step: Step) -> StepResult {
        self.execute_parts(step.into_parts()).await
    }

    pub(crate) async fn execute_parts(&self, parts: StepParts) -> StepResult {
        let StepParts {
            name,
            action,
            deadline,
            skip_reason,
            ..
        } = parts;

        if let Some(reason) = skip_reason {
            log::trace!("step \"{name}\" skipped: {reason}");
            return StepResult {
                outcome: StepOutcome::Skipped(reason),
                elapsed: Duration::ZERO,
            };
        }

        let started = Instant::now();
        let outcome = match deadline.or_default(self.default_timeout) {
            Some(deadline) => run_with_deadline(&name, action, deadline).await,
            None => run_inline(action).await,
        };
        StepResult {
            outcome,
            elapsed: started.elapsed(),
        }
    }
}

async fn run_inline(action: StepAction) -> StepOutcome {
    let token = CancellationToken::new();
    let result = match action {
        StepAction::Sync(action) => panic::catch_unwind(AssertUnwindSafe(|| action(&token))),
        StepAction::Async(action) => {
            AssertUnwindSafe(async move { action(token).await })
                .catch_unwind()
                .await
        }
    };
    match result {
        Ok(result) => outcome_of(result),
        Err(payload) => StepOutcome::Failed(PanicError::from_payload(payload.as_ref()).into()),
    }
}

async fn run_with_deadline(name: &str, action: StepAction, deadline: Duration) -> StepOutcome {
    let token = CancellationToken::new();
    let finished = match action {
        StepAction::Sync(action) => {
            let worker_token = token.clone();
            let worker = tokio::task::spawn_blocking(move || action(&worker_token));
            tokio::time::timeout(deadline, worker)
                .await
                .map(|joined| joined.map_err(worker_failure))
        }
        StepAction::Async(action) => {
            let future: ActionFuture = action(token.clone());
            tokio::time::timeout(deadline, AssertUnwindSafe(future).catch_unwind())
                .await
                .map(|caught| caught.map_err(|payload| PanicError::from_payload(payload.as_ref())))
        }
    };

    match finished {
        Ok(Ok(result)) => outcome_of(result),
        Ok(Err(panic)) => StepOutcome::Failed(panic.into()),
        Err(_) => {
            log::warn!(
                "step \"{name}\" exceeded its {}ms deadline; abandoning the running action",
                deadline.as_millis()
            );
            token.cancel();
            StepOutcome::Failed(StepTimeoutError::new(deadline).into())
        }
    }
}

fn outcome_of(result: ActionResult) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Passed,
        Err(error) => StepOutcome::Failed(StepFailure::Action(error)),
    }
}

fn worker_failure(error: JoinError) -> PanicError {
    match error.try_into_panic() {
        Ok(payload) => PanicError::from_payload(payload.as_ref()),
        Err(error) => PanicError::from_payload(&error.to_string()),
    }
}
