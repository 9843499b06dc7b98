//! Execution messages queued on the reporting channel.
//!
//! Every executed step produces `TestStarting`, one outcome message and
//! `TestFinished`. Scenario-fatal errors produce the same triple for the
//! scenario as a whole, and a skipped scenario produces a lone `TestSkipped`.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::error::{ScenarioError, StepFailure};

/// Identity of a reported test: a scenario, or one step within it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TestCase {
    display_name: String,
    scenario_number: usize,
    step_number: Option<usize>,
}

impl TestCase {
    /// Identity of a whole scenario.
    #[must_use]
    pub fn scenario(display_name: impl Into<String>, scenario_number: usize) -> Self {
        Self {
            display_name: display_name.into(),
            scenario_number,
            step_number: None,
        }
    }

    /// Identity of one step.
    ///
    /// # Examples
    ///
    /// ```
    /// use rstest_steps::TestCase;
    ///
    /// let test = TestCase::step("Checkout", 1, 3, "the total is shown");
    /// assert_eq!(test.display_name(), "Checkout [01.03] the total is shown");
    /// assert_eq!(test.step_number(), Some(3));
    /// ```
    #[must_use]
    pub fn step(
        scenario_display_name: &str,
        scenario_number: usize,
        step_number: usize,
        step_name: &str,
    ) -> Self {
        Self {
            display_name: format!(
                "{scenario_display_name} [{scenario_number:02}.{step_number:02}] {step_name}"
            ),
            scenario_number,
            step_number: Some(step_number),
        }
    }

    /// Returns the display name reported to consumers.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the scenario number.
    #[must_use]
    pub const fn scenario_number(&self) -> usize {
        self.scenario_number
    }

    /// Returns the one-based step ordinal, or `None` for a scenario identity.
    #[must_use]
    pub const fn step_number(&self) -> Option<usize> {
        self.step_number
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// Category of a reported failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FailureKind {
    /// The scenario could not be resolved.
    Discovery,
    /// The scenario fixture could not be constructed.
    FixtureConstruction,
    /// A background routine failed.
    Background,
    /// The scenario body failed.
    Invocation,
    /// A step action returned an error.
    StepAction,
    /// A step action panicked.
    StepPanic,
    /// A step exceeded its deadline.
    StepTimeout,
    /// A step was not executed because an earlier step failed.
    PrecedingStep,
}

/// Description of a failure carried by [`ExecutionMessage::TestFailed`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailureInfo {
    kind: FailureKind,
    message: String,
    causes: Vec<String>,
}

impl FailureInfo {
    /// Capture a failure and the messages of its source chain.
    #[must_use]
    pub fn new(kind: FailureKind, error: &(dyn StdError + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            kind,
            message: error.to_string(),
            causes,
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Returns the top-level error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the messages of the error's source chain, outermost first.
    #[must_use]
    pub fn causes(&self) -> &[String] {
        &self.causes
    }
}

impl From<&StepFailure> for FailureInfo {
    fn from(failure: &StepFailure) -> Self {
        let kind = match failure {
            StepFailure::Panic(_) => FailureKind::StepPanic,
            StepFailure::Timeout(_) => FailureKind::StepTimeout,
            StepFailure::PrecedingStep(_) => FailureKind::PrecedingStep,
            StepFailure::Action(_) => FailureKind::StepAction,
        };
        Self::new(kind, failure)
    }
}

impl From<&ScenarioError> for FailureInfo {
    fn from(error: &ScenarioError) -> Self {
        let kind = match error {
            ScenarioError::Discovery(_) => FailureKind::Discovery,
            ScenarioError::FixtureConstruction(_) => FailureKind::FixtureConstruction,
            ScenarioError::Background { .. } => FailureKind::Background,
            ScenarioError::Invocation(_) => FailureKind::Invocation,
        };
        Self::new(kind, error)
    }
}

/// A message queued on the reporting channel.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecutionMessage {
    /// A test is about to run.
    TestStarting {
        /// Test identity.
        test: TestCase,
    },
    /// A test passed.
    TestPassed {
        /// Test identity.
        test: TestCase,
        /// Time spent running the test.
        elapsed: Duration,
    },
    /// A test failed.
    TestFailed {
        /// Test identity.
        test: TestCase,
        /// Time spent running the test.
        elapsed: Duration,
        /// What went wrong.
        failure: FailureInfo,
    },
    /// A test was skipped without running.
    TestSkipped {
        /// Test identity.
        test: TestCase,
        /// Why the test was skipped.
        reason: String,
    },
    /// A test finished, whatever its outcome.
    TestFinished {
        /// Test identity.
        test: TestCase,
        /// Time spent running the test.
        elapsed: Duration,
    },
}

impl ExecutionMessage {
    /// Returns the identity of the test the message refers to.
    #[must_use]
    pub fn test(&self) -> &TestCase {
        match self {
            Self::TestStarting { test }
            | Self::TestPassed { test, .. }
            | Self::TestFailed { test, .. }
            | Self::TestSkipped { test, .. }
            | Self::TestFinished { test, .. } => test,
        }
    }

    /// Whether the message reports a failed test.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::TestFailed { .. })
    }

    /// Returns the failure details of a `TestFailed` message.
    #[must_use]
    pub fn failure(&self) -> Option<&FailureInfo> {
        match self {
            Self::TestFailed { failure, .. } => Some(failure),
            _ => None,
        }
    }

    /// Returns the lowercase label for the message kind.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::TestStarting { .. } => "starting",
            Self::TestPassed { .. } => "passed",
            Self::TestFailed { .. } => "failed",
            Self::TestSkipped { .. } => "skipped",
            Self::TestFinished { .. } => "finished",
        }
    }
}
