//! Harness adapter trait for scenario execution.

use rstest_steps::{MessageSink, RunSummary, ScenarioSource};

use crate::error::HarnessError;
use crate::request::ScenarioRunRequest;

/// Runs scenario requests inside a harness-specific runtime.
///
/// # Examples
///
/// ```
/// use rstest_steps::{RecordingSink, ScenarioDefinition, ScenarioMetadata};
/// use rstest_steps_harness::{HarnessAdapter, ScenarioRunRequest, TokioHarness};
///
/// let sink = RecordingSink::new();
/// let scenario = ScenarioDefinition::stateless(ScenarioMetadata::new("Demo", 1))
///     .body(|_, steps| {
///         steps.register_step("works", |_| Ok(()))?;
///         Ok(())
///     });
/// let summary = TokioHarness::new()
///     .run(ScenarioRunRequest::new(scenario, &sink))
///     .unwrap();
/// assert_eq!(summary.total, 1);
/// ```
pub trait HarnessAdapter {
    /// Executes one scenario request and returns its summary.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError`] when the harness cannot provide its runtime.
    fn run<S, K>(&self, request: ScenarioRunRequest<'_, S, K>) -> Result<RunSummary, HarnessError>
    where
        S: ScenarioSource,
        K: MessageSink + ?Sized;
}
