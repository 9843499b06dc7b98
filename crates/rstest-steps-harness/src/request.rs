//! A harness execution request for one scenario.

use rstest_steps::{
    CancellationToken, MessageSink, RunSummary, ScenarioMetadata, ScenarioRunner, ScenarioSource,
};

/// A scenario together with the sink, runner and cancellation token it runs
/// with.
///
/// # Examples
///
/// ```
/// use rstest_steps::{RecordingSink, ScenarioDefinition, ScenarioMetadata};
/// use rstest_steps_harness::ScenarioRunRequest;
///
/// let sink = RecordingSink::new();
/// let scenario = ScenarioDefinition::stateless(ScenarioMetadata::new("Sign in", 4))
///     .body(|_, _| Ok(()));
/// let request = ScenarioRunRequest::new(scenario, &sink);
/// assert_eq!(request.metadata().display_name(), "Sign in");
/// assert_eq!(request.metadata().scenario_number(), 4);
/// ```
pub struct ScenarioRunRequest<'a, S, K: ?Sized> {
    source: S,
    sink: &'a K,
    runner: ScenarioRunner,
    cancellation: CancellationToken,
}

impl<'a, S, K> ScenarioRunRequest<'a, S, K>
where
    S: ScenarioSource,
    K: MessageSink + ?Sized,
{
    /// Creates a request using the default runner and a fresh token.
    #[must_use]
    pub fn new(source: S, sink: &'a K) -> Self {
        Self {
            source,
            sink,
            runner: ScenarioRunner::default(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Replaces the runner used for the scenario.
    #[must_use]
    pub fn with_runner(mut self, runner: ScenarioRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Replaces the cancellation token observed by the run.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Returns the scenario metadata.
    #[must_use]
    pub fn metadata(&self) -> &ScenarioMetadata {
        self.source.metadata()
    }

    /// Returns the cancellation token observed by the run.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Runs the scenario on the current runtime.
    pub async fn run(self) -> RunSummary {
        self.runner
            .run(self.source, self.sink, &self.cancellation)
            .await
    }
}
