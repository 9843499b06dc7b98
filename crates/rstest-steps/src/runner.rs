//! Scenario execution.
//!
//! [`ScenarioRunner::run`] resolves a scenario, builds its fixture, runs the
//! background routines and the body, then executes the registered steps in
//! order. Each step reports `TestStarting`, one outcome message and
//! `TestFinished` to the sink. After the first failing step every remaining
//! step is reported as failed without running.

mod definition;

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt as _;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use definition::FixtureSource;
pub use definition::{
    BodyFuture, DeferredScenario, ScenarioBuilder, ScenarioDefinition, ScenarioMetadata,
    ScenarioSource,
};

use crate::config::RunnerConfig;
use crate::error::{BoxError, PrecedingStepFailureError, ScenarioError, StepFailure};
use crate::executor::{StepExecutor, StepOutcome};
use crate::messages::{ExecutionMessage, FailureInfo, TestCase};
use crate::panic::PanicError;
use crate::registry::StepRegistry;
use crate::sink::{InterceptingSink, MessageSink};
use crate::step::{Step, StepParts};
use crate::summary::RunSummary;

type Teardown = Box<dyn FnOnce() + Send + 'static>;

/// Runs scenarios against a [`MessageSink`].
///
/// # Examples
///
/// ```
/// use rstest_steps::{
///     CancellationToken, RecordingSink, ScenarioDefinition, ScenarioMetadata, ScenarioRunner,
/// };
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let scenario = ScenarioDefinition::stateless(ScenarioMetadata::new("Greeting", 1))
///     .body(|_, steps| {
///         steps.register_step("say hello", |_| Ok(()))?;
///         steps.register_step("wave", |_| Ok(()))?;
///         Ok(())
///     });
/// let sink = RecordingSink::new();
/// let summary = ScenarioRunner::default()
///     .run(scenario, &sink, &CancellationToken::new())
///     .await;
/// assert_eq!(summary.total, 2);
/// assert!(summary.is_success());
/// assert_eq!(sink.len(), 6);
/// # });
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct ScenarioRunner {
    config: RunnerConfig,
}

impl ScenarioRunner {
    /// Create a runner with the given configuration.
    #[must_use]
    pub const fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// Returns the runner configuration.
    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run one scenario, queueing its messages on `sink`.
    ///
    /// Errors raised before the first step runs are reported as a single
    /// scenario-level failure. When `sink` declines a message, or
    /// `cancellation` is cancelled, no further steps are scheduled. The
    /// returned summary counts only the results that were reported.
    pub async fn run<S, K>(
        &self,
        source: S,
        sink: &K,
        cancellation: &CancellationToken,
    ) -> RunSummary
    where
        S: ScenarioSource,
        K: MessageSink + ?Sized,
    {
        let metadata = source.metadata().clone();
        let reporter = Reporter::new(sink, cancellation);

        if cancellation.is_cancelled() {
            log::debug!(
                "cancellation requested before scenario \"{}\" started",
                metadata.display_name()
            );
            return RunSummary::default();
        }

        let scenario = TestCase::scenario(metadata.display_name(), metadata.scenario_number());
        if let Some(reason) = metadata.skip_reason() {
            log::debug!("scenario \"{}\" skipped: {reason}", metadata.display_name());
            reporter.emit(ExecutionMessage::TestSkipped {
                test: scenario,
                reason: reason.to_string(),
            });
            return RunSummary::skipped();
        }

        log::debug!("running scenario \"{}\"", metadata.display_name());
        let started = Instant::now();
        let steps = match prepare(source, cancellation).await {
            Ok(Some(steps)) => steps,
            Ok(None) => {
                log::debug!(
                    "cancellation requested while preparing scenario \"{}\"",
                    metadata.display_name()
                );
                return RunSummary::default();
            }
            Err(error) => {
                log::warn!(
                    "scenario \"{}\" failed before running steps: {error}",
                    metadata.display_name()
                );
                return reporter.report_failure(
                    scenario,
                    FailureInfo::from(&error),
                    started.elapsed(),
                );
            }
        };

        let summary = self.run_steps(&metadata, steps, &reporter).await;
        log::debug!(
            "scenario \"{}\" finished: {} result(s), {} failed, {} skipped",
            metadata.display_name(),
            summary.total,
            summary.failed,
            summary.skipped
        );
        summary
    }

    async fn run_steps<K>(
        &self,
        metadata: &ScenarioMetadata,
        steps: Vec<Step>,
        reporter: &Reporter<'_, K>,
    ) -> RunSummary
    where
        K: MessageSink + ?Sized,
    {
        let executor = StepExecutor::new().with_default_timeout(self.config.default_timeout());
        let mut summary = RunSummary::default();
        let mut cascade = Cascade::Running;
        let mut teardowns: Vec<Teardown> = Vec::new();
        let total = steps.len();

        for (index, step) in steps.into_iter().enumerate() {
            if reporter.is_cancelled() {
                log::debug!(
                    "run cancelled; {} step(s) of \"{}\" not scheduled",
                    total - index,
                    metadata.display_name()
                );
                break;
            }
            let mut parts = step.into_parts();
            let test = TestCase::step(
                metadata.display_name(),
                metadata.scenario_number(),
                index + 1,
                &parts.name,
            );
            match &cascade {
                Cascade::ShortCircuited { failed_step } => {
                    let failure =
                        StepFailure::from(PrecedingStepFailureError::new(failed_step.clone()));
                    summary +=
                        reporter.report_failure(test, FailureInfo::from(&failure), Duration::ZERO);
                }
                Cascade::Running => {
                    let teardown = parts.teardown.take();
                    let name = parts.name.clone();
                    let run = run_step(&executor, test, parts, reporter).await;
                    if run.executed {
                        teardowns.extend(teardown);
                    }
                    if run.failure_observed {
                        cascade = Cascade::ShortCircuited { failed_step: name };
                    }
                    summary += run.summary;
                }
            }
        }

        run_teardowns(metadata, teardowns);
        summary
    }
}

enum Cascade {
    Running,
    ShortCircuited { failed_step: String },
}

struct StepRun {
    summary: RunSummary,
    executed: bool,
    failure_observed: bool,
}

/// Records whether a failure was reported for one specific test.
///
/// Failures queued for any other test case pass through without tripping
/// the latch.
struct FailureLatch {
    current: TestCase,
    seen: AtomicBool,
}

impl FailureLatch {
    const fn new(current: TestCase) -> Self {
        Self {
            current,
            seen: AtomicBool::new(false),
        }
    }

    fn observe(&self, message: &ExecutionMessage) {
        if message.is_failure() && message.test() == &self.current {
            self.seen.store(true, Ordering::Release);
        }
    }

    fn seen(&self) -> bool {
        self.seen.load(Ordering::Acquire)
    }
}

/// Queues messages and cancels the run when the sink asks to stop.
struct Reporter<'a, K: ?Sized> {
    sink: &'a K,
    cancellation: &'a CancellationToken,
}

impl<'a, K: MessageSink + ?Sized> Reporter<'a, K> {
    const fn new(sink: &'a K, cancellation: &'a CancellationToken) -> Self {
        Self { sink, cancellation }
    }

    fn emit(&self, message: ExecutionMessage) -> bool {
        let accepted = self.sink.queue_message(message);
        if !accepted && !self.cancellation.is_cancelled() {
            log::warn!("message sink requested a stop; cancelling the run");
            self.cancellation.cancel();
        }
        accepted
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    fn report_failure(&self, test: TestCase, failure: FailureInfo, elapsed: Duration) -> RunSummary {
        if self.emit(ExecutionMessage::TestStarting { test: test.clone() }) {
            self.emit(ExecutionMessage::TestFailed {
                test: test.clone(),
                elapsed,
                failure,
            });
        }
        self.emit(ExecutionMessage::TestFinished { test, elapsed });
        RunSummary::failed(elapsed)
    }
}

async fn run_step<K>(
    executor: &StepExecutor,
    test: TestCase,
    parts: StepParts,
    reporter: &Reporter<'_, K>,
) -> StepRun
where
    K: MessageSink + ?Sized,
{
    let latch = FailureLatch::new(test.clone());
    let observed = InterceptingSink::new(reporter.sink, |message: &ExecutionMessage| {
        latch.observe(message);
    });
    let step_reporter = Reporter::new(&observed, reporter.cancellation);

    if !step_reporter.emit(ExecutionMessage::TestStarting { test: test.clone() }) {
        step_reporter.emit(ExecutionMessage::TestFinished {
            test,
            elapsed: Duration::ZERO,
        });
        return StepRun {
            summary: RunSummary::default(),
            executed: false,
            failure_observed: false,
        };
    }

    log::trace!("running step \"{test}\"");
    let result = executor.execute_parts(parts).await;
    let elapsed = result.elapsed();
    let (summary, executed) = match result.into_outcome() {
        StepOutcome::Passed => {
            step_reporter.emit(ExecutionMessage::TestPassed {
                test: test.clone(),
                elapsed,
            });
            (RunSummary::passed(elapsed), true)
        }
        StepOutcome::Failed(failure) => {
            log::debug!("step \"{test}\" failed: {failure}");
            step_reporter.emit(ExecutionMessage::TestFailed {
                test: test.clone(),
                elapsed,
                failure: FailureInfo::from(&failure),
            });
            (RunSummary::failed(elapsed), true)
        }
        StepOutcome::Skipped(reason) => {
            step_reporter.emit(ExecutionMessage::TestSkipped {
                test: test.clone(),
                reason,
            });
            (RunSummary::skipped(), false)
        }
    };
    step_reporter.emit(ExecutionMessage::TestFinished { test, elapsed });

    StepRun {
        summary,
        executed,
        failure_observed: latch.seen(),
    }
}

/// Resolve the scenario and collect its steps.
///
/// Returns `Ok(None)` when the run was cancelled before the body ran.
async fn prepare<S: ScenarioSource>(
    source: S,
    cancellation: &CancellationToken,
) -> Result<Option<Vec<Step>>, ScenarioError> {
    let ScenarioDefinition {
        fixture,
        backgrounds,
        body,
        ..
    } = source.resolve()?;

    let mut fixture = match fixture {
        FixtureSource::Stateless(fixture) => fixture,
        FixtureSource::Factory(factory) => panic::catch_unwind(AssertUnwindSafe(factory))
            .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())))
            .map_err(ScenarioError::FixtureConstruction)?,
    };

    for (index, background) in backgrounds.into_iter().enumerate() {
        if cancellation.is_cancelled() {
            return Ok(None);
        }
        guarded(async { background(&mut fixture).await })
            .await
            .map_err(|source| ScenarioError::Background {
                index: index + 1,
                source,
            })?;
    }
    if cancellation.is_cancelled() {
        return Ok(None);
    }

    let mut registry = StepRegistry::new();
    guarded(async { body(&mut fixture, &mut registry).await })
        .await
        .map_err(ScenarioError::Invocation)?;
    Ok(Some(registry.extract_steps()))
}

async fn guarded<Fut>(future: Fut) -> Result<(), BoxError>
where
    Fut: Future<Output = Result<(), BoxError>>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(panic_error(payload.as_ref())))
}

fn panic_error(payload: &(dyn std::any::Any + Send)) -> BoxError {
    Box::new(PanicError::from_payload(payload))
}

fn run_teardowns(metadata: &ScenarioMetadata, teardowns: Vec<Teardown>) {
    for teardown in teardowns.into_iter().rev() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(teardown)) {
            log::warn!(
                "teardown in scenario \"{}\" panicked: {}",
                metadata.display_name(),
                crate::panic::panic_message(payload.as_ref())
            );
        }
    }
}

#[cfg(test)]
mod tests;
