//! Multi-thread harness that runs independent scenarios concurrently.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt as _;
use rstest_steps::{
    CancellationToken, MessageSink, RunSummary, ScenarioRunner, ScenarioSource, panic_message,
};
use tokio::runtime::Runtime;
use tokio::task::{Id, JoinError, JoinSet};

use crate::adapter::HarnessAdapter;
use crate::error::HarnessError;
use crate::request::ScenarioRunRequest;

/// Runs scenarios on a multi-thread Tokio runtime with a fixed number of
/// worker threads.
///
/// Worker threads are reused across scenarios. Each scenario gets its own
/// step registry, so scenarios sharing a worker never observe each other's
/// steps.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
/// use std::sync::Arc;
/// use rstest_steps::{CancellationToken, RecordingSink, ScenarioDefinition, ScenarioMetadata, ScenarioRunner};
/// use rstest_steps_harness::PooledHarness;
///
/// let scenarios: Vec<_> = (1..=4)
///     .map(|n| {
///         ScenarioDefinition::stateless(ScenarioMetadata::new(format!("Scenario {n}"), n))
///             .body(|_, steps| {
///                 steps.register_step("runs", |_| Ok(()))?;
///                 Ok(())
///             })
///     })
///     .collect();
/// let sink = Arc::new(RecordingSink::new());
/// let harness = PooledHarness::new(NonZeroUsize::new(2).unwrap());
/// let summary = harness
///     .run_all(scenarios, &sink, ScenarioRunner::default(), &CancellationToken::new())
///     .unwrap();
/// assert_eq!(summary.total, 4);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PooledHarness {
    workers: NonZeroUsize,
}

impl PooledHarness {
    /// Creates a harness with `workers` worker threads.
    #[must_use]
    pub const fn new(workers: NonZeroUsize) -> Self {
        Self { workers }
    }

    /// Returns the configured worker count.
    #[must_use]
    pub const fn workers(&self) -> NonZeroUsize {
        self.workers
    }

    fn runtime(&self) -> Result<Runtime, HarnessError> {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.workers.get())
            .thread_name("rstest-steps-worker")
            .enable_all()
            .build()
            .map_err(HarnessError::RuntimeBuild)
    }

    /// Runs every scenario in `sources` concurrently and aggregates their
    /// summaries.
    ///
    /// All scenarios share `sink` and `cancellation`; once the sink declines
    /// a message, scenarios that have not started yet report nothing.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::RuntimeBuild`] when the runtime cannot be
    /// built, or [`HarnessError::Worker`] when a worker task panics outside
    /// the runner's own panic capture.
    pub fn run_all<S, K>(
        &self,
        sources: Vec<S>,
        sink: &Arc<K>,
        runner: ScenarioRunner,
        cancellation: &CancellationToken,
    ) -> Result<RunSummary, HarnessError>
    where
        S: ScenarioSource + 'static,
        K: MessageSink + 'static,
    {
        let runtime = self.runtime()?;
        log::debug!(
            "running {} scenario(s) on {} worker thread(s)",
            sources.len(),
            self.workers
        );
        let result = runtime.block_on(async {
            let mut workers = JoinSet::new();
            let mut names = HashMap::new();
            for source in sources {
                let name = source.metadata().display_name().to_string();
                let sink = Arc::clone(sink);
                let cancellation = cancellation.clone();
                let worker_name = name.clone();
                let handle = workers.spawn(async move {
                    let outcome =
                        AssertUnwindSafe(runner.run(source, sink.as_ref(), &cancellation))
                            .catch_unwind()
                            .await
                            .map_err(|payload| panic_message(payload.as_ref()));
                    (worker_name, outcome)
                });
                names.insert(handle.id(), name);
            }

            let mut total = RunSummary::default();
            while let Some(joined) = workers.join_next_with_id().await {
                let (_, (scenario, outcome)) =
                    joined.map_err(|error| worker_error(&names, &error))?;
                match outcome {
                    Ok(summary) => {
                        log::trace!("scenario \"{scenario}\" returned {} result(s)", summary.total);
                        total += summary;
                    }
                    Err(reason) => {
                        log::warn!("scenario worker \"{scenario}\" panicked: {reason}");
                        workers.abort_all();
                        return Err(HarnessError::Worker { scenario, reason });
                    }
                }
            }
            Ok::<_, HarnessError>(total)
        });
        runtime.shutdown_background();
        result
    }
}

/// Converts a failed join into a [`HarnessError::Worker`] naming the scenario
/// the task was spawned for.
fn worker_error(names: &HashMap<Id, String>, error: &JoinError) -> HarnessError {
    let scenario = names
        .get(&error.id())
        .cloned()
        .unwrap_or_else(|| String::from("<unknown>"));
    HarnessError::Worker {
        scenario,
        reason: error.to_string(),
    }
}

impl Default for PooledHarness {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN);
        Self::new(workers)
    }
}

impl HarnessAdapter for PooledHarness {
    fn run<S, K>(&self, request: ScenarioRunRequest<'_, S, K>) -> Result<RunSummary, HarnessError>
    where
        S: ScenarioSource,
        K: MessageSink + ?Sized,
    {
        let runtime = self.runtime()?;
        let summary = runtime.block_on(request.run());
        runtime.shutdown_background();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::task::JoinSet;

    use super::worker_error;
    use crate::error::HarnessError;

    #[test]
    fn join_failures_name_their_scenario() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap_or_else(|err| panic!("runtime: {err}"));
        let error = runtime.block_on(async {
            let mut workers = JoinSet::new();
            let mut names = HashMap::new();
            names.insert(workers.spawn(async {}).id(), String::from("Quiet"));
            let handle = workers.spawn(async { panic!("worker escaped") });
            names.insert(handle.id(), String::from("Checkout"));

            let mut failure = None;
            while let Some(joined) = workers.join_next_with_id().await {
                if let Err(error) = joined {
                    failure = Some(worker_error(&names, &error));
                }
            }
            failure
        });

        match error {
            Some(HarnessError::Worker { scenario, reason }) => {
                assert_eq!(scenario, "Checkout");
                assert!(reason.contains("panicked"), "reason: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unmapped_join_failure_falls_back_to_unknown() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap_or_else(|err| panic!("runtime: {err}"));
        let error = runtime.block_on(async {
            let mut workers: JoinSet<()> = JoinSet::new();
            workers.spawn(async { panic!("worker escaped") });
            match workers.join_next_with_id().await {
                Some(Err(error)) => worker_error(&HashMap::new(), &error),
                other => panic!("expected a join failure, got {other:?}"),
            }
        });

        assert!(
            matches!(error, HarnessError::Worker { ref scenario, .. } if scenario == "<unknown>")
        );
    }
}
