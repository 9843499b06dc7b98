//! Tokio current-thread harness adapter for scenario execution.

use rstest_steps::{MessageSink, RunSummary, ScenarioSource};

use crate::adapter::HarnessAdapter;
use crate::error::HarnessError;
use crate::request::ScenarioRunRequest;

/// Executes each scenario request inside its own Tokio current-thread runtime
/// with a [`LocalSet`](tokio::task::LocalSet).
///
/// `tokio::spawn`, `tokio::task::spawn_local` and the runtime's timer are all
/// available inside step actions, with or without a deadline. Asynchronous
/// steps always run on the scenario's task inside the `LocalSet`; synchronous
/// steps with a deadline run on the runtime's blocking pool.
///
/// The runtime is shut down without waiting once the scenario returns, so a
/// synchronous step abandoned after its deadline keeps running in the
/// background instead of holding up the harness. After the scenario finishes the harness runs a
/// single `yield_now` tick, which lets one-poll `spawn_local` tasks complete
/// but does not drain the `LocalSet`.
///
/// # Examples
///
/// ```
/// use rstest_steps::{RecordingSink, ScenarioDefinition, ScenarioMetadata};
/// use rstest_steps_harness::{HarnessAdapter, ScenarioRunRequest, TokioHarness};
///
/// let sink = RecordingSink::new();
/// let scenario = ScenarioDefinition::stateless(ScenarioMetadata::new("Async scenario", 5))
///     .body(|_, steps| {
///         steps.register_async_step("sleeps", |_token| async {
///             tokio::time::sleep(std::time::Duration::from_millis(1)).await;
///             Ok(())
///         })?;
///         Ok(())
///     });
/// let harness = TokioHarness::new();
/// let summary = harness.run(ScenarioRunRequest::new(scenario, &sink)).unwrap();
/// assert!(summary.is_success());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioHarness;

impl TokioHarness {
    /// Creates a new Tokio harness instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HarnessAdapter for TokioHarness {
    fn run<S, K>(&self, request: ScenarioRunRequest<'_, S, K>) -> Result<RunSummary, HarnessError>
    where
        S: ScenarioSource,
        K: MessageSink + ?Sized,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(HarnessError::RuntimeBuild)?;
        log::trace!(
            "running scenario \"{}\" on a current-thread runtime",
            request.metadata().display_name()
        );
        let local_set = tokio::task::LocalSet::new();
        let summary = local_set.block_on(&runtime, async {
            let summary = request.run().await;
            tokio::task::yield_now().await;
            summary
        });
        drop(local_set);
        runtime.shutdown_background();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the Tokio current-thread harness.

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::TokioHarness;
    use crate::{HarnessAdapter, ScenarioRunRequest};
    use rstest::{fixture, rstest};
    use rstest_steps::{RecordingSink, ScenarioDefinition, ScenarioMetadata};

    #[fixture]
    fn harness() -> TokioHarness {
        TokioHarness::new()
    }

    #[rstest]
    fn tokio_runtime_is_active_during_steps(harness: TokioHarness) {
        let saw_runtime = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&saw_runtime);
        let sink = RecordingSink::new();
        let scenario = ScenarioDefinition::stateless(ScenarioMetadata::default()).body(
            move |_, steps| {
                steps.register_step("inspects runtime", move |_| {
                    flag.store(
                        tokio::runtime::Handle::try_current().is_ok(),
                        Ordering::SeqCst,
                    );
                    Ok(())
                })?;
                Ok(())
            },
        );

        let summary = harness
            .run(ScenarioRunRequest::new(scenario, &sink))
            .unwrap_or_else(|err| panic!("harness failed: {err}"));

        assert!(summary.is_success());
        assert!(saw_runtime.load(Ordering::SeqCst));
    }

    #[rstest]
    #[case::untimed(None)]
    #[case::timed(Some(5_000))]
    fn spawn_local_is_available_in_async_steps(
        harness: TokioHarness,
        #[case] timeout_millis: Option<u64>,
    ) {
        let sink = RecordingSink::new();
        let scenario = ScenarioDefinition::stateless(ScenarioMetadata::default()).body(
            move |_, steps| {
                let step = steps.register_async_step("spawns locally", |_token| async {
                    let value = tokio::task::spawn_local(async { 21 * 2 }).await?;
                    if value == 42 { Ok(()) } else { Err("wrong value".into()) }
                })?;
                if let Some(millis) = timeout_millis {
                    step.with_timeout_millis(millis);
                }
                Ok(())
            },
        );

        let summary = harness
            .run(ScenarioRunRequest::new(scenario, &sink))
            .unwrap_or_else(|err| panic!("harness failed: {err}"));

        assert!(summary.is_success(), "{:?}", sink.messages());
    }
}
