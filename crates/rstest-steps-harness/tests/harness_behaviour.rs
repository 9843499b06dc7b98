//! Behavioural tests for harness adapter execution semantics.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

use rstest::{fixture, rstest};
use rstest_steps::{
    BoxError, CancellationToken, ExecutionMessage, RecordingSink, RunnerConfig,
    ScenarioDefinition, ScenarioMetadata, ScenarioRunner,
};
use rstest_steps_harness::{HarnessAdapter, PooledHarness, ScenarioRunRequest, TokioHarness};

const STEPS_PER_SCENARIO: usize = 3;

#[fixture]
fn sink() -> Arc<RecordingSink> {
    Arc::new(RecordingSink::new())
}

fn pool(workers: usize) -> PooledHarness {
    PooledHarness::new(NonZeroUsize::new(workers).unwrap_or(NonZeroUsize::MIN))
}

/// A scenario whose body yields between registrations so that scenarios
/// sharing a worker interleave while their bodies run.
fn interleaving(number: usize, threads: &Arc<Mutex<HashSet<ThreadId>>>) -> ScenarioDefinition {
    let threads = Arc::clone(threads);
    ScenarioDefinition::stateless(ScenarioMetadata::new(format!("S{number}"), number)).body_async(
        move |_, steps| {
            Box::pin(async move {
                for index in 1..=STEPS_PER_SCENARIO {
                    let threads = Arc::clone(&threads);
                    steps.register_step(format!("S{number}-step-{index}"), move |_| {
                        threads
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(std::thread::current().id());
                        Ok(())
                    })?;
                    tokio::task::yield_now().await;
                }
                Ok::<(), BoxError>(())
            })
        },
    )
}

#[rstest]
fn pooled_scenarios_never_observe_each_others_steps(sink: Arc<RecordingSink>) {
    let threads = Arc::new(Mutex::new(HashSet::new()));
    let scenarios: Vec<_> = (1..=8).map(|n| interleaving(n, &threads)).collect();

    let summary = pool(2)
        .run_all(
            scenarios,
            &sink,
            ScenarioRunner::default(),
            &CancellationToken::new(),
        )
        .unwrap_or_else(|err| panic!("harness failed: {err}"));

    assert_eq!(summary.total, 8 * STEPS_PER_SCENARIO);
    assert!(summary.is_success());
    for message in sink.messages() {
        let test = message.test();
        let scenario = format!("S{}", test.scenario_number());
        let step = test
            .step_number()
            .unwrap_or_else(|| panic!("scenario-level message: {message:?}"));
        assert_eq!(
            test.display_name(),
            format!(
                "{scenario} [{:02}.{step:02}] {scenario}-step-{step}",
                test.scenario_number()
            )
        );
    }
    let used = threads.lock().unwrap_or_else(PoisonError::into_inner).len();
    assert!((1..=2).contains(&used), "steps ran on {used} threads");
}

#[rstest]
fn pooled_messages_keep_per_scenario_order(sink: Arc<RecordingSink>) {
    let threads = Arc::new(Mutex::new(HashSet::new()));
    let scenarios: Vec<_> = (1..=4).map(|n| interleaving(n, &threads)).collect();

    pool(3)
        .run_all(
            scenarios,
            &sink,
            ScenarioRunner::default(),
            &CancellationToken::new(),
        )
        .unwrap_or_else(|err| panic!("harness failed: {err}"));

    for number in 1..=4 {
        let mine: Vec<_> = sink
            .messages()
            .into_iter()
            .filter(|message| message.test().scenario_number() == number)
            .map(|message| (message.test().step_number(), message.label()))
            .collect();
        let expected: Vec<_> = (1..=STEPS_PER_SCENARIO)
            .flat_map(|step| {
                ["starting", "passed", "finished"].map(|label| (Some(step), label))
            })
            .collect();
        assert_eq!(mine, expected, "scenario S{number}");
    }
}

#[rstest]
fn tokio_harness_returns_before_abandoned_step_finishes(sink: Arc<RecordingSink>) {
    let scenario = ScenarioDefinition::stateless(ScenarioMetadata::new("Slow", 1)).body(
        |_, steps| {
            steps
                .register_step("blocks", |_| {
                    std::thread::sleep(Duration::from_millis(500));
                    Ok(())
                })?
                .with_timeout_millis(20);
            Ok(())
        },
    );

    let started = Instant::now();
    let summary = TokioHarness::new()
        .run(ScenarioRunRequest::new(scenario, sink.as_ref()))
        .unwrap_or_else(|err| panic!("harness failed: {err}"));

    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(summary.failed, 1);
    let failure = sink
        .messages()
        .iter()
        .find_map(|message| message.failure().map(|f| f.message().to_string()));
    assert_eq!(
        failure.as_deref(),
        Some("Test execution time exceeded: 20ms")
    );
}

#[rstest]
fn request_runner_configuration_is_applied(sink: Arc<RecordingSink>) {
    let scenario = ScenarioDefinition::stateless(ScenarioMetadata::new("Defaults", 1)).body(
        |_, steps| {
            steps.register_async_step("waits", |_token| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })?;
            Ok(())
        },
    );
    let runner =
        ScenarioRunner::new(RunnerConfig::default().with_default_timeout(Duration::from_millis(25)));

    let summary = TokioHarness::new()
        .run(ScenarioRunRequest::new(scenario, sink.as_ref()).with_runner(runner))
        .unwrap_or_else(|err| panic!("harness failed: {err}"));

    assert_eq!(summary.failed, 1);
}

#[rstest]
fn shared_cancellation_stops_pending_scenarios(sink: Arc<RecordingSink>) {
    let token = CancellationToken::new();
    token.cancel();
    let threads = Arc::new(Mutex::new(HashSet::new()));
    let scenarios: Vec<_> = (1..=3).map(|n| interleaving(n, &threads)).collect();

    let summary = pool(2)
        .run_all(scenarios, &sink, ScenarioRunner::default(), &token)
        .unwrap_or_else(|err| panic!("harness failed: {err}"));

    assert_eq!(summary.total, 0);
    assert!(sink.is_empty());
}

#[rstest]
fn pooled_harness_runs_single_requests(sink: Arc<RecordingSink>) {
    let scenario = ScenarioDefinition::stateless(ScenarioMetadata::new("Single", 1)).body(
        |_, steps| {
            steps.register_step("runs", |_| Ok(()))?;
            Ok(())
        },
    );

    let summary = pool(1)
        .run(ScenarioRunRequest::new(scenario, sink.as_ref()))
        .unwrap_or_else(|err| panic!("harness failed: {err}"));

    assert_eq!(summary.total, 1);
    assert!(
        sink.messages()
            .iter()
            .all(|message| !matches!(message, ExecutionMessage::TestFailed { .. }))
    );
}
