//! Unit tests for the runner internals.

use std::sync::{Mutex, Once, PoisonError};
use std::time::Duration;

use rstest::rstest;
use tokio_util::sync::CancellationToken;

use super::{FailureLatch, Reporter, run_step};
use crate::error::StepFailure;
use crate::executor::StepExecutor;
use crate::messages::{ExecutionMessage, FailureInfo, TestCase};
use crate::sink::{InterceptingSink, MessageSink as _, RecordingSink};
use crate::step::Step;
use crate::summary::RunSummary;

fn labels(sink: &RecordingSink) -> Vec<&'static str> {
    sink.messages().iter().map(ExecutionMessage::label).collect()
}

fn step_case(name: &str) -> TestCase {
    TestCase::step("Runner", 1, 1, name)
}

struct CapturingLogger;

static RECORDS: Mutex<Vec<(log::Level, String)>> = Mutex::new(Vec::new());
static LOGGER: CapturingLogger = CapturingLogger;
static INIT_LOGGER: Once = Once::new();

impl log::Log for CapturingLogger {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        RECORDS
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

fn capture_logs() {
    INIT_LOGGER.call_once(|| {
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);
    });
}

fn logged_at(level: log::Level, needle: &str) -> bool {
    RECORDS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .iter()
        .any(|(recorded, message)| *recorded == level && message.contains(needle))
}

fn failed(test: TestCase) -> ExecutionMessage {
    ExecutionMessage::TestFailed {
        test,
        elapsed: Duration::from_millis(1),
        failure: FailureInfo::from(&StepFailure::Action("stale".into())),
    }
}

#[test]
fn reporter_cancels_the_run_when_the_sink_declines() {
    let sink = RecordingSink::stop_after(1);
    let token = CancellationToken::new();
    let reporter = Reporter::new(&sink, &token);

    assert!(!reporter.emit(ExecutionMessage::TestStarting {
        test: step_case("first"),
    }));
    assert!(token.is_cancelled());
    assert!(reporter.is_cancelled());
}

#[test]
fn sink_stop_is_logged_as_a_warning() {
    capture_logs();
    let sink = RecordingSink::stop_after(0);
    let token = CancellationToken::new();
    let reporter = Reporter::new(&sink, &token);

    assert!(!reporter.emit(ExecutionMessage::TestStarting {
        test: step_case("declined"),
    }));

    assert!(logged_at(log::Level::Warn, "message sink requested a stop"));
    assert!(!logged_at(log::Level::Info, "message sink requested a stop"));
}

#[test]
fn latch_ignores_failures_of_other_tests() {
    let sink = RecordingSink::new();
    let latch = FailureLatch::new(step_case("current"));
    let observed = InterceptingSink::new(&sink, |message: &ExecutionMessage| {
        latch.observe(message);
    });

    assert!(observed.queue_message(failed(TestCase::step("Runner", 1, 2, "later"))));
    assert!(observed.queue_message(failed(TestCase::step("Runner", 2, 1, "current"))));
    assert!(!latch.seen());
    assert_eq!(labels(&sink), ["failed", "failed"]);

    assert!(observed.queue_message(ExecutionMessage::TestPassed {
        test: step_case("current"),
        elapsed: Duration::ZERO,
    }));
    assert!(!latch.seen());

    assert!(observed.queue_message(failed(step_case("current"))));
    assert!(latch.seen());
}

#[test]
fn rejected_start_suppresses_the_failure_message() {
    let sink = RecordingSink::stop_after(1);
    let token = CancellationToken::new();
    let reporter = Reporter::new(&sink, &token);
    let failure = FailureInfo::new(
        crate::messages::FailureKind::Invocation,
        &crate::error::ScenarioError::Invocation("boom".into()),
    );

    let summary = reporter.report_failure(
        TestCase::scenario("Runner", 1),
        failure,
        Duration::from_millis(2),
    );

    assert_eq!(labels(&sink), ["starting", "finished"]);
    assert_eq!(summary, RunSummary::failed(Duration::from_millis(2)));
}

#[rstest]
#[case::passing(false)]
#[case::failing(true)]
#[tokio::test]
async fn run_step_observes_only_its_own_failure(#[case] fails: bool) {
    let sink = RecordingSink::new();
    let token = CancellationToken::new();
    let reporter = Reporter::new(&sink, &token);
    let step = Step::new("maybe fails", move |_| {
        if fails { Err("step failed".into()) } else { Ok(()) }
    })
    .unwrap_or_else(|err| panic!("invalid step: {err}"));

    let run = run_step(
        &StepExecutor::new(),
        step_case("maybe fails"),
        step.into_parts(),
        &reporter,
    )
    .await;

    assert!(run.executed);
    assert_eq!(run.failure_observed, fails);
    assert_eq!(run.summary.failed, usize::from(fails));
    let outcome = if fails { "failed" } else { "passed" };
    assert_eq!(labels(&sink), ["starting", outcome, "finished"]);
}

#[tokio::test]
async fn rejected_step_start_skips_execution() {
    let sink = RecordingSink::stop_after(1);
    let token = CancellationToken::new();
    let reporter = Reporter::new(&sink, &token);
    let step = Step::new("never runs", |_| panic!("must not run"))
        .unwrap_or_else(|err| panic!("invalid step: {err}"));

    let run = run_step(
        &StepExecutor::new(),
        step_case("never runs"),
        step.into_parts(),
        &reporter,
    )
    .await;

    assert!(!run.executed);
    assert!(!run.failure_observed);
    assert_eq!(run.summary, RunSummary::default());
    assert_eq!(labels(&sink), ["starting", "finished"]);
    assert!(token.is_cancelled());
}
