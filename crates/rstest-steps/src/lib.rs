//! Core library for `rstest-steps`.
//!
//! Scenario bodies register named steps on a [`StepRegistry`]; the
//! [`ScenarioRunner`] then executes them one by one, reporting each as its
//! own test on a [`MessageSink`]. A failing step short-circuits the rest of
//! its scenario, optional deadlines bound how long a step may run, and errors
//! raised while preparing a scenario are reported as a single scenario-level
//! failure.

mod config;
mod error;
mod executor;
mod messages;
mod panic;
mod registry;
mod runner;
mod sink;
mod step;
mod summary;

pub use config::{
    DEFAULT_TIMEOUT_ENV, RunnerConfig, clear_default_timeout_override, default_timeout,
    set_default_timeout,
};
pub use error::{
    BoxError, ConfigError, DiscoveryError, PrecedingStepFailureError, RegistryError,
    ScenarioError, StepFailure, StepTimeoutError,
};
pub use executor::{StepExecutor, StepOutcome, StepResult};
pub use messages::{ExecutionMessage, FailureInfo, FailureKind, TestCase};
pub use panic::{PanicError, panic_message};
pub use registry::StepRegistry;
pub use runner::{
    BodyFuture, DeferredScenario, ScenarioBuilder, ScenarioDefinition, ScenarioMetadata,
    ScenarioRunner, ScenarioSource,
};
pub use sink::{InterceptingSink, LogSink, MessageSink, RecordingSink};
pub use step::{ActionFuture, ActionResult, Step};
pub use summary::RunSummary;
pub use tokio_util::sync::CancellationToken;
