//! Harness adapters for `rstest-steps`.
//!
//! A harness owns the Tokio runtime a scenario runs in. [`TokioHarness`]
//! builds a current-thread runtime per scenario; [`PooledHarness`] runs a
//! batch of independent scenarios concurrently on a fixed set of worker
//! threads.

mod adapter;
mod error;
mod pooled;
mod request;
mod tokio_harness;

pub use adapter::HarnessAdapter;
pub use error::HarnessError;
pub use pooled::PooledHarness;
pub use request::ScenarioRunRequest;
pub use tokio_harness::TokioHarness;
