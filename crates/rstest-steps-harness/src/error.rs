//! Errors raised by harness adapters.

use thiserror::Error;

/// Failures of the harness itself, as opposed to scenario failures, which are
/// reported through the message sink.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HarnessError {
    /// The Tokio runtime could not be built.
    #[error("failed to build Tokio runtime: {0}")]
    RuntimeBuild(#[source] std::io::Error),
    /// A pooled worker task panicked or was aborted before finishing.
    #[error("scenario worker \"{scenario}\" did not complete: {reason}")]
    Worker {
        /// Display name of the scenario the worker was running.
        scenario: String,
        /// Rendered join failure.
        reason: String,
    },
}
