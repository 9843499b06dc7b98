//! Reporting channel abstractions.
//!
//! A [`MessageSink`] receives every [`ExecutionMessage`] the runner produces.
//! Returning `false` from [`MessageSink::queue_message`] asks the runner to
//! stop; the runner then cancels its token and schedules no further work.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::messages::ExecutionMessage;

/// Consumer of execution messages.
pub trait MessageSink: Send + Sync {
    /// Queue one message. Returns `false` when the consumer wants execution
    /// to stop.
    fn queue_message(&self, message: ExecutionMessage) -> bool;
}

impl<S: MessageSink + ?Sized> MessageSink for &S {
    fn queue_message(&self, message: ExecutionMessage) -> bool {
        (**self).queue_message(message)
    }
}

impl<S: MessageSink + ?Sized> MessageSink for Arc<S> {
    fn queue_message(&self, message: ExecutionMessage) -> bool {
        (**self).queue_message(message)
    }
}

impl<S: MessageSink + ?Sized> MessageSink for Box<S> {
    fn queue_message(&self, message: ExecutionMessage) -> bool {
        (**self).queue_message(message)
    }
}

/// Pass-through sink that shows every message to an observer before
/// forwarding it unchanged.
///
/// The inner sink's return value is handed back to the caller, so a stop
/// request from downstream still reaches the runner.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use rstest_steps::{ExecutionMessage, InterceptingSink, MessageSink, RecordingSink, TestCase};
///
/// let inner = RecordingSink::new();
/// let saw_start = AtomicBool::new(false);
/// let sink = InterceptingSink::new(&inner, |message: &ExecutionMessage| {
///     if matches!(message, ExecutionMessage::TestStarting { .. }) {
///         saw_start.store(true, Ordering::Relaxed);
///     }
/// });
///
/// assert!(sink.queue_message(ExecutionMessage::TestStarting {
///     test: TestCase::scenario("demo", 1),
/// }));
/// assert!(saw_start.load(Ordering::Relaxed));
/// assert_eq!(inner.len(), 1);
/// ```
pub struct InterceptingSink<S, O> {
    inner: S,
    observer: O,
}

impl<S, O> InterceptingSink<S, O>
where
    S: MessageSink,
    O: Fn(&ExecutionMessage) + Send + Sync,
{
    /// Wrap `inner`, calling `observer` for every message.
    pub const fn new(inner: S, observer: O) -> Self {
        Self { inner, observer }
    }

    /// Returns the wrapped sink.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S, O> MessageSink for InterceptingSink<S, O>
where
    S: MessageSink,
    O: Fn(&ExecutionMessage) + Send + Sync,
{
    fn queue_message(&self, message: ExecutionMessage) -> bool {
        (self.observer)(&message);
        self.inner.queue_message(message)
    }
}

/// Sink that keeps every message in memory, in queue order.
///
/// An optional limit makes the sink request a stop once that many messages
/// have been accepted, which mirrors a consumer that gives up mid-run.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<ExecutionMessage>>,
    stop_after: Option<usize>,
}

impl RecordingSink {
    /// Create a sink that accepts every message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a sink that asks the runner to stop once `limit` messages have
    /// been recorded.
    #[must_use]
    pub fn stop_after(limit: usize) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            stop_after: Some(limit),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ExecutionMessage>> {
        match self.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Returns a snapshot of the recorded messages.
    #[must_use]
    pub fn messages(&self) -> Vec<ExecutionMessage> {
        self.lock().clone()
    }

    /// Remove and return every recorded message.
    #[must_use]
    pub fn drain(&self) -> Vec<ExecutionMessage> {
        self.lock().drain(..).collect()
    }

    /// Number of recorded messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl MessageSink for RecordingSink {
    fn queue_message(&self, message: ExecutionMessage) -> bool {
        let mut messages = self.lock();
        messages.push(message);
        self.stop_after.is_none_or(|limit| messages.len() < limit)
    }
}

/// Sink that writes a line per outcome to the `log` facade before forwarding.
#[derive(Debug, Default)]
pub struct LogSink<S> {
    inner: S,
}

impl<S: MessageSink> LogSink<S> {
    /// Wrap `inner`, logging every outcome message.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: MessageSink> MessageSink for LogSink<S> {
    fn queue_message(&self, message: ExecutionMessage) -> bool {
        match &message {
            ExecutionMessage::TestPassed { test, elapsed } => {
                log::info!("{test} passed in {elapsed:?}");
            }
            ExecutionMessage::TestFailed { test, failure, .. } => {
                log::warn!("{test} failed: {}", failure.message());
            }
            ExecutionMessage::TestSkipped { test, reason } => {
                log::info!("{test} skipped: {reason}");
            }
            ExecutionMessage::TestStarting { test } | ExecutionMessage::TestFinished { test, .. } => {
                log::trace!("{test} {}", message.label());
            }
        }
        self.inner.queue_message(message)
    }
}
