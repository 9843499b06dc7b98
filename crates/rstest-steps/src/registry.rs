//! Per-scenario step registry.
//!
//! The runner creates one [`StepRegistry`] for each scenario execution and
//! lends it to the scenario body as `&mut StepRegistry`. Because the registry
//! is an explicit value rather than thread-local state, scenarios running on
//! pooled worker threads never observe each other's steps.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::RegistryError;
use crate::step::{ActionResult, Step};

/// Ordered collection of steps registered by one scenario body.
///
/// # Examples
///
/// ```
/// use rstest_steps::StepRegistry;
///
/// let mut steps = StepRegistry::new();
/// steps.register_step("x", |_| Ok(())).unwrap().with_timeout_millis(50);
///
/// let extracted = steps.extract_steps();
/// assert_eq!(extracted.len(), 1);
/// assert!(steps.extract_steps().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct StepRegistry {
    steps: Vec<Step>,
}

impl StepRegistry {
    /// Create an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// Append a step with a synchronous action.
    ///
    /// The returned handle configures the step before extraction.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] when `name` is blank.
    pub fn register_step<A>(
        &mut self,
        name: impl Into<String>,
        action: A,
    ) -> Result<&mut Step, RegistryError>
    where
        A: FnOnce(&CancellationToken) -> ActionResult + Send + 'static,
    {
        let step = Step::new(name, action)?;
        Ok(self.push(step))
    }

    /// Append a step with an asynchronous action.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::EmptyName`] when `name` is blank.
    pub fn register_async_step<A, Fut>(
        &mut self,
        name: impl Into<String>,
        action: A,
    ) -> Result<&mut Step, RegistryError>
    where
        A: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let step = Step::new_async(name, action)?;
        Ok(self.push(step))
    }

    /// Append a prepared step.
    pub fn push(&mut self, step: Step) -> &mut Step {
        let slot = self.steps.len();
        self.steps.push(step);
        #[expect(
            clippy::indexing_slicing,
            reason = "the slot was filled by the push above"
        )]
        let step = &mut self.steps[slot];
        step
    }

    /// Take every registered step in registration order, leaving the
    /// registry empty.
    #[must_use]
    pub fn extract_steps(&mut self) -> Vec<Step> {
        let steps = std::mem::take(&mut self.steps);
        log::trace!("extracted {} step(s) from registry", steps.len());
        steps
    }

    /// Number of steps registered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps have been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Iterate over the registered steps in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }
}
