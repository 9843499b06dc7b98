//! Scenario definitions handed to the runner by the discovery layer.

use std::future::Future;
use std::pin::Pin;

use crate::error::{BoxError, DiscoveryError};
use crate::registry::StepRegistry;

/// Boxed future returned by asynchronous background routines and bodies.
pub type BodyFuture<'a> = Pin<Box<dyn Future<Output = Result<(), BoxError>> + Send + 'a>>;

type FixtureFactory<F> = Box<dyn FnOnce() -> Result<F, BoxError> + Send>;
pub(crate) type BackgroundFn<F> = Box<dyn for<'a> FnOnce(&'a mut F) -> BodyFuture<'a> + Send>;
pub(crate) type BodyFn<F> =
    Box<dyn for<'a> FnOnce(&'a mut F, &'a mut StepRegistry) -> BodyFuture<'a> + Send>;

/// Display metadata for one scenario.
///
/// # Examples
///
/// ```
/// use rstest_steps::ScenarioMetadata;
///
/// let metadata = ScenarioMetadata::new("Checkout", 2).with_skip_reason("payments offline");
/// assert_eq!(metadata.display_name(), "Checkout");
/// assert_eq!(metadata.scenario_number(), 2);
/// assert_eq!(metadata.skip_reason(), Some("payments offline"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioMetadata {
    display_name: String,
    scenario_number: usize,
    skip_reason: Option<String>,
}

impl ScenarioMetadata {
    /// Create metadata for a scenario that is not skipped.
    #[must_use]
    pub fn new(display_name: impl Into<String>, scenario_number: usize) -> Self {
        Self {
            display_name: display_name.into(),
            scenario_number,
            skip_reason: None,
        }
    }

    /// Mark the scenario as skipped.
    #[must_use]
    pub fn with_skip_reason(mut self, reason: impl Into<String>) -> Self {
        self.skip_reason = Some(reason.into());
        self
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the scenario number used to disambiguate step display names.
    #[must_use]
    pub const fn scenario_number(&self) -> usize {
        self.scenario_number
    }

    /// Returns the skip reason, if the scenario is skipped.
    #[must_use]
    pub fn skip_reason(&self) -> Option<&str> {
        self.skip_reason.as_deref()
    }
}

impl Default for ScenarioMetadata {
    fn default() -> Self {
        Self::new("<unknown>", 1)
    }
}

pub(crate) enum FixtureSource<F> {
    /// The body needs no constructed instance.
    Stateless(F),
    Factory(FixtureFactory<F>),
}

/// A resolved scenario: fixture, background routines and body.
///
/// Build one with [`ScenarioDefinition::stateless`] or
/// [`ScenarioDefinition::with_fixture`].
///
/// # Examples
///
/// ```
/// use rstest_steps::{ScenarioDefinition, ScenarioMetadata};
///
/// let scenario = ScenarioDefinition::stateless(ScenarioMetadata::new("Greeting", 1))
///     .body(|_, steps| {
///         steps.register_step("say hello", |_| Ok(()))?;
///         Ok(())
///     });
/// assert_eq!(scenario.metadata().display_name(), "Greeting");
/// ```
pub struct ScenarioDefinition<F = ()> {
    pub(crate) metadata: ScenarioMetadata,
    pub(crate) fixture: FixtureSource<F>,
    pub(crate) backgrounds: Vec<BackgroundFn<F>>,
    pub(crate) body: BodyFn<F>,
}

impl ScenarioDefinition<()> {
    /// Start a scenario whose body needs no constructed fixture.
    #[must_use]
    pub fn stateless(metadata: ScenarioMetadata) -> ScenarioBuilder<()> {
        ScenarioBuilder {
            metadata,
            fixture: FixtureSource::Stateless(()),
            backgrounds: Vec::new(),
        }
    }
}

impl<F: Send + 'static> ScenarioDefinition<F> {
    /// Start a scenario whose fixture is built by `factory` before any
    /// background routine runs.
    #[must_use]
    pub fn with_fixture<C>(metadata: ScenarioMetadata, factory: C) -> ScenarioBuilder<F>
    where
        C: FnOnce() -> Result<F, BoxError> + Send + 'static,
    {
        ScenarioBuilder {
            metadata,
            fixture: FixtureSource::Factory(Box::new(factory)),
            backgrounds: Vec::new(),
        }
    }

    /// Returns the scenario metadata.
    #[must_use]
    pub fn metadata(&self) -> &ScenarioMetadata {
        &self.metadata
    }

    /// Number of background routines declared.
    #[must_use]
    pub fn background_count(&self) -> usize {
        self.backgrounds.len()
    }
}

/// Builder collecting background routines before the body is supplied.
pub struct ScenarioBuilder<F> {
    metadata: ScenarioMetadata,
    fixture: FixtureSource<F>,
    backgrounds: Vec<BackgroundFn<F>>,
}

fn boxed_background<F, B>(routine: B) -> BackgroundFn<F>
where
    B: for<'a> FnOnce(&'a mut F) -> BodyFuture<'a> + Send + 'static,
{
    Box::new(routine)
}

fn boxed_body<F, B>(body: B) -> BodyFn<F>
where
    B: for<'a> FnOnce(&'a mut F, &'a mut StepRegistry) -> BodyFuture<'a> + Send + 'static,
{
    Box::new(body)
}

impl<F: Send + 'static> ScenarioBuilder<F> {
    /// Append a synchronous background routine. Routines run in declaration
    /// order before the body.
    #[must_use]
    pub fn background<B>(mut self, routine: B) -> Self
    where
        B: FnOnce(&mut F) -> Result<(), BoxError> + Send + 'static,
    {
        self.backgrounds.push(boxed_background(move |fixture| {
            Box::pin(std::future::ready(routine(fixture)))
        }));
        self
    }

    /// Append an asynchronous background routine.
    #[must_use]
    pub fn background_async<B>(mut self, routine: B) -> Self
    where
        B: for<'a> FnOnce(&'a mut F) -> BodyFuture<'a> + Send + 'static,
    {
        self.backgrounds.push(boxed_background(routine));
        self
    }

    /// Finish with a synchronous body that registers the scenario's steps.
    #[must_use]
    pub fn body<B>(self, body: B) -> ScenarioDefinition<F>
    where
        B: FnOnce(&mut F, &mut StepRegistry) -> Result<(), BoxError> + Send + 'static,
    {
        self.finish(boxed_body(move |fixture, steps| {
            Box::pin(std::future::ready(body(fixture, steps)))
        }))
    }

    /// Finish with an asynchronous body.
    #[must_use]
    pub fn body_async<B>(self, body: B) -> ScenarioDefinition<F>
    where
        B: for<'a> FnOnce(&'a mut F, &'a mut StepRegistry) -> BodyFuture<'a> + Send + 'static,
    {
        self.finish(boxed_body(body))
    }

    fn finish(self, body: BodyFn<F>) -> ScenarioDefinition<F> {
        ScenarioDefinition {
            metadata: self.metadata,
            fixture: self.fixture,
            backgrounds: self.backgrounds,
            body,
        }
    }
}

/// Supplies a scenario to the runner.
///
/// This is the seam to the discovery layer: metadata must be available up
/// front so that skips and resolution failures can be reported, while the
/// definition is only resolved once the scenario actually runs.
pub trait ScenarioSource: Send {
    /// Fixture type the resolved scenario operates on.
    type Fixture: Send + 'static;

    /// Returns display metadata for the scenario.
    fn metadata(&self) -> &ScenarioMetadata;

    /// Resolve the scenario definition.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError`] when the scenario cannot be located.
    fn resolve(self) -> Result<ScenarioDefinition<Self::Fixture>, DiscoveryError>;
}

impl<F: Send + 'static> ScenarioSource for ScenarioDefinition<F> {
    type Fixture = F;

    fn metadata(&self) -> &ScenarioMetadata {
        &self.metadata
    }

    fn resolve(self) -> Result<Self, DiscoveryError> {
        Ok(self)
    }
}

/// A scenario resolved lazily by a closure when the runner reaches it.
///
/// # Examples
///
/// ```
/// use rstest_steps::{DeferredScenario, DiscoveryError, ScenarioMetadata, ScenarioSource};
///
/// let missing = DeferredScenario::<(), _>::new(ScenarioMetadata::new("Missing", 1), || {
///     Err(DiscoveryError::new("Missing", "no such type"))
/// });
/// assert!(missing.resolve().is_err());
/// ```
pub struct DeferredScenario<F, R> {
    metadata: ScenarioMetadata,
    resolver: R,
    _fixture: std::marker::PhantomData<fn() -> F>,
}

impl<F, R> DeferredScenario<F, R>
where
    F: Send + 'static,
    R: FnOnce() -> Result<ScenarioDefinition<F>, DiscoveryError> + Send,
{
    /// Create a deferred scenario.
    #[must_use]
    pub const fn new(metadata: ScenarioMetadata, resolver: R) -> Self {
        Self {
            metadata,
            resolver,
            _fixture: std::marker::PhantomData,
        }
    }
}

impl<F, R> ScenarioSource for DeferredScenario<F, R>
where
    F: Send + 'static,
    R: FnOnce() -> Result<ScenarioDefinition<F>, DiscoveryError> + Send,
{
    type Fixture = F;

    fn metadata(&self) -> &ScenarioMetadata {
        &self.metadata
    }

    fn resolve(self) -> Result<ScenarioDefinition<F>, DiscoveryError> {
        (self.resolver)()
    }
}
