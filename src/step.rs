use std::{cell::RefCell, fmt, sync::Arc};

use crate::{DomEvent, Error, Result, Scene};

/// Callback run when the active step's event occurs.
pub type Response<C> = Box<dyn FnMut(&Scene<'_, C>, &DomEvent) -> Result<()>>;

/// Descriptor of one step in a story.
///
/// - `on`: CSS selector the triggering element has to satisfy.
/// - `watch_for`: event type to bind listeners for, e.g. `"click"`. A step
///   without it is a placeholder: it occupies a slot in the sequence but
///   is only left by an explicit `advance()`.
/// - `response`: what to do when the step triggers.
///
/// ```rust
/// use storyline::Step;
///
/// let step: Step<()> = Step::new()
///     .on("#start")
///     .watch_for("click")
///     .response(|scene, _event| {
///         scene.advance();
///         Ok(())
///     });
/// assert_eq!(step.selector(), Some("#start"));
/// ```
pub struct Step<C> {
    on: Option<Arc<str>>,
    watch_for: Option<Arc<str>>,
    response: Option<Response<C>>,
}

impl<C> Default for Step<C> {
    fn default() -> Self {
        Self {
            on: None,
            watch_for: None,
            response: None,
        }
    }
}

impl<C> Step<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(mut self, selector: impl Into<Arc<str>>) -> Self {
        self.on = Some(selector.into());
        self
    }

    pub fn watch_for(mut self, event_type: impl Into<Arc<str>>) -> Self {
        self.watch_for = Some(event_type.into());
        self
    }

    pub fn response<F>(mut self, response: F) -> Self
    where
        F: FnMut(&Scene<'_, C>, &DomEvent) -> Result<()> + 'static,
    {
        self.response = Some(Box::new(response));
        self
    }

    pub fn selector(&self) -> Option<&str> {
        self.on.as_deref()
    }

    pub fn event_type(&self) -> Option<&str> {
        self.watch_for.as_deref()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(event_type) = &self.watch_for {
            if event_type.trim().is_empty() {
                return Err(Error::MalformedStep("'watch_for' is empty".into()));
            }
            match &self.on {
                None => {
                    return Err(Error::MalformedStep(format!(
                        "'watch_for: {event_type}' needs an 'on' selector"
                    )));
                }
                Some(on) if on.trim().is_empty() => {
                    return Err(Error::MalformedStep("'on' selector is empty".into()));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl<C> fmt::Debug for Step<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("on", &self.on)
            .field("watch_for", &self.watch_for)
            .field("response", &self.response.is_some())
            .finish()
    }
}

/// A step as stored in a story's registry.
pub(crate) struct Registered<C> {
    pub on: Option<Arc<str>>,
    pub watch_for: Option<Arc<str>>,
    pub response: RefCell<Option<Response<C>>>,
    has_response: bool,
    pub bound: usize,
}

impl<C> Registered<C> {
    pub fn new(step: Step<C>, bound: usize) -> Self {
        Self {
            on: step.on,
            watch_for: step.watch_for,
            has_response: step.response.is_some(),
            response: RefCell::new(step.response),
            bound,
        }
    }

    pub fn info(&self, index: usize) -> StepInfo {
        StepInfo {
            index,
            on: self.on.as_deref().map(str::to_string),
            watch_for: self.watch_for.as_deref().map(str::to_string),
            bound: self.bound,
            has_response: self.has_response,
        }
    }
}

/// Read-only description of a registered step.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepInfo {
    pub index: usize,
    pub on: Option<String>,
    pub watch_for: Option<String>,
    /// Elements this step attached a new listener to at registration.
    pub bound: usize,
    pub has_response: bool,
}
