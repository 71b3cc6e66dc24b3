use std::{
    cell::RefCell,
    collections::HashSet,
    rc::{Rc, Weak},
    sync::Arc,
};

use crate::{
    BindingMode, Config, Control, Cursor, Document, DomEvent, ElementId, Listener, MatchingMode,
    Position, Result, Scene, Step, StepInfo,
    internal::{DispatchQueue, EventBinder, SelectorMatcher, binder_for, matcher_for},
    listener,
    step::Registered,
};

/// An ordered sequence of steps bound to a host document.
///
/// Exactly one step is active at a time. When a bound event fires, the
/// story checks whether the element that triggered it satisfies the active
/// step's selector and, if so, runs that step's response. Responses move the
/// sequence on with [`advance`](Control::advance), stay with
/// [`repeat`](Control::repeat) or end it with [`stop`](Control::stop).
///
/// - `event(step)`: register a step, binding listeners for `watch_for`
/// - `advance()` / `repeat()` / `stop()`: sequence control
/// - `position()`, `steps()`: introspection
///
/// Every story owns its registry and cursor, so independent stories can
/// share one document.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use storyline::{Dispatch, MemoryDocument, Position, Step, Story};
///
/// # fn main() -> storyline::Result<()> {
/// let doc = Rc::new(MemoryDocument::new());
/// let start = doc.append(doc.root(), "button#start")?;
///
/// let story = Story::new(doc.clone(), "walkthrough")?;
/// story.event(
///     Step::new()
///         .on("#start")
///         .watch_for("click")
///         .response(|scene, _| {
///             assert_eq!(*scene.context(), "walkthrough");
///             scene.advance();
///             Ok(())
///         }),
/// )?;
///
/// doc.dispatch_event(start, "click")?;
/// assert_eq!(story.position(), Position::Exhausted);
/// # Ok(())
/// # }
/// ```
pub struct Story<C: 'static = ()> {
    inner: Rc<Inner<C>>,
}

struct Inner<C: 'static> {
    document: Rc<dyn Document>,
    context: C,
    steps: RefCell<Vec<Rc<Registered<C>>>>,
    control: Control,
    binder: Box<dyn EventBinder>,
    matcher: Box<dyn SelectorMatcher>,
    bound: RefCell<HashSet<(ElementId, Arc<str>)>>,
    queue: DispatchQueue,
    listener: Listener,
}

impl<C: 'static> Story<C> {
    /// Create a story over `document` whose responses run with `context`.
    ///
    /// Host capabilities are detected here, once.
    pub fn new<D>(document: Rc<D>, context: C) -> Result<Self>
    where
        D: Document + 'static,
    {
        Self::with_config(document, context, Config::default())
    }

    pub fn with_config<D>(document: Rc<D>, context: C, config: Config) -> Result<Self>
    where
        D: Document + 'static,
    {
        let capabilities = document.capabilities();
        let binding = config.binding.resolve(&capabilities)?;
        let matching = config.matching.resolve(&capabilities)?;
        tracing::debug!(%binding, %matching, "story created");

        let document: Rc<dyn Document> = document;
        let inner = Rc::new_cyclic(|weak: &Weak<Inner<C>>| {
            let weak = weak.clone();
            let listener = listener(move |event| match weak.upgrade() {
                Some(inner) => inner.listen_for_event(event),
                // The story is gone; its listeners stay inert.
                None => Ok(()),
            });
            Inner {
                document,
                context,
                steps: RefCell::new(Vec::new()),
                control: Control::new(),
                binder: binder_for(binding),
                matcher: matcher_for(matching),
                bound: RefCell::new(HashSet::new()),
                queue: DispatchQueue::new(config.max_deferred_events),
                listener,
            }
        });
        Ok(Self { inner })
    }

    /// Register a step at the end of the sequence.
    ///
    /// When the step declares `watch_for`, a listener for that event type is
    /// attached to every element matching `on` right now. Elements added later
    /// are not bound. Returns `self` so registrations can be chained:
    ///
    /// ```rust,ignore
    /// story.event(intro)?.event(details)?.event(outro)?;
    /// ```
    pub fn event(&self, step: Step<C>) -> Result<&Self> {
        step.validate()?;
        let bound = match (step.selector(), step.event_type()) {
            (Some(selector), Some(event_type)) => self.inner.bind_all(selector, event_type)?,
            _ => 0,
        };

        let mut steps = self.inner.steps.borrow_mut();
        tracing::debug!(
            index = steps.len(),
            on = step.selector(),
            watch_for = step.event_type(),
            bound,
            "step registered"
        );
        steps.push(Rc::new(Registered::new(step, bound)));
        Ok(self)
    }

    /// Move on to the next step.
    pub fn advance(&self) {
        self.inner.control.advance();
    }

    /// Stay on the current step.
    pub fn repeat(&self) {
        self.inner.control.repeat();
    }

    /// Stop the story. Every later event is ignored.
    pub fn stop(&self) {
        self.inner.control.stop();
    }

    /// A handle for driving this story from outside its responses.
    pub fn control(&self) -> Control {
        self.inner.control.clone()
    }

    pub fn cursor(&self) -> Cursor {
        self.inner.control.cursor()
    }

    pub fn position(&self) -> Position {
        self.cursor().position(self.len())
    }

    pub fn len(&self) -> usize {
        self.inner.steps.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The binding context passed to every response.
    pub fn context(&self) -> &C {
        &self.inner.context
    }

    /// Registered steps in sequence order.
    pub fn steps(&self) -> Vec<StepInfo> {
        self.inner
            .steps
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, step)| step.info(i))
            .collect()
    }

    pub fn binding(&self) -> BindingMode {
        self.inner.binder.mode()
    }

    pub fn matching(&self) -> MatchingMode {
        self.inner.matcher.mode()
    }
}

impl<C: 'static> Inner<C> {
    /// Attach the shared listener to every element matching `selector`.
    ///
    /// Elements already bound for `event_type` by this story are skipped.
    /// On failure, listeners attached by this call are removed again.
    fn bind_all(&self, selector: &str, event_type: &str) -> Result<usize> {
        let elements = self.document.query_selector_all(selector)?;
        let event_type: Arc<str> = Arc::from(event_type);
        let mut attached = Vec::new();

        for element in elements {
            let key = (element, event_type.clone());
            if self.bound.borrow().contains(&key) {
                continue;
            }
            if let Err(e) = self.binder.bind(&*self.document, element, &event_type, &self.listener)
            {
                tracing::warn!(%element, %event_type, error = %e, "binding failed, rolling back");
                self.unbind_all(&attached, &event_type);
                return Err(e);
            }
            self.bound.borrow_mut().insert(key);
            attached.push(element);
        }

        Ok(attached.len())
    }

    fn unbind_all(&self, elements: &[ElementId], event_type: &Arc<str>) {
        for element in elements {
            if let Err(e) = self
                .binder
                .unbind(&*self.document, *element, event_type, &self.listener)
            {
                tracing::error!(%element, %event_type, error = %e, "unbinding failed");
            }
            self.bound
                .borrow_mut()
                .remove(&(*element, event_type.clone()));
        }
    }

    fn listen_for_event(&self, event: &DomEvent) -> Result<()> {
        self.queue.deliver(event, |event| self.filter(event))
    }

    /// Run the active step's response if `event` belongs to it.
    fn filter(&self, event: &DomEvent) -> Result<()> {
        let Cursor::At(index) = self.control.cursor() else {
            tracing::trace!(event_id = event.id(), "story stopped, event ignored");
            return Ok(());
        };

        let Some(step) = self.steps.borrow().get(index).cloned() else {
            tracing::trace!(event_id = event.id(), index, "story exhausted, event ignored");
            return Ok(());
        };

        // Placeholders only move by explicit control.
        let Some(watch_for) = &step.watch_for else {
            return Ok(());
        };
        if watch_for.as_ref() != event.event_type() {
            return Ok(());
        }

        let (Some(selector), Some(origin)) = (step.on.as_deref(), event.origin()) else {
            return Ok(());
        };

        if !self.matcher.matches(&*self.document, origin, selector)? {
            tracing::trace!(event_id = event.id(), index, %origin, selector, "no match");
            return Ok(());
        }

        tracing::debug!(event_id = event.id(), index, %origin, "step triggered");
        let mut response = step.response.borrow_mut();
        match response.as_mut() {
            Some(respond) => respond(&Scene::new(&self.context, &self.control), event),
            None => Ok(()),
        }
    }
}
