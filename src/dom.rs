//! Host capability model.
//!
//! A story never walks a document itself. Everything it needs from the host
//! (selector queries, listener registration, membership tests, event delivery)
//! goes through the [`Document`] and [`Dispatch`] traits defined here.

#[cfg(feature = "memory-dom")]
mod memory;
#[cfg(feature = "memory-dom")]
mod selector;

use std::{fmt, rc::Rc, sync::Arc, time::SystemTime};

use uuid::Uuid;

use crate::{Error, EventId, Result};

#[cfg(feature = "memory-dom")]
pub use memory::MemoryDocument;

/// Opaque identity of a host element.
///
/// Two ids are equal exactly when they name the same element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementId(u64);

impl ElementId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single event delivered by the host to a listener.
///
/// Hosts with unified listeners fill `target`; legacy hosts only provide
/// `src_element`. Use [`DomEvent::origin`] to get whichever is present.
#[derive(Debug, Clone)]
pub struct DomEvent {
    id: EventId,
    timestamp: u64,
    event_type: Arc<str>,
    target: Option<ElementId>,
    src_element: Option<ElementId>,
    current_target: Option<ElementId>,
}

impl DomEvent {
    /// Event in the unified model, originating at `target`.
    pub fn new(event_type: impl Into<Arc<str>>, target: ElementId) -> Self {
        Self::with_origin(event_type.into(), Some(target), None)
    }

    /// Event in the legacy model, where only `src_element` is reported.
    pub fn legacy(event_type: impl Into<Arc<str>>, src_element: ElementId) -> Self {
        Self::with_origin(event_type.into(), None, Some(src_element))
    }

    fn with_origin(
        event_type: Arc<str>,
        target: Option<ElementId>,
        src_element: Option<ElementId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().as_u128(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or_default(),
            event_type,
            target,
            src_element,
            current_target: None,
        }
    }

    /// Copy of this event as seen by the listener attached to `element`.
    pub fn at(&self, element: ElementId) -> Self {
        Self {
            current_target: Some(element),
            ..self.clone()
        }
    }

    /// Unique identifier, shared by every delivery of the same event while it bubbles.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// Creation time in nanoseconds since Unix epoch (u64 truncation).
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn target(&self) -> Option<ElementId> {
        self.target
    }

    pub fn src_element(&self) -> Option<ElementId> {
        self.src_element
    }

    /// Element whose listener is currently running.
    pub fn current_target(&self) -> Option<ElementId> {
        self.current_target
    }

    /// The element that actually triggered the event, regardless of event model.
    pub fn origin(&self) -> Option<ElementId> {
        self.target.or(self.src_element)
    }
}

/// Callback registered with the host.
///
/// Listener identity is pointer identity: the same `Rc` must be passed to
/// deregistration as was passed to registration.
pub type Listener = Rc<dyn Fn(&DomEvent) -> Result<()>>;

/// Wrap a closure into a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&DomEvent) -> Result<()> + 'static,
{
    Rc::new(f)
}

/// What a host can do, detected once when a story is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capabilities {
    /// The host has `add_event_listener` / `remove_event_listener`.
    pub unified_listeners: bool,
    /// The host can test selector membership directly.
    pub native_matches: bool,
}

impl Capabilities {
    pub const fn modern() -> Self {
        Self {
            unified_listeners: true,
            native_matches: true,
        }
    }

    pub const fn legacy() -> Self {
        Self {
            unified_listeners: false,
            native_matches: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::modern()
    }
}

/// Document-like element tree a story binds to.
///
/// Only [`capabilities`](Document::capabilities) and
/// [`query_selector_all`](Document::query_selector_all) are mandatory.
/// The remaining methods come in pairs that hosts provide according to
/// what their [`Capabilities`] advertise; the defaults report
/// [`Error::Unsupported`].
pub trait Document {
    fn capabilities(&self) -> Capabilities;

    /// All elements currently matching `selector`, in document order.
    ///
    /// Fails with [`Error::InvalidSelector`] when the selector can't be parsed.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<ElementId>>;

    /// Native selector membership test.
    fn matches(&self, _element: ElementId, _selector: &str) -> Result<bool> {
        Err(Error::Unsupported("native selector matching"))
    }

    fn add_event_listener(
        &self,
        _element: ElementId,
        _event_type: &str,
        _listener: Listener,
    ) -> Result<()> {
        Err(Error::Unsupported("unified event listeners"))
    }

    fn remove_event_listener(
        &self,
        _element: ElementId,
        _event_type: &str,
        _listener: &Listener,
    ) -> Result<()> {
        Err(Error::Unsupported("unified event listeners"))
    }

    /// Legacy registration; `handler` is the `on`-prefixed event name, e.g. `onclick`.
    fn attach_event(&self, _element: ElementId, _handler: &str, _listener: Listener) -> Result<()> {
        Err(Error::Unsupported("legacy event listeners"))
    }

    fn detach_event(&self, _element: ElementId, _handler: &str, _listener: &Listener) -> Result<()> {
        Err(Error::Unsupported("legacy event listeners"))
    }
}

/// Outcome of delivering one event through the host.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Number of listener invocations, across every element on the bubbling path.
    pub invoked: usize,
    /// Failures raised by listeners. Delivery continues past them.
    pub errors: Vec<Error>,
}

impl DispatchReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Host-side event delivery: fire `event_type` at `target` and let it bubble.
pub trait Dispatch {
    fn dispatch_event(&self, target: ElementId, event_type: &str) -> Result<DispatchReport>;
}
