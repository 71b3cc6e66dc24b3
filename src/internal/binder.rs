use std::fmt;

use crate::{BindingMode, Document, ElementId, Listener, Result};

/// Attaches and detaches listeners through one of the host's registration APIs.
///
/// Resolved once per story from the host's capabilities; never re-checked per call.
pub(crate) trait EventBinder: fmt::Debug {
    fn mode(&self) -> BindingMode;

    fn bind(
        &self,
        document: &dyn Document,
        element: ElementId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<()>;

    fn unbind(
        &self,
        document: &dyn Document,
        element: ElementId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<()>;
}

#[derive(Debug)]
struct UnifiedBinder;

impl EventBinder for UnifiedBinder {
    fn mode(&self) -> BindingMode {
        BindingMode::Unified
    }

    fn bind(
        &self,
        document: &dyn Document,
        element: ElementId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<()> {
        document.add_event_listener(element, event_type, listener.clone())
    }

    fn unbind(
        &self,
        document: &dyn Document,
        element: ElementId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<()> {
        document.remove_event_listener(element, event_type, listener)
    }
}

#[derive(Debug)]
struct LegacyBinder;

impl EventBinder for LegacyBinder {
    fn mode(&self) -> BindingMode {
        BindingMode::Legacy
    }

    fn bind(
        &self,
        document: &dyn Document,
        element: ElementId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<()> {
        document.attach_event(element, &format!("on{event_type}"), listener.clone())
    }

    fn unbind(
        &self,
        document: &dyn Document,
        element: ElementId,
        event_type: &str,
        listener: &Listener,
    ) -> Result<()> {
        document.detach_event(element, &format!("on{event_type}"), listener)
    }
}

/// Binder for an already resolved mode (see [`BindingMode::resolve`]).
pub(crate) fn binder_for(mode: BindingMode) -> Box<dyn EventBinder> {
    match mode {
        BindingMode::Legacy => Box::new(LegacyBinder),
        BindingMode::Unified | BindingMode::Auto => Box::new(UnifiedBinder),
    }
}
