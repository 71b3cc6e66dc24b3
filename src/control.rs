use std::{cell::Cell, rc::Rc};

use crate::Cursor;

/// Sequence control: the only way a story's cursor moves.
///
/// Cheap to clone. Every clone drives the same story, so a handle can be
/// kept by code outside the responses (e.g. a "skip" button).
///
/// - `advance()`: move to the next step (may run past the last one)
/// - `repeat()`: stay on the current step
/// - `stop()`: ignore every further event, permanently
#[derive(Debug, Clone, Default)]
pub struct Control {
    cursor: Rc<Cell<Cursor>>,
}

impl Control {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Move the cursor to the next step. No bounds check is made.
    pub fn advance(&self) {
        let next = self.cursor.get().advanced();
        tracing::debug!(cursor = %next, "advance");
        self.cursor.set(next);
    }

    /// Keep the current step active. Does nothing.
    #[inline]
    pub fn repeat(&self) {}

    /// Stop the sequence. There is no way to resume it.
    pub fn stop(&self) {
        if !self.cursor.get().is_stopped() {
            tracing::debug!("stop");
        }
        self.cursor.set(Cursor::Stopped);
    }

    #[inline]
    pub fn cursor(&self) -> Cursor {
        self.cursor.get()
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.cursor.get().is_stopped()
    }
}

/// What a step response gets to work with.
///
/// Carries the story's binding context (fixed for the lifetime of the story)
/// and the sequence controls. Derefs to [`Control`], so a response can call
/// `scene.advance()` directly.
pub struct Scene<'a, C> {
    context: &'a C,
    control: &'a Control,
}

impl<'a, C> Scene<'a, C> {
    pub(crate) fn new(context: &'a C, control: &'a Control) -> Self {
        Self { context, control }
    }

    /// The binding context the story was created with.
    pub fn context(&self) -> &'a C {
        self.context
    }

    pub fn control(&self) -> &'a Control {
        self.control
    }
}

impl<C> std::ops::Deref for Scene<'_, C> {
    type Target = Control;

    fn deref(&self) -> &Self::Target {
        self.control
    }
}
