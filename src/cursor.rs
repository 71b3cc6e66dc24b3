use std::fmt;

/// Pointer to the active step of a story.
///
/// `At(i)` may point past the last registered step; that's the exhausted
/// state, where no response fires. `Stopped` is distinct from every index
/// and can't be left through the public surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cursor {
    At(usize),
    Stopped,
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::At(0)
    }
}

impl Cursor {
    /// Move one step forward. Stopped stays stopped.
    pub fn advanced(self) -> Cursor {
        match self {
            Cursor::At(i) => Cursor::At(i.saturating_add(1)),
            Cursor::Stopped => Cursor::Stopped,
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Cursor::At(i) => Some(*i),
            Cursor::Stopped => None,
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Cursor::Stopped)
    }

    /// Classify this cursor against a registry of `len` steps.
    pub fn position(&self, len: usize) -> Position {
        match self {
            Cursor::At(i) if *i < len => Position::Active(*i),
            Cursor::At(_) => Position::Exhausted,
            Cursor::Stopped => Position::Stopped,
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::At(i) => write!(f, "{i}"),
            Cursor::Stopped => write!(f, "stopped"),
        }
    }
}

/// State of a story's sequence, as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Position {
    /// The step at this index reacts to matching events.
    Active(usize),
    /// The cursor moved past the last step. Only `stop` leaves this state.
    Exhausted,
    /// Terminal: every event is ignored.
    Stopped,
}

impl Position {
    pub fn is_active(&self) -> bool {
        matches!(self, Position::Active(_))
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Position::Exhausted)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Position::Stopped)
    }
}
