use std::fmt;

use crate::{Capabilities, Error, Result};

/// How a story attaches listeners to host elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BindingMode {
    /// Pick from [`Capabilities`]: unified when available, legacy otherwise.
    #[default]
    Auto,
    /// `add_event_listener` / `remove_event_listener`.
    Unified,
    /// `attach_event("on<type>")` / `detach_event("on<type>")`.
    Legacy,
}

/// How a story tests whether an element satisfies a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchingMode {
    /// Native membership test when available, query scan otherwise.
    #[default]
    Auto,
    /// Ask the host directly (`Document::matches`).
    Native,
    /// Query every match of the selector and look for the element among them.
    QueryScan,
}

impl BindingMode {
    pub(crate) fn resolve(self, caps: &Capabilities) -> Result<BindingMode> {
        match self {
            BindingMode::Auto if caps.unified_listeners => Ok(BindingMode::Unified),
            BindingMode::Auto => Ok(BindingMode::Legacy),
            BindingMode::Unified if !caps.unified_listeners => {
                Err(Error::Unsupported("unified event listeners"))
            }
            mode => Ok(mode),
        }
    }
}

impl MatchingMode {
    pub(crate) fn resolve(self, caps: &Capabilities) -> Result<MatchingMode> {
        match self {
            MatchingMode::Auto if caps.native_matches => Ok(MatchingMode::Native),
            MatchingMode::Auto => Ok(MatchingMode::QueryScan),
            MatchingMode::Native if !caps.native_matches => {
                Err(Error::Unsupported("native selector matching"))
            }
            mode => Ok(mode),
        }
    }
}

impl fmt::Display for BindingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BindingMode::Auto => write!(f, "auto"),
            BindingMode::Unified => write!(f, "unified"),
            BindingMode::Legacy => write!(f, "legacy"),
        }
    }
}

impl fmt::Display for MatchingMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MatchingMode::Auto => write!(f, "auto"),
            MatchingMode::Native => write!(f, "native"),
            MatchingMode::QueryScan => write!(f, "query-scan"),
        }
    }
}

/// Runtime configuration for a [`Story`](crate::Story) and the host event loop.
///
/// Use the builder methods to customize, or [`Default`] for feature detection
/// and sensible limits.
///
/// # Examples
///
/// ```rust
/// use storyline::{BindingMode, Config, MatchingMode};
///
/// let config = Config::default()
///     .with_binding(BindingMode::Legacy)      // Force the attach/detach pair
///     .with_matching(MatchingMode::QueryScan) // Force the fallback membership test
///     .with_max_deferred_events(64);
/// assert_eq!(config.binding, BindingMode::Legacy);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listener registration strategy.
    /// Default: [`BindingMode::Auto`]
    pub binding: BindingMode,

    /// Selector membership strategy used at dispatch time.
    /// Default: [`MatchingMode::Auto`]
    pub matching: MatchingMode,

    /// Maximum number of events deferred because they arrived while a
    /// response was running, counted per host-delivered event. Events beyond
    /// that are dropped with [`Error::ReentrancyOverflow`].
    /// Default: 1024
    pub max_deferred_events: usize,

    /// Buffer size of the host event loop channel.
    /// Default: 128
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            binding: BindingMode::Auto,
            matching: MatchingMode::Auto,
            max_deferred_events: 1024,
            queue_capacity: 128,
        }
    }
}

impl Config {
    pub fn with_binding(mut self, binding: BindingMode) -> Self {
        self.binding = binding;
        self
    }

    pub fn with_matching(mut self, matching: MatchingMode) -> Self {
        self.matching = matching;
        self
    }

    /// Set how many re-entrant events one host delivery may defer.
    ///
    /// A response that keeps re-triggering its own step without advancing
    /// would otherwise loop forever.
    pub fn with_max_deferred_events(mut self, limit: usize) -> Self {
        self.max_deferred_events = limit;
        self
    }

    /// Set the channel buffer of the host event loop.
    ///
    /// When the buffer is full, [`HostHandle::send`](crate::HostHandle::send)
    /// waits for capacity (backpressure).
    pub fn with_queue_capacity(mut self, size: usize) -> Self {
        self.queue_capacity = size;
        self
    }
}
