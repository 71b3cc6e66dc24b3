//! Storyline - scripted event sequences over a DOM-like host
//!
//! Declare an ordered list of steps, each bound to a selector and an event
//! type. Only the active step reacts; its response decides whether the story
//! advances, repeats or stops.
//!
//! The host document is a collaborator, not something this crate implements:
//! anything implementing [`Document`] can be driven. [`MemoryDocument`] (feature
//! `memory-dom`, on by default) is an in-memory stand-in used by tests and demos.
//!
//! See `demos/guided_tour.rs` and `demos/legacy_host.rs`.

mod config;
mod control;
mod cursor;
mod dom;
mod error;
mod event_loop;
mod step;
mod story;

mod internal;

pub use config::{BindingMode, Config, MatchingMode};
pub use control::{Control, Scene};
pub use cursor::{Cursor, Position};
pub use dom::{
    Capabilities, Dispatch, DispatchReport, Document, DomEvent, ElementId, Listener, listener,
};
pub use error::Error;
pub use event_loop::{HostEvent, HostHandle, HostLoop, HostStats, host_loop};
pub use step::{Response, Step, StepInfo};
pub use story::Story;

#[cfg(feature = "memory-dom")]
pub use dom::MemoryDocument;

pub type Result<T = ()> = std::result::Result<T, Error>;
pub type EventId = u128;
