mod binder;
mod dispatch_queue;
mod matcher;

pub(crate) use binder::{EventBinder, binder_for};
pub(crate) use dispatch_queue::DispatchQueue;
pub(crate) use matcher::{SelectorMatcher, matcher_for};
