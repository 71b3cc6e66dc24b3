use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
};

use crate::{DomEvent, Error, Result};

/// Serializes dispatch for one story.
///
/// An event that arrives while a response is still running (the response
/// fired it synchronously) is deferred and handled once the running
/// response returns, so the filter always sees a settled cursor.
/// At most `limit` events are deferred per outermost delivery.
#[derive(Debug)]
pub(crate) struct DispatchQueue {
    pending: RefCell<VecDeque<DomEvent>>,
    draining: Cell<bool>,
    deferred: Cell<usize>,
    limit: usize,
}

struct DrainGuard<'a>(&'a DispatchQueue);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        // Only non-empty when a handler panicked mid-drain.
        self.0.pending.borrow_mut().clear();
        self.0.deferred.set(0);
        self.0.draining.set(false);
    }
}

impl DispatchQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            pending: RefCell::new(VecDeque::new()),
            draining: Cell::new(false),
            deferred: Cell::new(0),
            limit,
        }
    }

    /// Run `handle` for `event`, then for every event deferred meanwhile.
    ///
    /// Returns the first failure; later ones are logged.
    pub fn deliver<F>(&self, event: &DomEvent, mut handle: F) -> Result<()>
    where
        F: FnMut(&DomEvent) -> Result<()>,
    {
        if self.draining.get() {
            return self.defer(event);
        }

        self.draining.set(true);
        let _guard = DrainGuard(self);

        let mut outcome = handle(event);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(next) = next else {
                break;
            };
            if let Err(e) = handle(&next) {
                if outcome.is_ok() {
                    outcome = Err(e);
                } else {
                    tracing::error!(event_id = next.id(), error = %e, "deferred event failed");
                }
            }
        }
        outcome
    }

    fn defer(&self, event: &DomEvent) -> Result<()> {
        if self.deferred.get() >= self.limit {
            tracing::warn!(
                event_id = event.id(),
                limit = self.limit,
                "dropping event delivered during a running response"
            );
            return Err(Error::ReentrancyOverflow(self.limit));
        }
        tracing::trace!(event_id = event.id(), "deferring re-entrant event");
        self.deferred.set(self.deferred.get() + 1);
        self.pending.borrow_mut().push_back(event.clone());
        Ok(())
    }

    #[cfg(test)]
    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::ElementId;

    fn click() -> DomEvent {
        DomEvent::new("click", ElementId::new(1))
    }

    #[test]
    fn test_reentrant_events_run_after_current() {
        let queue = Rc::new(DispatchQueue::new(8));
        let log = Rc::new(RefCell::new(Vec::new()));
        let first = click();

        let q = queue.clone();
        let l = log.clone();
        let first_id = first.id();
        queue
            .deliver(&first, |ev| {
                l.borrow_mut().push(format!("start {}", ev.id() == first_id));
                if ev.id() == first_id {
                    // Nested delivery is only queued.
                    q.deliver(&click(), |_| unreachable!()).unwrap();
                    assert!(q.is_draining());
                }
                l.borrow_mut().push("end".to_string());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["start true", "end", "start false", "end"]
        );
        assert!(!queue.is_draining());
    }

    #[test]
    fn test_overflow_is_reported() {
        let queue = DispatchQueue::new(1);
        let mut nested = Vec::new();
        queue
            .deliver(&click(), |_| {
                if nested.is_empty() {
                    nested.push(queue.deliver(&click(), |_| Ok(())));
                    nested.push(queue.deliver(&click(), |_| Ok(())));
                }
                Ok(())
            })
            .unwrap();
        assert!(nested[0].is_ok());
        assert!(matches!(nested[1], Err(Error::ReentrancyOverflow(1))));
    }

    #[test]
    fn test_limit_counts_whole_drain() {
        let queue = DispatchQueue::new(2);
        let mut calls = 0;
        let mut refused = 0;
        // Every handled event schedules another one, like a response re-firing itself.
        queue
            .deliver(&click(), |_| {
                calls += 1;
                if queue.deliver(&click(), |_| Ok(())).is_err() {
                    refused += 1;
                }
                Ok(())
            })
            .unwrap();
        assert_eq!(calls, 3);
        assert_eq!(refused, 1);

        // The budget is restored for the next delivery.
        let mut again = 0;
        queue
            .deliver(&click(), |_| {
                again += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(again, 1);
    }

    #[test]
    fn test_first_error_wins() {
        let queue = DispatchQueue::new(4);
        let mut calls = 0;
        let result = queue.deliver(&click(), |_| {
            calls += 1;
            if calls == 1 {
                queue.deliver(&click(), |_| Ok(())).unwrap();
                Err(Error::response("first"))
            } else {
                Err(Error::response("second"))
            }
        });
        assert_eq!(calls, 2);
        assert!(matches!(result, Err(Error::Response(msg)) if &*msg == "first"));
    }
}
