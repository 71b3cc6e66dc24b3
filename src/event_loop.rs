use std::{rc::Rc, sync::Arc};

use tokio::{
    select,
    sync::mpsc::{Receiver, Sender, channel},
};
use tokio_util::sync::CancellationToken;

use crate::{Config, Dispatch, ElementId, Result};

/// An event waiting to be delivered by the host loop.
#[derive(Debug, Clone)]
pub struct HostEvent {
    pub target: ElementId,
    pub event_type: Arc<str>,
}

/// Counters reported by [`HostLoop::run`] once it finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Events handed to the document.
    pub delivered: usize,
    /// Listener invocations across all delivered events.
    pub invoked: usize,
    /// Listener failures plus events the document refused to deliver.
    pub failed: usize,
}

/// Sending side of a host event loop. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HostHandle {
    sender: Sender<HostEvent>,
    cancel_token: CancellationToken,
}

impl HostHandle {
    /// Queue `event_type` for delivery at `target`.
    /// This awaits channel capacity (backpressure) to avoid silent drops.
    pub async fn send(&self, target: ElementId, event_type: impl Into<Arc<str>>) -> Result<()> {
        self.sender
            .send(HostEvent {
                target,
                event_type: event_type.into(),
            })
            .await?;
        Ok(())
    }

    #[inline]
    pub async fn click(&self, target: ElementId) -> Result<()> {
        self.send(target, "click").await
    }

    /// Ask the loop to finish. Events already queued are still delivered.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Delivers queued events to a document strictly one at a time, in order.
///
/// Stands in for the host's own event loop: each event, and every response
/// it triggers, runs to completion before the next one is taken off the
/// queue. Listener failures end up here, the way uncaught exceptions reach
/// a browser console: logged and counted, never stopping the loop.
pub struct HostLoop<D: Dispatch> {
    document: Rc<D>,
    receiver: Receiver<HostEvent>,
    cancel_token: CancellationToken,
    stats: HostStats,
}

/// Create a host loop over `document` and the handle that feeds it.
pub fn host_loop<D: Dispatch>(document: Rc<D>, config: &Config) -> (HostLoop<D>, HostHandle) {
    let (tx, rx) = channel(config.queue_capacity);
    let cancel_token = CancellationToken::new();
    let host = HostLoop {
        document,
        receiver: rx,
        cancel_token: cancel_token.clone(),
        stats: HostStats::default(),
    };
    let handle = HostHandle {
        sender: tx,
        cancel_token,
    };
    (host, handle)
}

impl<D: Dispatch> HostLoop<D> {
    /// Run until [`HostHandle::shutdown`] is called or every handle is dropped.
    pub async fn run(mut self) -> HostStats {
        loop {
            select! {
                _ = self.cancel_token.cancelled() => break,
                event = self.receiver.recv() => match event {
                    Some(e) => {
                        self.deliver(e);
                        tokio::task::yield_now().await;
                    }
                    None => break,
                },
            }
        }
        self.drain();
        tracing::debug!(
            delivered = self.stats.delivered,
            failed = self.stats.failed,
            "host loop finished"
        );
        self.stats
    }

    fn deliver(&mut self, e: HostEvent) {
        self.stats.delivered += 1;
        match self.document.dispatch_event(e.target, &e.event_type) {
            Ok(report) => {
                self.stats.invoked += report.invoked;
                self.stats.failed += report.errors.len();
                for err in report.errors {
                    tracing::error!(
                        element = %e.target,
                        event_type = %e.event_type,
                        error = %err,
                        "uncaught listener failure"
                    );
                }
            }
            Err(err) => {
                self.stats.failed += 1;
                tracing::error!(
                    element = %e.target,
                    event_type = %e.event_type,
                    error = %err,
                    "event not delivered"
                );
            }
        }
    }

    fn drain(&mut self) {
        self.receiver.close();
        while let Ok(e) = self.receiver.try_recv() {
            self.deliver(e);
        }
    }
}
