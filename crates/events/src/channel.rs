//! Single-subscriber progress channel using tokio mpsc
//!
//! The sender side closes itself when a terminal event passes through it, so
//! the receiving stream ends exactly once and nothing can follow the terminal
//! event.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::types::ProgressEvent;

/// Receiving half of a run's progress channel
pub type ProgressStream = UnboundedReceiverStream<ProgressEvent>;

/// What happened to an event handed to [`ProgressSender::send`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The event was queued for the subscriber.
    Delivered,
    /// The subscriber is gone; the event was dropped.
    Disconnected,
    /// A terminal event was already sent; the event was dropped.
    Closed,
}

/// Sending half of a run's progress channel
#[derive(Clone)]
pub struct ProgressSender {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<ProgressEvent>>>>,
    /// Number of events accepted before closure (for monitoring)
    event_count: Arc<AtomicUsize>,
    disconnected: Arc<AtomicBool>,
}

/// Create a progress channel for one run.
pub fn progress_channel() -> (ProgressSender, ProgressStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sender = ProgressSender {
        sender: Arc::new(Mutex::new(Some(tx))),
        event_count: Arc::new(AtomicUsize::new(0)),
        disconnected: Arc::new(AtomicBool::new(false)),
    };
    (sender, UnboundedReceiverStream::new(rx))
}

impl ProgressSender {
    /// Queue an event in call order.
    ///
    /// A terminal event closes the channel after it is queued. Sending after
    /// closure returns [`SendOutcome::Closed`]; sending to a dropped receiver
    /// returns [`SendOutcome::Disconnected`]. Neither is an error.
    pub fn send(&self, event: ProgressEvent) -> SendOutcome {
        let mut guard = self
            .sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let terminal = event.is_terminal();
        let outcome = match guard.as_ref() {
            None => return SendOutcome::Closed,
            Some(tx) => match tx.send(event) {
                Ok(()) => {
                    self.event_count.fetch_add(1, Ordering::Relaxed);
                    SendOutcome::Delivered
                }
                Err(_) => {
                    self.disconnected.store(true, Ordering::Relaxed);
                    SendOutcome::Disconnected
                }
            },
        };

        if terminal {
            guard.take();
        }
        outcome
    }

    /// Whether a terminal event has already passed through the channel.
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_none()
    }

    /// Whether a send has ever failed because the subscriber went away.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Relaxed)
    }

    /// Number of events delivered so far.
    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSender")
            .field("closed", &self.is_closed())
            .field("disconnected", &self.is_disconnected())
            .field("event_count", &self.event_count())
            .finish()
    }
}
