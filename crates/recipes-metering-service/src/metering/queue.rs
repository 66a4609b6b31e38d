//! In-process event queue between request handlers and the metering worker.
//!
//! The queue is unbounded and multi-producer, single-consumer. Producers hold
//! cheap clones of [`EventQueue`]; the single [`UsageReceiver`] is owned by
//! the worker and cannot be cloned.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use recipes_metering_core::{MeteringError, UsageEvent};

/// Producer side of the usage event queue.
#[derive(Debug, Clone)]
pub struct EventQueue {
    sender: mpsc::UnboundedSender<UsageEvent>,
    closed: CancellationToken,
}

/// Consumer side of the usage event queue.
#[derive(Debug)]
pub struct UsageReceiver {
    receiver: mpsc::UnboundedReceiver<UsageEvent>,
    closed: CancellationToken,
    draining: bool,
}

impl EventQueue {
    /// Open a new queue, returning the producer handle and the sole receiver.
    #[must_use]
    pub fn open() -> (Self, UsageReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let queue = Self {
            sender,
            closed: closed.clone(),
        };
        let receiver = UsageReceiver {
            receiver,
            closed,
            draining: false,
        };

        (queue, receiver)
    }

    /// Submit an event without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`MeteringError::QueueClosed`] once the queue has been closed.
    pub fn submit(&self, event: UsageEvent) -> Result<(), MeteringError> {
        if self.closed.is_cancelled() {
            return Err(MeteringError::QueueClosed);
        }

        self.sender
            .send(event)
            .map_err(|_| MeteringError::QueueClosed)
    }

    /// Close the queue. Idempotent.
    ///
    /// Events already buffered are still handed to the receiver; new
    /// submissions are rejected.
    pub fn close(&self) {
        if !self.closed.is_cancelled() {
            tracing::info!("Closing usage event queue");
        }
        self.closed.cancel();
    }

    /// Whether `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl UsageReceiver {
    /// Wait for the next event.
    ///
    /// Returns `None` once the queue is closed and every buffered event has
    /// been received.
    pub async fn receive(&mut self) -> Option<UsageEvent> {
        if !self.draining {
            tokio::select! {
                biased;
                event = self.receiver.recv() => return event,
                () = self.closed.cancelled() => {
                    self.receiver.close();
                    self.draining = true;
                }
            }
        }

        self.receiver.recv().await
    }

    /// Whether the producer side has been closed. Buffered events may still
    /// be waiting.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}
