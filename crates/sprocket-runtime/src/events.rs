//! Broadcast stream of [`MotionEvent`]s.
//!
//! Built on [`tokio::sync::broadcast`], so every subscriber sees every event
//! and a slow subscriber never blocks the control loop. Publishing with no
//! subscribers is normal and not an error.

use sprocket_types::MotionEvent;
use tokio::sync::broadcast;
use tracing::warn;

/// Number of buffered events before the oldest are dropped for slow
/// subscribers.
const DEFAULT_CAPACITY: usize = 256;

/// Shared event stream. Clones share one channel.
#[derive(Clone, Debug)]
pub struct EventStream {
    sender: broadcast::Sender<MotionEvent>,
}

impl EventStream {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish `event`, returning how many subscribers received it.
    pub fn publish(&self, event: MotionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventStream {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A receiver obtained from [`EventStream::subscribe`].
pub struct EventSubscriber {
    receiver: broadcast::Receiver<MotionEvent>,
}

impl EventSubscriber {
    /// Wait for the next event, skipping over any that were dropped because
    /// this subscriber lagged. Returns `None` once every publisher is gone.
    pub async fn next(&mut self) -> Option<MotionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "motion event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take an already-buffered event without waiting.
    pub fn try_next(&mut self) -> Option<MotionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "motion event subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Every event currently buffered, oldest first.
    pub fn drain(&mut self) -> Vec<MotionEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}
