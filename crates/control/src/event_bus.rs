//! In-process event bus backed by a tokio broadcast channel.

use std::future::Future;

use tokio::sync::broadcast;

use terrarium_domain::error::TerrariumError;
use terrarium_domain::event::LoopEvent;

use crate::ports::EventSink;

/// Bounded in-process event stream.
///
/// Appending succeeds even when there are no active subscribers (the event
/// is simply dropped), and a subscriber that falls behind loses the oldest
/// events first — readings are perishable, so shedding old entries is the
/// correct overflow behaviour for the loop's side of the channel.
pub struct InProcessEventBus {
    sender: broadcast::Sender<LoopEvent>,
    capacity: usize,
}

impl InProcessEventBus {
    /// Create a new bus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    /// Subscribe to events on this bus.
    ///
    /// Returns a receiver that will get all events appended *after* the
    /// subscription is created.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.sender.subscribe()
    }

    /// The configured channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl EventSink for InProcessEventBus {
    fn append(&self, event: LoopEvent) -> impl Future<Output = Result<(), TerrariumError>> + Send {
        // broadcast::send fails only when there are zero receivers,
        // which is fine — the record is simply dropped.
        let _ = self.sender.send(event);
        async { Ok(()) }
    }
}
