//! Event sink port — append-only record stream.

use std::future::Future;

use terrarium_domain::error::TerrariumError;
use terrarium_domain::event::LoopEvent;

/// Receives every auditable record the loop produces.
///
/// Implementations must not block on persistence latency; the provided
/// [`InProcessEventBus`](crate::event_bus::InProcessEventBus) decouples the
/// loop from slow consumers with a bounded channel that sheds its oldest
/// entries first. The core never reads back through this port.
pub trait EventSink {
    /// Append one event.
    fn append(&self, event: LoopEvent) -> impl Future<Output = Result<(), TerrariumError>> + Send;
}

impl<T: EventSink + Send + Sync> EventSink for std::sync::Arc<T> {
    fn append(&self, event: LoopEvent) -> impl Future<Output = Result<(), TerrariumError>> + Send {
        (**self).append(event)
    }
}
