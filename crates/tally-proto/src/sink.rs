use crate::event::CrossingEvent;

/// Receiver of crossing events. Implementations must not block the caller;
/// a sink that cannot keep up drops events instead.
pub trait EventSink: Send + Sync {
    fn emit(&self, ev: CrossingEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _ev: CrossingEvent) {}
}
