pub mod event;
pub mod sink;

pub use event::{CounterSnapshot, CrossingEvent, Direction};
pub use sink::{EventSink, NullSink};
