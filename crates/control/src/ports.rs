//! Port definitions — traits that device adapters implement.
//!
//! Ports are the boundaries between the control core and the physical
//! world. They are defined here so the loop components and the adapter
//! crates can depend on them without creating circular dependencies.

pub mod actuator;
pub mod event_sink;
pub mod sensor;
pub mod switch;

pub use actuator::ActuatorSink;
pub use event_sink::EventSink;
pub use sensor::{RawSample, SensorSource};
pub use switch::{ButtonPress, SwitchInput};
