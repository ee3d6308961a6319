//! # terrarium-adapter-virtual
//!
//! Virtual device adapter providing simulated hardware for demos and
//! integration tests.
//!
//! ## Provided devices
//!
//! | Device | Port | Behaviour |
//! |--------|------|-----------|
//! | [`VirtualSensor`] | `SensorSource` | Settable value with a gentle wobble, optional fault mode |
//! | [`VirtualRelayBoard`] | `ActuatorSink` | Records on/off state per actuator |
//! | [`VirtualSwitch`] | `SwitchInput` | Settable level input (e-stop, override, mat) |
//! | [`VirtualButtonPanel`] | — | Pushes `ButtonPress` messages into the bounded queue |
//!
//! ## Dependency rule
//!
//! Depends on `terrarium-control` (port traits) and `terrarium-domain` only.

mod devices;

pub use devices::buttons::VirtualButtonPanel;
pub use devices::relay::VirtualRelayBoard;
pub use devices::sensor::VirtualSensor;
pub use devices::switch::VirtualSwitch;
