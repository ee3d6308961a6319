//! # terrarium-domain
//!
//! Pure domain model for the terrarium environmental control core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **SensorReadings** (normalized, validity-tagged measurements)
//! - Define **ActuatorCommands** (on/off/pulse requests with an origin)
//! - Define the **SafetyState** machine values and their gating rules
//! - Define **Sessions** (supervised human interaction periods) and their
//!   append-only activity log
//! - Define **Rules** (threshold / time-window automation with hysteresis)
//! - Define **LoopEvents** (the tagged records forwarded to the event sink)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies** and no IO.
//! It must never import anything from `control`, adapters, or runtime crates.
//! All IO boundaries are expressed as traits in the `control` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod event;
pub mod reading;
pub mod rule;
pub mod safety;
pub mod session;
