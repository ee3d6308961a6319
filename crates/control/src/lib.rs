//! # terrarium-control
//!
//! Application core — capability **ports** (traits) and the control-loop
//! components that orchestrate one tick of the system.
//!
//! ## Responsibilities
//! - Define port traits that device adapters implement (driven ports):
//!   - `SensorSource` — one normalized measurement per call
//!   - `ActuatorSink` — on/off writes, single authority enforced here
//!   - `SwitchInput` — boolean physical inputs (e-stop, override, presence)
//!   - `EventSink` — append-only, never blocks the loop
//! - Provide in-process infrastructure (bounded event bus) that needs no IO
//! - Implement the loop stages: `SafetyMonitor` → `EnvironmentSampler` →
//!   `AutomationScheduler` + `SessionManager` → `ActuatorController`,
//!   composed by `ControlLoop`
//!
//! ## Dependency rule
//! Depends on `terrarium-domain` only (plus `tokio::sync`/`tokio::time` for
//! channels and timeouts). Never imports adapter crates; adapters depend on
//! *this* crate, not the reverse.

pub mod control_loop;
pub mod controller;
pub mod event_bus;
pub mod ports;
pub mod safety_monitor;
pub mod sampler;
pub mod scheduler;
pub mod session_manager;
