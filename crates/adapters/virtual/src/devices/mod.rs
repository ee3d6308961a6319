//! Simulated devices backing the control ports.

pub mod buttons;
pub mod relay;
pub mod sensor;
pub mod switch;
