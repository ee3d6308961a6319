//! Sensor port — one raw measurement per call.

use std::future::Future;

use terrarium_domain::error::PortError;

/// A single raw measurement as the device reports it, before the sampler
/// normalizes it into a [`SensorReading`](terrarium_domain::reading::SensorReading).
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    pub value: f64,
    pub unit: String,
    /// Devices that can self-diagnose report faults here; the sampler adds
    /// its own range and timeout checks on top.
    pub valid: bool,
}

impl RawSample {
    #[must_use]
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
            valid: true,
        }
    }

    /// A sample the device itself flags as unreliable.
    #[must_use]
    pub fn faulted(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
            valid: false,
        }
    }
}

/// A readable measurement source.
///
/// Implementations may block on device IO; the sampler wraps every call in
/// a bounded timeout, so a hung bus can never stall the loop beyond it.
pub trait SensorSource {
    /// Take one measurement.
    fn read(&self) -> impl Future<Output = Result<RawSample, PortError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_fresh_sample_to_valid() {
        let s = RawSample::new(21.5, "°C");
        assert!(s.valid);
    }

    #[test]
    fn should_mark_faulted_sample_invalid() {
        let s = RawSample::faulted(-40.0, "°C");
        assert!(!s.valid);
    }
}
