//! Sensor readings — normalized, validity-tagged measurements.

use serde::{Deserialize, Serialize};

use crate::id::SourceId;
use crate::time::Timestamp;

/// The environmental variable a sensor measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Temperature,
    Humidity,
    Moisture,
    Light,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Temperature => f.write_str("temperature"),
            Self::Humidity => f.write_str("humidity"),
            Self::Moisture => f.write_str("moisture"),
            Self::Light => f.write_str("light"),
        }
    }
}

/// One measurement from one sensor source.
///
/// Immutable once produced. Readings with `valid = false` carry the last
/// value worth displaying (stale or raw out-of-range) and must never drive
/// automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub source_id: SourceId,
    pub kind: SensorKind,
    pub value: f64,
    pub unit: String,
    pub timestamp: Timestamp,
    pub valid: bool,
}

impl SensorReading {
    /// A valid measurement.
    #[must_use]
    pub fn valid(
        source_id: SourceId,
        kind: SensorKind,
        value: f64,
        unit: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            source_id,
            kind,
            value,
            unit: unit.into(),
            timestamp,
            valid: true,
        }
    }

    /// An invalid measurement (timeout, fault, or out-of-range value).
    ///
    /// `display_value` is whatever is still worth showing an operator:
    /// the retained prior valid value, or the raw out-of-range reading.
    #[must_use]
    pub fn invalid(
        source_id: SourceId,
        kind: SensorKind,
        display_value: f64,
        unit: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            source_id,
            kind,
            value: display_value,
            unit: unit.into(),
            timestamp,
            valid: false,
        }
    }
}

impl std::fmt::Display for SensorReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}={}{}{}",
            self.source_id,
            self.value,
            self.unit,
            if self.valid { "" } else { " (invalid)" }
        )
    }
}
