//! Environment sampler — polls sensors on a fixed cadence and publishes
//! consistent snapshots.
//!
//! The sampler runs on its own sub-cycle, usually much slower than the
//! control tick. A cycle runs to completion (bounded by the per-sensor
//! timeout) before the new snapshot replaces the old one, so every other
//! component sees one consistent set of readings per tick.

use std::time::Duration;

use tracing::{debug, warn};

use terrarium_domain::id::SourceId;
use terrarium_domain::reading::{SensorKind, SensorReading};
use terrarium_domain::time::Timestamp;

use crate::ports::SensorSource;

/// How many consecutive invalid reads mark a sensor as degraded.
const DEGRADED_STREAK: u32 = 3;

/// Static description of one registered sensor.
#[derive(Debug, Clone)]
pub struct SensorSpec {
    pub source_id: SourceId,
    pub kind: SensorKind,
    pub unit: String,
    /// Plausible physical range; values outside it are treated as faults.
    pub min: f64,
    pub max: f64,
}

struct RegisteredSensor<S> {
    spec: SensorSpec,
    source: S,
    last_valid: Option<f64>,
    invalid_streak: u32,
}

/// The latest completed sampling cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub taken_at: Option<Timestamp>,
    pub readings: Vec<SensorReading>,
}

impl Snapshot {
    /// The latest reading for a source, valid or not.
    #[must_use]
    pub fn get(&self, source_id: &SourceId) -> Option<&SensorReading> {
        self.readings.iter().find(|r| &r.source_id == source_id)
    }

    /// The latest reading's value, only if it is valid — the only form
    /// automation is allowed to consume.
    #[must_use]
    pub fn valid_value(&self, source_id: &SourceId) -> Option<f64> {
        self.get(source_id).filter(|r| r.valid).map(|r| r.value)
    }
}

/// What one sampler tick produced.
#[derive(Debug, Default)]
pub struct SampleOutput {
    /// True when a sampling cycle actually ran this tick.
    pub fresh: bool,
    /// The readings of the cycle that ran, for the event sink.
    pub readings: Vec<SensorReading>,
    /// Sources that just crossed the degraded threshold, with their streak.
    pub degraded: Vec<(SourceId, u32)>,
}

/// Polls every registered sensor on a fixed period.
pub struct EnvironmentSampler<S> {
    sensors: Vec<RegisteredSensor<S>>,
    period: chrono::Duration,
    read_timeout: Duration,
    last_cycle: Option<Timestamp>,
    snapshot: Snapshot,
}

impl<S: SensorSource> EnvironmentSampler<S> {
    /// Build the static registry. Which sensors exist is a configuration
    /// decision made before the loop starts, never a runtime probe.
    pub fn new(sensors: Vec<(SensorSpec, S)>, period_s: u64, read_timeout: Duration) -> Self {
        let sensors = sensors
            .into_iter()
            .map(|(spec, source)| RegisteredSensor {
                spec,
                source,
                last_valid: None,
                invalid_streak: 0,
            })
            .collect();
        Self {
            sensors,
            period: chrono::Duration::seconds(i64::try_from(period_s).unwrap_or(i64::MAX)),
            read_timeout,
            last_cycle: None,
            snapshot: Snapshot::default(),
        }
    }

    /// The latest completed snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Run a sampling cycle if one is due, otherwise keep the snapshot.
    pub async fn tick(&mut self, now: Timestamp) -> SampleOutput {
        let due = self
            .last_cycle
            .is_none_or(|last| now.signed_duration_since(last) >= self.period);
        if !due {
            return SampleOutput::default();
        }

        self.last_cycle = Some(now);
        let mut readings = Vec::with_capacity(self.sensors.len());
        let mut degraded = Vec::new();

        for sensor in &mut self.sensors {
            let reading = sample_one(sensor, self.read_timeout, now).await;
            if reading.valid {
                sensor.last_valid = Some(reading.value);
                sensor.invalid_streak = 0;
            } else {
                sensor.invalid_streak += 1;
                if sensor.invalid_streak == DEGRADED_STREAK {
                    warn!(source = %sensor.spec.source_id, "sensor degraded");
                    degraded.push((sensor.spec.source_id.clone(), sensor.invalid_streak));
                }
            }
            readings.push(reading);
        }

        self.snapshot = Snapshot {
            taken_at: Some(now),
            readings: readings.clone(),
        };

        SampleOutput {
            fresh: true,
            readings,
            degraded,
        }
    }
}

async fn sample_one<S: SensorSource>(
    sensor: &RegisteredSensor<S>,
    read_timeout: Duration,
    now: Timestamp,
) -> SensorReading {
    let spec = &sensor.spec;
    match tokio::time::timeout(read_timeout, sensor.source.read()).await {
        Ok(Ok(sample)) => {
            let in_range = sample.value >= spec.min && sample.value <= spec.max;
            if sample.valid && in_range {
                SensorReading::valid(
                    spec.source_id.clone(),
                    spec.kind,
                    sample.value,
                    spec.unit.clone(),
                    now,
                )
            } else {
                debug!(source = %spec.source_id, value = sample.value, "implausible sample");
                // The raw value is still worth showing an operator.
                SensorReading::invalid(
                    spec.source_id.clone(),
                    spec.kind,
                    sample.value,
                    spec.unit.clone(),
                    now,
                )
            }
        }
        Ok(Err(err)) => {
            debug!(source = %spec.source_id, %err, "sensor read failed");
            stale_reading(sensor, now)
        }
        Err(_) => {
            debug!(source = %spec.source_id, "sensor read timed out");
            stale_reading(sensor, now)
        }
    }
}

/// An invalid reading that retains the last valid value for display.
fn stale_reading<S>(sensor: &RegisteredSensor<S>, now: Timestamp) -> SensorReading {
    let spec = &sensor.spec;
    SensorReading::invalid(
        spec.source_id.clone(),
        spec.kind,
        sensor.last_valid.unwrap_or(0.0),
        spec.unit.clone(),
        now,
    )
}
