//! Virtual sensor — settable value with a gentle deterministic wobble.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use terrarium_control::ports::{RawSample, SensorSource};
use terrarium_domain::error::PortError;

/// A simulated measurement source.
///
/// Returns the configured value plus a small triangle-wave wobble so demo
/// charts look alive without pulling in a randomness dependency. Fault
/// mode makes every read fail, which is how tests drive the sampler's
/// degraded path.
#[derive(Clone)]
pub struct VirtualSensor {
    value: Arc<Mutex<f64>>,
    unit: String,
    wobble: f64,
    reads: Arc<AtomicU64>,
    failing: Arc<AtomicBool>,
}

impl VirtualSensor {
    #[must_use]
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
            unit: unit.into(),
            wobble: 0.0,
            reads: Arc::new(AtomicU64::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Add a wobble amplitude for livelier demo output.
    #[must_use]
    pub fn with_wobble(mut self, amplitude: f64) -> Self {
        self.wobble = amplitude;
        self
    }

    /// Replace the base value (e.g. a test scenario heating the air).
    pub fn set_value(&self, value: f64) {
        *self.lock_value() = value;
    }

    /// Toggle fault mode: every read returns an error while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn lock_value(&self) -> std::sync::MutexGuard<'_, f64> {
        self.value
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Triangle wave in [-1, 1] over a period of eight reads.
    fn phase(&self) -> f64 {
        let step = self.reads.fetch_add(1, Ordering::SeqCst) % 8;
        match step {
            0 | 4 => 0.0,
            1 | 3 => 0.5,
            2 => 1.0,
            5 | 7 => -0.5,
            _ => -1.0,
        }
    }
}

impl SensorSource for VirtualSensor {
    fn read(&self) -> impl Future<Output = Result<RawSample, PortError>> + Send {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(PortError::Unavailable("virtual sensor fault".to_string()))
        } else {
            let value = *self.lock_value() + self.wobble * self.phase();
            Ok(RawSample::new(value, self.unit.clone()))
        };
        async move { result }
    }
}
