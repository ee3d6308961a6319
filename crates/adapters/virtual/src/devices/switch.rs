//! Virtual level input — settable switch for e-stop, override and mat.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use terrarium_control::ports::SwitchInput;
use terrarium_domain::error::PortError;

/// A simulated latching switch or pressure mat.
#[derive(Clone, Default)]
pub struct VirtualSwitch {
    active: Arc<AtomicBool>,
    failing: Arc<AtomicBool>,
}

impl VirtualSwitch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Assert or release the input.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    /// Toggle fault mode: every read fails while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl SwitchInput for VirtualSwitch {
    fn is_active(&self) -> impl Future<Output = Result<bool, PortError>> + Send {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(PortError::Unavailable("virtual switch fault".to_string()))
        } else {
            Ok(self.active.load(Ordering::SeqCst))
        };
        async move { result }
    }
}
