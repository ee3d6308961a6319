//! Virtual relay board — records on/off state per actuator.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use terrarium_control::ports::ActuatorSink;
use terrarium_domain::error::PortError;
use terrarium_domain::id::ActuatorId;

/// A simulated relay board holding one channel per actuator.
///
/// Channels default to off; unknown channels are rejected, matching a real
/// board with a fixed number of outputs.
#[derive(Clone)]
pub struct VirtualRelayBoard {
    channels: Arc<Mutex<HashMap<ActuatorId, bool>>>,
}

impl VirtualRelayBoard {
    #[must_use]
    pub fn new(actuators: impl IntoIterator<Item = ActuatorId>) -> Self {
        let channels = actuators.into_iter().map(|id| (id, false)).collect();
        Self {
            channels: Arc::new(Mutex::new(channels)),
        }
    }

    /// Current state of one channel.
    #[must_use]
    pub fn is_on(&self, actuator_id: &ActuatorId) -> bool {
        self.lock_channels().get(actuator_id).copied().unwrap_or(false)
    }

    /// Number of channels currently energized.
    #[must_use]
    pub fn energized_count(&self) -> usize {
        self.lock_channels().values().filter(|on| **on).count()
    }

    fn lock_channels(&self) -> MutexGuard<'_, HashMap<ActuatorId, bool>> {
        self.channels
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ActuatorSink for VirtualRelayBoard {
    fn set(
        &self,
        actuator_id: &ActuatorId,
        on: bool,
    ) -> impl Future<Output = Result<(), PortError>> + Send {
        let result = match self.lock_channels().get_mut(actuator_id) {
            Some(channel) => {
                *channel = on;
                Ok(())
            }
            None => Err(PortError::Unavailable(format!(
                "no relay channel for `{actuator_id}`"
            ))),
        };
        async move { result }
    }
}
