//! Safety monitor — owns the latched safety state.
//!
//! Runs first in every tick, before any command from another producer can
//! reach the actuator sink. An asserted (or unreadable) emergency-stop
//! input latches [`SafetyState::Stopped`] and emits an off command for
//! every known actuator; releasing the input never resumes automatically,
//! only an explicit [`reset`](SafetyMonitor::reset) does, mirroring a
//! physically latching stop button.

use std::time::Duration;

use tracing::{info, warn};

use terrarium_domain::command::ActuatorCommand;
use terrarium_domain::id::ActuatorId;
use terrarium_domain::safety::SafetyState;
use terrarium_domain::time::Timestamp;

use crate::ports::SwitchInput;

/// The result of one safety evaluation.
#[derive(Debug, Clone)]
pub struct SafetyCheck {
    pub state: SafetyState,
    /// All-off commands issued on a fresh trip, empty otherwise.
    pub commands: Vec<ActuatorCommand>,
    /// `(from, to, reason)` when the state changed this tick.
    pub transition: Option<(SafetyState, SafetyState, String)>,
}

/// Polls the emergency-stop and manual-override inputs and derives the
/// system safety state.
pub struct SafetyMonitor<E, O> {
    estop: E,
    override_input: O,
    actuators: Vec<ActuatorId>,
    input_timeout: Duration,
    state: SafetyState,
}

impl<E: SwitchInput, O: SwitchInput> SafetyMonitor<E, O> {
    pub fn new(
        estop: E,
        override_input: O,
        actuators: Vec<ActuatorId>,
        input_timeout: Duration,
    ) -> Self {
        Self {
            estop,
            override_input,
            actuators,
            input_timeout,
            state: SafetyState::Normal,
        }
    }

    /// The current latched state.
    #[must_use]
    pub fn state(&self) -> SafetyState {
        self.state
    }

    /// Evaluate the physical inputs once.
    ///
    /// A failed or timed-out read of either input counts as an asserted
    /// stop: the loop must never keep actuators energized on the strength
    /// of an input it cannot see.
    pub async fn tick(&mut self, now: Timestamp) -> SafetyCheck {
        let estop = read_input(&self.estop, self.input_timeout, "emergency-stop").await;
        let override_active =
            read_input(&self.override_input, self.input_timeout, "manual-override").await;

        let (asserted, reason) = match (estop, override_active) {
            (None, _) => (true, "emergency-stop input unreadable"),
            (_, None) => (true, "manual-override input unreadable"),
            (Some(true), _) => (true, "emergency-stop asserted"),
            (Some(false), _) => (false, ""),
        };

        if asserted {
            return self.trip(reason, now);
        }

        if self.state.is_stopped() {
            // Input released, but the latch only clears via reset().
            return SafetyCheck {
                state: self.state,
                commands: Vec::new(),
                transition: None,
            };
        }

        let target = if override_active == Some(true) {
            SafetyState::Overridden
        } else {
            SafetyState::Normal
        };
        let transition = (self.state != target).then(|| {
            let reason = match target {
                SafetyState::Overridden => "manual override engaged",
                _ => "manual override released",
            };
            info!(from = %self.state, to = %target, "safety state changed");
            (self.state, target, reason.to_string())
        });
        self.state = target;

        SafetyCheck {
            state: self.state,
            commands: Vec::new(),
            transition,
        }
    }

    /// Explicitly clear a latched stop.
    ///
    /// Refused while the emergency-stop input is still asserted or cannot
    /// be read. Returns the new state when the reset took effect.
    pub async fn reset(&mut self, _now: Timestamp) -> Option<SafetyState> {
        if !self.state.is_stopped() {
            return Some(self.state);
        }
        match read_input(&self.estop, self.input_timeout, "emergency-stop").await {
            Some(false) => {
                info!("safety latch reset");
                self.state = SafetyState::Normal;
                Some(self.state)
            }
            _ => {
                warn!("safety reset refused: emergency-stop still asserted");
                None
            }
        }
    }

    fn trip(&mut self, reason: &str, now: Timestamp) -> SafetyCheck {
        if self.state.is_stopped() {
            return SafetyCheck {
                state: self.state,
                commands: Vec::new(),
                transition: None,
            };
        }
        let from = self.state;
        self.state = SafetyState::Stopped;
        warn!(%reason, "safety stop latched, commanding all actuators off");
        let commands = self
            .actuators
            .iter()
            .map(|id| ActuatorCommand::safety_off(id.clone(), now))
            .collect();
        SafetyCheck {
            state: self.state,
            commands,
            transition: Some((from, SafetyState::Stopped, reason.to_string())),
        }
    }
}

/// Read one level input with a bounded timeout. `None` means the value
/// could not be determined.
async fn read_input<I: SwitchInput>(input: &I, timeout: Duration, label: &str) -> Option<bool> {
    match tokio::time::timeout(timeout, input.is_active()).await {
        Ok(Ok(active)) => Some(active),
        Ok(Err(err)) => {
            warn!(%label, %err, "safety input read failed");
            None
        }
        Err(_) => {
            warn!(%label, "safety input read timed out");
            None
        }
    }
}
