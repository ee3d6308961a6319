//! Safety state — owned by the safety monitor, read by everyone else.

use serde::{Deserialize, Serialize};

use crate::command::CommandOrigin;

/// The latched safety condition of the whole system.
///
/// Only the safety monitor mutates this; `Stopped` models a physically
/// latching emergency stop and is never left automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyState {
    /// Automation, human and safety commands all flow.
    #[default]
    Normal,
    /// Emergency stop latched; only safety commands flow.
    Stopped,
    /// Manual override active; automation is paused, humans stay in control.
    Overridden,
}

impl SafetyState {
    /// Whether a command from `origin` may reach the actuator sink in this
    /// state.
    #[must_use]
    pub fn allows(self, origin: CommandOrigin) -> bool {
        match self {
            Self::Normal => true,
            Self::Stopped => origin == CommandOrigin::Safety,
            Self::Overridden => origin != CommandOrigin::Scheduler,
        }
    }

    /// True while the emergency stop is latched.
    #[must_use]
    pub fn is_stopped(self) -> bool {
        matches!(self, Self::Stopped)
    }
}

impl std::fmt::Display for SafetyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Stopped => f.write_str("stopped"),
            Self::Overridden => f.write_str("overridden"),
        }
    }
}
