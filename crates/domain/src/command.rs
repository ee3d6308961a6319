//! Actuator commands — the requests that flow into the controller.

use serde::{Deserialize, Serialize};

use crate::id::ActuatorId;
use crate::time::Timestamp;

/// What the actuator should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActuatorAction {
    /// Switch on until further notice.
    On,
    /// Switch off.
    Off,
    /// Switch on now; the controller owns the follow-up off.
    Pulse { seconds: u64 },
}

impl ActuatorAction {
    /// Whether executing this action leaves the actuator energized.
    #[must_use]
    pub fn energizes(self) -> bool {
        matches!(self, Self::On | Self::Pulse { .. })
    }
}

impl std::fmt::Display for ActuatorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Pulse { seconds } => write!(f, "pulse({seconds}s)"),
        }
    }
}

/// Who asked for the action.
///
/// Variant order is priority order: safety preempts human, human preempts
/// the scheduler. `Ord` follows declaration order, so sorting a batch of
/// commands by origin yields priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandOrigin {
    Safety,
    Human,
    Scheduler,
}

impl std::fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safety => f.write_str("safety"),
            Self::Human => f.write_str("human"),
            Self::Scheduler => f.write_str("scheduler"),
        }
    }
}

/// A single request against one actuator, consumed exactly once by the
/// controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorCommand {
    pub actuator_id: ActuatorId,
    pub action: ActuatorAction,
    pub origin: CommandOrigin,
    pub issued_at: Timestamp,
}

impl ActuatorCommand {
    #[must_use]
    pub fn new(
        actuator_id: ActuatorId,
        action: ActuatorAction,
        origin: CommandOrigin,
        issued_at: Timestamp,
    ) -> Self {
        Self {
            actuator_id,
            action,
            origin,
            issued_at,
        }
    }

    /// The all-off command the safety monitor issues on a trip.
    #[must_use]
    pub fn safety_off(actuator_id: ActuatorId, issued_at: Timestamp) -> Self {
        Self::new(actuator_id, ActuatorAction::Off, CommandOrigin::Safety, issued_at)
    }
}

impl std::fmt::Display for ActuatorCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} ({})", self.actuator_id, self.action, self.origin)
    }
}

/// Why a command was turned away without reaching the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The safety state is `Stopped`; only safety commands pass.
    Stopped,
    /// The minimum interval since the last activation has not elapsed.
    MinInterval,
    /// The runtime budget for the current window is exhausted.
    RuntimeBudget,
    /// A higher-priority origin addressed the same actuator this tick.
    Preempted,
    /// The actuator is owned by an in-flight pulse; only safety may take it.
    Busy,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => f.write_str("stopped"),
            Self::MinInterval => f.write_str("min_interval"),
            Self::RuntimeBudget => f.write_str("runtime_budget"),
            Self::Preempted => f.write_str("preempted"),
            Self::Busy => f.write_str("busy"),
        }
    }
}

/// What became of a command once the controller processed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Forwarded to the actuator sink.
    Executed,
    /// Would not have changed the actuator's state; dropped as a no-op.
    Unchanged,
    /// Turned away before reaching the sink.
    Rejected { reason: RejectReason },
    /// The actuator sink itself reported a failure.
    Failed { message: String },
}

impl CommandOutcome {
    /// Whether the outcome deserves a record in the event sink.
    ///
    /// `Unchanged` no-ops would flood the sink once per tick for every
    /// level-triggered rule; everything else is audit-worthy.
    #[must_use]
    pub fn is_auditable(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_order_origins_by_priority() {
        assert!(CommandOrigin::Safety < CommandOrigin::Human);
        assert!(CommandOrigin::Human < CommandOrigin::Scheduler);
    }

    #[test]
    fn should_report_energizing_actions() {
        assert!(ActuatorAction::On.energizes());
        assert!(ActuatorAction::Pulse { seconds: 5 }.energizes());
        assert!(!ActuatorAction::Off.energizes());
    }

    #[test]
    fn should_build_safety_off_command() {
        let cmd = ActuatorCommand::safety_off(ActuatorId::new("pump"), now());
        assert_eq!(cmd.action, ActuatorAction::Off);
        assert_eq!(cmd.origin, CommandOrigin::Safety);
    }

    #[test]
    fn should_display_pulse_command() {
        let cmd = ActuatorCommand::new(
            ActuatorId::new("pump"),
            ActuatorAction::Pulse { seconds: 30 },
            CommandOrigin::Human,
            now(),
        );
        assert_eq!(cmd.to_string(), "pump:pulse(30s) (human)");
    }

    #[test]
    fn should_keep_unchanged_outcomes_out_of_the_audit_trail() {
        assert!(!CommandOutcome::Unchanged.is_auditable());
        assert!(CommandOutcome::Executed.is_auditable());
        assert!(
            CommandOutcome::Rejected {
                reason: RejectReason::MinInterval
            }
            .is_auditable()
        );
    }

    #[test]
    fn should_roundtrip_command_through_serde_json() {
        let cmd = ActuatorCommand::new(
            ActuatorId::new("fan"),
            ActuatorAction::On,
            CommandOrigin::Scheduler,
            now(),
        );
        let json = serde_json::to_string(&cmd).unwrap();
        let parsed: ActuatorCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, cmd);
    }

    #[test]
    fn should_tag_outcome_variants_in_json() {
        let json = serde_json::to_string(&CommandOutcome::Rejected {
            reason: RejectReason::Stopped,
        })
        .unwrap();
        assert!(json.contains("\"rejected\""));
        assert!(json.contains("\"stopped\""));
    }
}
