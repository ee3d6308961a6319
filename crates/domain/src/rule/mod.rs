//! Rules — the fixed automation vocabulary of the control loop.
//!
//! A rule binds one condition (threshold with hysteresis, or a daily time
//! window) to one actuator. Rules are declared in configuration, validated
//! at startup, and evaluated in declaration order every tick.

mod condition;

pub use condition::RuleCondition;

use serde::{Deserialize, Serialize};

use crate::error::{TerrariumError, ValidationError};
use crate::id::ActuatorId;

/// What the rule drives on its actuator while engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCommand {
    /// Hold the actuator on while the condition is engaged, off otherwise.
    Switch,
    /// Fire a timed pulse on engagement, re-firing after the cooldown while
    /// the condition stays engaged.
    Pulse { seconds: u64 },
}

impl std::fmt::Display for RuleCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Switch => f.write_str("switch"),
            Self::Pulse { seconds } => write!(f, "pulse({seconds}s)"),
        }
    }
}

/// One automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub actuator_id: ActuatorId,
    pub condition: RuleCondition,
    pub command: RuleCommand,
    /// Minimum seconds between latch flips (switch rules) or between pulse
    /// fires (pulse rules, where it must be non-zero).
    pub cooldown_s: u64,
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - a threshold band is degenerate ([`ValidationError::EqualThresholds`])
    /// - a window bound is malformed ([`ValidationError::MalformedTimeWindow`])
    /// - a pulse rule has no cooldown ([`ValidationError::ZeroPulseCooldown`])
    ///   or a zero duration ([`ValidationError::ZeroPulseDuration`])
    pub fn validate(&self) -> Result<(), TerrariumError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        self.condition.validate(&self.name)?;
        if let RuleCommand::Pulse { seconds } = self.command {
            if self.cooldown_s == 0 {
                return Err(ValidationError::ZeroPulseCooldown {
                    rule: self.name.clone(),
                }
                .into());
            }
            if seconds == 0 {
                return Err(ValidationError::ZeroPulseDuration {
                    rule: self.name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{} -> {}:{}]",
            self.name, self.condition, self.actuator_id, self.command
        )
    }
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    name: Option<String>,
    actuator_id: Option<ActuatorId>,
    condition: Option<RuleCondition>,
    command: Option<RuleCommand>,
    cooldown_s: Option<u64>,
}

impl RuleBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn actuator(mut self, id: ActuatorId) -> Self {
        self.actuator_id = Some(id);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: RuleCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn command(mut self, command: RuleCommand) -> Self {
        self.command = Some(command);
        self
    }

    #[must_use]
    pub fn cooldown_s(mut self, seconds: u64) -> Self {
        self.cooldown_s = Some(seconds);
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// # Errors
    ///
    /// Returns [`TerrariumError::Validation`] if required fields are missing
    /// or inconsistent.
    pub fn build(self) -> Result<Rule, TerrariumError> {
        let rule = Rule {
            name: self.name.unwrap_or_default(),
            actuator_id: self.actuator_id.unwrap_or_else(|| ActuatorId::new("")),
            condition: self.condition.unwrap_or(RuleCondition::TimeWindow {
                after: "00:00".to_string(),
                before: "23:59".to_string(),
            }),
            command: self.command.unwrap_or(RuleCommand::Switch),
            cooldown_s: self.cooldown_s.unwrap_or(0),
        };
        rule.validate()?;
        Ok(rule)
    }
}
