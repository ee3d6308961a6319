//! Automation scheduler — turns rules plus the latest snapshot into
//! proposed commands.
//!
//! Evaluation is deterministic: rules run in declaration order, and when
//! two rules target the same actuator in the same tick the later
//! declaration wins. Rule authors rely on that ordering to express
//! overrides, so it is a documented contract, not an accident.
//!
//! Switch rules are level-triggered: they propose the desired state every
//! tick, which makes a restart mid-window converge within one tick. The
//! controller deduplicates the no-ops.

use std::collections::HashSet;

use tracing::debug;

use terrarium_domain::command::{ActuatorAction, ActuatorCommand, CommandOrigin};
use terrarium_domain::rule::{Rule, RuleCommand, RuleCondition};
use terrarium_domain::time::{self, Timestamp};

use crate::sampler::Snapshot;

#[derive(Debug, Default, Clone)]
struct RuleState {
    engaged: Option<bool>,
    last_flip: Option<Timestamp>,
    last_fire: Option<Timestamp>,
}

/// Evaluates the configured rule set once per tick.
pub struct AutomationScheduler {
    rules: Vec<Rule>,
    states: Vec<RuleState>,
}

impl AutomationScheduler {
    /// Takes a rule set that already passed startup validation.
    #[must_use]
    pub fn new(rules: Vec<Rule>) -> Self {
        let states = vec![RuleState::default(); rules.len()];
        Self { rules, states }
    }

    /// The configured rules, in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate all rules against the snapshot and wall-clock time.
    ///
    /// Rate limiting is deliberately absent here: every proposal goes
    /// through the controller's limits like any other command.
    pub fn evaluate(&mut self, snapshot: &Snapshot, now: Timestamp) -> Vec<ActuatorCommand> {
        let clock = time::hhmm(now);
        let mut proposals = Vec::new();

        for (rule, state) in self.rules.iter().zip(self.states.iter_mut()) {
            let desired = match &rule.condition {
                RuleCondition::Threshold { source_id, .. } => {
                    // Invalid or missing input: hold the latch, propose
                    // nothing for this rule this tick.
                    let Some(value) = snapshot.valid_value(source_id) else {
                        debug!(rule = %rule.name, source = %source_id, "no valid input, holding");
                        continue;
                    };
                    rule.condition
                        .next_engaged(state.engaged.unwrap_or(false), value)
                }
                RuleCondition::TimeWindow { .. } => rule.condition.window_contains(&clock),
            };

            let engaged = state.advance(desired, rule.cooldown_s, now);

            match rule.command {
                RuleCommand::Switch => {
                    let action = if engaged {
                        ActuatorAction::On
                    } else {
                        ActuatorAction::Off
                    };
                    proposals.push(command(rule, action, now));
                }
                RuleCommand::Pulse { seconds } => {
                    if engaged && state.fire_due(rule.cooldown_s, now) {
                        state.last_fire = Some(now);
                        proposals.push(command(rule, ActuatorAction::Pulse { seconds }, now));
                    }
                }
            }
        }

        collapse_last_write(proposals)
    }
}

impl RuleState {
    /// Apply the dwell cooldown and move the latch.
    fn advance(&mut self, desired: bool, cooldown_s: u64, now: Timestamp) -> bool {
        let engaged = match self.engaged {
            Some(prev) if prev != desired => {
                if self.last_flip.is_some_and(|flip| !elapsed(flip, cooldown_s, now)) {
                    prev
                } else {
                    self.last_flip = Some(now);
                    desired
                }
            }
            Some(prev) => prev,
            None => {
                self.last_flip = Some(now);
                desired
            }
        };
        self.engaged = Some(engaged);
        engaged
    }

    fn fire_due(&self, cooldown_s: u64, now: Timestamp) -> bool {
        self.last_fire.is_none_or(|fired| elapsed(fired, cooldown_s, now))
    }
}

fn elapsed(since: Timestamp, seconds: u64, now: Timestamp) -> bool {
    now.signed_duration_since(since) >= chrono::Duration::seconds(i64::try_from(seconds).unwrap_or(i64::MAX))
}

fn command(rule: &Rule, action: ActuatorAction, now: Timestamp) -> ActuatorCommand {
    ActuatorCommand::new(
        rule.actuator_id.clone(),
        action,
        CommandOrigin::Scheduler,
        now,
    )
}

/// Keep only the last proposal per actuator, preserving the relative order
/// of the winners.
fn collapse_last_write(proposals: Vec<ActuatorCommand>) -> Vec<ActuatorCommand> {
    let mut seen = HashSet::new();
    let mut winners: Vec<ActuatorCommand> = proposals
        .into_iter()
        .rev()
        .filter(|cmd| seen.insert(cmd.actuator_id.clone()))
        .collect();
    winners.reverse();
    winners
}
