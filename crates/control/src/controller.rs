//! Actuator controller — the single authority over the actuator sink.
//!
//! Everything else in the system *proposes* commands; only this component
//! executes them. It arbitrates between origins (safety > human >
//! scheduler), enforces per-actuator rate limits, owns every pulse timer,
//! and forwards each auditable outcome to the event sink.

use std::collections::HashMap;

use tracing::{trace, warn};

use terrarium_domain::command::{
    ActuatorAction, ActuatorCommand, CommandOrigin, CommandOutcome, RejectReason,
};
use terrarium_domain::event::{EventPayload, LoopEvent};
use terrarium_domain::id::ActuatorId;
use terrarium_domain::safety::SafetyState;
use terrarium_domain::time::Timestamp;

use crate::ports::{ActuatorSink, EventSink};

/// Configured limits for one actuator.
#[derive(Debug, Clone)]
pub struct ActuatorPolicy {
    /// Minimum seconds between the end of one activation and the next.
    pub min_interval_s: u64,
    /// Runtime budget per window; `None` disables the cap.
    pub max_runtime_s: Option<u64>,
    /// Budget window length in seconds.
    pub window_s: u64,
}

impl Default for ActuatorPolicy {
    fn default() -> Self {
        Self {
            min_interval_s: 0,
            max_runtime_s: None,
            window_s: 3600,
        }
    }
}

/// Per-actuator runtime bookkeeping. Lives for the whole process.
#[derive(Debug, Default)]
struct RateLimitRecord {
    on: bool,
    on_since: Option<Timestamp>,
    last_activation_end: Option<Timestamp>,
    window_start: Option<Timestamp>,
    runtime_in_window_s: i64,
    pulse_deadline: Option<Timestamp>,
    pulse_origin: Option<CommandOrigin>,
    last_outcome: Option<CommandOutcome>,
}

/// Operator-facing view of one actuator.
#[derive(Debug, Clone)]
pub struct ActuatorStatus {
    pub actuator_id: ActuatorId,
    pub on: bool,
    pub pulse_deadline: Option<Timestamp>,
    pub last_outcome: Option<CommandOutcome>,
}

/// The sole writer to the actuator sink.
pub struct ActuatorController<A, E> {
    sink: A,
    events: E,
    order: Vec<ActuatorId>,
    policies: HashMap<ActuatorId, ActuatorPolicy>,
    records: HashMap<ActuatorId, RateLimitRecord>,
}

impl<A: ActuatorSink, E: EventSink> ActuatorController<A, E> {
    pub fn new(sink: A, events: E, actuators: Vec<(ActuatorId, ActuatorPolicy)>) -> Self {
        let order: Vec<ActuatorId> = actuators.iter().map(|(id, _)| id.clone()).collect();
        let records = order
            .iter()
            .map(|id| (id.clone(), RateLimitRecord::default()))
            .collect();
        let policies = actuators.into_iter().collect();
        Self {
            sink,
            events,
            order,
            policies,
            records,
        }
    }

    /// Process one tick: fire due pulse offs, then resolve the batch.
    ///
    /// The returned pairs preserve processing order; every auditable
    /// outcome has already been forwarded to the event sink.
    pub async fn tick(
        &mut self,
        safety: SafetyState,
        mut commands: Vec<ActuatorCommand>,
        now: Timestamp,
    ) -> Vec<(ActuatorCommand, CommandOutcome)> {
        let mut results = Vec::new();

        // Controller-owned pulse timers fire first: the off is guaranteed
        // even if the component that asked for the pulse no longer exists.
        for (actuator_id, origin) in self.due_pulse_offs(now) {
            if let Some(record) = self.records.get_mut(&actuator_id) {
                record.pulse_deadline = None;
                record.pulse_origin = None;
            }
            let cmd = ActuatorCommand::new(actuator_id, ActuatorAction::Off, origin, now);
            let outcome = self.apply(&cmd, now).await;
            results.push((cmd, outcome));
        }

        // Stable sort: priority order across origins, generation order
        // within one origin.
        commands.sort_by_key(|cmd| cmd.origin);

        let mut best: HashMap<ActuatorId, CommandOrigin> = HashMap::new();
        for cmd in &commands {
            best.entry(cmd.actuator_id.clone())
                .and_modify(|origin| *origin = (*origin).min(cmd.origin))
                .or_insert(cmd.origin);
        }

        for cmd in commands {
            let outcome = if !safety.allows(cmd.origin) {
                CommandOutcome::Rejected {
                    reason: RejectReason::Stopped,
                }
            } else if best.get(&cmd.actuator_id).copied() < Some(cmd.origin) {
                CommandOutcome::Rejected {
                    reason: RejectReason::Preempted,
                }
            } else {
                self.apply(&cmd, now).await
            };
            results.push((cmd, outcome));
        }

        for (cmd, outcome) in &results {
            if let Some(record) = self.records.get_mut(&cmd.actuator_id) {
                record.last_outcome = Some(outcome.clone());
            }
            if outcome.is_auditable() {
                let event = LoopEvent::new(
                    now,
                    EventPayload::Command {
                        command: cmd.clone(),
                        outcome: outcome.clone(),
                    },
                );
                if let Err(err) = self.events.append(event).await {
                    warn!(%err, "failed to forward command outcome");
                }
            } else {
                trace!(command = %cmd, "command deduplicated");
            }
        }

        results
    }

    /// Current per-actuator view, in configuration order.
    #[must_use]
    pub fn statuses(&self) -> Vec<ActuatorStatus> {
        self.order
            .iter()
            .filter_map(|id| {
                self.records.get(id).map(|record| ActuatorStatus {
                    actuator_id: id.clone(),
                    on: record.on,
                    pulse_deadline: record.pulse_deadline,
                    last_outcome: record.last_outcome.clone(),
                })
            })
            .collect()
    }

    fn due_pulse_offs(&self, now: Timestamp) -> Vec<(ActuatorId, CommandOrigin)> {
        self.order
            .iter()
            .filter_map(|id| {
                let record = self.records.get(id)?;
                let deadline = record.pulse_deadline?;
                (record.on && deadline <= now).then(|| {
                    (
                        id.clone(),
                        record.pulse_origin.unwrap_or(CommandOrigin::Scheduler),
                    )
                })
            })
            .collect()
    }

    async fn apply(&mut self, cmd: &ActuatorCommand, now: Timestamp) -> CommandOutcome {
        let Some(record) = self.records.get_mut(&cmd.actuator_id) else {
            return CommandOutcome::Failed {
                message: format!("unknown actuator `{}`", cmd.actuator_id),
            };
        };
        let policy = self.policies.get(&cmd.actuator_id).cloned().unwrap_or_default();

        // An in-flight pulse owns its actuator. Only safety takes it away;
        // a repeated pulse is a no-op rather than a stacked timer.
        if record.pulse_deadline.is_some() && cmd.origin != CommandOrigin::Safety {
            return if matches!(cmd.action, ActuatorAction::Pulse { .. }) {
                CommandOutcome::Unchanged
            } else {
                CommandOutcome::Rejected {
                    reason: RejectReason::Busy,
                }
            };
        }

        match cmd.action {
            ActuatorAction::Off => {
                if !record.on {
                    return CommandOutcome::Unchanged;
                }
                match self.sink.set(&cmd.actuator_id, false).await {
                    Ok(()) => {
                        deactivate(record, now);
                        record.pulse_deadline = None;
                        record.pulse_origin = None;
                        CommandOutcome::Executed
                    }
                    Err(err) => CommandOutcome::Failed {
                        message: err.to_string(),
                    },
                }
            }
            ActuatorAction::On => {
                if record.on {
                    // A safety-on (unusual but legal) takes ownership of a
                    // running pulse by cancelling its deadline.
                    if cmd.origin == CommandOrigin::Safety {
                        record.pulse_deadline = None;
                        record.pulse_origin = None;
                    }
                    return CommandOutcome::Unchanged;
                }
                if let Some(reason) = check_limits(&policy, record, now) {
                    return CommandOutcome::Rejected { reason };
                }
                match self.sink.set(&cmd.actuator_id, true).await {
                    Ok(()) => {
                        activate(record, now);
                        CommandOutcome::Executed
                    }
                    Err(err) => CommandOutcome::Failed {
                        message: err.to_string(),
                    },
                }
            }
            ActuatorAction::Pulse { seconds } => {
                if record.on {
                    return CommandOutcome::Unchanged;
                }
                if let Some(reason) = check_limits(&policy, record, now) {
                    return CommandOutcome::Rejected { reason };
                }
                match self.sink.set(&cmd.actuator_id, true).await {
                    Ok(()) => {
                        activate(record, now);
                        record.pulse_deadline =
                            Some(now + chrono::Duration::seconds(clamp_seconds(seconds)));
                        record.pulse_origin = Some(cmd.origin);
                        CommandOutcome::Executed
                    }
                    Err(err) => CommandOutcome::Failed {
                        message: err.to_string(),
                    },
                }
            }
        }
    }
}

fn activate(record: &mut RateLimitRecord, now: Timestamp) {
    record.on = true;
    record.on_since = Some(now);
}

fn deactivate(record: &mut RateLimitRecord, now: Timestamp) {
    if let Some(since) = record.on_since {
        record.runtime_in_window_s += now.signed_duration_since(since).num_seconds();
    }
    record.on = false;
    record.on_since = None;
    record.last_activation_end = Some(now);
}

/// Activation gate: minimum interval first, then the runtime budget.
fn check_limits(
    policy: &ActuatorPolicy,
    record: &mut RateLimitRecord,
    now: Timestamp,
) -> Option<RejectReason> {
    if let Some(end) = record.last_activation_end {
        if now.signed_duration_since(end)
            < chrono::Duration::seconds(clamp_seconds(policy.min_interval_s))
        {
            return Some(RejectReason::MinInterval);
        }
    }
    if let Some(cap) = policy.max_runtime_s {
        let window = chrono::Duration::seconds(clamp_seconds(policy.window_s));
        match record.window_start {
            Some(start) if now.signed_duration_since(start) >= window => {
                record.window_start = Some(now);
                record.runtime_in_window_s = 0;
            }
            None => record.window_start = Some(now),
            _ => {}
        }
        if record.runtime_in_window_s >= clamp_seconds(cap) {
            return Some(RejectReason::RuntimeBudget);
        }
    }
    None
}

fn clamp_seconds(seconds: u64) -> i64 {
    i64::try_from(seconds).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::{Arc, Mutex};
    use chrono::{TimeZone, Utc};
    use terrarium_domain::error::{PortError, TerrariumError};

    // ── Recording actuator sink ────────────────────────────────────

    #[derive(Clone, Default)]
    struct RecordingSink {
        log: Arc<Mutex<Vec<(ActuatorId, bool)>>>,
        failing: Arc<Mutex<bool>>,
    }

    impl RecordingSink {
        fn log(&self) -> Vec<(ActuatorId, bool)> {
            self.log.lock().unwrap().clone()
        }

        fn set_failing(&self, failing: bool) {
            *self.failing.lock().unwrap() = failing;
        }
    }

    impl ActuatorSink for RecordingSink {
        fn set(
            &self,
            actuator_id: &ActuatorId,
            on: bool,
        ) -> impl Future<Output = Result<(), PortError>> + Send {
            let result = if *self.failing.lock().unwrap() {
                Err(PortError::Io("relay offline".to_string()))
            } else {
                self.log.lock().unwrap().push((actuator_id.clone(), on));
                Ok(())
            };
            async move { result }
        }
    }

    // ── Spy event sink ─────────────────────────────────────────────

    #[derive(Clone, Default)]
    struct SpySink {
        events: Arc<Mutex<Vec<LoopEvent>>>,
    }

    impl SpySink {
        fn events(&self) -> Vec<LoopEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for SpySink {
        fn append(
            &self,
            event: LoopEvent,
        ) -> impl Future<Output = Result<(), TerrariumError>> + Send {
            self.events.lock().unwrap().push(event);
            async { Ok(()) }
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn at(seconds: i64) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
    }

    fn pump() -> ActuatorId {
        ActuatorId::new("pump")
    }

    fn cmd(action: ActuatorAction, origin: CommandOrigin, issued: Timestamp) -> ActuatorCommand {
        ActuatorCommand::new(pump(), action, origin, issued)
    }

    fn controller(
        policy: ActuatorPolicy,
    ) -> (ActuatorController<RecordingSink, SpySink>, RecordingSink, SpySink) {
        let sink = RecordingSink::default();
        let events = SpySink::default();
        let controller =
            ActuatorController::new(sink.clone(), events.clone(), vec![(pump(), policy)]);
        (controller, sink, events)
    }

    // ── Tests ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn should_execute_command_and_forward_outcome() {
        let (mut c, sink, events) = controller(ActuatorPolicy::default());
        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(0))],
                at(0),
            )
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(sink.log(), vec![(pump(), true)]);
        assert_eq!(events.events().len(), 1);
    }

    #[tokio::test]
    async fn should_dedup_identical_commands_within_one_tick() {
        let (mut c, sink, events) = controller(ActuatorPolicy::default());
        let results = c
            .tick(
                SafetyState::Normal,
                vec![
                    cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(0)),
                    cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(0)),
                ],
                at(0),
            )
            .await;

        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(results[1].1, CommandOutcome::Unchanged);
        // The sink saw exactly one write, and the no-op left no event.
        assert_eq!(sink.log().len(), 1);
        assert_eq!(events.events().len(), 1);
    }

    #[tokio::test]
    async fn should_reject_non_safety_commands_while_stopped() {
        let (mut c, sink, events) = controller(ActuatorPolicy::default());
        let results = c
            .tick(
                SafetyState::Stopped,
                vec![
                    cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(0)),
                    cmd(ActuatorAction::Pulse { seconds: 5 }, CommandOrigin::Human, at(0)),
                ],
                at(0),
            )
            .await;

        for (_, outcome) in &results {
            assert_eq!(
                *outcome,
                CommandOutcome::Rejected {
                    reason: RejectReason::Stopped
                }
            );
        }
        assert!(sink.log().is_empty());
        // Both rejections are auditable.
        assert_eq!(events.events().len(), 2);
    }

    #[tokio::test]
    async fn should_enforce_minimum_interval_between_activations() {
        let policy = ActuatorPolicy {
            min_interval_s: 60,
            ..ActuatorPolicy::default()
        };
        let (mut c, sink, _) = controller(policy);

        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::On, CommandOrigin::Human, at(0))],
            at(0),
        )
        .await;
        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::Off, CommandOrigin::Human, at(10))],
            at(10),
        )
        .await;

        // Too soon after the activation ended.
        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::On, CommandOrigin::Human, at(30))],
                at(30),
            )
            .await;
        assert_eq!(
            results[0].1,
            CommandOutcome::Rejected {
                reason: RejectReason::MinInterval
            }
        );

        // Exactly the interval later it goes through.
        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::On, CommandOrigin::Human, at(70))],
                at(70),
            )
            .await;
        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(sink.log().len(), 3);
    }

    #[tokio::test]
    async fn should_enforce_runtime_budget_within_window() {
        let policy = ActuatorPolicy {
            min_interval_s: 0,
            max_runtime_s: Some(10),
            window_s: 3600,
        };
        let (mut c, _, _) = controller(policy);

        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(0))],
            at(0),
        )
        .await;
        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::Off, CommandOrigin::Scheduler, at(10))],
            at(10),
        )
        .await;

        // Budget exhausted inside the window.
        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(20))],
                at(20),
            )
            .await;
        assert_eq!(
            results[0].1,
            CommandOutcome::Rejected {
                reason: RejectReason::RuntimeBudget
            }
        );

        // A fresh window resets the budget.
        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(3700))],
                at(3700),
            )
            .await;
        assert_eq!(results[0].1, CommandOutcome::Executed);
    }

    #[tokio::test]
    async fn should_fire_controller_owned_off_when_pulse_expires() {
        let (mut c, sink, events) = controller(ActuatorPolicy::default());
        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::Pulse { seconds: 5 }, CommandOrigin::Human, at(0))],
            at(0),
        )
        .await;
        assert_eq!(sink.log(), vec![(pump(), true)]);

        // Nothing new is commanded; the controller's own timer turns it off.
        let results = c.tick(SafetyState::Normal, Vec::new(), at(5)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.action, ActuatorAction::Off);
        assert_eq!(results[0].0.origin, CommandOrigin::Human);
        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(sink.log(), vec![(pump(), true), (pump(), false)]);
        assert_eq!(events.events().len(), 2);
    }

    #[tokio::test]
    async fn should_cancel_pending_pulse_on_safety_stop() {
        let (mut c, sink, _) = controller(ActuatorPolicy::default());
        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::Pulse { seconds: 10 }, CommandOrigin::Human, at(0))],
            at(0),
        )
        .await;

        // Emergency stop five seconds before the pulse would have ended.
        let results = c
            .tick(
                SafetyState::Stopped,
                vec![cmd(ActuatorAction::Off, CommandOrigin::Safety, at(5))],
                at(5),
            )
            .await;
        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(sink.log(), vec![(pump(), true), (pump(), false)]);

        // At the original expiry nothing further happens.
        let results = c.tick(SafetyState::Stopped, Vec::new(), at(10)).await;
        assert!(results.is_empty());
        assert_eq!(sink.log().len(), 2);
    }

    #[tokio::test]
    async fn should_not_stack_timers_for_repeated_pulses() {
        let (mut c, sink, _) = controller(ActuatorPolicy::default());
        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::Pulse { seconds: 10 }, CommandOrigin::Human, at(0))],
            at(0),
        )
        .await;

        // A second press mid-pulse neither restarts nor extends the timer.
        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::Pulse { seconds: 10 }, CommandOrigin::Human, at(4))],
                at(4),
            )
            .await;
        assert_eq!(results[0].1, CommandOutcome::Unchanged);

        let results = c.tick(SafetyState::Normal, Vec::new(), at(10)).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.action, ActuatorAction::Off);
        assert_eq!(sink.log().len(), 2);
    }

    #[tokio::test]
    async fn should_reject_non_safety_interference_with_running_pulse() {
        let (mut c, sink, _) = controller(ActuatorPolicy::default());
        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::Pulse { seconds: 10 }, CommandOrigin::Scheduler, at(0))],
            at(0),
        )
        .await;

        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::Off, CommandOrigin::Human, at(3))],
                at(3),
            )
            .await;
        assert_eq!(
            results[0].1,
            CommandOutcome::Rejected {
                reason: RejectReason::Busy
            }
        );
        // The pulse still runs to completion.
        let results = c.tick(SafetyState::Normal, Vec::new(), at(10)).await;
        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(sink.log(), vec![(pump(), true), (pump(), false)]);
    }

    #[tokio::test]
    async fn should_let_higher_priority_origin_preempt_within_one_tick() {
        let (mut c, sink, _) = controller(ActuatorPolicy::default());
        let results = c
            .tick(
                SafetyState::Normal,
                vec![
                    cmd(ActuatorAction::Off, CommandOrigin::Scheduler, at(0)),
                    cmd(ActuatorAction::On, CommandOrigin::Human, at(0)),
                ],
                at(0),
            )
            .await;

        // After the stable sort the human command runs first; the
        // scheduler's is preempted.
        assert_eq!(results[0].0.origin, CommandOrigin::Human);
        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(
            results[1].1,
            CommandOutcome::Rejected {
                reason: RejectReason::Preempted
            }
        );
        assert_eq!(sink.log(), vec![(pump(), true)]);
    }

    #[tokio::test]
    async fn should_apply_same_origin_commands_in_generation_order() {
        let (mut c, sink, _) = controller(ActuatorPolicy::default());
        let results = c
            .tick(
                SafetyState::Normal,
                vec![
                    cmd(ActuatorAction::On, CommandOrigin::Human, at(0)),
                    cmd(ActuatorAction::Off, CommandOrigin::Human, at(0)),
                ],
                at(0),
            )
            .await;

        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(results[1].1, CommandOutcome::Executed);
        // Net effect: the later command wins.
        assert_eq!(sink.log(), vec![(pump(), true), (pump(), false)]);
    }

    #[tokio::test]
    async fn should_report_failure_when_sink_errors() {
        let (mut c, sink, events) = controller(ActuatorPolicy::default());
        sink.set_failing(true);

        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(0))],
                at(0),
            )
            .await;
        assert!(matches!(results[0].1, CommandOutcome::Failed { .. }));

        // State was not marked on, so recovery can simply retry.
        sink.set_failing(false);
        let results = c
            .tick(
                SafetyState::Normal,
                vec![cmd(ActuatorAction::On, CommandOrigin::Scheduler, at(1))],
                at(1),
            )
            .await;
        assert_eq!(results[0].1, CommandOutcome::Executed);
        assert_eq!(events.events().len(), 2);
    }

    #[tokio::test]
    async fn should_fail_commands_for_unknown_actuators() {
        let (mut c, sink, _) = controller(ActuatorPolicy::default());
        let unknown = ActuatorCommand::new(
            ActuatorId::new("mister"),
            ActuatorAction::On,
            CommandOrigin::Human,
            at(0),
        );
        let results = c.tick(SafetyState::Normal, vec![unknown], at(0)).await;
        assert!(matches!(results[0].1, CommandOutcome::Failed { .. }));
        assert!(sink.log().is_empty());
    }

    #[tokio::test]
    async fn should_expose_status_with_pulse_deadline() {
        let (mut c, _, _) = controller(ActuatorPolicy::default());
        c.tick(
            SafetyState::Normal,
            vec![cmd(ActuatorAction::Pulse { seconds: 30 }, CommandOrigin::Human, at(0))],
            at(0),
        )
        .await;

        let statuses = c.statuses();
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].on);
        assert_eq!(statuses[0].pulse_deadline, Some(at(30)));
        assert_eq!(statuses[0].last_outcome, Some(CommandOutcome::Executed));
    }
}
