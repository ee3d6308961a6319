//! Control loop — one tick runs every stage in a fixed order.
//!
//! Stage order is the system's core invariant: the safety monitor's result
//! is evaluated and applied before any command from the scheduler or the
//! session manager can reach the actuator sink. All stages run
//! cooperatively on one task; the only suspension points are the bounded
//! port timeouts inside the stages.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use terrarium_domain::command::{ActuatorCommand, CommandOrigin, CommandOutcome};
use terrarium_domain::event::{EventPayload, LoopEvent};
use terrarium_domain::id::SessionId;
use terrarium_domain::safety::SafetyState;
use terrarium_domain::time::{self, Timestamp};

use crate::controller::{ActuatorController, ActuatorStatus};
use crate::ports::{ActuatorSink, EventSink, SensorSource, SwitchInput};
use crate::safety_monitor::SafetyMonitor;
use crate::sampler::EnvironmentSampler;
use crate::scheduler::AutomationScheduler;
use crate::session_manager::SessionManager;

/// What one tick did, for logging and tests.
#[derive(Debug)]
pub struct TickReport {
    pub safety_state: SafetyState,
    pub outcomes: Vec<(ActuatorCommand, CommandOutcome)>,
}

/// Operator-facing snapshot of the whole loop.
#[derive(Debug, Clone)]
pub struct LoopStatus {
    pub safety_state: SafetyState,
    pub actuators: Vec<ActuatorStatus>,
    pub open_session: Option<SessionId>,
}

/// The composed loop. Constructed once at startup from validated
/// configuration; each component receives exactly the interfaces it needs.
pub struct ControlLoop<ES, OS, S, P, A, E> {
    safety: SafetyMonitor<ES, OS>,
    sampler: EnvironmentSampler<S>,
    scheduler: AutomationScheduler,
    sessions: SessionManager<P>,
    controller: ActuatorController<A, E>,
    events: E,
    tick_period: Duration,
}

impl<ES, OS, S, P, A, E> ControlLoop<ES, OS, S, P, A, E>
where
    ES: SwitchInput,
    OS: SwitchInput,
    S: SensorSource,
    P: SwitchInput,
    A: ActuatorSink,
    E: EventSink,
{
    pub fn new(
        safety: SafetyMonitor<ES, OS>,
        sampler: EnvironmentSampler<S>,
        scheduler: AutomationScheduler,
        sessions: SessionManager<P>,
        controller: ActuatorController<A, E>,
        events: E,
        tick_period: Duration,
    ) -> Self {
        Self {
            safety,
            sampler,
            scheduler,
            sessions,
            controller,
            events,
            tick_period,
        }
    }

    /// Run one full cycle: safety → sample → session + schedule → actuate.
    ///
    /// Never fails: port errors are absorbed into events and the
    /// components' documented fail-safes before they can cross the tick
    /// boundary.
    pub async fn tick(&mut self, now: Timestamp) -> TickReport {
        // 1. Safety first; its commands lead the batch.
        let check = self.safety.tick(now).await;
        if let Some((from, to, reason)) = check.transition {
            self.publish(LoopEvent::new(now, EventPayload::Safety { from, to, reason }))
                .await;
        }
        let mut commands = check.commands;

        // 2. Sample. Fresh readings and degradation reports go to the sink.
        let sample = self.sampler.tick(now).await;
        for reading in sample.readings {
            self.publish(LoopEvent::new(now, EventPayload::Reading(reading)))
                .await;
        }
        for (source_id, streak) in sample.degraded {
            self.publish(LoopEvent::new(
                now,
                EventPayload::SensorDegraded { source_id, streak },
            ))
            .await;
        }

        // 3. Session and scheduler both propose; the scheduler is muted
        //    whenever the safety state does not admit it.
        let session_out = self.sessions.tick(now).await;
        for event in session_out.events {
            self.publish(event).await;
        }
        commands.extend(session_out.commands);

        if check.state.allows(CommandOrigin::Scheduler) {
            commands.extend(self.scheduler.evaluate(self.sampler.snapshot(), now));
        } else {
            debug!(state = %check.state, "scheduler muted");
        }

        // 4. Actuate. The controller forwards outcomes to the sink itself.
        let outcomes = self.controller.tick(check.state, commands, now).await;

        TickReport {
            safety_state: check.state,
            outcomes,
        }
    }

    /// Drive ticks until the shutdown flag flips.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(period = ?self.tick_period, "control loop started");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let report = self.tick(time::now()).await;
                    if !report.outcomes.is_empty() {
                        debug!(
                            state = %report.safety_state,
                            outcomes = report.outcomes.len(),
                            "tick complete"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("control loop stopped");
    }

    /// The snapshot an operator sees: every rejection or fault is either
    /// here or in the event stream.
    #[must_use]
    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            safety_state: self.safety.state(),
            actuators: self.controller.statuses(),
            open_session: self.sessions.open_session().map(|s| s.id),
        }
    }

    /// Access the safety monitor, e.g. for an explicit latch reset.
    pub fn safety_mut(&mut self) -> &mut SafetyMonitor<ES, OS> {
        &mut self.safety
    }

    /// Access the session manager, e.g. for explicit session start/end.
    pub fn sessions_mut(&mut self) -> &mut SessionManager<P> {
        &mut self.sessions
    }

    async fn publish(&self, event: LoopEvent) {
        if let Err(err) = self.events.append(event).await {
            warn!(%err, "failed to append loop event");
        }
    }
}
