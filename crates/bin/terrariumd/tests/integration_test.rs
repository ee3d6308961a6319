//! End-to-end tests for the full control stack.
//!
//! Each test wires the real components (sampler, scheduler, safety
//! monitor, session manager, controller, event bus) to the virtual bench
//! and drives ticks with explicit timestamps — no sleeping, no real clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};

use terrarium_adapter_virtual::{
    VirtualButtonPanel, VirtualRelayBoard, VirtualSensor, VirtualSwitch,
};
use terrarium_control::control_loop::ControlLoop;
use terrarium_control::controller::{ActuatorController, ActuatorPolicy};
use terrarium_control::event_bus::InProcessEventBus;
use terrarium_control::safety_monitor::SafetyMonitor;
use terrarium_control::sampler::{EnvironmentSampler, SensorSpec};
use terrarium_control::scheduler::AutomationScheduler;
use terrarium_control::session_manager::{ButtonBinding, SessionManager};
use terrarium_domain::command::{ActuatorAction, CommandOutcome, RejectReason};
use terrarium_domain::event::{EventPayload, LoopEvent, SessionEvent};
use terrarium_domain::id::{ActuatorId, ButtonId, SourceId};
use terrarium_domain::reading::SensorKind;
use terrarium_domain::rule::{Rule, RuleCondition};
use terrarium_domain::safety::SafetyState;
use terrarium_domain::session::CloseReason;
use terrarium_domain::time::Timestamp;

type Bench = (
    ControlLoop<
        VirtualSwitch,
        VirtualSwitch,
        VirtualSensor,
        VirtualSwitch,
        VirtualRelayBoard,
        Arc<InProcessEventBus>,
    >,
    BenchHandles,
);

struct BenchHandles {
    estop: VirtualSwitch,
    mat: VirtualSwitch,
    air_temp: VirtualSensor,
    relays: VirtualRelayBoard,
    buttons: VirtualButtonPanel,
    events: tokio::sync::broadcast::Receiver<LoopEvent>,
}

fn at(seconds: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
}

fn fan_rule() -> Rule {
    Rule::builder()
        .name("cooling fan")
        .actuator(ActuatorId::new("fan"))
        .condition(RuleCondition::Threshold {
            source_id: SourceId::new("air_temp"),
            on_at: 28.0,
            off_at: 22.0,
        })
        .build()
        .unwrap()
}

/// Wire the complete stack the way `terrariumd` does, with a pump rate
/// limit tight enough to exercise rejections.
fn bench(rules: Vec<Rule>) -> Bench {
    let estop = VirtualSwitch::new();
    let override_input = VirtualSwitch::new();
    let mat = VirtualSwitch::new();
    let air_temp = VirtualSensor::new(20.0, "°C");

    let actuators = vec![
        (ActuatorId::new("fan"), ActuatorPolicy::default()),
        (
            ActuatorId::new("pump"),
            ActuatorPolicy {
                min_interval_s: 30,
                max_runtime_s: Some(600),
                window_s: 3600,
            },
        ),
    ];
    let relays = VirtualRelayBoard::new(actuators.iter().map(|(id, _)| id.clone()));
    let bus = Arc::new(InProcessEventBus::new(256));
    let events = bus.subscribe();

    let safety = SafetyMonitor::new(
        estop.clone(),
        override_input,
        actuators.iter().map(|(id, _)| id.clone()).collect(),
        Duration::from_millis(100),
    );
    let sampler = EnvironmentSampler::new(
        vec![(
            SensorSpec {
                source_id: SourceId::new("air_temp"),
                kind: SensorKind::Temperature,
                unit: "°C".to_string(),
                min: -10.0,
                max: 60.0,
            },
            air_temp.clone(),
        )],
        0,
        Duration::from_millis(100),
    );
    let scheduler = AutomationScheduler::new(rules);
    let (button_tx, button_rx) = SessionManager::<VirtualSwitch>::button_channel(16);
    let buttons = VirtualButtonPanel::new(button_tx);
    let sessions = SessionManager::new(
        mat.clone(),
        button_rx,
        HashMap::from([(
            ButtonId::new("water_now"),
            ButtonBinding {
                actuator_id: ActuatorId::new("pump"),
                action: ActuatorAction::Pulse { seconds: 10 },
            },
        )]),
        10,
        Duration::from_millis(100),
    );
    let controller = ActuatorController::new(relays.clone(), Arc::clone(&bus), actuators);

    let control_loop = ControlLoop::new(
        safety,
        sampler,
        scheduler,
        sessions,
        controller,
        Arc::clone(&bus),
        Duration::from_millis(200),
    );

    (
        control_loop,
        BenchHandles {
            estop,
            mat,
            air_temp,
            relays,
            buttons,
            events,
        },
    )
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<LoopEvent>) -> Vec<LoopEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

// ---------------------------------------------------------------------------
// Automation over the virtual bench
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_drive_fan_relay_through_hysteresis_band() {
    let (mut control_loop, mut handles) = bench(vec![fan_rule()]);
    let fan = ActuatorId::new("fan");

    control_loop.tick(at(0)).await;
    assert!(!handles.relays.is_on(&fan));

    handles.air_temp.set_value(29.0);
    control_loop.tick(at(1)).await;
    assert!(handles.relays.is_on(&fan));

    // Cooling into the band: still on.
    handles.air_temp.set_value(25.0);
    control_loop.tick(at(2)).await;
    assert!(handles.relays.is_on(&fan));

    handles.air_temp.set_value(18.0);
    control_loop.tick(at(3)).await;
    assert!(!handles.relays.is_on(&fan));

    let events = drain(&mut handles.events);
    assert!(
        events
            .iter()
            .any(|e| matches!(e.payload, EventPayload::Reading(_)))
    );
}

#[tokio::test]
async fn should_report_degraded_sensor_exactly_once() {
    let (mut control_loop, mut handles) = bench(vec![fan_rule()]);

    handles.air_temp.set_failing(true);
    for t in 0..5 {
        control_loop.tick(at(t)).await;
    }

    let degraded = drain(&mut handles.events)
        .into_iter()
        .filter(|e| matches!(e.payload, EventPayload::SensorDegraded { .. }))
        .count();
    assert_eq!(degraded, 1);
}

// ---------------------------------------------------------------------------
// Safety
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_stop_everything_until_explicit_reset() {
    let (mut control_loop, mut handles) = bench(vec![fan_rule()]);
    let fan = ActuatorId::new("fan");

    handles.air_temp.set_value(35.0);
    control_loop.tick(at(0)).await;
    assert!(handles.relays.is_on(&fan));

    handles.estop.set_active(true);
    let report = control_loop.tick(at(1)).await;
    assert_eq!(report.safety_state, SafetyState::Stopped);
    assert!(!handles.relays.is_on(&fan));
    assert_eq!(handles.relays.energized_count(), 0);

    // Releasing the stop changes nothing by itself.
    handles.estop.set_active(false);
    for t in 2..6 {
        control_loop.tick(at(t)).await;
        assert!(!handles.relays.is_on(&fan));
    }

    let events = drain(&mut handles.events);
    assert!(events.iter().any(|e| matches!(
        e.payload,
        EventPayload::Safety {
            to: SafetyState::Stopped,
            ..
        }
    )));

    control_loop.safety_mut().reset(at(6)).await;
    control_loop.tick(at(7)).await;
    assert!(handles.relays.is_on(&fan));
}

#[tokio::test]
async fn should_cancel_in_flight_pulse_on_emergency_stop() {
    let (mut control_loop, mut handles) = bench(Vec::new());
    let pump = ActuatorId::new("pump");

    handles.mat.set_active(true);
    control_loop.tick(at(0)).await;
    handles.buttons.press(ButtonId::new("water_now"));
    control_loop.tick(at(1)).await;
    assert!(handles.relays.is_on(&pump));

    // Stop with five seconds left on the pulse.
    handles.estop.set_active(true);
    control_loop.tick(at(6)).await;
    assert!(!handles.relays.is_on(&pump));

    // Nothing fires at the original expiry; the relay stays off and no
    // further command outcome is recorded for the pump.
    drain(&mut handles.events);
    let report = control_loop.tick(at(11)).await;
    assert!(report.outcomes.is_empty());
    assert!(!handles.relays.is_on(&pump));
}

// ---------------------------------------------------------------------------
// Sessions and human commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_run_a_full_session_lifecycle() {
    let (mut control_loop, mut handles) = bench(Vec::new());
    let pump = ActuatorId::new("pump");

    handles.mat.set_active(true);
    control_loop.tick(at(0)).await;
    assert!(control_loop.status().open_session.is_some());

    handles.buttons.press(ButtonId::new("water_now"));
    control_loop.tick(at(1)).await;
    assert!(handles.relays.is_on(&pump));

    // Pulse completes on schedule.
    control_loop.tick(at(11)).await;
    assert!(!handles.relays.is_on(&pump));

    // Participant leaves; the grace timeout closes the session once.
    handles.mat.set_active(false);
    for t in 12..40 {
        control_loop.tick(at(t)).await;
    }
    assert!(control_loop.status().open_session.is_none());

    let events = drain(&mut handles.events);
    let closed: Vec<_> = events
        .iter()
        .filter_map(|e| match &e.payload {
            EventPayload::Session(SessionEvent::Closed { session }) => Some(session),
            _ => None,
        })
        .collect();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].close_reason, Some(CloseReason::ParticipantLeft));
    // The flushed session carries the button activity.
    assert_eq!(closed[0].activities.len(), 2);
}

#[tokio::test]
async fn should_rate_limit_repeated_watering_requests() {
    let (mut control_loop, mut handles) = bench(Vec::new());
    let pump = ActuatorId::new("pump");

    handles.mat.set_active(true);
    control_loop.tick(at(0)).await;
    handles.buttons.press(ButtonId::new("water_now"));
    control_loop.tick(at(1)).await;

    // Pulse runs to completion at t=11.
    control_loop.tick(at(11)).await;
    assert!(!handles.relays.is_on(&pump));
    drain(&mut handles.events);

    // A second press right away hits the 30 s minimum interval.
    handles.buttons.press(ButtonId::new("water_now"));
    control_loop.tick(at(12)).await;
    assert!(!handles.relays.is_on(&pump));

    let events = drain(&mut handles.events);
    assert!(events.iter().any(|e| matches!(
        e.payload,
        EventPayload::Command {
            outcome: CommandOutcome::Rejected {
                reason: RejectReason::MinInterval
            },
            ..
        }
    )));

    // Once the interval has passed the request goes through.
    handles.buttons.press(ButtonId::new("water_now"));
    control_loop.tick(at(45)).await;
    assert!(handles.relays.is_on(&pump));
}
