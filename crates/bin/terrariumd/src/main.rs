//! # terrariumd — terrarium daemon
//!
//! Composition root that wires the virtual bench to the control loop and
//! runs it until interrupted.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env overrides) and refuse to start on
//!   an inconsistent rule set
//! - Initialise tracing
//! - Construct the virtual devices and inject them into the loop
//!   components via the port traits
//! - Subscribe a log task to the event bus
//! - Run the loop and handle graceful shutdown (ctrl-c)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no control logic belongs here.

mod config;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use terrarium_adapter_virtual::{VirtualRelayBoard, VirtualSensor, VirtualSwitch};
use terrarium_control::control_loop::ControlLoop;
use terrarium_control::controller::ActuatorController;
use terrarium_control::event_bus::InProcessEventBus;
use terrarium_control::safety_monitor::SafetyMonitor;
use terrarium_control::sampler::EnvironmentSampler;
use terrarium_control::scheduler::AutomationScheduler;
use terrarium_control::session_manager::SessionManager;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter)?)
        .init();

    // Virtual bench. Real hardware slots in behind the same ports.
    let estop = VirtualSwitch::new();
    let override_input = VirtualSwitch::new();
    let mat = VirtualSwitch::new();
    let relays = VirtualRelayBoard::new(config.policies().into_iter().map(|(id, _)| id));
    let sensors: Vec<_> = config
        .sensor_specs()
        .into_iter()
        .map(|(spec, initial)| {
            let sensor = VirtualSensor::new(initial, spec.unit.clone()).with_wobble(0.3);
            (spec, sensor)
        })
        .collect();

    // Event bus plus a subscriber that turns the stream into log lines.
    let bus = Arc::new(InProcessEventBus::new(config.events.capacity));
    let mut event_rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => info!(target: "terrarium::events", at = %event.timestamp, "{}", event.payload),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    error!(target: "terrarium::events", missed, "event log fell behind");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Components, each receiving only what it needs.
    let actuator_ids = config.policies().into_iter().map(|(id, _)| id).collect();
    let safety = SafetyMonitor::new(
        estop,
        override_input,
        actuator_ids,
        config.safety_timeout(),
    );
    let sampler = EnvironmentSampler::new(
        sensors,
        config.sampling.period_s,
        config.sensor_timeout(),
    );
    let scheduler = AutomationScheduler::new(config.rules()?);
    let (_button_tx, button_rx) = SessionManager::<VirtualSwitch>::button_channel(64);
    let sessions = SessionManager::new(
        mat,
        button_rx,
        config.bindings(),
        config.session.grace_s,
        config.safety_timeout(),
    );
    let controller = ActuatorController::new(relays, Arc::clone(&bus), config.policies());

    let control_loop = ControlLoop::new(
        safety,
        sampler,
        scheduler,
        sessions,
        controller,
        Arc::clone(&bus),
        config.tick_period(),
    );

    // Graceful shutdown on ctrl-c.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(
        sensors = config.sensors.len(),
        actuators = config.actuators.len(),
        rules = config.rules.len(),
        "terrariumd starting"
    );
    control_loop.run(shutdown_rx).await;

    Ok(())
}
