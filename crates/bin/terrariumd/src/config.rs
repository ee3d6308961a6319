//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `terrarium.toml` in the working directory (path overridable
//! via `TERRARIUM_CONFIG`). Every scalar field has a sensible default so
//! the file is optional; the sensor/actuator/rule tables come only from
//! the file. Configuration is immutable for the lifetime of one run —
//! changing it requires a restart, which keeps every tick internally
//! consistent.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::Deserialize;

use terrarium_control::controller::ActuatorPolicy;
use terrarium_control::sampler::SensorSpec;
use terrarium_control::session_manager::ButtonBinding;
use terrarium_domain::command::ActuatorAction;
use terrarium_domain::id::{ActuatorId, ButtonId, SourceId};
use terrarium_domain::reading::SensorKind;
use terrarium_domain::rule::{Rule, RuleCommand, RuleCondition};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control loop timing.
    #[serde(rename = "loop")]
    pub tick: TickConfig,
    /// Sensor sampling cadence.
    pub sampling: SamplingConfig,
    /// Safety input handling.
    pub safety: SafetyConfig,
    /// Session behaviour.
    pub session: SessionConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Event stream settings.
    pub events: EventsConfig,
    /// Registered sensors.
    pub sensors: Vec<SensorConfig>,
    /// Registered actuators with their rate limits.
    pub actuators: Vec<ActuatorConfig>,
    /// Automation rules, evaluated in declaration order.
    pub rules: Vec<RuleConfig>,
    /// Button bindings for session participants.
    pub buttons: Vec<ButtonConfig>,
}

/// Control loop timing.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Tick period in milliseconds. Keep it at or below 1000 so button
    /// presses feel responsive.
    pub tick_ms: u64,
}

/// Sensor sampling cadence.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Sampling sub-cycle period in seconds (5–300).
    pub period_s: u64,
    /// Per-sensor read timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Safety input handling.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Timeout for the e-stop and override reads in milliseconds.
    pub input_timeout_ms: u64,
}

/// Session behaviour.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Seconds of lost presence before the session closes.
    pub grace_s: u64,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Event stream configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Bounded event bus capacity; oldest entries are shed on overflow.
    pub capacity: usize,
}

/// One registered sensor.
#[derive(Debug, Deserialize)]
pub struct SensorConfig {
    pub id: String,
    pub kind: SensorKind,
    pub unit: String,
    /// Plausible physical range; values outside are treated as faults.
    pub min: f64,
    pub max: f64,
    /// Starting value for the virtual bench.
    #[serde(default = "default_initial")]
    pub initial: f64,
}

fn default_initial() -> f64 {
    20.0
}

/// One registered actuator and its rate limits.
#[derive(Debug, Deserialize)]
pub struct ActuatorConfig {
    pub id: String,
    #[serde(default)]
    pub min_interval_s: u64,
    #[serde(default)]
    pub max_runtime_s: Option<u64>,
    #[serde(default = "default_window_s")]
    pub window_s: u64,
}

fn default_window_s() -> u64 {
    3600
}

/// One automation rule.
#[derive(Debug, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub actuator: String,
    #[serde(flatten)]
    pub kind: RuleKindConfig,
    /// Pulse duration; presence turns the rule into a pulse rule.
    #[serde(default)]
    pub pulse_s: Option<u64>,
    #[serde(default)]
    pub cooldown_s: u64,
}

/// The condition half of a rule.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKindConfig {
    Threshold { sensor: String, on_at: f64, off_at: f64 },
    TimeWindow { after: String, before: String },
}

/// One button binding.
#[derive(Debug, Deserialize)]
pub struct ButtonConfig {
    pub id: String,
    pub actuator: String,
    #[serde(flatten)]
    pub action: ButtonActionConfig,
}

/// What a button press requests.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ButtonActionConfig {
    On,
    Off,
    Pulse { seconds: u64 },
}

impl Config {
    /// Load configuration from `terrarium.toml` (or `TERRARIUM_CONFIG`)
    /// then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if the
    /// resulting configuration is inconsistent — an invalid rule set must
    /// stop the process before the loop starts.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("TERRARIUM_CONFIG")
            .unwrap_or_else(|_| "terrarium.toml".to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string and validate.
    ///
    /// # Errors
    ///
    /// Same contract as [`load`](Self::load).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TERRARIUM_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("TERRARIUM_TICK_MS") {
            if let Ok(tick_ms) = val.parse() {
                self.tick.tick_ms = tick_ms;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.tick_ms == 0 {
            return Err(ConfigError::Validation("tick_ms must be non-zero".to_string()));
        }
        if !self.sensors.is_empty() && !(5..=300).contains(&self.sampling.period_s) {
            return Err(ConfigError::Validation(
                "sampling period_s must be within 5..=300".to_string(),
            ));
        }
        if self.sampling.timeout_ms == 0 || self.safety.input_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "port timeouts must be non-zero".to_string(),
            ));
        }

        let mut sensor_ids = HashSet::new();
        for sensor in &self.sensors {
            if !sensor_ids.insert(sensor.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate sensor id `{}`",
                    sensor.id
                )));
            }
            if sensor.min >= sensor.max {
                return Err(ConfigError::Validation(format!(
                    "sensor `{}`: min must be below max",
                    sensor.id
                )));
            }
        }

        let mut actuator_ids = HashSet::new();
        for actuator in &self.actuators {
            if !actuator_ids.insert(actuator.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate actuator id `{}`",
                    actuator.id
                )));
            }
            if actuator.window_s == 0 {
                return Err(ConfigError::Validation(format!(
                    "actuator `{}`: window_s must be non-zero",
                    actuator.id
                )));
            }
        }

        for rule in &self.rules {
            if !actuator_ids.contains(rule.actuator.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "rule `{}` references unknown actuator `{}`",
                    rule.name, rule.actuator
                )));
            }
            if let RuleKindConfig::Threshold { sensor, .. } = &rule.kind {
                if !sensor_ids.contains(sensor.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "rule `{}` references unknown sensor `{}`",
                        rule.name, sensor
                    )));
                }
            }
        }
        // Builds every rule, so threshold and window invariants are
        // enforced here, before the loop can start.
        self.rules()?;

        for button in &self.buttons {
            if !actuator_ids.contains(button.actuator.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "button `{}` references unknown actuator `{}`",
                    button.id, button.actuator
                )));
            }
            if matches!(button.action, ButtonActionConfig::Pulse { seconds: 0 }) {
                return Err(ConfigError::Validation(format!(
                    "button `{}`: pulse duration must be non-zero",
                    button.id
                )));
            }
        }

        Ok(())
    }

    /// Build the domain rule set in declaration order.
    ///
    /// # Errors
    ///
    /// Returns the first rule whose invariants fail.
    pub fn rules(&self) -> Result<Vec<Rule>, ConfigError> {
        self.rules
            .iter()
            .map(|rule| {
                let condition = match &rule.kind {
                    RuleKindConfig::Threshold { sensor, on_at, off_at } => {
                        RuleCondition::Threshold {
                            source_id: SourceId::new(sensor.clone()),
                            on_at: *on_at,
                            off_at: *off_at,
                        }
                    }
                    RuleKindConfig::TimeWindow { after, before } => RuleCondition::TimeWindow {
                        after: after.clone(),
                        before: before.clone(),
                    },
                };
                let command = match rule.pulse_s {
                    Some(seconds) => RuleCommand::Pulse { seconds },
                    None => RuleCommand::Switch,
                };
                Rule::builder()
                    .name(rule.name.clone())
                    .actuator(ActuatorId::new(rule.actuator.clone()))
                    .condition(condition)
                    .command(command)
                    .cooldown_s(rule.cooldown_s)
                    .build()
                    .map_err(ConfigError::Rule)
            })
            .collect()
    }

    /// Per-actuator rate-limit policies, in declaration order.
    #[must_use]
    pub fn policies(&self) -> Vec<(ActuatorId, ActuatorPolicy)> {
        self.actuators
            .iter()
            .map(|actuator| {
                (
                    ActuatorId::new(actuator.id.clone()),
                    ActuatorPolicy {
                        min_interval_s: actuator.min_interval_s,
                        max_runtime_s: actuator.max_runtime_s,
                        window_s: actuator.window_s,
                    },
                )
            })
            .collect()
    }

    /// Sensor registry specs with their virtual-bench starting values.
    #[must_use]
    pub fn sensor_specs(&self) -> Vec<(SensorSpec, f64)> {
        self.sensors
            .iter()
            .map(|sensor| {
                (
                    SensorSpec {
                        source_id: SourceId::new(sensor.id.clone()),
                        kind: sensor.kind,
                        unit: sensor.unit.clone(),
                        min: sensor.min,
                        max: sensor.max,
                    },
                    sensor.initial,
                )
            })
            .collect()
    }

    /// Button-to-actuator bindings.
    #[must_use]
    pub fn bindings(&self) -> HashMap<ButtonId, ButtonBinding> {
        self.buttons
            .iter()
            .map(|button| {
                let action = match button.action {
                    ButtonActionConfig::On => ActuatorAction::On,
                    ButtonActionConfig::Off => ActuatorAction::Off,
                    ButtonActionConfig::Pulse { seconds } => ActuatorAction::Pulse { seconds },
                };
                (
                    ButtonId::new(button.id.clone()),
                    ButtonBinding {
                        actuator_id: ActuatorId::new(button.actuator.clone()),
                        action,
                    },
                )
            })
            .collect()
    }

    /// The control tick period.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick.tick_ms)
    }

    /// The per-sensor read timeout.
    #[must_use]
    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sampling.timeout_ms)
    }

    /// The safety input read timeout.
    #[must_use]
    pub fn safety_timeout(&self) -> Duration {
        Duration::from_millis(self.safety.input_timeout_ms)
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { tick_ms: 500 }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            period_s: 30,
            timeout_ms: 800,
        }
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            input_timeout_ms: 200,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { grace_s: 10 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "terrariumd=info,terrarium=info".to_string(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// A rule failed its domain invariants.
    #[error("invalid rule set")]
    Rule(#[from] terrarium_domain::error::TerrariumError),
}
