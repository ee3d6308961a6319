//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts via `#[from]`.
//! Recoverable conditions (a sensor timing out, a command being rejected)
//! are modelled as data — invalid readings and command outcomes — not as
//! errors; only genuine failures surface through these types.

/// Umbrella error for the control core.
#[derive(Debug, thiserror::Error)]
pub enum TerrariumError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A capability port (sensor, actuator, switch, event sink) failed.
    #[error("port error")]
    Port(#[from] PortError),
}

/// Domain invariant violations, raised by `validate()` methods.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A rule was declared without a name.
    #[error("rule name must not be empty")]
    EmptyName,

    /// A threshold rule's on and off levels coincide; hysteresis needs a band.
    #[error("rule `{rule}`: on and off thresholds must differ")]
    EqualThresholds { rule: String },

    /// A time-window bound is not a zero-padded 24-hour `HH:MM` string.
    #[error("rule `{rule}`: `{value}` is not an HH:MM time")]
    MalformedTimeWindow { rule: String, value: String },

    /// A pulse rule would re-fire every tick without a cooldown.
    #[error("rule `{rule}`: pulse rules require a non-zero cooldown")]
    ZeroPulseCooldown { rule: String },

    /// A pulse duration of zero seconds would turn on and off in one tick.
    #[error("rule `{rule}`: pulse duration must be non-zero")]
    ZeroPulseDuration { rule: String },
}

/// Failures reported by capability ports.
///
/// The control loop never lets these escape a tick: a sensor failure
/// becomes an invalid reading, an actuator failure becomes a `Failed`
/// command outcome, and an input-switch failure triggers the component's
/// documented fail-safe.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The device did not answer within the configured timeout.
    #[error("device read timed out")]
    Timeout,

    /// The device is known but cannot be reached right now.
    #[error("device unavailable: {0}")]
    Unavailable(String),

    /// The underlying transport reported a failure.
    #[error("device io failure: {0}")]
    Io(String),
}
