//! Actuator port — on/off writes to physical outputs.

use std::future::Future;

use terrarium_domain::error::PortError;
use terrarium_domain::id::ActuatorId;

/// A writable actuator backend (relay board, driver chip, simulator).
///
/// Only the [`ActuatorController`](crate::controller::ActuatorController)
/// calls this port; every other component proposes commands instead.
pub trait ActuatorSink {
    /// Drive the named actuator fully on or fully off.
    fn set(
        &self,
        actuator_id: &ActuatorId,
        on: bool,
    ) -> impl Future<Output = Result<(), PortError>> + Send;
}
