//! Switch port — boolean physical inputs.
//!
//! Used for the emergency-stop and manual-override inputs (safety monitor)
//! and the presence mat (session manager). Momentary buttons are different:
//! they are edge events, delivered through a bounded queue as
//! [`ButtonPress`] messages and drained at the next tick boundary.

use std::future::Future;

use terrarium_domain::error::PortError;
use terrarium_domain::id::ButtonId;
use terrarium_domain::time::Timestamp;

/// A readable level input (latching switch, pressure mat).
pub trait SwitchInput {
    /// Whether the input is currently asserted.
    fn is_active(&self) -> impl Future<Output = Result<bool, PortError>> + Send;
}

/// One debounced button press, queued by an adapter and consumed by the
/// session manager at the tick boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonPress {
    pub button_id: ButtonId,
    pub pressed_at: Timestamp,
}

impl ButtonPress {
    #[must_use]
    pub fn new(button_id: ButtonId, pressed_at: Timestamp) -> Self {
        Self {
            button_id,
            pressed_at,
        }
    }
}
