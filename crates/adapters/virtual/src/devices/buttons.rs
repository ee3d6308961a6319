//! Virtual button panel — feeds the bounded press queue.

use tokio::sync::mpsc;
use tracing::warn;

use terrarium_control::ports::ButtonPress;
use terrarium_domain::id::ButtonId;
use terrarium_domain::time;

/// A simulated set of momentary buttons.
///
/// Presses go into the same bounded queue a debounced GPIO interrupt
/// handler would feed; when the queue is full the press is dropped, which
/// is the documented overflow behaviour for burst input.
#[derive(Clone)]
pub struct VirtualButtonPanel {
    queue: mpsc::Sender<ButtonPress>,
}

impl VirtualButtonPanel {
    #[must_use]
    pub fn new(queue: mpsc::Sender<ButtonPress>) -> Self {
        Self { queue }
    }

    /// Press a button. Returns whether the press was queued.
    pub fn press(&self, button_id: ButtonId) -> bool {
        let press = ButtonPress::new(button_id, time::now());
        match self.queue.try_send(press) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "button press dropped, queue full or closed");
                false
            }
        }
    }
}
