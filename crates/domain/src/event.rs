//! Loop events — the tagged records forwarded to the event sink.
//!
//! Events are produced when readings are sampled, commands are resolved,
//! sessions change, or the safety state transitions. The core only ever
//! appends them; durable storage lives behind the event-sink port.

use serde::{Deserialize, Serialize};

use crate::command::{ActuatorCommand, CommandOutcome};
use crate::id::{EventId, SessionId, SourceId};
use crate::reading::SensorReading;
use crate::safety::SafetyState;
use crate::session::{ActivityEvent, Session};
use crate::time::Timestamp;

/// One record in the append-only event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopEvent {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl LoopEvent {
    #[must_use]
    pub fn new(timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            timestamp,
            payload,
        }
    }
}

/// The tagged body of a [`LoopEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// A sampled measurement.
    Reading(SensorReading),
    /// A sensor produced three consecutive invalid reads.
    SensorDegraded { source_id: SourceId, streak: u32 },
    /// A command was resolved by the controller.
    Command {
        command: ActuatorCommand,
        outcome: CommandOutcome,
    },
    /// A session opened, logged activity, or closed.
    Session(SessionEvent),
    /// The safety state transitioned.
    Safety {
        from: SafetyState,
        to: SafetyState,
        reason: String,
    },
}

/// Session lifecycle records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SessionEvent {
    Opened {
        session_id: SessionId,
        participant_ref: Option<String>,
    },
    Activity {
        session_id: SessionId,
        activity: ActivityEvent,
    },
    /// Carries the full session so the sink receives the flushed record.
    Closed { session: Session },
}

impl std::fmt::Display for EventPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading(reading) => write!(f, "reading {reading}"),
            Self::SensorDegraded { source_id, .. } => write!(f, "sensor degraded {source_id}"),
            Self::Command { command, .. } => write!(f, "command {command}"),
            Self::Session(SessionEvent::Opened { session_id, .. }) => {
                write!(f, "session opened {session_id}")
            }
            Self::Session(SessionEvent::Activity { session_id, .. }) => {
                write!(f, "session activity {session_id}")
            }
            Self::Session(SessionEvent::Closed { session }) => {
                write!(f, "session closed {}", session.id)
            }
            Self::Safety { from, to, .. } => write!(f, "safety {from} -> {to}"),
        }
    }
}
