//! Sessions — bounded periods of supervised human interaction.

use serde::{Deserialize, Serialize};

use crate::id::SessionId;
use crate::time::Timestamp;

/// What kind of activity a participant performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A physical button was pressed.
    ButtonPress,
    /// The press was translated into an actuator request.
    ActuatorRequest,
    /// Free-form note recorded by a supervisor.
    Note,
}

/// One entry in a session's append-only activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub timestamp: Timestamp,
    pub detail: String,
}

impl ActivityEvent {
    #[must_use]
    pub fn new(kind: ActivityKind, timestamp: Timestamp, detail: impl Into<String>) -> Self {
        Self {
            kind,
            timestamp,
            detail: detail.into(),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Presence was lost for longer than the grace timeout.
    ParticipantLeft,
    /// A new session was started while this one was still open.
    Superseded,
    /// A supervisor ended the session deliberately.
    Explicit,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ParticipantLeft => f.write_str("participant_left"),
            Self::Superseded => f.write_str("superseded"),
            Self::Explicit => f.write_str("explicit"),
        }
    }
}

/// A supervised interaction period. At most one is open at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub participant_ref: Option<String>,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub close_reason: Option<CloseReason>,
    pub activities: Vec<ActivityEvent>,
}

impl Session {
    /// Open a new session.
    #[must_use]
    pub fn open(participant_ref: Option<String>, started_at: Timestamp) -> Self {
        Self {
            id: SessionId::new(),
            participant_ref,
            started_at,
            ended_at: None,
            close_reason: None,
            activities: Vec::new(),
        }
    }

    /// Whether the session is still running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Append an activity. Activities are never mutated after creation.
    pub fn record(&mut self, activity: ActivityEvent) {
        self.activities.push(activity);
    }

    /// Close the session. Closing an already-closed session is a no-op so
    /// a close event can never be emitted twice for the same session.
    pub fn close(&mut self, reason: CloseReason, ended_at: Timestamp) -> bool {
        if self.ended_at.is_some() {
            return false;
        }
        self.ended_at = Some(ended_at);
        self.close_reason = Some(reason);
        true
    }
}
