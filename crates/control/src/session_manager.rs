//! Session manager — tracks the optional supervised interaction session.
//!
//! Presence (a pressure mat or latching switch) opens a session; losing
//! presence starts a grace timer, and only its expiry closes the session.
//! Button presses arrive through a bounded queue, become activity-log
//! entries, and may map to human-origin actuator commands. Those commands
//! enjoy no exemption from safety or rate limits — only from the
//! scheduler's threshold logic.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use terrarium_domain::command::{ActuatorAction, ActuatorCommand, CommandOrigin};
use terrarium_domain::event::{EventPayload, LoopEvent, SessionEvent};
use terrarium_domain::id::{ActuatorId, ButtonId};
use terrarium_domain::session::{ActivityEvent, ActivityKind, CloseReason, Session};
use terrarium_domain::time::Timestamp;

use crate::ports::{ButtonPress, SwitchInput};

/// The actuator request a configured button maps to.
#[derive(Debug, Clone)]
pub struct ButtonBinding {
    pub actuator_id: ActuatorId,
    pub action: ActuatorAction,
}

/// What one session-manager tick produced.
#[derive(Debug, Default)]
pub struct SessionTick {
    pub commands: Vec<ActuatorCommand>,
    pub events: Vec<LoopEvent>,
}

/// Tracks at most one open session.
pub struct SessionManager<P> {
    presence: P,
    input_timeout: Duration,
    grace: chrono::Duration,
    buttons: mpsc::Receiver<ButtonPress>,
    bindings: HashMap<ButtonId, ButtonBinding>,
    session: Option<Session>,
    present: bool,
    absent_since: Option<Timestamp>,
}

impl<P: SwitchInput> SessionManager<P> {
    pub fn new(
        presence: P,
        buttons: mpsc::Receiver<ButtonPress>,
        bindings: HashMap<ButtonId, ButtonBinding>,
        grace_s: u64,
        input_timeout: Duration,
    ) -> Self {
        Self {
            presence,
            input_timeout,
            grace: chrono::Duration::seconds(i64::try_from(grace_s).unwrap_or(i64::MAX)),
            buttons,
            bindings,
            session: None,
            present: false,
            absent_since: None,
        }
    }

    /// Create the bounded queue that adapters push button presses into.
    #[must_use]
    pub fn button_channel(capacity: usize) -> (mpsc::Sender<ButtonPress>, mpsc::Receiver<ButtonPress>) {
        mpsc::channel(capacity)
    }

    /// The currently open session, if any.
    #[must_use]
    pub fn open_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Evaluate presence and drain queued button presses.
    pub async fn tick(&mut self, now: Timestamp) -> SessionTick {
        let mut out = SessionTick::default();

        self.update_presence(now, &mut out).await;
        self.expire_grace(now, &mut out);
        self.drain_buttons(now, &mut out);

        out
    }

    /// Explicitly open a session, force-closing any prior one.
    pub fn start_session(&mut self, participant_ref: Option<String>, now: Timestamp) -> Vec<LoopEvent> {
        let mut events = Vec::new();
        if let Some(event) = self.close_open(CloseReason::Superseded, now) {
            events.push(event);
        }
        events.push(self.open(participant_ref, now));
        events
    }

    /// Explicitly end the open session, if any.
    pub fn end_session(&mut self, now: Timestamp) -> Vec<LoopEvent> {
        self.close_open(CloseReason::Explicit, now)
            .into_iter()
            .collect()
    }

    async fn update_presence(&mut self, now: Timestamp, out: &mut SessionTick) {
        let present = match tokio::time::timeout(self.input_timeout, self.presence.is_active()).await
        {
            Ok(Ok(active)) => active,
            Ok(Err(err)) => {
                // A flapping mat input must not open or close sessions on
                // its own; hold the last known value.
                warn!(%err, "presence read failed, holding last value");
                self.present
            }
            Err(_) => {
                warn!("presence read timed out, holding last value");
                self.present
            }
        };

        if present {
            self.absent_since = None;
            if !self.present && self.session.is_none() {
                out.events.push(self.open(None, now));
            }
        } else if self.present && self.session.is_some() {
            self.absent_since = Some(now);
        }
        self.present = present;
    }

    fn expire_grace(&mut self, now: Timestamp, out: &mut SessionTick) {
        let expired = self
            .absent_since
            .is_some_and(|since| now.signed_duration_since(since) >= self.grace);
        if expired {
            self.absent_since = None;
            if let Some(event) = self.close_open(CloseReason::ParticipantLeft, now) {
                out.events.push(event);
            }
        }
    }

    fn drain_buttons(&mut self, now: Timestamp, out: &mut SessionTick) {
        while let Ok(press) = self.buttons.try_recv() {
            let Some(session) = self.session.as_mut() else {
                debug!(button = %press.button_id, "button press outside a session, ignored");
                continue;
            };

            let activity =
                ActivityEvent::new(ActivityKind::ButtonPress, now, press.button_id.to_string());
            session.record(activity.clone());
            out.events.push(LoopEvent::new(
                now,
                EventPayload::Session(SessionEvent::Activity {
                    session_id: session.id,
                    activity,
                }),
            ));

            if let Some(binding) = self.bindings.get(&press.button_id) {
                let request = ActivityEvent::new(
                    ActivityKind::ActuatorRequest,
                    now,
                    format!("{}:{}", binding.actuator_id, binding.action),
                );
                session.record(request.clone());
                out.events.push(LoopEvent::new(
                    now,
                    EventPayload::Session(SessionEvent::Activity {
                        session_id: session.id,
                        activity: request,
                    }),
                ));
                out.commands.push(ActuatorCommand::new(
                    binding.actuator_id.clone(),
                    binding.action,
                    CommandOrigin::Human,
                    now,
                ));
            }
        }
    }

    fn open(&mut self, participant_ref: Option<String>, now: Timestamp) -> LoopEvent {
        let session = Session::open(participant_ref, now);
        info!(session = %session.id, "session opened");
        let event = LoopEvent::new(
            now,
            EventPayload::Session(SessionEvent::Opened {
                session_id: session.id,
                participant_ref: session.participant_ref.clone(),
            }),
        );
        self.session = Some(session);
        event
    }

    /// Close and flush the open session. `Session::close` refusing a second
    /// close is what makes duplicate close events impossible.
    fn close_open(&mut self, reason: CloseReason, now: Timestamp) -> Option<LoopEvent> {
        let mut session = self.session.take()?;
        if !session.close(reason, now) {
            return None;
        }
        info!(session = %session.id, %reason, "session closed");
        Some(LoopEvent::new(
            now,
            EventPayload::Session(SessionEvent::Closed { session }),
        ))
    }
}
