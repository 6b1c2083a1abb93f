//! The turn arbiter owns "whose turn it is".
//!
//! At most one [`Turn`] exists at a time. Submitting while a turn is open
//! interrupts it first. Server events are correlated by `turn_id` when the
//! server echoes one and by the current turn state otherwise, so trailing
//! events for a turn that has already finished are dropped here.
//!
//! A server that never echoes ids answers each `send_message` with one
//! `message_response` followed by at most one `audio_ready`, and keeps
//! working on a superseded message. Untagged audio is therefore only
//! accepted once the open turn has its reply, and a superseded turn that had
//! not been answered yet still owes the next untagged reply.

use tokio::time::Instant;

use crate::capture::{RecognizerEvent, SpeechCapture};
use crate::error::CompanionError;
use crate::timer::{TurnTimer, DEBOUNCE_THRESHOLD};
use crate::turn::{Turn, TurnOutcome, TurnState, Utterance};
use crate::types::events::client::{SendMessageEvent, StopResponseEvent};
use crate::types::events::server::{AudioReadyEvent, ErrorEvent, MessageResponseEvent};
use crate::types::{ClientEvent, TurnId};
use crate::{display, emit, Command, CommandTx, DisplayEvent};

/// Reported by the audio player for the clip it was asked to play.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Ended { turn_id: TurnId },
    Failed { turn_id: TurnId, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A newer utterance replaces the open turn.
    Superseded,
    UserStop,
    ServerError,
    /// The session was rejected or logged out.
    SessionLost,
    ConnectionLost,
}

impl AbortReason {
    /// Whether the server should be told to stop generating.
    fn notifies_server(&self) -> bool {
        matches!(self, AbortReason::Superseded | AbortReason::UserStop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted(TurnId),
    /// Arrived inside the debounce window of the previous submission.
    Debounced,
    Empty,
    /// Not connected or no session.
    Suspended,
}

pub struct TurnArbiter {
    commands: CommandTx,
    capture: SpeechCapture,
    turn: Option<Turn>,
    next_turn_id: TurnId,
    debounce: TurnTimer<()>,
    accepting: bool,
    connected: bool,
    pending_playback: Option<(TurnId, String)>,
    /// Untagged replies still due to superseded turns.
    owed_replies: u32,
}

impl TurnArbiter {
    pub fn new(commands: CommandTx, auto_listen: bool) -> Self {
        Self {
            capture: SpeechCapture::new(commands.clone(), auto_listen),
            commands,
            turn: None,
            next_turn_id: 1,
            debounce: TurnTimer::new(),
            accepting: false,
            connected: false,
            pending_playback: None,
            owed_replies: 0,
        }
    }

    pub fn state(&self) -> TurnState {
        self.turn.as_ref().map_or(TurnState::Idle, Turn::state)
    }

    pub fn turn(&self) -> Option<&Turn> {
        self.turn.as_ref()
    }

    pub fn capture(&self) -> &SpeechCapture {
        &self.capture
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.capture.next_deadline()
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Gate submissions on an established session. Opening the gate starts
    /// capture when auto-listen is on; closing it aborts capture.
    pub fn set_accepting(&mut self, accepting: bool, now: Instant) {
        if self.accepting == accepting {
            return;
        }
        self.accepting = accepting;
        if accepting {
            tracing::info!("accepting input");
            if self.turn.is_none() && self.capture.auto_listen() {
                self.capture.start();
            } else {
                self.capture.schedule_restart(now);
            }
        } else {
            tracing::info!("input suspended");
            self.capture.force_abort();
        }
    }

    pub fn submit(&mut self, utterance: Utterance, now: Instant) -> Submission {
        if utterance.text().is_empty() {
            return Submission::Empty;
        }
        if !self.accepting {
            let error = if self.connected {
                CompanionError::Auth("sign in before sending messages".to_string())
            } else {
                CompanionError::Transport("not connected to the server".to_string())
            };
            tracing::warn!("submission rejected: {}", error);
            display(&self.commands, DisplayEvent::Error(error));
            return Submission::Suspended;
        }
        if self.debounce.is_pending(now) {
            tracing::debug!("dropping submission inside debounce window: {:?}", utterance.text());
            return Submission::Debounced;
        }

        self.interrupt(AbortReason::Superseded, now);
        self.capture.stop();
        self.debounce.arm(DEBOUNCE_THRESHOLD, now, ());

        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;
        tracing::info!("turn {} submitted: {:?}", turn_id, utterance.text());

        let message = SendMessageEvent::new(utterance.text()).with_turn_id(turn_id);
        emit(&self.commands, Command::Send(ClientEvent::SendMessage(message)));
        display(&self.commands, DisplayEvent::UserUtterance(utterance.clone()));
        display(&self.commands, DisplayEvent::Thinking(true));

        self.turn = Some(Turn::new(turn_id, utterance));
        Submission::Accepted(turn_id)
    }

    /// Abort the open turn. Returns `false` when there was nothing to abort.
    pub fn interrupt(&mut self, reason: AbortReason, now: Instant) -> bool {
        let Some(mut turn) = self.turn.take() else {
            return false;
        };
        let turn_id = turn.turn_id();
        tracing::info!("turn {} aborted ({:?}) in {:?}", turn_id, reason, turn.state());
        turn.state = TurnState::Aborted;
        if reason == AbortReason::Superseded && !turn.has_reply() && !turn.is_correlated() {
            self.owed_replies += 1;
        }

        self.pending_playback = None;
        if turn.audio().is_some() {
            emit(&self.commands, Command::StopAudio { turn_id });
        }
        self.capture.force_abort();

        if reason.notifies_server() && self.connected {
            let stop = StopResponseEvent::new().with_turn_id(turn_id);
            emit(&self.commands, Command::Send(ClientEvent::StopResponse(stop)));
        }

        display(&self.commands, DisplayEvent::Thinking(false));
        display(
            &self.commands,
            DisplayEvent::TurnFinished {
                turn_id,
                outcome: TurnOutcome::Aborted,
            },
        );

        if reason != AbortReason::Superseded && self.accepting {
            self.capture.schedule_restart(now);
        }
        true
    }

    /// Drop connection-bound work. A turn already speaking keeps its audio.
    pub fn on_connection_lost(&mut self, now: Instant) {
        self.connected = false;
        // Work the server still does for the old socket never reaches us.
        self.owed_replies = 0;
        if matches!(self.state(), TurnState::Submitted | TurnState::Processing) {
            self.interrupt(AbortReason::ConnectionLost, now);
        }
    }

    pub fn on_recognizer(&mut self, event: RecognizerEvent, now: Instant) {
        let speaking = self.state() == TurnState::Speaking;
        self.capture.on_recognizer(event, now, speaking);
    }

    /// Clear a disabled recognizer and start listening if nothing is open.
    pub fn start_listening(&mut self) {
        self.capture.enable();
        if self.accepting && self.turn.is_none() {
            self.capture.start();
        }
    }

    pub fn set_auto_listen(&mut self, enabled: bool, now: Instant) {
        self.capture.set_auto_listen(enabled, now);
        if enabled && self.accepting && self.turn.is_none() {
            self.capture.start();
        }
    }

    fn correlate(&mut self, event: &str, turn_id: Option<TurnId>) -> Option<&mut Turn> {
        match (self.turn.as_mut(), turn_id) {
            (None, _) => {
                tracing::debug!("dropping {} with no open turn", event);
                None
            }
            (Some(turn), Some(id)) if id != turn.turn_id() => {
                tracing::debug!(
                    "dropping stale {} for turn {} (current {})",
                    event,
                    id,
                    turn.turn_id()
                );
                None
            }
            (Some(turn), Some(_)) => {
                turn.mark_correlated();
                Some(turn)
            }
            (Some(turn), None) => Some(turn),
        }
    }

    pub fn on_ack(&mut self, turn_id: TurnId) {
        if let Some(turn) = self.correlate("message_ack", Some(turn_id)) {
            if turn.state == TurnState::Submitted {
                tracing::debug!("turn {} processing", turn_id);
                turn.state = TurnState::Processing;
            }
        }
    }

    pub fn on_message_response(&mut self, event: &MessageResponseEvent) {
        if event.turn_id().is_none() && self.owed_replies > 0 {
            self.owed_replies -= 1;
            tracing::debug!("dropping untagged message_response owed to a superseded turn");
            return;
        }
        let Some(turn) = self.correlate("message_response", event.turn_id()) else {
            return;
        };
        match turn.state {
            TurnState::Submitted => turn.state = TurnState::Processing,
            TurnState::Processing | TurnState::Speaking => {}
            state => {
                tracing::debug!("dropping message_response in {:?}", state);
                return;
            }
        }
        turn.append_text(event.text(), event.personality());
        let turn_id = turn.turn_id();
        let personality = turn.personality().map(str::to_string);
        display(
            &self.commands,
            DisplayEvent::AssistantText {
                turn_id,
                text: event.text().to_string(),
                personality,
            },
        );
    }

    pub fn on_audio_ready(&mut self, event: &AudioReadyEvent, now: Instant) {
        let Some(turn) = self.correlate("audio_ready", event.turn_id()) else {
            return;
        };
        let turn_id = turn.turn_id();
        if event.turn_id().is_none() && !turn.has_reply() {
            // Audio always follows its own reply; this belongs to an older turn.
            tracing::debug!("dropping untagged audio_ready, turn {} has no reply yet", turn_id);
            return;
        }
        match turn.state {
            TurnState::Submitted | TurnState::Processing => {}
            TurnState::Speaking => {
                tracing::debug!("duplicate audio_ready for turn {}", turn_id);
                return;
            }
            state => {
                tracing::debug!("dropping audio_ready in {:?}", state);
                return;
            }
        }

        match event.audio_url().filter(|url| !url.is_empty()) {
            Some(url) => {
                tracing::debug!("turn {} speaking", turn_id);
                turn.state = TurnState::Speaking;
                self.pending_playback = Some((turn_id, url.to_string()));
                self.capture.force_abort();
                display(&self.commands, DisplayEvent::Thinking(false));
            }
            None => {
                tracing::debug!("turn {} has no audio", turn_id);
                self.complete(now);
            }
        }
    }

    pub fn on_server_error(&mut self, event: &ErrorEvent, now: Instant) {
        if let (Some(turn), Some(id)) = (self.turn.as_ref(), event.turn_id()) {
            if turn.turn_id() != id {
                tracing::debug!("dropping stale error for turn {}: {}", id, event.message());
                return;
            }
        }
        tracing::warn!("server error: {}", event.message());
        self.interrupt(AbortReason::ServerError, now);
        display(
            &self.commands,
            DisplayEvent::Error(CompanionError::Turn(event.message().to_string())),
        );
    }

    pub fn on_playback(&mut self, event: PlaybackEvent, now: Instant) {
        let turn_id = match &event {
            PlaybackEvent::Ended { turn_id } => *turn_id,
            PlaybackEvent::Failed { turn_id, message } => {
                tracing::warn!("playback failed for turn {}: {}", turn_id, message);
                display(
                    &self.commands,
                    DisplayEvent::Error(CompanionError::Playback(message.clone())),
                );
                *turn_id
            }
        };
        match self.turn.as_ref() {
            Some(turn) if turn.turn_id() == turn_id && turn.state() == TurnState::Speaking => {
                self.complete(now);
            }
            _ => tracing::debug!("dropping playback event for finished turn {}", turn_id),
        }
    }

    fn complete(&mut self, now: Instant) {
        let Some(mut turn) = self.turn.take() else {
            return;
        };
        turn.state = TurnState::Completed;
        let turn_id = turn.turn_id();
        tracing::info!("turn {} completed", turn_id);
        self.pending_playback = None;
        display(&self.commands, DisplayEvent::Thinking(false));
        display(
            &self.commands,
            DisplayEvent::TurnFinished {
                turn_id,
                outcome: TurnOutcome::Completed,
            },
        );
        if self.accepting {
            self.capture.schedule_restart(now);
        }
    }

    /// Start playback decided during this tick, unless the turn was
    /// interrupted after its `audio_ready` arrived.
    pub fn end_tick(&mut self) {
        let Some((turn_id, url)) = self.pending_playback.take() else {
            return;
        };
        match self.turn.as_mut() {
            Some(turn) if turn.turn_id() == turn_id && turn.state == TurnState::Speaking => {
                turn.attach_audio(&url);
                emit(&self.commands, Command::PlayAudio { turn_id, url });
            }
            _ => tracing::debug!("playback for turn {} cancelled", turn_id),
        }
    }

    /// Advance timers and submit a voice utterance if one was finalized.
    pub fn tick(&mut self, now: Instant) -> Option<Submission> {
        let utterance = self.poll_capture(now)?;
        Some(self.submit(utterance, now))
    }

    /// Advance timers and hand back a finalized voice utterance without
    /// submitting it.
    pub fn poll_capture(&mut self, now: Instant) -> Option<Utterance> {
        self.debounce.poll(now);
        let blocked = !self.accepting || self.turn.is_some();
        self.capture.poll(now, blocked)
    }
}
