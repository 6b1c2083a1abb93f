pub mod arbiter;
pub mod capture;
pub mod companion;
pub mod error;
pub mod lifecycle;
pub mod mood;
pub mod timer;
pub mod turn;
pub mod voice;

pub use roomie_realtime_types as types;

use crate::error::CompanionError;
use crate::lifecycle::{Session, SessionId};
use crate::mood::MoodSample;
use crate::turn::{TurnOutcome, Utterance};
use types::{ClientEvent, ConnectionState, EmotionRecord, HistoryEntry, ServerEvent, TurnId};

pub use arbiter::PlaybackEvent;
pub use capture::{RecognitionError, RecognizerEvent};
pub use companion::{Companion, CompanionConfig, UserAction};

pub type CommandTx = tokio::sync::mpsc::UnboundedSender<Command>;
pub type CommandRx = tokio::sync::mpsc::UnboundedReceiver<Command>;

/// Represents commands that the core issues to the runtime.
///
/// The core never touches the socket, the recognizer or the audio element
/// itself; it decides, and the runtime executes.
#[derive(Debug)]
pub enum Command {
    /// Deliver an event to the server.
    Send(ClientEvent),
    StartRecognizer,
    /// Graceful stop; the recognizer may still flush trailing results.
    StopRecognizer,
    /// Immediate stop; trailing results are ignored by the core.
    AbortRecognizer,
    PlayAudio { turn_id: TurnId, url: String },
    /// Pause playback and rewind to position zero.
    StopAudio { turn_id: TurnId },
    /// Something for the user to see.
    Display(DisplayEvent),
}

/// Output for the presentation layer (chat log, avatar, banners).
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Connection(ConnectionState),
    LoginRequired,
    SessionReady {
        session_id: SessionId,
        session: Session,
    },
    LoggedOut,
    Listening(bool),
    UserUtterance(Utterance),
    Thinking(bool),
    AssistantText {
        turn_id: TurnId,
        text: String,
        personality: Option<String>,
    },
    TurnFinished {
        turn_id: TurnId,
        outcome: TurnOutcome,
    },
    Mood(MoodSample),
    History(Vec<HistoryEntry>),
    EmotionHistory(Vec<EmotionRecord>),
    HistoryCleared,
    Notice(String),
    Error(CompanionError),
}

/// Everything the core reacts to, delivered one at a time in arrival order.
#[derive(Debug)]
pub enum Event {
    Server(ServerEvent),
    Connection(ConnectionState),
    Recognizer(RecognizerEvent),
    Playback(PlaybackEvent),
    User(UserAction),
}

pub(crate) fn emit(commands: &CommandTx, command: Command) {
    if let Err(e) = commands.send(command) {
        tracing::error!("runtime dropped command receiver, lost {:?}", e.0);
    }
}

pub(crate) fn display(commands: &CommandTx, event: DisplayEvent) {
    emit(commands, Command::Display(event));
}
