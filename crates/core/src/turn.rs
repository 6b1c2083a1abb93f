use crate::types::TurnId;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceSource {
    Voice,
    Typed,
}

/// A finalized unit of user input. Consumed by the arbiter, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    text: String,
    source: UtteranceSource,
    captured_at: Instant,
}

impl Utterance {
    pub fn new(text: &str, source: UtteranceSource, captured_at: Instant) -> Self {
        Self {
            text: text.trim().to_string(),
            source,
            captured_at,
        }
    }

    pub fn typed(text: &str, captured_at: Instant) -> Self {
        Self::new(text, UtteranceSource::Typed, captured_at)
    }

    pub fn voice(text: &str, captured_at: Instant) -> Self {
        Self::new(text, UtteranceSource::Voice, captured_at)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> UtteranceSource {
        self.source
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Submitted,
    Processing,
    Speaking,
    Completed,
    Aborted,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Completed | TurnState::Aborted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    Aborted,
}

/// Audio currently owned by a speaking turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioHandle {
    url: String,
}

impl AudioHandle {
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// One assistant response cycle.
#[derive(Debug)]
pub struct Turn {
    turn_id: TurnId,
    utterance: Utterance,
    pub(crate) state: TurnState,
    personality: Option<String>,
    text_so_far: String,
    /// A `message_response` has been accepted for this turn.
    replied: bool,
    /// The server echoed this turn's id at least once.
    correlated: bool,
    audio: Option<AudioHandle>,
}

impl Turn {
    pub(crate) fn new(turn_id: TurnId, utterance: Utterance) -> Self {
        Self {
            turn_id,
            utterance,
            state: TurnState::Submitted,
            personality: None,
            text_so_far: String::new(),
            replied: false,
            correlated: false,
            audio: None,
        }
    }

    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }

    pub fn utterance(&self) -> &Utterance {
        &self.utterance
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn personality(&self) -> Option<&str> {
        self.personality.as_deref()
    }

    pub fn text_so_far(&self) -> &str {
        &self.text_so_far
    }

    pub fn has_reply(&self) -> bool {
        self.replied
    }

    pub fn is_correlated(&self) -> bool {
        self.correlated
    }

    pub fn audio(&self) -> Option<&AudioHandle> {
        self.audio.as_ref()
    }

    pub(crate) fn append_text(&mut self, chunk: &str, personality: Option<&str>) {
        if let Some(personality) = personality {
            self.personality = Some(personality.to_string());
        }
        self.text_so_far.push_str(chunk);
        self.replied = true;
    }

    pub(crate) fn mark_correlated(&mut self) {
        self.correlated = true;
    }

    pub(crate) fn attach_audio(&mut self, url: &str) {
        self.audio = Some(AudioHandle {
            url: url.to_string(),
        });
    }
}
