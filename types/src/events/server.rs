use crate::{Emotion, EmotionRecord, HistoryEntry, TurnId, UserId};

/// `connected` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConnectedEvent {
    #[serde(default)]
    message: Option<String>,
}

impl ConnectedEvent {
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// `login_success` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LoginSuccessEvent {
    user_id: UserId,
    username: String,
}

impl LoginSuccessEvent {
    pub fn new(user_id: UserId, username: &str) -> Self {
        Self {
            user_id,
            username: username.to_string(),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// `auth_error` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthErrorEvent {
    message: String,
}

impl AuthErrorEvent {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `conversation_history` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConversationHistoryEvent {
    /// Prior exchanges, newest first
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl ConversationHistoryEvent {
    pub fn new(history: Vec<HistoryEntry>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }
}

/// `emotion_update` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmotionUpdateEvent {
    emotion: Emotion,
    confidence: f32,

    /// Seconds since the unix epoch, server clock
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<f64>,
}

impl EmotionUpdateEvent {
    pub fn new(emotion: Emotion, confidence: f32) -> Self {
        Self {
            emotion,
            confidence,
            timestamp: None,
        }
    }

    pub fn emotion(&self) -> &Emotion {
        &self.emotion
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn timestamp(&self) -> Option<f64> {
        self.timestamp
    }
}

/// `message_ack` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageAckEvent {
    turn_id: TurnId,
}

impl MessageAckEvent {
    pub fn new(turn_id: TurnId) -> Self {
        Self { turn_id }
    }

    pub fn turn_id(&self) -> TurnId {
        self.turn_id
    }
}

/// `message_response` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MessageResponseEvent {
    /// Assistant text for the current turn
    text: String,

    /// Display name of the persona that answered
    #[serde(default)]
    personality: Option<String>,

    /// Emotion the server used when generating the reply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    emotion: Option<Emotion>,

    /// Combined mood label (`cheerful`, `low`, `neutral`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mood: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    turn_id: Option<TurnId>,
}

impl MessageResponseEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            personality: None,
            emotion: None,
            mood: None,
            turn_id: None,
        }
    }

    pub fn with_personality(mut self, personality: &str) -> Self {
        self.personality = Some(personality.to_string());
        self
    }

    pub fn with_turn_id(mut self, turn_id: TurnId) -> Self {
        self.turn_id = Some(turn_id);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn personality(&self) -> Option<&str> {
        self.personality.as_deref()
    }

    pub fn emotion(&self) -> Option<&Emotion> {
        self.emotion.as_ref()
    }

    pub fn mood(&self) -> Option<&str> {
        self.mood.as_deref()
    }

    pub fn turn_id(&self) -> Option<TurnId> {
        self.turn_id
    }
}

/// `audio_ready` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioReadyEvent {
    /// Location of the synthesized speech; `null` for a text-only reply
    audio_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    turn_id: Option<TurnId>,
}

impl AudioReadyEvent {
    pub fn new(audio_url: Option<&str>) -> Self {
        Self {
            audio_url: audio_url.map(str::to_string),
            turn_id: None,
        }
    }

    pub fn with_turn_id(mut self, turn_id: TurnId) -> Self {
        self.turn_id = Some(turn_id);
        self
    }

    pub fn audio_url(&self) -> Option<&str> {
        self.audio_url.as_deref()
    }

    pub fn turn_id(&self) -> Option<TurnId> {
        self.turn_id
    }
}

/// `history_cleared` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct HistoryClearedEvent {
    #[serde(default)]
    message: Option<String>,
}

impl HistoryClearedEvent {
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// `emotion_history` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EmotionHistoryEvent {
    #[serde(default)]
    history: Vec<EmotionRecord>,
}

impl EmotionHistoryEvent {
    pub fn new(history: Vec<EmotionRecord>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &[EmotionRecord] {
        &self.history
    }
}

/// `error` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    turn_id: Option<TurnId>,
}

impl ErrorEvent {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            turn_id: None,
        }
    }

    pub fn with_turn_id(mut self, turn_id: TurnId) -> Self {
        self.turn_id = Some(turn_id);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn turn_id(&self) -> Option<TurnId> {
        self.turn_id
    }
}

/// What the server decided a `voice_command` means.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    ChangePersonality,
    ShowAnalytics,
    ClearConversation,
    ExportHistory,
    ToggleListening,
    ShowHelp,
    Greeting,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CommandData {
    /// Set by `toggle_listening`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enabled: Option<bool>,

    /// Set by `change_personality`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    personality: Option<String>,
}

impl CommandData {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn with_personality(mut self, personality: &str) -> Self {
        self.personality = Some(personality.to_string());
        self
    }

    pub fn enabled(&self) -> Option<bool> {
        self.enabled
    }

    pub fn personality(&self) -> Option<&str> {
        self.personality.as_deref()
    }
}

/// `command_response` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CommandResponseEvent {
    success: bool,

    #[serde(default)]
    message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<CommandAction>,

    /// Not a command after all; the text should be sent as a message.
    #[serde(default)]
    is_message: bool,

    #[serde(default)]
    data: CommandData,
}

impl CommandResponseEvent {
    pub fn new(success: bool, message: &str) -> Self {
        Self {
            success,
            message: message.to_string(),
            action: None,
            is_message: false,
            data: CommandData::default(),
        }
    }

    pub fn with_action(mut self, action: CommandAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_data(mut self, data: CommandData) -> Self {
        self.data = data;
        self
    }

    pub fn with_is_message(mut self, is_message: bool) -> Self {
        self.is_message = is_message;
        self
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn action(&self) -> Option<&CommandAction> {
        self.action.as_ref()
    }

    pub fn is_message(&self) -> bool {
        self.is_message
    }

    pub fn data(&self) -> &CommandData {
        &self.data
    }
}
