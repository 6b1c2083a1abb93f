use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serializer};

use crate::{TurnId, UserId};

fn serialize_password<S>(password: &SecretString, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(password.expose_secret())
}

fn deserialize_password<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let password = String::deserialize(deserializer)?;
    Ok(SecretString::from(password))
}

/// `auth_login` / `auth_signup` event
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct AuthEvent {
    username: String,

    /// Only exposed when written onto the wire.
    #[serde(
        serialize_with = "serialize_password",
        deserialize_with = "deserialize_password"
    )]
    password: SecretString,
}

impl AuthEvent {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecretString {
        &self.password
    }
}

/// `restore_session` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RestoreSessionEvent {
    user_id: UserId,
    username: String,
}

impl RestoreSessionEvent {
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

/// `send_message` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SendMessageEvent {
    /// The user's utterance
    message: String,

    /// Echoed back by servers that support turn correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    turn_id: Option<TurnId>,
}

impl SendMessageEvent {
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

/// `stop_response` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct StopResponseEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    turn_id: Option<TurnId>,
}

impl StopResponseEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_turn_id(mut self, turn_id: TurnId) -> Self {
        self.turn_id = Some(turn_id);
        self
    }

    pub fn turn_id(&self) -> Option<TurnId> {
        self.turn_id
    }
}

/// `get_emotion` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GetEmotionEvent {}

impl GetEmotionEvent {
    pub fn new() -> Self {
        Self {}
    }
}

/// `clear_history` event
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ClearHistoryEvent {}

impl ClearHistoryEvent {
    pub fn new() -> Self {
        Self {}
    }
}

/// `get_conversation_history` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GetConversationHistoryEvent {
    /// Maximum number of exchanges to return
    limit: u32,
}

impl Default for GetConversationHistoryEvent {
    fn default() -> Self {
        Self { limit: 20 }
    }
}

impl GetConversationHistoryEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// `get_emotion_history` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GetEmotionHistoryEvent {
    /// Look-back window in hours
    hours: u32,
}

impl Default for GetEmotionHistoryEvent {
    fn default() -> Self {
        Self { hours: 24 }
    }
}

impl GetEmotionHistoryEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hours(mut self, hours: u32) -> Self {
        self.hours = hours;
        self
    }

    pub fn hours(&self) -> u32 {
        self.hours
    }
}

/// `voice_command` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VoiceCommandEvent {
    /// Recognized speech, activation word included
    text: String,
}

impl VoiceCommandEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
