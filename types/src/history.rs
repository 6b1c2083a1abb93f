use crate::Emotion;

/// One stored exchange, as returned by `conversation_history` (newest first).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    user_message: String,
    bot_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    emotion: Option<Emotion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sentiment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    personality: Option<String>,
}

impl HistoryEntry {
    pub fn new(user_message: &str, bot_response: &str) -> Self {
        Self {
            id: None,
            timestamp: None,
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            emotion: None,
            sentiment: None,
            personality: None,
        }
    }

    pub fn with_emotion(mut self, emotion: Emotion) -> Self {
        self.emotion = Some(emotion);
        self
    }

    pub fn with_timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = Some(timestamp.to_string());
        self
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn bot_response(&self) -> &str {
        &self.bot_response
    }

    pub fn emotion(&self) -> Option<&Emotion> {
        self.emotion.as_ref()
    }

    pub fn sentiment(&self) -> Option<&str> {
        self.sentiment.as_deref()
    }

    pub fn personality(&self) -> Option<&str> {
        self.personality.as_deref()
    }
}

/// One row of the server's emotion log, as returned by `emotion_history`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmotionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    emotion: Emotion,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mood_state: Option<String>,
}

impl EmotionRecord {
    pub fn new(emotion: Emotion) -> Self {
        Self {
            timestamp: None,
            emotion,
            confidence: None,
            mood_state: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn emotion(&self) -> &Emotion {
        &self.emotion
    }

    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }

    pub fn mood_state(&self) -> Option<&str> {
        self.mood_state.as_deref()
    }
}
