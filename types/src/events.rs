pub mod client;
pub mod server;

use client::*;
use server::*;

use crate::TurnId;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "auth_login")]
    AuthLogin(AuthEvent),
    #[serde(rename = "auth_signup")]
    AuthSignup(AuthEvent),
    #[serde(rename = "restore_session")]
    RestoreSession(RestoreSessionEvent),
    #[serde(rename = "send_message")]
    SendMessage(SendMessageEvent),
    #[serde(rename = "stop_response")]
    StopResponse(StopResponseEvent),
    #[serde(rename = "get_emotion")]
    GetEmotion(GetEmotionEvent),
    #[serde(rename = "clear_history")]
    ClearHistory(ClearHistoryEvent),
    #[serde(rename = "get_conversation_history")]
    GetConversationHistory(GetConversationHistoryEvent),
    #[serde(rename = "get_emotion_history")]
    GetEmotionHistory(GetEmotionHistoryEvent),
    #[serde(rename = "voice_command")]
    VoiceCommand(VoiceCommandEvent),
}

impl ClientEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::AuthLogin(_) => "auth_login",
            ClientEvent::AuthSignup(_) => "auth_signup",
            ClientEvent::RestoreSession(_) => "restore_session",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::StopResponse(_) => "stop_response",
            ClientEvent::GetEmotion(_) => "get_emotion",
            ClientEvent::ClearHistory(_) => "clear_history",
            ClientEvent::GetConversationHistory(_) => "get_conversation_history",
            ClientEvent::GetEmotionHistory(_) => "get_emotion_history",
            ClientEvent::VoiceCommand(_) => "voice_command",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Synthesized locally when the socket closes; never sent by the server.
    #[serde(rename = "close")]
    Close {
        reason: Option<String>,
    },
    #[serde(rename = "connected")]
    Connected(ConnectedEvent),
    #[serde(rename = "login_success")]
    LoginSuccess(LoginSuccessEvent),
    #[serde(rename = "auth_error")]
    AuthError(AuthErrorEvent),
    #[serde(rename = "conversation_history")]
    ConversationHistory(ConversationHistoryEvent),
    #[serde(rename = "emotion_update")]
    EmotionUpdate(EmotionUpdateEvent),
    #[serde(rename = "message_ack")]
    MessageAck(MessageAckEvent),
    #[serde(rename = "message_response")]
    MessageResponse(MessageResponseEvent),
    #[serde(rename = "audio_ready")]
    AudioReady(AudioReadyEvent),
    #[serde(rename = "history_cleared")]
    HistoryCleared(HistoryClearedEvent),
    #[serde(rename = "emotion_history")]
    EmotionHistory(EmotionHistoryEvent),
    #[serde(rename = "command_response")]
    CommandResponse(CommandResponseEvent),
    #[serde(rename = "error")]
    Error(ErrorEvent),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Close { .. } => "close",
            ServerEvent::Connected(_) => "connected",
            ServerEvent::LoginSuccess(_) => "login_success",
            ServerEvent::AuthError(_) => "auth_error",
            ServerEvent::ConversationHistory(_) => "conversation_history",
            ServerEvent::EmotionUpdate(_) => "emotion_update",
            ServerEvent::MessageAck(_) => "message_ack",
            ServerEvent::MessageResponse(_) => "message_response",
            ServerEvent::AudioReady(_) => "audio_ready",
            ServerEvent::HistoryCleared(_) => "history_cleared",
            ServerEvent::EmotionHistory(_) => "emotion_history",
            ServerEvent::CommandResponse(_) => "command_response",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Events accepted before a session has been established.
    pub fn is_auth_event(&self) -> bool {
        matches!(
            self,
            ServerEvent::Close { .. }
                | ServerEvent::Connected(_)
                | ServerEvent::LoginSuccess(_)
                | ServerEvent::AuthError(_)
        )
    }

    /// The turn this event answers, when the server reported one.
    pub fn turn_id(&self) -> Option<TurnId> {
        match self {
            ServerEvent::MessageAck(e) => Some(e.turn_id()),
            ServerEvent::MessageResponse(e) => e.turn_id(),
            ServerEvent::AudioReady(e) => e.turn_id(),
            ServerEvent::Error(e) => e.turn_id(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Emotion;

    #[test]
    fn test_serialize_client_events() {
        let event = ClientEvent::SendMessage(SendMessageEvent::new("hello").with_turn_id(3));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"send_message","message":"hello","turn_id":3}"#);

        let event = ClientEvent::StopResponse(StopResponseEvent::new());
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"stop_response"}"#);

        let event = ClientEvent::RestoreSession(RestoreSessionEvent::new(7, "ana"));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"restore_session","user_id":7,"username":"ana"}"#);

        let event = ClientEvent::VoiceCommand(VoiceCommandEvent::new("roomie, stop listening"));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"voice_command","text":"roomie, stop listening"}"#);

        let event = ClientEvent::AuthLogin(AuthEvent::new("ana", "hunter2"));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"auth_login","username":"ana","password":"hunter2"}"#);
    }

    #[test]
    fn test_auth_event_debug_hides_password() {
        let event = AuthEvent::new("ana", "hunter2");
        assert!(!format!("{:?}", event).contains("hunter2"));
    }

    #[test]
    fn test_deserialize_server_events() {
        let json = r#"{"type":"audio_ready","audio_url":null}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::AudioReady(e) => {
                assert_eq!(e.audio_url(), None);
                assert_eq!(e.turn_id(), None);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let json = r#"{"type":"message_response","text":"hi there","personality":"Sunny","emotion":"happy","mood":"cheerful","turn_id":4}"#;
        let event = serde_json::from_str::<ServerEvent>(json).unwrap();
        assert_eq!(event.turn_id(), Some(4));
        match event {
            ServerEvent::MessageResponse(e) => {
                assert_eq!(e.text(), "hi there");
                assert_eq!(e.personality(), Some("Sunny"));
                assert_eq!(e.emotion(), Some(&Emotion::Happy));
                assert_eq!(e.mood(), Some("cheerful"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let json = r#"{"type":"emotion_update","emotion":"sad","confidence":0.82,"timestamp":1700000000.5}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::EmotionUpdate(e) => {
                assert_eq!(e.emotion(), &Emotion::Sad);
                assert!((e.confidence() - 0.82).abs() < f32::EPSILON);
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let json = r#"{"type":"conversation_history","history":[{"id":2,"user_message":"hey","bot_response":"hello!","emotion":"neutral"}]}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::ConversationHistory(e) => {
                assert_eq!(e.history().len(), 1);
                assert_eq!(e.history()[0].user_message(), "hey");
                assert_eq!(e.history()[0].id(), Some(2));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let json = r#"{"type":"command_response","success":true,"message":"Stopped listening for voice commands","action":"toggle_listening","data":{"enabled":false}}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::CommandResponse(e) => {
                assert!(e.success());
                assert_eq!(e.action(), Some(&CommandAction::ToggleListening));
                assert_eq!(e.data().enabled(), Some(false));
                assert!(!e.is_message());
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let json = r#"{"type":"command_response","success":false,"message":"Not a recognized command","is_message":true}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::CommandResponse(e) => {
                assert!(e.is_message());
                assert_eq!(e.action(), None);
                assert_eq!(e.data(), &CommandData::default());
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let json = r#"{"type":"command_response","success":true,"message":"Exporting","action":"dance_party","data":{}}"#;
        match serde_json::from_str::<ServerEvent>(json).unwrap() {
            ServerEvent::CommandResponse(e) => assert_eq!(e.action(), Some(&CommandAction::Unknown)),
            other => panic!("unexpected event: {:?}", other),
        }

        let json = r#"{"type":"history_cleared","message":"Chat history cleared"}"#;
        assert!(matches!(
            serde_json::from_str::<ServerEvent>(json).unwrap(),
            ServerEvent::HistoryCleared(_)
        ));
    }

    #[test]
    fn test_auth_events_are_classified() {
        let ok: ServerEvent =
            serde_json::from_str(r#"{"type":"login_success","user_id":1,"username":"ana"}"#).unwrap();
        assert!(ok.is_auth_event());
        let err: ServerEvent = serde_json::from_str(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert!(!err.is_auth_event());
    }
}
