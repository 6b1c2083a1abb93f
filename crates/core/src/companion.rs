use std::time::Duration;

use secrecy::SecretString;
use tokio::time::Instant;

use crate::arbiter::{AbortReason, Submission, TurnArbiter};
use crate::error::CompanionError;
use crate::lifecycle::{Disposition, SessionLifecycle, SessionMode, SessionStore};
use crate::mood::MoodSample;
use crate::timer::{earliest, TurnTimer};
use crate::turn::{TurnState, Utterance};
use crate::types::events::client::{
    ClearHistoryEvent, GetConversationHistoryEvent, GetEmotionEvent, GetEmotionHistoryEvent,
    VoiceCommandEvent,
};
use crate::types::events::server::{CommandAction, CommandResponseEvent};
use crate::types::{ClientEvent, ConnectionState, ServerEvent};
use crate::voice::{self, VoiceCommands};
use crate::{display, emit, Command, CommandTx, DisplayEvent, Event};

pub const DEFAULT_MOOD_POLL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct CompanionConfig {
    auto_listen: bool,
    mood_poll: Option<Duration>,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            auto_listen: true,
            mood_poll: Some(DEFAULT_MOOD_POLL),
        }
    }
}

impl CompanionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_listen(mut self, auto_listen: bool) -> Self {
        self.auto_listen = auto_listen;
        self
    }

    /// `None` disables mood polling.
    pub fn with_mood_poll(mut self, interval: Option<Duration>) -> Self {
        self.mood_poll = interval.filter(|d| !d.is_zero());
        self
    }

    pub fn auto_listen(&self) -> bool {
        self.auto_listen
    }

    pub fn mood_poll(&self) -> Option<Duration> {
        self.mood_poll
    }
}

/// Things the user asks for directly.
#[derive(Debug)]
pub enum UserAction {
    /// Typed text.
    Submit(String),
    Stop,
    Login {
        username: String,
        password: SecretString,
    },
    Signup {
        username: String,
        password: SecretString,
    },
    Logout,
    ClearHistory,
    RequestHistory {
        limit: u32,
    },
    RequestEmotionHistory {
        hours: u32,
    },
    RequestMood,
    SetAutoListen(bool),
    /// Re-enable capture after a fatal recognizer error.
    StartListening,
}

/// Serializes every input into the lifecycle manager and the turn arbiter.
///
/// The runtime calls [`Companion::handle`] for each event that is ready, then
/// [`Companion::end_tick`] once, then [`Companion::tick`] whenever
/// [`Companion::next_deadline`] passes.
pub struct Companion {
    commands: CommandTx,
    lifecycle: SessionLifecycle,
    arbiter: TurnArbiter,
    voice_commands: VoiceCommands,
    mood_poll: TurnTimer<()>,
    mood_interval: Option<Duration>,
}

impl Companion {
    pub fn new(commands: CommandTx, store: Box<dyn SessionStore>, config: CompanionConfig) -> Self {
        Self {
            lifecycle: SessionLifecycle::new(commands.clone(), store),
            arbiter: TurnArbiter::new(commands.clone(), config.auto_listen),
            commands,
            voice_commands: VoiceCommands::new(),
            mood_poll: TurnTimer::new(),
            mood_interval: config.mood_poll,
        }
    }

    pub fn arbiter(&self) -> &TurnArbiter {
        &self.arbiter
    }

    pub fn lifecycle(&self) -> &SessionLifecycle {
        &self.lifecycle
    }

    pub fn turn_state(&self) -> TurnState {
        self.arbiter.state()
    }

    pub fn session_mode(&self) -> SessionMode {
        self.lifecycle.mode()
    }

    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_ready()
    }

    pub fn handle(&mut self, event: Event, now: Instant) {
        match event {
            Event::Connection(state) => self.on_connection(state, now),
            Event::Server(event) => self.on_server(event, now),
            Event::Recognizer(event) => self.arbiter.on_recognizer(event, now),
            Event::Playback(event) => self.arbiter.on_playback(event, now),
            Event::User(action) => self.on_user(action, now),
        }
        self.sync_readiness(now);
    }

    /// Close the current tick. Playback decided during the tick starts here.
    pub fn end_tick(&mut self) {
        self.arbiter.end_tick();
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(utterance) = self.arbiter.poll_capture(now) {
            self.on_voice_utterance(utterance, now);
        }
        if self.mood_poll.poll(now).is_some() && self.lifecycle.is_ready() {
            self.request_mood(now);
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.arbiter.next_deadline(), self.mood_poll.deadline()])
    }

    fn on_connection(&mut self, state: ConnectionState, now: Instant) {
        display(&self.commands, DisplayEvent::Connection(state));
        if state.is_connected() {
            self.arbiter.set_connected(true);
        } else {
            self.arbiter.on_connection_lost(now);
            self.voice_commands.clear();
        }
        self.lifecycle.on_connection(state);
    }

    fn on_server(&mut self, event: ServerEvent, now: Instant) {
        tracing::debug!("server event: {}", event.name());
        match self.lifecycle.on_server_event(&event) {
            Disposition::Handled => {
                if matches!(event, ServerEvent::AuthError(_)) {
                    // Covers a restore rejected while a turn was open.
                    self.arbiter.interrupt(AbortReason::SessionLost, now);
                }
                return;
            }
            Disposition::Rejected => return,
            Disposition::Forward => {}
        }

        match event {
            ServerEvent::Close { reason } => {
                if let Some(reason) = reason {
                    display(
                        &self.commands,
                        DisplayEvent::Error(CompanionError::Transport(reason)),
                    );
                }
            }
            ServerEvent::MessageAck(e) => self.arbiter.on_ack(e.turn_id()),
            ServerEvent::MessageResponse(e) => self.arbiter.on_message_response(&e),
            ServerEvent::AudioReady(e) => self.arbiter.on_audio_ready(&e, now),
            ServerEvent::Error(e) => self.arbiter.on_server_error(&e, now),
            ServerEvent::EmotionUpdate(e) => {
                display(&self.commands, DisplayEvent::Mood(MoodSample::from_update(&e)));
            }
            ServerEvent::ConversationHistory(e) => {
                display(&self.commands, DisplayEvent::History(e.history().to_vec()));
            }
            ServerEvent::EmotionHistory(e) => {
                display(&self.commands, DisplayEvent::EmotionHistory(e.history().to_vec()));
            }
            ServerEvent::HistoryCleared(_) => display(&self.commands, DisplayEvent::HistoryCleared),
            ServerEvent::CommandResponse(e) => self.on_command_response(&e, now),
            ServerEvent::Connected(_) | ServerEvent::LoginSuccess(_) | ServerEvent::AuthError(_) => {}
        }
    }

    fn on_user(&mut self, action: UserAction, now: Instant) {
        match action {
            UserAction::Submit(text) => {
                self.arbiter.submit(Utterance::typed(&text, now), now);
            }
            UserAction::Stop => {
                if !self.arbiter.interrupt(AbortReason::UserStop, now) {
                    tracing::debug!("stop requested with no open turn");
                }
            }
            UserAction::Login { username, password } => {
                self.lifecycle.login(&username, &password, false);
            }
            UserAction::Signup { username, password } => {
                self.lifecycle.login(&username, &password, true);
            }
            UserAction::Logout => {
                self.arbiter.interrupt(AbortReason::UserStop, now);
                self.voice_commands.clear();
                self.lifecycle.logout();
            }
            UserAction::ClearHistory => {
                self.send_when_ready(ClientEvent::ClearHistory(ClearHistoryEvent::new()));
            }
            UserAction::RequestHistory { limit } => {
                let request = GetConversationHistoryEvent::new().with_limit(limit);
                self.send_when_ready(ClientEvent::GetConversationHistory(request));
            }
            UserAction::RequestEmotionHistory { hours } => {
                let request = GetEmotionHistoryEvent::new().with_hours(hours);
                self.send_when_ready(ClientEvent::GetEmotionHistory(request));
            }
            UserAction::RequestMood => {
                self.send_when_ready(ClientEvent::GetEmotion(GetEmotionEvent::new()));
            }
            UserAction::SetAutoListen(enabled) => {
                self.arbiter.set_auto_listen(enabled, now);
                let notice = if enabled { "auto-listen on" } else { "auto-listen off" };
                display(&self.commands, DisplayEvent::Notice(notice.to_string()));
            }
            UserAction::StartListening => self.arbiter.start_listening(),
        }
    }

    /// Speech addressed to the companion is a command; anything else opens a turn.
    fn on_voice_utterance(&mut self, utterance: Utterance, now: Instant) {
        if !voice::is_addressed(utterance.text()) {
            if let Submission::Accepted(turn_id) = self.arbiter.submit(utterance, now) {
                tracing::debug!("voice turn {} submitted", turn_id);
            }
            return;
        }
        tracing::info!("voice command: {:?}", utterance.text());
        let command = VoiceCommandEvent::new(utterance.text());
        emit(&self.commands, Command::Send(ClientEvent::VoiceCommand(command)));
        self.voice_commands.push(utterance);
    }

    fn on_command_response(&mut self, response: &CommandResponseEvent, now: Instant) {
        let Some(utterance) = self.voice_commands.resolve() else {
            tracing::debug!("dropping command_response with no command pending");
            return;
        };
        if response.is_message() {
            tracing::debug!("{:?} is not a command, sending it as a message", utterance.text());
            self.arbiter.submit(utterance, now);
            return;
        }
        if response.success() {
            match response.action() {
                Some(CommandAction::ToggleListening) => {
                    let enabled = response
                        .data()
                        .enabled()
                        .unwrap_or(!self.arbiter.capture().auto_listen());
                    self.arbiter.set_auto_listen(enabled, now);
                }
                Some(CommandAction::ClearConversation) => {
                    self.send_when_ready(ClientEvent::ClearHistory(ClearHistoryEvent::new()));
                }
                action => tracing::debug!("voice command answered with {:?}", action),
            }
        }
        if !response.message().is_empty() {
            display(
                &self.commands,
                DisplayEvent::Notice(response.message().to_string()),
            );
        }
    }

    fn send_when_ready(&mut self, event: ClientEvent) {
        if self.lifecycle.is_ready() {
            emit(&self.commands, Command::Send(event));
            return;
        }
        let error = if self.lifecycle.connection().is_connected() {
            CompanionError::Auth("sign in first".to_string())
        } else {
            CompanionError::Transport("not connected to the server".to_string())
        };
        tracing::warn!("not sending {}: {}", event.name(), error);
        display(&self.commands, DisplayEvent::Error(error));
    }

    fn request_mood(&mut self, now: Instant) {
        emit(
            &self.commands,
            Command::Send(ClientEvent::GetEmotion(GetEmotionEvent::new())),
        );
        if let Some(interval) = self.mood_interval {
            self.mood_poll.arm(interval, now, ());
        }
    }

    fn sync_readiness(&mut self, now: Instant) {
        let ready = self.lifecycle.is_ready();
        if ready == self.arbiter.is_accepting() {
            return;
        }
        self.arbiter.set_accepting(ready, now);
        if ready {
            if self.mood_interval.is_some() {
                self.request_mood(now);
            }
        } else {
            self.mood_poll.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{RecognitionError, RecognizerEvent};
    use crate::lifecycle::{MemorySessionStore, Session};
    use crate::timer::{CAPTURE_RESTART_DELAY, DEBOUNCE_THRESHOLD, SILENCE_THRESHOLD};
    use crate::turn::TurnOutcome;
    use crate::types::events::server::{
        AudioReadyEvent, AuthErrorEvent, CommandData, EmotionUpdateEvent, ErrorEvent,
        LoginSuccessEvent, MessageAckEvent, MessageResponseEvent,
    };
    use crate::types::{Emotion, TurnId};
    use crate::{CommandRx, PlaybackEvent};
    use std::collections::HashSet;

    struct Harness {
        companion: Companion,
        rx: CommandRx,
        now: Instant,
    }

    impl Harness {
        fn new(store: MemorySessionStore, config: CompanionConfig) -> Self {
            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            Self {
                companion: Companion::new(tx, Box::new(store), config),
                rx,
                now: Instant::now(),
            }
        }

        /// Connected and logged in, nothing pending.
        fn ready(config: CompanionConfig) -> Self {
            let store = MemorySessionStore::new().with_session(Session::new(1, "ada"));
            let mut h = Self::new(store, config);
            h.send(Event::Connection(ConnectionState::Connected));
            h.server(ServerEvent::LoginSuccess(LoginSuccessEvent::new(1, "ada")));
            h.drain();
            h
        }

        fn send(&mut self, event: Event) {
            self.companion.handle(event, self.now);
            self.companion.end_tick();
        }

        fn server(&mut self, event: ServerEvent) {
            self.send(Event::Server(event));
        }

        fn user(&mut self, action: UserAction) {
            self.send(Event::User(action));
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
            self.companion.tick(self.now);
        }

        /// Speak `text` and let the silence timer finalize it.
        fn say(&mut self, text: &str) {
            self.send(Event::Recognizer(RecognizerEvent::Fragment {
                text: text.to_string(),
                is_final: true,
            }));
            self.advance(SILENCE_THRESHOLD);
        }

        fn drain(&mut self) -> Vec<Command> {
            let mut out = vec![];
            while let Ok(command) = self.rx.try_recv() {
                out.push(command);
            }
            out
        }
    }

    fn sends(commands: &[Command], name: &str) -> usize {
        commands
            .iter()
            .filter(|c| matches!(c, Command::Send(event) if event.name() == name))
            .count()
    }

    fn has(commands: &[Command], pred: impl Fn(&Command) -> bool) -> bool {
        commands.iter().any(pred)
    }

    fn no_poll() -> CompanionConfig {
        CompanionConfig::new().with_mood_poll(None)
    }

    #[test]
    fn test_login_then_submit() {
        let mut h = Harness::new(MemorySessionStore::new(), no_poll().with_auto_listen(false));
        h.send(Event::Connection(ConnectionState::Connected));
        h.user(UserAction::Login {
            username: "ada".to_string(),
            password: SecretString::from("pw".to_string()),
        });
        h.server(ServerEvent::LoginSuccess(LoginSuccessEvent::new(1, "ada")));
        assert!(h.companion.is_ready());
        h.drain();

        h.user(UserAction::Submit("hello".to_string()));
        assert_eq!(h.companion.turn_state(), TurnState::Submitted);
        h.server(ServerEvent::MessageAck(MessageAckEvent::new(1)));
        assert_eq!(h.companion.turn_state(), TurnState::Processing);

        assert_eq!(sends(&h.drain(), "send_message"), 1);
    }

    #[test]
    fn test_new_submission_interrupts_speaking_turn() {
        let mut h = Harness::ready(no_poll());
        h.user(UserAction::Submit("tell me a story".to_string()));
        h.server(ServerEvent::AudioReady(
            AudioReadyEvent::new(Some("/audio/1.mp3")).with_turn_id(1),
        ));
        assert!(has(&h.drain(), |c| matches!(c, Command::PlayAudio { turn_id: 1, .. })));
        assert_eq!(h.companion.turn_state(), TurnState::Speaking);

        h.advance(DEBOUNCE_THRESHOLD);
        h.user(UserAction::Submit("stop that".to_string()));

        let commands = h.drain();
        assert!(has(&commands, |c| matches!(c, Command::StopAudio { turn_id: 1 })));
        assert_eq!(sends(&commands, "stop_response"), 1);
        assert_eq!(sends(&commands, "send_message"), 1);
        assert_eq!(h.companion.turn_state(), TurnState::Submitted);
        assert_eq!(h.companion.arbiter().turn().map(|t| t.turn_id()), Some(2));
    }

    #[test]
    fn test_no_speech_restarts_capture_silently() {
        let mut h = Harness::ready(no_poll());
        assert!(h.companion.arbiter().capture().is_active());

        h.send(Event::Recognizer(RecognizerEvent::Error(
            RecognitionError::NoSpeech,
        )));
        assert!(!h.companion.arbiter().capture().is_active());
        h.advance(CAPTURE_RESTART_DELAY);

        let commands = h.drain();
        assert!(has(&commands, |c| matches!(c, Command::StartRecognizer)));
        assert!(!has(&commands, |c| matches!(
            c,
            Command::Display(DisplayEvent::Error(_))
        )));
    }

    #[test]
    fn test_text_only_reply_completes_and_capture_resumes() {
        let mut h = Harness::ready(no_poll());
        h.user(UserAction::Submit("hi".to_string()));
        h.server(ServerEvent::MessageAck(MessageAckEvent::new(1)));
        h.server(ServerEvent::MessageResponse(
            MessageResponseEvent::new("hello!").with_turn_id(1),
        ));
        h.server(ServerEvent::AudioReady(AudioReadyEvent::new(None).with_turn_id(1)));
        assert_eq!(h.companion.turn_state(), TurnState::Idle);

        let commands = h.drain();
        assert!(!has(&commands, |c| matches!(c, Command::PlayAudio { .. })));
        assert!(has(&commands, |c| matches!(
            c,
            Command::Display(DisplayEvent::TurnFinished {
                turn_id: 1,
                outcome: TurnOutcome::Completed
            })
        )));

        h.advance(CAPTURE_RESTART_DELAY);
        assert!(h.companion.arbiter().capture().is_active());
    }

    #[test]
    fn test_interrupt_and_audio_ready_in_one_tick() {
        let mut h = Harness::ready(no_poll());
        h.user(UserAction::Submit("hello".to_string()));
        h.drain();

        let now = h.now;
        h.companion.handle(
            Event::Server(ServerEvent::AudioReady(
                AudioReadyEvent::new(Some("/audio/1.mp3")).with_turn_id(1),
            )),
            now,
        );
        h.companion.handle(Event::User(UserAction::Stop), now);
        h.companion.end_tick();

        let commands = h.drain();
        assert!(!has(&commands, |c| matches!(c, Command::PlayAudio { .. })));
        assert_eq!(sends(&commands, "stop_response"), 1);
        assert_eq!(h.companion.turn_state(), TurnState::Idle);
    }

    #[test]
    fn test_stop_twice_sends_one_stop_response() {
        let mut h = Harness::ready(no_poll());
        h.user(UserAction::Submit("hello".to_string()));
        h.user(UserAction::Stop);
        assert_eq!(sends(&h.drain(), "stop_response"), 1);

        h.user(UserAction::Stop);
        h.user(UserAction::Stop);
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_reconnect_resumes_without_login() {
        let store = MemorySessionStore::new().with_session(Session::new(9, "grace"));
        let mut h = Harness::new(store, no_poll());
        h.send(Event::Connection(ConnectionState::Connected));
        assert_eq!(sends(&h.drain(), "restore_session"), 1);

        h.server(ServerEvent::LoginSuccess(LoginSuccessEvent::new(9, "grace")));
        h.user(UserAction::Submit("good morning".to_string()));
        assert_eq!(sends(&h.drain(), "send_message"), 1);

        // Drop and come back: restore is re-issued, submissions wait for it.
        h.server(ServerEvent::AudioReady(AudioReadyEvent::new(None)));
        h.send(Event::Connection(ConnectionState::Disconnected));
        h.advance(DEBOUNCE_THRESHOLD);
        h.user(UserAction::Submit("are you there".to_string()));
        assert_eq!(sends(&h.drain(), "send_message"), 0);

        h.send(Event::Connection(ConnectionState::Connected));
        assert_eq!(sends(&h.drain(), "restore_session"), 1);
        h.server(ServerEvent::LoginSuccess(LoginSuccessEvent::new(9, "grace")));
        h.user(UserAction::Submit("are you there".to_string()));
        let commands = h.drain();
        assert_eq!(sends(&commands, "send_message"), 1);
        assert_eq!(sends(&commands, "auth_login"), 0);
    }

    #[test]
    fn test_rejected_restore_aborts_open_turn() {
        let mut h = Harness::ready(no_poll());
        h.user(UserAction::Submit("tell me a story".to_string()));
        h.server(ServerEvent::AudioReady(
            AudioReadyEvent::new(Some("/audio/1.mp3")).with_turn_id(1),
        ));
        h.send(Event::Connection(ConnectionState::Disconnected));
        // Audio that already started keeps playing through the outage.
        assert_eq!(h.companion.turn_state(), TurnState::Speaking);

        h.send(Event::Connection(ConnectionState::Connected));
        h.drain();
        h.server(ServerEvent::AuthError(AuthErrorEvent::new("session expired")));

        let commands = h.drain();
        assert_eq!(h.companion.turn_state(), TurnState::Idle);
        assert_eq!(sends(&commands, "stop_response"), 0);
        assert!(has(&commands, |c| matches!(c, Command::StopAudio { turn_id: 1 })));
        assert!(has(&commands, |c| matches!(
            c,
            Command::Display(DisplayEvent::LoginRequired)
        )));
        assert!(!h.companion.is_ready());
    }

    #[test]
    fn test_events_before_login_are_rejected() {
        let mut h = Harness::new(MemorySessionStore::new(), no_poll());
        h.send(Event::Connection(ConnectionState::Connected));
        h.drain();

        h.server(ServerEvent::MessageResponse(MessageResponseEvent::new("hi")));
        h.server(ServerEvent::EmotionUpdate(EmotionUpdateEvent::new(
            Emotion::Happy,
            0.9,
        )));
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_mood_polling_while_ready() {
        let interval = Duration::from_millis(5000);
        let mut h = Harness::ready(
            CompanionConfig::new()
                .with_auto_listen(false)
                .with_mood_poll(Some(interval)),
        );
        h.advance(interval);
        assert_eq!(sends(&h.drain(), "get_emotion"), 1);

        h.server(ServerEvent::EmotionUpdate(EmotionUpdateEvent::new(
            Emotion::Sad,
            0.7,
        )));
        assert!(has(&h.drain(), |c| matches!(
            c,
            Command::Display(DisplayEvent::Mood(sample)) if sample.emotion() == &Emotion::Sad
        )));

        h.send(Event::Connection(ConnectionState::Disconnected));
        assert_eq!(h.companion.next_deadline(), None);
        h.advance(interval * 3);
        assert_eq!(sends(&h.drain(), "get_emotion"), 0);
    }

    #[test]
    fn test_logout_aborts_and_suspends() {
        let mut h = Harness::ready(no_poll());
        h.user(UserAction::Submit("hello".to_string()));
        h.user(UserAction::Logout);
        let commands = h.drain();
        assert_eq!(sends(&commands, "stop_response"), 1);
        assert!(has(&commands, |c| matches!(c, Command::Display(DisplayEvent::LoggedOut))));
        assert_eq!(h.companion.session_mode(), SessionMode::AwaitingCredentials);

        h.advance(DEBOUNCE_THRESHOLD);
        h.user(UserAction::Submit("hello again".to_string()));
        assert_eq!(sends(&h.drain(), "send_message"), 0);
    }

    #[test]
    fn test_history_requests_need_session() {
        let mut h = Harness::new(MemorySessionStore::new(), no_poll());
        h.user(UserAction::RequestHistory { limit: 5 });
        assert!(has(&h.drain(), |c| matches!(
            c,
            Command::Display(DisplayEvent::Error(CompanionError::Transport(_)))
        )));

        let mut h = Harness::ready(no_poll());
        h.user(UserAction::RequestHistory { limit: 5 });
        h.user(UserAction::RequestEmotionHistory { hours: 12 });
        h.user(UserAction::ClearHistory);
        let commands = h.drain();
        assert_eq!(sends(&commands, "get_conversation_history"), 1);
        assert_eq!(sends(&commands, "get_emotion_history"), 1);
        assert_eq!(sends(&commands, "clear_history"), 1);
    }

    #[test]
    fn test_server_error_returns_to_idle() {
        let mut h = Harness::ready(no_poll());
        h.user(UserAction::Submit("hello".to_string()));
        h.server(ServerEvent::Error(ErrorEvent::new("llm timeout").with_turn_id(1)));
        assert_eq!(h.companion.turn_state(), TurnState::Idle);

        h.advance(DEBOUNCE_THRESHOLD);
        h.user(UserAction::Submit("try again".to_string()));
        assert_eq!(h.companion.turn_state(), TurnState::Submitted);
    }

    #[test]
    fn test_voice_command_toggles_listening() {
        // --- Arrange ---
        let mut h = Harness::ready(no_poll());
        assert!(h.companion.arbiter().capture().is_active());

        // --- Act ---
        h.say("Roomie, stop listening");
        let commands = h.drain();
        assert_eq!(sends(&commands, "voice_command"), 1);
        assert_eq!(sends(&commands, "send_message"), 0);
        h.server(ServerEvent::CommandResponse(
            CommandResponseEvent::new(true, "Stopped listening for voice commands")
                .with_action(CommandAction::ToggleListening)
                .with_data(CommandData::default().with_enabled(false)),
        ));
        h.advance(CAPTURE_RESTART_DELAY * 2);

        // --- Assert ---
        assert!(!h.companion.arbiter().capture().auto_listen());
        assert!(!h.companion.arbiter().capture().is_active());
        assert_eq!(h.companion.turn_state(), TurnState::Idle);
        assert!(has(&h.drain(), |c| matches!(
            c,
            Command::Display(DisplayEvent::Notice(m)) if m == "Stopped listening for voice commands"
        )));
    }

    #[test]
    fn test_unrecognized_voice_command_becomes_message() {
        let mut h = Harness::ready(no_poll());
        h.say("hey roomie what should I cook tonight");
        assert_eq!(sends(&h.drain(), "voice_command"), 1);

        h.server(ServerEvent::CommandResponse(
            CommandResponseEvent::new(false, "Not a recognized command").with_is_message(true),
        ));
        let commands = h.drain();
        assert_eq!(sends(&commands, "send_message"), 1);
        assert!(has(&commands, |c| matches!(
            c,
            Command::Send(ClientEvent::SendMessage(m)) if m.message() == "hey roomie what should I cook tonight"
        )));
        assert_eq!(h.companion.turn_state(), TurnState::Submitted);

        // Nothing is pending any more.
        h.server(ServerEvent::CommandResponse(
            CommandResponseEvent::new(false, "late").with_is_message(true),
        ));
        assert!(h.drain().is_empty());
    }

    #[test]
    fn test_voice_command_clears_conversation() {
        let mut h = Harness::ready(no_poll());
        h.say("roomie clear conversation");
        h.drain();
        h.server(ServerEvent::CommandResponse(
            CommandResponseEvent::new(true, "Clearing conversation history")
                .with_action(CommandAction::ClearConversation),
        ));
        assert_eq!(sends(&h.drain(), "clear_history"), 1);
    }

    #[test]
    fn test_plain_speech_skips_command_channel() {
        let mut h = Harness::ready(no_poll());
        h.say("what time is it");
        let commands = h.drain();
        assert_eq!(sends(&commands, "voice_command"), 0);
        assert_eq!(sends(&commands, "send_message"), 1);
    }

    /// Deterministic pseudo-random event sequences. At no point may more than
    /// one turn be open, judged from the commands the core emitted.
    #[test]
    fn test_at_most_one_open_turn() {
        let mut seed: u64 = 0x5eed_1234;
        let mut next = move |bound: u64| {
            seed = seed
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (seed >> 33) % bound
        };

        for _ in 0..20 {
            let mut h = Harness::ready(no_poll().with_auto_listen(next(2) == 0));
            let mut open: HashSet<TurnId> = HashSet::new();
            let mut playing: Option<TurnId> = None;

            for _ in 0..200 {
                let latest = h.companion.arbiter().turn().map(|t| t.turn_id());
                let target = match (latest, next(4)) {
                    (Some(id), 0) if id > 1 => Some(id - 1),
                    (latest, _) => latest,
                };
                let event = match next(12) {
                    0 | 1 => Event::User(UserAction::Submit(format!("message {}", next(100)))),
                    2 => Event::User(UserAction::Stop),
                    3 => Event::Server(ServerEvent::MessageAck(MessageAckEvent::new(
                        target.unwrap_or(0),
                    ))),
                    4 => Event::Server(ServerEvent::MessageResponse(
                        MessageResponseEvent::new("chunk "),
                    )),
                    5 => {
                        let url = (next(3) > 0).then_some("/audio/x.mp3");
                        let mut audio = AudioReadyEvent::new(url);
                        if let Some(id) = target {
                            audio = audio.with_turn_id(id);
                        }
                        Event::Server(ServerEvent::AudioReady(audio))
                    }
                    6 => Event::Playback(PlaybackEvent::Ended {
                        turn_id: playing.unwrap_or(0),
                    }),
                    7 => Event::Server(ServerEvent::Error(ErrorEvent::new("boom"))),
                    8 => Event::Recognizer(RecognizerEvent::Fragment {
                        text: "some words".to_string(),
                        is_final: next(2) == 0,
                    }),
                    9 => Event::Recognizer(RecognizerEvent::Ended),
                    10 => Event::Connection(if next(2) == 0 {
                        ConnectionState::Disconnected
                    } else {
                        ConnectionState::Connected
                    }),
                    _ => Event::Server(ServerEvent::LoginSuccess(LoginSuccessEvent::new(
                        1, "ada",
                    ))),
                };
                h.send(event);
                h.advance(Duration::from_millis(next(1200)));

                for command in h.drain() {
                    match command {
                        Command::Send(ClientEvent::SendMessage(message)) => {
                            if let Some(id) = message.turn_id() {
                                open.insert(id);
                            }
                        }
                        Command::Display(DisplayEvent::TurnFinished { turn_id, .. }) => {
                            assert!(open.remove(&turn_id), "turn {} finished twice", turn_id);
                            if playing == Some(turn_id) {
                                playing = None;
                            }
                        }
                        Command::PlayAudio { turn_id, .. } => {
                            assert!(open.contains(&turn_id), "audio for closed turn {}", turn_id);
                            playing = Some(turn_id);
                        }
                        _ => {}
                    }
                    assert!(open.len() <= 1, "open turns: {:?}", open);
                }
                let busy = matches!(
                    h.companion.turn_state(),
                    TurnState::Processing | TurnState::Speaking
                );
                assert_eq!(busy || h.companion.turn_state() == TurnState::Submitted, !open.is_empty());
            }
        }
    }
}
