//! Speech capture: turns a continuous recognizer stream into discrete
//! utterances.
//!
//! Final fragments accumulate in a buffer and every fragment, interim or
//! final, restarts the silence countdown. When the countdown fires the buffer
//! becomes one [`Utterance`], capture stops, and a restart is scheduled.

use tokio::time::Instant;

use crate::error::CompanionError;
use crate::timer::{TurnTimer, CAPTURE_RESTART_DELAY, SILENCE_THRESHOLD};
use crate::turn::Utterance;
use crate::{display, emit, Command, CommandTx, DisplayEvent};

/// Buffers of this many characters or fewer are treated as noise.
pub const MIN_UTTERANCE_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum RecognizerEvent {
    Fragment { text: String, is_final: bool },
    Error(RecognitionError),
    /// The recognizer stopped on its own or acknowledged a stop/abort.
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    NoSpeech,
    /// A stop/start raced and the recognizer aborted itself.
    Aborted,
    NotAllowed,
    AudioCapture,
    Network,
    Other(String),
}

impl RecognitionError {
    /// Transient errors are swallowed and capture restarts on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, RecognitionError::NoSpeech | RecognitionError::Aborted)
    }
}

impl std::fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognitionError::NoSpeech => f.write_str("no-speech"),
            RecognitionError::Aborted => f.write_str("aborted"),
            RecognitionError::NotAllowed => f.write_str("not-allowed"),
            RecognitionError::AudioCapture => f.write_str("audio-capture"),
            RecognitionError::Network => f.write_str("network"),
            RecognitionError::Other(reason) => f.write_str(reason),
        }
    }
}

pub struct SpeechCapture {
    commands: CommandTx,
    active: bool,
    auto_listen: bool,
    disabled: Option<RecognitionError>,
    buffer: String,
    silence: TurnTimer<()>,
    restart: TurnTimer<()>,
}

impl SpeechCapture {
    pub fn new(commands: CommandTx, auto_listen: bool) -> Self {
        Self {
            commands,
            active: false,
            auto_listen,
            disabled: None,
            buffer: String::new(),
            silence: TurnTimer::new(),
            restart: TurnTimer::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn auto_listen(&self) -> bool {
        self.auto_listen
    }

    /// Set after a non-transient recognizer error until [`Self::enable`].
    pub fn is_disabled(&self) -> bool {
        self.disabled.is_some()
    }

    pub fn buffered_text(&self) -> &str {
        &self.buffer
    }

    pub fn restart_pending(&self) -> bool {
        self.restart.is_armed()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        crate::timer::earliest([self.silence.deadline(), self.restart.deadline()])
    }

    /// Start the recognizer if it is not already running.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        if let Some(error) = &self.disabled {
            tracing::debug!("capture disabled after {}, not starting", error);
            return false;
        }
        self.restart.cancel();
        self.buffer.clear();
        self.active = true;
        tracing::debug!("capture started");
        emit(&self.commands, Command::StartRecognizer);
        display(&self.commands, DisplayEvent::Listening(true));
        true
    }

    /// Graceful stop. Buffered text is discarded.
    pub fn stop(&mut self) {
        self.silence.cancel();
        self.buffer.clear();
        if self.active {
            self.active = false;
            tracing::debug!("capture stopped");
            emit(&self.commands, Command::StopRecognizer);
            display(&self.commands, DisplayEvent::Listening(false));
        }
    }

    /// Immediate stop with no restart pending. Used when playback begins and
    /// when a turn is interrupted.
    pub fn force_abort(&mut self) {
        self.silence.cancel();
        self.restart.cancel();
        self.buffer.clear();
        if self.active {
            self.active = false;
            tracing::debug!("capture aborted");
            emit(&self.commands, Command::AbortRecognizer);
            display(&self.commands, DisplayEvent::Listening(false));
        }
    }

    /// Arm the restart countdown unless auto-listen is off, capture is
    /// disabled, or the recognizer is already running.
    pub fn schedule_restart(&mut self, now: Instant) {
        if !self.auto_listen || self.disabled.is_some() || self.active {
            return;
        }
        self.restart.arm(CAPTURE_RESTART_DELAY, now, ());
    }

    pub fn set_auto_listen(&mut self, enabled: bool, now: Instant) {
        self.auto_listen = enabled;
        if enabled {
            self.schedule_restart(now);
        } else {
            self.restart.cancel();
            self.stop();
        }
    }

    /// Clear a fatal recognizer error. This is the external restart trigger.
    pub fn enable(&mut self) {
        if let Some(error) = self.disabled.take() {
            tracing::info!("capture re-enabled after {}", error);
        }
    }

    /// `speaking` is true while assistant audio owns the speaker; fragments
    /// that arrive then are echo and are dropped.
    pub fn on_recognizer(&mut self, event: RecognizerEvent, now: Instant, speaking: bool) {
        match event {
            RecognizerEvent::Fragment { text, is_final } => {
                if !self.active {
                    tracing::debug!("ignoring trailing fragment from stopped recognizer");
                    return;
                }
                if speaking {
                    tracing::debug!("ignoring fragment captured during playback");
                    return;
                }
                if is_final {
                    let text = text.trim();
                    if !text.is_empty() {
                        if !self.buffer.is_empty() {
                            self.buffer.push(' ');
                        }
                        self.buffer.push_str(text);
                    }
                }
                self.silence.arm(SILENCE_THRESHOLD, now, ());
            }
            RecognizerEvent::Error(error) if error.is_transient() => {
                tracing::debug!("transient recognizer error: {}", error);
                self.active = false;
                self.silence.cancel();
                self.buffer.clear();
                self.schedule_restart(now);
            }
            RecognizerEvent::Error(error) => {
                tracing::warn!("recognizer failed: {}", error);
                let was_active = self.active;
                self.active = false;
                self.silence.cancel();
                self.restart.cancel();
                self.buffer.clear();
                display(
                    &self.commands,
                    DisplayEvent::Error(CompanionError::Recognition(error.to_string())),
                );
                if was_active {
                    display(&self.commands, DisplayEvent::Listening(false));
                }
                self.disabled = Some(error);
            }
            RecognizerEvent::Ended => {
                if self.active {
                    // Continuous recognizers end on their own from time to
                    // time. Pending silence still finalizes what was heard.
                    tracing::debug!("recognizer ended while capturing");
                    self.active = false;
                    if !self.silence.is_armed() {
                        self.schedule_restart(now);
                    }
                }
            }
        }
    }

    /// Advance timers. `blocked` is true while a turn is in flight or input is
    /// suspended; a finalized buffer is then discarded and restarts wait.
    pub fn poll(&mut self, now: Instant, blocked: bool) -> Option<Utterance> {
        let mut finalized = None;

        if self.silence.poll(now).is_some() {
            let text = self.buffer.trim().to_string();
            self.buffer.clear();
            if blocked {
                tracing::debug!("discarding capture finalized while a turn is active");
            } else if text.chars().count() > MIN_UTTERANCE_CHARS {
                tracing::info!("utterance finalized: {:?}", text);
                self.stop();
                self.schedule_restart(now);
                finalized = Some(Utterance::voice(&text, now));
            } else if !text.is_empty() {
                tracing::debug!("discarding short fragment {:?} as noise", text);
            }
            if !self.active && finalized.is_none() {
                self.schedule_restart(now);
            }
        }

        if self.restart.poll(now).is_some() {
            if blocked {
                tracing::debug!("capture restart deferred until the turn ends");
            } else {
                self.start();
            }
        }

        finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn drain(rx: &mut crate::CommandRx) -> Vec<Command> {
        let mut out = vec![];
        while let Ok(command) = rx.try_recv() {
            out.push(command);
        }
        out
    }

    fn fragment(text: &str, is_final: bool) -> RecognizerEvent {
        RecognizerEvent::Fragment {
            text: text.to_string(),
            is_final,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_finalizes_after_silence() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut capture = SpeechCapture::new(tx, true);
        let t0 = Instant::now();
        assert!(capture.start());

        capture.on_recognizer(fragment("hello", true), t0, false);
        capture.on_recognizer(fragment("the", false), t0 + ms(500), false);
        capture.on_recognizer(fragment("there", true), t0 + ms(1000), false);

        // Interim and final fragments both restart the countdown.
        assert_eq!(capture.poll(t0 + ms(2000), false), None);
        let utterance = capture.poll(t0 + ms(2500), false).unwrap();
        assert_eq!(utterance.text(), "hello there");
        assert!(!capture.is_active());
        assert!(capture.restart_pending());
        assert_eq!(capture.buffered_text(), "");

        let commands = drain(&mut rx);
        assert!(matches!(commands.first(), Some(Command::StartRecognizer)));
        assert!(commands.iter().any(|c| matches!(c, Command::StopRecognizer)));

        // Restarts after the fixed delay.
        assert_eq!(capture.poll(t0 + ms(3000), false), None);
        assert!(!capture.is_active());
        capture.poll(t0 + ms(3500), false);
        assert!(capture.is_active());
    }

    #[test]
    fn test_short_buffer_is_noise() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut capture = SpeechCapture::new(tx, true);
        let t0 = Instant::now();
        capture.start();

        capture.on_recognizer(fragment(" ok ", true), t0, false);
        assert_eq!(capture.poll(t0 + SILENCE_THRESHOLD, false), None);
        // Noise does not stop capture.
        assert!(capture.is_active());
        assert_eq!(capture.buffered_text(), "");
    }

    #[test]
    fn test_no_utterance_while_blocked() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut capture = SpeechCapture::new(tx, true);
        let t0 = Instant::now();
        capture.start();

        capture.on_recognizer(fragment("tell me a joke", true), t0, false);
        assert_eq!(capture.poll(t0 + SILENCE_THRESHOLD, true), None);
    }

    #[test]
    fn test_fragments_during_playback_are_dropped() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut capture = SpeechCapture::new(tx, true);
        let t0 = Instant::now();
        capture.start();

        capture.on_recognizer(fragment("echo of the assistant", true), t0, true);
        assert_eq!(capture.buffered_text(), "");
        assert_eq!(capture.next_deadline(), None);
    }

    #[test]
    fn test_trailing_fragment_after_abort_is_ignored() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut capture = SpeechCapture::new(tx, true);
        let t0 = Instant::now();
        capture.start();
        capture.force_abort();
        assert!(drain(&mut rx).iter().any(|c| matches!(c, Command::AbortRecognizer)));

        capture.on_recognizer(fragment("late words", true), t0, false);
        assert_eq!(capture.buffered_text(), "");
        assert_eq!(capture.poll(t0 + ms(5000), false), None);
        assert!(!capture.is_active());
    }

    #[test]
    fn test_transient_error_restarts_silently() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut capture = SpeechCapture::new(tx, true);
        let t0 = Instant::now();
        capture.start();
        drain(&mut rx);

        capture.on_recognizer(RecognizerEvent::Error(RecognitionError::NoSpeech), t0, false);
        capture.poll(t0 + CAPTURE_RESTART_DELAY, false);

        let commands = drain(&mut rx);
        assert!(commands.iter().any(|c| matches!(c, Command::StartRecognizer)));
        assert!(!commands
            .iter()
            .any(|c| matches!(c, Command::Display(DisplayEvent::Error(_)))));
    }

    #[test]
    fn test_fatal_error_disables_until_enabled() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut capture = SpeechCapture::new(tx, true);
        let t0 = Instant::now();
        capture.start();
        drain(&mut rx);

        capture.on_recognizer(
            RecognizerEvent::Error(RecognitionError::NotAllowed),
            t0,
            false,
        );
        assert!(capture.is_disabled());
        assert!(drain(&mut rx).iter().any(|c| matches!(
            c,
            Command::Display(DisplayEvent::Error(CompanionError::Recognition(_)))
        )));

        capture.schedule_restart(t0);
        assert_eq!(capture.poll(t0 + ms(10_000), false), None);
        assert!(!capture.start());

        capture.enable();
        assert!(capture.start());
    }

    #[test]
    fn test_auto_listen_off_suppresses_restart() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut capture = SpeechCapture::new(tx, true);
        let t0 = Instant::now();
        capture.start();
        capture.set_auto_listen(false, t0);
        assert!(!capture.is_active());

        capture.schedule_restart(t0);
        assert!(!capture.restart_pending());
    }
}
