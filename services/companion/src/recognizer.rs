use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use roomie_core::{Event, RecognitionError, RecognizerEvent};

use crate::EventTx;

/// Dictation typed on the console stands in for a speech recognizer. Lines
/// only reach the core while the core has the recognizer started.
#[derive(Clone)]
pub struct ConsoleRecognizer {
    events: EventTx,
    active: Arc<AtomicBool>,
}

impl ConsoleRecognizer {
    pub fn new(events: EventTx) -> Self {
        Self {
            events,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn start(&self) {
        if !self.active.swap(true, Ordering::SeqCst) {
            tracing::debug!("recognizer started");
        }
    }

    pub fn stop(&self) {
        self.end("stopped");
    }

    pub fn abort(&self) {
        self.end("aborted");
    }

    fn end(&self, how: &str) {
        if self.active.swap(false, Ordering::SeqCst) {
            tracing::debug!("recognizer {}", how);
            crate::deliver(&self.events, Event::Recognizer(RecognizerEvent::Ended));
        }
    }

    /// Feed one dictated line. Returns `false` when the recognizer is off.
    /// A blank line is reported the way a silent microphone would be.
    pub fn dictate(&self, text: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        let event = if text.trim().is_empty() {
            RecognizerEvent::Error(RecognitionError::NoSpeech)
        } else {
            RecognizerEvent::Fragment {
                text: text.trim().to_string(),
                is_final: true,
            }
        };
        crate::deliver(&self.events, Event::Recognizer(event));
        true
    }
}
