//! Spoken commands addressed to the companion by name.
//!
//! Speech that opens with the activation word goes to the server as a
//! `voice_command` instead of a message. The server answers each one with a
//! `command_response`, in order, so pending commands are kept in a queue.

use std::collections::VecDeque;

use crate::turn::Utterance;

pub const ACTIVATION_WORD: &str = "roomie";

/// "Roomie, ..." or "hey roomie ...".
pub fn is_addressed(text: &str) -> bool {
    let text = text.trim_start().to_lowercase();
    let text = text
        .strip_prefix("hey ")
        .map(str::trim_start)
        .unwrap_or(text.as_str());
    match text.strip_prefix(ACTIVATION_WORD) {
        Some(rest) => rest.chars().next().map_or(true, |c| !c.is_alphanumeric()),
        None => false,
    }
}

#[derive(Debug, Default)]
pub struct VoiceCommands {
    pending: VecDeque<Utterance>,
}

impl VoiceCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, utterance: Utterance) {
        self.pending.push_back(utterance);
    }

    /// The utterance the next `command_response` answers.
    pub fn resolve(&mut self) -> Option<Utterance> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!("dropping {} unanswered voice commands", self.pending.len());
        }
        self.pending.clear();
    }
}
