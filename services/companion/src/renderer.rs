use std::io::Write;

use roomie_core::mood::MoodHistory;
use roomie_core::turn::{TurnOutcome, UtteranceSource};
use roomie_core::types::{EmotionRecord, HistoryEntry};
use roomie_core::DisplayEvent;

/// Writes core display output as plain lines. Keeps the rolling mood window
/// the avatar would otherwise own.
pub struct ConsoleRenderer<W: Write> {
    out: W,
    moods: MoodHistory,
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W, mood_capacity: usize) -> Self {
        Self {
            out,
            moods: MoodHistory::new(mood_capacity),
        }
    }

    pub fn moods(&self) -> &MoodHistory {
        &self.moods
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn playing(&mut self, url: &str) -> std::io::Result<()> {
        writeln!(self.out, "♪ {}", url)
    }

    pub fn render(&mut self, event: DisplayEvent) -> std::io::Result<()> {
        match event {
            DisplayEvent::Connection(state) => writeln!(self.out, "[{}]", state)?,
            DisplayEvent::LoginRequired => writeln!(
                self.out,
                "Sign in with /login <user> <password> or /signup <user> <password>"
            )?,
            DisplayEvent::SessionReady {
                session_id,
                session,
            } => writeln!(
                self.out,
                "Welcome, {}! (session {})",
                session.username(),
                session_id
            )?,
            DisplayEvent::LoggedOut => writeln!(self.out, "Logged out.")?,
            DisplayEvent::Listening(true) => writeln!(self.out, "(listening)")?,
            DisplayEvent::Listening(false) => {}
            DisplayEvent::UserUtterance(utterance) => match utterance.source() {
                UtteranceSource::Voice => writeln!(self.out, "you (voice): {}", utterance.text())?,
                UtteranceSource::Typed => writeln!(self.out, "you: {}", utterance.text())?,
            },
            DisplayEvent::Thinking(true) => writeln!(self.out, "roomie is thinking...")?,
            DisplayEvent::Thinking(false) => {}
            DisplayEvent::AssistantText {
                text, personality, ..
            } => match personality {
                Some(personality) => writeln!(self.out, "roomie [{}]: {}", personality, text)?,
                None => writeln!(self.out, "roomie: {}", text)?,
            },
            DisplayEvent::TurnFinished {
                outcome: TurnOutcome::Aborted,
                ..
            } => writeln!(self.out, "(response stopped)")?,
            DisplayEvent::TurnFinished { .. } => {}
            DisplayEvent::Mood(sample) => {
                let line = format!(
                    "mood: {} ({:.0}%)",
                    sample.emotion(),
                    sample.confidence() * 100.0
                );
                self.moods.push(sample);
                match self.moods.dominant() {
                    Some(dominant) if self.moods.len() > 1 => {
                        writeln!(self.out, "{}, mostly {} lately", line, dominant)?
                    }
                    _ => writeln!(self.out, "{}", line)?,
                }
            }
            DisplayEvent::History(entries) => self.history(&entries)?,
            DisplayEvent::EmotionHistory(records) => self.emotion_history(&records)?,
            DisplayEvent::HistoryCleared => writeln!(self.out, "History cleared.")?,
            DisplayEvent::Notice(notice) => writeln!(self.out, "{}", notice)?,
            DisplayEvent::Error(error) => writeln!(self.out, "error: {}", error)?,
        }
        self.out.flush()
    }

    // Entries arrive newest-first; print them in reading order.
    fn history(&mut self, entries: &[HistoryEntry]) -> std::io::Result<()> {
        if entries.is_empty() {
            return writeln!(self.out, "No conversation history yet.");
        }
        writeln!(self.out, "--- last {} exchanges ---", entries.len())?;
        for entry in entries.iter().rev() {
            writeln!(self.out, "you: {}", entry.user_message())?;
            match entry.emotion() {
                Some(emotion) => {
                    writeln!(self.out, "roomie ({}): {}", emotion, entry.bot_response())?
                }
                None => writeln!(self.out, "roomie: {}", entry.bot_response())?,
            }
        }
        Ok(())
    }

    fn emotion_history(&mut self, records: &[EmotionRecord]) -> std::io::Result<()> {
        if records.is_empty() {
            return writeln!(self.out, "No moods recorded.");
        }
        for record in records {
            let confidence = record
                .confidence()
                .map(|c| format!(" {:.0}%", c * 100.0))
                .unwrap_or_default();
            writeln!(
                self.out,
                "{} {}{}",
                record.timestamp().unwrap_or("-"),
                record.emotion(),
                confidence
            )?;
        }
        Ok(())
    }
}
