pub mod connection;
pub mod emotion;
pub mod events;
pub mod history;

pub use connection::ConnectionState;
pub use emotion::Emotion;
pub use events::{ClientEvent, ServerEvent};
pub use history::{EmotionRecord, HistoryEntry};

/// Correlates a `send_message` with the server events that answer it.
pub type TurnId = u64;

/// Server-side user identifier.
pub type UserId = i64;
