/// Failures surfaced to the user. None of these are fatal: the core recovers
/// locally and stays interactive.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompanionError {
    #[error("connection problem: {0}")]
    Transport(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("voice capture stopped: {0}")]
    Recognition(String),
    #[error("{0}")]
    Turn(String),
    #[error("audio playback failed: {0}")]
    Playback(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session record is malformed: {0}")]
    Format(#[from] serde_json::Error),
}
