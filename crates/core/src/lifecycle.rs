//! Authentication, session restore and the "ready" gate for the arbiter.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{CompanionError, StoreError};
use crate::types::events::client::{AuthEvent, RestoreSessionEvent};
use crate::types::{ClientEvent, ConnectionState, ServerEvent, UserId};
use crate::{display, emit, Command, CommandTx, DisplayEvent};

/// Numbers each authenticated connection. Local to this client and never
/// persisted.
pub type SessionId = u64;

/// The persisted identity used to drive `restore_session`. The server
/// re-validates it; it is not a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    user_id: UserId,
    username: String,
}

impl Session {
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

pub trait SessionStore: Send {
    fn load(&self) -> Result<Option<Session>, StoreError>;
    fn save(&mut self, session: &Session) -> Result<(), StoreError>;
    fn clear(&mut self) -> Result<(), StoreError>;
}

/// One JSON record at a fixed path.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    fn save(&mut self, session: &Session) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    session: Option<Session>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, StoreError> {
        Ok(self.session.clone())
    }

    fn save(&mut self, session: &Session) -> Result<(), StoreError> {
        self.session = Some(session.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.session = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    AwaitingCredentials,
    Authenticating,
    Restoring,
    Ready,
}

/// What the caller should do with a server event after the lifecycle saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Handled,
    /// Arrived without an established session.
    Rejected,
    Forward,
}

pub struct SessionLifecycle {
    commands: CommandTx,
    store: Box<dyn SessionStore>,
    session: Option<Session>,
    session_id: Option<SessionId>,
    connections: SessionId,
    mode: SessionMode,
    connection: ConnectionState,
}

impl SessionLifecycle {
    pub fn new(commands: CommandTx, store: Box<dyn SessionStore>) -> Self {
        Self {
            commands,
            store,
            session: None,
            session_id: None,
            connections: 0,
            mode: SessionMode::AwaitingCredentials,
            connection: ConnectionState::Disconnected,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Set while the session on the current connection is established.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Submissions are allowed only with a session on a live connection.
    pub fn is_ready(&self) -> bool {
        self.mode == SessionMode::Ready && self.connection.is_connected()
    }

    pub fn on_connection(&mut self, state: ConnectionState) {
        if self.connection == state {
            return;
        }
        tracing::info!("connection {} -> {}", self.connection, state);
        self.connection = state;
        self.session_id = None;
        match state {
            ConnectionState::Connected => {
                self.connections += 1;
                self.resume();
            }
            _ => {
                // The in-memory session survives so reconnect can restore it.
                if self.mode == SessionMode::Authenticating {
                    self.mode = SessionMode::AwaitingCredentials;
                }
            }
        }
    }

    fn resume(&mut self) {
        let session = match self.session.clone() {
            Some(session) => Some(session),
            None => self.load_stored(),
        };
        match session {
            Some(session) => {
                tracing::info!("restoring session for {}", session.username());
                self.mode = SessionMode::Restoring;
                let restore = RestoreSessionEvent::new(session.user_id(), session.username());
                self.session = Some(session);
                emit(&self.commands, Command::Send(ClientEvent::RestoreSession(restore)));
            }
            None => {
                self.mode = SessionMode::AwaitingCredentials;
                display(&self.commands, DisplayEvent::LoginRequired);
            }
        }
    }

    fn load_stored(&mut self) -> Option<Session> {
        match self.store.load() {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("discarding unreadable session record: {}", e);
                self.clear_stored();
                None
            }
        }
    }

    fn clear_stored(&mut self) {
        if let Err(e) = self.store.clear() {
            tracing::error!("failed to clear session record: {}", e);
        }
    }

    /// Send credentials. Returns `false` when they could not be sent.
    pub fn login(&mut self, username: &str, password: &SecretString, signup: bool) -> bool {
        if !self.connection.is_connected() {
            display(
                &self.commands,
                DisplayEvent::Error(CompanionError::Transport(
                    "not connected to the server".to_string(),
                )),
            );
            return false;
        }
        let username = username.trim();
        if username.is_empty() || password.expose_secret().trim().is_empty() {
            display(
                &self.commands,
                DisplayEvent::Error(CompanionError::Auth(
                    "username and password required".to_string(),
                )),
            );
            return false;
        }

        tracing::info!("authenticating {} (signup: {})", username, signup);
        self.mode = SessionMode::Authenticating;
        let auth = AuthEvent::new(username, password.expose_secret());
        let event = if signup {
            ClientEvent::AuthSignup(auth)
        } else {
            ClientEvent::AuthLogin(auth)
        };
        emit(&self.commands, Command::Send(event));
        true
    }

    pub fn logout(&mut self) {
        if let Some(session) = self.session.take() {
            tracing::info!("logging out {}", session.username());
        }
        self.session_id = None;
        self.clear_stored();
        self.mode = SessionMode::AwaitingCredentials;
        display(&self.commands, DisplayEvent::LoggedOut);
        if self.connection.is_connected() {
            display(&self.commands, DisplayEvent::LoginRequired);
        }
    }

    pub fn on_server_event(&mut self, event: &ServerEvent) -> Disposition {
        match event {
            ServerEvent::Connected(e) => {
                tracing::debug!("server greeting: {}", e.message().unwrap_or_default());
                Disposition::Handled
            }
            ServerEvent::LoginSuccess(e) => {
                let session = Session::new(e.user_id(), e.username());
                let session_id = self.connections;
                tracing::info!(
                    "session {} ready for {} ({})",
                    session_id,
                    session.username(),
                    session.user_id()
                );
                if let Err(err) = self.store.save(&session) {
                    tracing::error!("failed to persist session record: {}", err);
                }
                self.session = Some(session.clone());
                self.session_id = Some(session_id);
                self.mode = SessionMode::Ready;
                display(
                    &self.commands,
                    DisplayEvent::SessionReady {
                        session_id,
                        session,
                    },
                );
                Disposition::Handled
            }
            ServerEvent::AuthError(e) => {
                tracing::warn!("authentication rejected in {:?}: {}", self.mode, e.message());
                let was_restoring = self.mode == SessionMode::Restoring;
                self.session = None;
                self.session_id = None;
                self.clear_stored();
                self.mode = SessionMode::AwaitingCredentials;
                display(
                    &self.commands,
                    DisplayEvent::Error(CompanionError::Auth(e.message().to_string())),
                );
                if was_restoring {
                    display(&self.commands, DisplayEvent::LoginRequired);
                }
                Disposition::Handled
            }
            ServerEvent::Close { .. } => Disposition::Forward,
            _ if self.mode != SessionMode::Ready => {
                tracing::warn!("rejecting {} received without a session", event.name());
                Disposition::Rejected
            }
            _ => Disposition::Forward,
        }
    }
}
