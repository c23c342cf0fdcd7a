use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{Duration, Instant};

use movie_shelf_core::{SessionContext, UserKey};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// How long a session may go unused before its token stops resolving.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum SessionError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("user `{0}` already exists")]
    UserExists(String),
}

/// Opaque bearer token handed out at login.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(transparent)]
pub struct SessionToken(Ulid);

impl SessionToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionToken {
    type Err = SessionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(raw.trim()).map(Self).map_err(|_| SessionError::NotAuthenticated)
    }
}

/// An authenticated user bound to a token.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Session {
    pub token: SessionToken,
    pub user_key: UserKey,
    pub username: String,
}

impl Session {
    #[must_use]
    pub fn new(user_key: UserKey, username: String) -> Self {
        Self { token: SessionToken::new(), user_key, username }
    }
}

impl SessionContext for Session {
    fn current_user_key(&self) -> Option<UserKey> {
        Some(self.user_key.clone())
    }
}

#[derive(Debug)]
struct LiveSession {
    session: Session,
    last_seen: Instant,
}

/// Live sessions by token. A session expires once it has been idle for the
/// registry's timeout; resolving a token counts as use.
#[derive(Debug)]
pub(crate) struct SessionRegistry {
    sessions: HashMap<SessionToken, LiveSession>,
    idle_timeout: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }
}

impl SessionRegistry {
    pub(crate) fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self { sessions: HashMap::new(), idle_timeout }
    }

    pub(crate) fn insert(&mut self, session: Session, now: Instant) {
        self.sessions.insert(session.token, LiveSession { session, last_seen: now });
    }

    pub(crate) fn remove(&mut self, token: &SessionToken) -> Option<Session> {
        self.sessions.remove(token).map(|live| live.session)
    }

    /// Resolve a token and mark its session as used at `now`.
    pub(crate) fn user_key(&mut self, token: &SessionToken, now: Instant) -> Option<UserKey> {
        let idle_timeout = self.idle_timeout;
        let live = self.sessions.get_mut(token)?;
        if now.saturating_duration_since(live.last_seen) >= idle_timeout {
            return None;
        }
        live.last_seen = now;
        Some(live.session.user_key.clone())
    }

    pub(crate) fn has_user(&self, user_key: &UserKey) -> bool {
        self.sessions.values().any(|live| &live.session.user_key == user_key)
    }

    /// Drop every session idle for the timeout at `now`. Returns the users left
    /// with no session at all.
    pub(crate) fn expire_idle(&mut self, now: Instant) -> Vec<UserKey> {
        let idle_timeout = self.idle_timeout;
        let mut expired = Vec::new();
        self.sessions.retain(|_, live| {
            let keep = now.saturating_duration_since(live.last_seen) < idle_timeout;
            if !keep {
                expired.push(live.session.user_key.clone());
            }
            keep
        });

        expired.sort();
        expired.dedup();
        expired.retain(|user_key| !self.has_user(user_key));
        expired
    }
}
