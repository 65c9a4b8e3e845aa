//! Session registry: binds live connections to negotiated display identities
//! and owns the uniqueness and reserved-name policy.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::constants::{MAX_USERNAME_CHARS, MIN_USERNAME_CHARS};

/// Why a username negotiation was refused. All variants are recoverable:
/// the connection stays open and may retry with a different name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    InvalidFormat,
    LengthOutOfRange,
    Taken,
    Reserved,
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFormat => write!(
                f,
                "Username can only contain letters, numbers, underscore, and dash"
            ),
            Self::LengthOutOfRange => write!(
                f,
                "Username must be {}-{} characters long",
                MIN_USERNAME_CHARS, MAX_USERNAME_CHARS
            ),
            Self::Taken => write!(f, "Username is already taken"),
            Self::Reserved => write!(f, "Username is reserved"),
        }
    }
}

impl Error for IdentityError {}

/// The live binding between one connection and one negotiated identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub connection_id: Uuid,
    /// Opaque token minted when the connection first negotiates a name.
    /// Not assumed to survive a reconnect.
    pub user_id: String,
    pub username: String,
    pub joined_at: DateTime<Utc>,
}

/// Validate a requested username without touching any shared state.
///
/// Returns the trimmed name on success. Checks run in a fixed order and
/// the first violation is reported: non-empty, length, then charset.
pub fn validate_username(requested: &str) -> Result<String, IdentityError> {
    let trimmed = requested.trim();
    if trimmed.is_empty() {
        return Err(IdentityError::InvalidFormat);
    }
    let length = trimmed.chars().count();
    if length < MIN_USERNAME_CHARS || length > MAX_USERNAME_CHARS {
        return Err(IdentityError::LengthOutOfRange);
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(IdentityError::InvalidFormat);
    }
    Ok(trimmed.to_string())
}

/// Owns every live session. Exactly one session may exist per connection,
/// and usernames are unique case-insensitively across live sessions.
pub struct SessionRegistry {
    sessions: HashMap<Uuid, Session>,
    /// Names that can never be assigned, stored lowercased.
    reserved: Vec<String>,
}

impl SessionRegistry {
    /// Create a registry with the given reserved names (compared
    /// case-insensitively against requests).
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            sessions: HashMap::new(),
            reserved: reserved
                .into_iter()
                .map(|name| name.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Negotiate an identity for a connection.
    ///
    /// On success the session is stored and a copy returned. A connection
    /// that already holds a session re-validates as usual; its binding is
    /// replaced in place, keeping the original `user_id` and `joined_at`.
    pub fn negotiate(
        &mut self,
        connection_id: Uuid,
        requested: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, IdentityError> {
        let username = validate_username(requested)?;

        // Uniqueness is checked against every live session, the caller's
        // own included: re-requesting your current name is a rejection.
        if self
            .sessions
            .values()
            .any(|session| session.username.eq_ignore_ascii_case(&username))
        {
            return Err(IdentityError::Taken);
        }

        if self.reserved.contains(&username.to_lowercase()) {
            return Err(IdentityError::Reserved);
        }

        let session = match self.sessions.get_mut(&connection_id) {
            Some(existing) => {
                existing.username = username;
                existing.clone()
            }
            None => {
                let session = Session {
                    connection_id,
                    user_id: Uuid::new_v4().to_string(),
                    username,
                    joined_at: now,
                };
                self.sessions.insert(connection_id, session.clone());
                session
            }
        };

        Ok(session)
    }

    /// Remove and return the session bound to a connection. Connections
    /// that never negotiated (or were already removed) yield `None`.
    pub fn remove(&mut self, connection_id: &Uuid) -> Option<Session> {
        self.sessions.remove(connection_id)
    }

    /// Look up the session bound to a connection.
    pub fn get(&self, connection_id: &Uuid) -> Option<&Session> {
        self.sessions.get(connection_id)
    }

    /// Number of live identified sessions.
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
