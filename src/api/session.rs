//! In-memory session registry.
//!
//! Sessions are kept in a single map behind a reader/writer lock that every
//! operation shares. There is no background timer:
//!
//! - **Read-time expiry:** `get` on an expired session deletes it and reports
//!   [`SessionError::Expired`].
//! - **Amortized sweep:** every `put` bumps a write counter; once it reaches
//!   the sweep threshold the same `put` removes every expired entry and resets
//!   the counter, all under one exclusive lock acquisition.

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 4 * 60 * 60;
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;
pub const DEFAULT_SWEEP_THRESHOLD: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("SessionID not found")]
    NotFound,
    #[error("SessionID expired")]
    Expired,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Empty for anonymous sessions.
    pub user: String,
    /// `None` means "use the store default"; stored sessions always carry one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_user(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }
}

#[derive(Debug, Default)]
struct Entries {
    sessions: HashMap<String, Session>,
    writes: usize,
}

#[derive(Debug)]
pub struct SessionStore {
    entries: RwLock<Entries>,
    ttl: Duration,
    sweep_threshold: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_SESSION_TTL_SECONDS))
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            ttl,
            sweep_threshold: DEFAULT_SWEEP_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_sweep_threshold(mut self, threshold: usize) -> Self {
        self.sweep_threshold = threshold.max(1);
        self
    }

    /// Insert or overwrite a session, materializing the default expiry.
    ///
    /// An expiry past the last representable instant saturates to it.
    pub async fn put(&self, id: &str, mut session: Session) {
        let now = Utc::now();
        if session.expires_at.is_none() {
            session.expires_at = Some(
                now.checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
        }

        let mut entries = self.entries.write().await;
        entries.sessions.insert(id.to_string(), session);
        entries.writes += 1;
        if entries.writes >= self.sweep_threshold {
            let before = entries.sessions.len();
            entries.sessions.retain(|_, session| !session.is_expired(now));
            entries.writes = 0;
            debug!(
                removed = before - entries.sessions.len(),
                "swept expired sessions"
            );
        }
    }

    /// Look up a session.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] when absent, [`SessionError::Expired`] when
    /// the entry has expired; the expired entry is removed.
    pub async fn get(&self, id: &str) -> Result<Session, SessionError> {
        let now = Utc::now();
        let session = {
            let entries = self.entries.read().await;
            entries
                .sessions
                .get(id)
                .cloned()
                .ok_or(SessionError::NotFound)?
        };

        if !session.is_expired(now) {
            return Ok(session);
        }

        // A concurrent put may have refreshed the entry between the two locks.
        let mut entries = self.entries.write().await;
        if entries
            .sessions
            .get(id)
            .is_some_and(|current| current.is_expired(now))
        {
            entries.sessions.remove(id);
        }
        Err(SessionError::Expired)
    }

    /// Remove a session; absent ids are ignored.
    pub async fn delete(&self, id: &str) {
        self.entries.write().await.sessions.remove(id);
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Generate a 128-bit random session id formatted as `8-4-4-4-12` upper-case hex groups.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_session_id() -> Result<String, rand::Error> {
    let mut bytes = [0u8; 16];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(Uuid::from_bytes(bytes)
        .hyphenated()
        .to_string()
        .to_uppercase())
}
