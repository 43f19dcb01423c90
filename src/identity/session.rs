//! Session collaborator boundary.
//!
//! The auth workflow treats sessions as opaque: establish on login, clear on
//! logout, drop them all when a password is reset. The in-memory layer keeps
//! hashed tokens only; the raw value exists just long enough to reach the
//! caller's cookie.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use uuid::Uuid;

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const DEFAULT_REMEMBER_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A resolved, still-valid session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: Uuid,
    pub remember: bool,
}

/// Opaque session operations the workflow delegates to.
pub trait SessionLayer: Send + Sync {
    /// Start a session and return the raw token for the transport layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the system randomness source fails.
    fn establish(&self, user_id: Uuid, remember: bool) -> Result<String>;

    fn resolve(&self, token: &str) -> Option<Session>;

    /// Drop one session. Clearing an unknown token is a no-op.
    fn clear(&self, token: &str);

    /// Drop every session belonging to `user_id`.
    fn invalidate_all(&self, user_id: Uuid);
}

struct SessionEntry {
    user_id: Uuid,
    remember: bool,
    created_at: Instant,
}

pub struct InMemorySessions {
    entries: Mutex<HashMap<Vec<u8>, SessionEntry>>,
    session_ttl: Duration,
    remember_ttl: Duration,
}

impl InMemorySessions {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            session_ttl: DEFAULT_SESSION_TTL,
            remember_ttl: DEFAULT_REMEMBER_TTL,
        }
    }

    #[must_use]
    pub fn with_ttls(mut self, session_ttl: Duration, remember_ttl: Duration) -> Self {
        self.session_ttl = session_ttl;
        self.remember_ttl = remember_ttl;
        self
    }

    fn ttl_for(&self, remember: bool) -> Duration {
        if remember {
            self.remember_ttl
        } else {
            self.session_ttl
        }
    }

    fn expired(&self, entry: &SessionEntry) -> bool {
        entry.created_at.elapsed() >= self.ttl_for(entry.remember)
    }
}

impl Default for InMemorySessions {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Raw tokens never sit in the map; lookups go through this hash.
fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

impl SessionLayer for InMemorySessions {
    fn establish(&self, user_id: Uuid, remember: bool) -> Result<String> {
        let token = generate_session_token()?;
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.created_at.elapsed() < self.ttl_for(entry.remember));
        entries.insert(
            hash_session_token(&token),
            SessionEntry {
                user_id,
                remember,
                created_at: Instant::now(),
            },
        );
        Ok(token)
    }

    fn resolve(&self, token: &str) -> Option<Session> {
        let hash = hash_session_token(token);
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(&hash)?;
        if self.expired(entry) {
            return None;
        }
        Some(Session {
            user_id: entry.user_id,
            remember: entry.remember,
        })
    }

    fn clear(&self, token: &str) {
        let hash = hash_session_token(token);
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(&hash);
    }

    fn invalidate_all(&self, user_id: Uuid) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|_, entry| entry.user_id != user_id);
    }
}
