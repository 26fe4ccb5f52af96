//! Server-side session storage.
//!
//! The degraded alternative to the stateless codec: the cookie carries a
//! random token and the session itself lives in a [`SessionStore`]. The store
//! is injected, so the in-memory map can be swapped for a shared cache.

use aes_gcm::aead::{OsRng, rand_core::RngCore};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::SessionBackend;
use crate::error::{InvalidReason, SessionError};
use crate::session::Session;

const TOKEN_BYTES: usize = 32;

/// Keyed session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores `session` under `key`, replacing any previous value.
    async fn put(&self, key: &str, session: Session) -> Result<(), SessionError>;

    /// Returns the session stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Session>, SessionError>;

    /// Removes the session stored under `key`, if any.
    async fn delete(&self, key: &str) -> Result<(), SessionError>;
}

/// Process-local session map behind a single reader/writer lock.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns true if no sessions are stored.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn put(&self, key: &str, session: Session) -> Result<(), SessionError> {
        self.sessions.write().await.insert(key.to_string(), session);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        self.sessions.write().await.remove(key);
        Ok(())
    }
}

/// A [`SessionBackend`] that keeps sessions in a [`SessionStore`].
#[derive(Debug)]
pub struct StoredSessions<S> {
    store: S,
}

impl<S: SessionStore> StoredSessions<S> {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn check_token_shape(token: &str) -> Result<(), SessionError> {
    let decoded = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| InvalidReason::Encoding)?;
    if decoded.len() != TOKEN_BYTES {
        return Err(InvalidReason::Truncated.into());
    }
    Ok(())
}

#[async_trait]
impl<S: SessionStore> SessionBackend for StoredSessions<S> {
    async fn issue(&self, session: &Session) -> Result<String, SessionError> {
        let token = generate_token();
        self.store.put(&token, session.clone()).await?;
        Ok(token)
    }

    async fn load(&self, token: &str) -> Result<Option<Session>, SessionError> {
        if token.is_empty() {
            return Ok(None);
        }
        check_token_shape(token)?;

        let Some(session) = self.store.get(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            debug!(expires_at = %session.expires_at(), "stored session expired");
            self.store.delete(token).await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    async fn revoke(&self, token: &str) -> Result<(), SessionError> {
        if token.is_empty() {
            return Ok(());
        }
        self.store.delete(token).await
    }
}
