//! Session tokens
//!
//! Login hands out an opaque bearer token. Only its SHA-256 digest is ever
//! stored, so a leaked sessions table cannot be replayed.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::StoreError;

/// Random bytes behind each token
const TOKEN_BYTES: usize = 32;

/// Fresh random token, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest under which a token is stored and looked up
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: SessionRecord) -> Result<(), StoreError>;

    async fn find(&self, token_hash: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Revoking an unknown session is not an error
    async fn revoke(&self, token_hash: &str) -> Result<(), StoreError>;
}

// =========================================================================
// In-memory
// =========================================================================

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: SessionRecord) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, existing| !existing.is_expired(now));
        sessions.insert(session.token_hash.clone(), session);
        Ok(())
    }

    async fn find(&self, token_hash: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.sessions.read().await.get(token_hash).cloned())
    }

    async fn revoke(&self, token_hash: &str) -> Result<(), StoreError> {
        self.sessions.write().await.remove(token_hash);
        Ok(())
    }
}

// =========================================================================
// PostgreSQL
// =========================================================================

#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: SessionRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (token_hash, user_id, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&session.token_hash)
        .bind(session.user_id)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, token_hash: &str) -> Result<Option<SessionRecord>, StoreError> {
        let row: Option<(String, Uuid, DateTime<Utc>)> = sqlx::query_as(
            "SELECT token_hash, user_id, expires_at FROM sessions WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(token_hash, user_id, expires_at)| SessionRecord {
            token_hash,
            user_id,
            expires_at,
        }))
    }

    async fn revoke(&self, token_hash: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
