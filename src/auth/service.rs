//! Auth Service

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{DomainError, OperationContext, OperationKind, Role, WalletResult};
use crate::store::{AccountNumber, AccountStore, NewUser, UserRecord};

use super::policy::{target_scope, TargetScope};
use super::session::{generate_token, hash_token, SessionRecord, SessionStore};
use super::PasswordService;

/// Default lifetime of a login session
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Outcome of a successful registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub user_id: Uuid,
    pub account_number: AccountNumber,
}

/// Identity returned by login, with the bearer token for later calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: Uuid,
    pub full_name: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthService {
    store: Arc<dyn AccountStore>,
    sessions: Arc<dyn SessionStore>,
    passwords: Arc<PasswordService>,
    session_ttl: Duration,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        sessions: Arc<dyn SessionStore>,
        passwords: PasswordService,
        session_ttl: Duration,
    ) -> Self {
        Self {
            store,
            sessions,
            passwords: Arc::new(passwords),
            session_ttl,
        }
    }

    /// Argon2 hashing off the async worker threads
    async fn hash_password(&self, password: &str) -> WalletResult<String> {
        let passwords = Arc::clone(&self.passwords);
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || passwords.hash_password(&password))
            .await
            .map_err(|e| DomainError::internal(format!("password task failed: {}", e)))?
    }

    /// Verification off the async worker threads. Without a stored hash the
    /// same work is burned against a dummy and the answer is `false`.
    async fn verify_password(&self, password: &str, hash: Option<&str>) -> WalletResult<bool> {
        let passwords = Arc::clone(&self.passwords);
        let password = password.to_owned();
        let hash = hash.map(str::to_owned);
        tokio::task::spawn_blocking(move || match hash {
            Some(hash) => passwords.verify_password(&password, &hash),
            None => {
                passwords.verify_dummy(&password);
                Ok(false)
            }
        })
        .await
        .map_err(|e| DomainError::internal(format!("password task failed: {}", e)))?
    }

    // =========================================================================
    // register_user
    // =========================================================================

    /// Create a user and its account. Email uniqueness is enforced by the
    /// store at insert time.
    pub async fn register_user(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> WalletResult<Registration> {
        let full_name = full_name.trim();
        if full_name.is_empty() {
            return Err(DomainError::InvalidRequest("full name is required".into()));
        }
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(DomainError::InvalidRequest(format!(
                "invalid email address: {}",
                email
            )));
        }
        PasswordService::validate_strength(password)?;

        let password_hash = self.hash_password(password).await?;
        let user = self
            .store
            .create_user(NewUser {
                id: Uuid::new_v4(),
                full_name: full_name.to_string(),
                email,
                password_hash,
                role,
            })
            .await?;

        tracing::info!(
            user_id = %user.id,
            account = %user.account_number,
            role = %user.role,
            "User registered"
        );

        Ok(Registration {
            user_id: user.id,
            account_number: user.account_number,
        })
    }

    // =========================================================================
    // login
    // =========================================================================

    /// Unknown email and wrong password both yield `InvalidCredentials`.
    /// Success opens a session; only the token's hash is stored.
    pub async fn login(&self, email: &str, password: &str) -> WalletResult<Session> {
        let email = normalize_email(email);

        let user = self.store.find_user_by_email(&email).await?;
        let hash = user.as_ref().map(|u| u.password_hash.as_str());
        let verified = self.verify_password(password, hash).await?;

        let Some(user) = user.filter(|_| verified) else {
            tracing::warn!("Login rejected");
            return Err(DomainError::InvalidCredentials);
        };

        let ttl = chrono::Duration::from_std(self.session_ttl)
            .map_err(|e| DomainError::internal(format!("session ttl out of range: {}", e)))?;
        let token = generate_token();
        let expires_at = Utc::now() + ttl;
        self.sessions
            .insert(SessionRecord {
                token_hash: hash_token(&token),
                user_id: user.id,
                expires_at,
            })
            .await?;

        tracing::info!(user_id = %user.id, "Session opened");

        Ok(Session {
            user_id: user.id,
            full_name: user.full_name,
            role: user.role,
            token,
            expires_at,
        })
    }

    // =========================================================================
    // authenticate / logout
    // =========================================================================

    /// Resolve a bearer token to a context carrying the stored role
    pub async fn authenticate(&self, token: &str) -> WalletResult<OperationContext> {
        let session = self
            .sessions
            .find(&hash_token(token.trim()))
            .await?
            .filter(|session| !session.is_expired(Utc::now()))
            .ok_or(DomainError::InvalidSession)?;

        let user = self
            .store
            .find_user(session.user_id)
            .await?
            .ok_or(DomainError::InvalidSession)?;

        Ok(OperationContext::new(user.id, user.role))
    }

    pub async fn logout(&self, token: &str) -> WalletResult<()> {
        self.sessions.revoke(&hash_token(token.trim())).await?;
        Ok(())
    }

    // =========================================================================
    // authorize
    // =========================================================================

    /// Check the actor may run `operation` against `target_account`.
    ///
    /// The claimed role must match the stored one; a client-side claim is
    /// never trusted on its own. Returns the verified actor.
    pub async fn authorize(
        &self,
        context: &OperationContext,
        operation: OperationKind,
        target_account: &str,
    ) -> WalletResult<UserRecord> {
        let actor = self.verify_actor(context).await?;

        match target_scope(actor.role, operation) {
            Some(TargetScope::AnyAccount) => Ok(actor),
            Some(TargetScope::OwnAccount)
                if actor.account_number == AccountNumber::from(target_account) =>
            {
                Ok(actor)
            }
            Some(TargetScope::OwnAccount) => Err(DomainError::Unauthorized(format!(
                "{} may only {} on their own account",
                actor.role, operation
            ))),
            None => Err(DomainError::Unauthorized(format!(
                "{} may not perform {}",
                actor.role, operation
            ))),
        }
    }

    /// Customers may only look up themselves; staff may look up anyone.
    pub async fn authorize_view(
        &self,
        context: &OperationContext,
        user_id: Uuid,
    ) -> WalletResult<UserRecord> {
        let actor = self.verify_actor(context).await?;
        if actor.role == Role::Customer && actor.id != user_id {
            return Err(DomainError::Unauthorized(
                "customers may only view their own account".into(),
            ));
        }
        Ok(actor)
    }

    /// Load the stored user behind a context and confirm the claimed role
    pub async fn verify_actor(&self, context: &OperationContext) -> WalletResult<UserRecord> {
        let actor = self
            .store
            .find_user(context.actor_user_id)
            .await?
            .ok_or_else(|| DomainError::Unauthorized("unknown actor".into()))?;

        if actor.role != context.claimed_role {
            return Err(DomainError::Unauthorized(format!(
                "claimed role {} does not match",
                context.claimed_role
            )));
        }
        Ok(actor)
    }
}
