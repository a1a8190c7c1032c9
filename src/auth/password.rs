//! Password hashing
//!
//! Argon2id hashes in PHC string format. Plaintext passwords are never stored
//! or compared directly.

use std::sync::OnceLock;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::domain::DomainError;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

const DUMMY_PASSWORD: &str = "not-a-real-password";

#[derive(Debug)]
pub struct PasswordService {
    params: Params,
    dummy_hash: OnceLock<String>,
}

impl Default for PasswordService {
    fn default() -> Self {
        Self {
            params: Params::default(),
            dummy_hash: OnceLock::new(),
        }
    }
}

impl PasswordService {
    /// Custom cost parameters (memory in KiB, iterations)
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, DomainError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| DomainError::internal(format!("invalid Argon2 params: {}", e)))?;
        Ok(Self {
            params,
            dummy_hash: OnceLock::new(),
        })
    }

    fn argon2(&self) -> Argon2<'_> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn validate_strength(password: &str) -> Result<(), DomainError> {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(DomainError::InvalidRequest(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }

    pub fn hash_password(&self, password: &str) -> Result<String, DomainError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| DomainError::internal(format!("password hashing failed: {}", e)))
    }

    /// Constant-time verification against a stored hash
    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, DomainError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| DomainError::internal(format!("stored hash unreadable: {}", e)))?;

        match self.argon2().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(DomainError::internal(format!("password verification failed: {}", e))),
        }
    }

    /// Burn the same work as a real verification when no user matched
    pub fn verify_dummy(&self, password: &str) {
        let hash = match self.dummy_hash.get() {
            Some(hash) => hash.clone(),
            None => match self.hash_password(DUMMY_PASSWORD) {
                Ok(hash) => self.dummy_hash.get_or_init(|| hash).clone(),
                Err(_) => return,
            },
        };
        let _ = self.verify_password(password, &hash);
    }
}
