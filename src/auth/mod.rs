//! Auth module
//!
//! Registration, login sessions and per-operation authorization. Knows
//! nothing about balances; the engine asks it one question per request.

mod password;
pub mod policy;
mod service;
pub mod session;

pub use password::{PasswordService, MIN_PASSWORD_LENGTH};
pub use policy::{target_scope, TargetScope};
pub use service::{AuthService, Registration, Session, DEFAULT_SESSION_TTL};
pub use session::{InMemorySessionStore, PgSessionStore, SessionRecord, SessionStore};
