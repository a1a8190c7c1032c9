//! Domain module
//!
//! Core domain types shared by every component.

pub mod amount;
pub mod context;
pub mod currency;
pub mod error;
pub mod role;

pub use amount::{Amount, AmountError, Balance, MAX_AMOUNT, MAX_SCALE};
pub use context::OperationContext;
pub use currency::{BillType, Currency};
pub use error::{DomainError, ErrorKind};
pub use role::{OperationKind, Role};

/// Result type for every core operation
pub type WalletResult<T> = Result<T, DomainError>;
