//! Wallet Gateway Library
//!
//! Role-gated multi-currency wallet: accounts, balances, exchange and bill
//! payment behind one transaction engine. Re-exports modules for the server
//! binary, the load driver and integration testing.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
mod error;
pub mod ledger;
pub mod rates;
pub mod store;
pub mod wallet;

pub use config::{Config, StorageBackend};
pub use domain::{Currency, DomainError, ErrorKind, OperationContext, Role, WalletResult};
pub use engine::{EngineSettings, TransactionReceipt};
pub use error::{AppError, ErrorResponse};
pub use wallet::Wallet;
