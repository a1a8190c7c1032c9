//! Transaction Engine module
//!
//! Orchestrates money movement: the only component that couples
//! authorization, balances, rates and the ledger.

mod commands;
#[allow(clippy::module_inception)]
mod engine;


pub use commands::*;
pub use engine::{EngineSettings, TransactionEngine};
