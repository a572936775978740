//! # Vault State
//!
//! Process-wide state for the vault oracle: TTL cache cells and the
//! bookkeeping ledger.

pub mod cell;
pub mod ledger;

pub use cell::TtlCell;
pub use ledger::{InMemoryLedger, Ledger, LedgerEntry, LedgerKey};
