//! # Vault SDK
//!
//! Client SDK for withdrawing from an oracle-gated vault through a vault
//! node.

pub mod client;

pub use client::{VaultClient, Withdrawal};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::client::{VaultClient, Withdrawal};
    pub use vault_core::prelude::*;
}
