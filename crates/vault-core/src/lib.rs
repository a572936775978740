//! # Vault Core
//!
//! Core primitives and types for the oracle-gated vault.
//!
//! This crate provides the fundamental building blocks:
//! - [`Covenant`] and the [`CovenantCompiler`] / [`Program`] interface
//! - [`SpendContext`] - inputs to a spend's digest and final transaction
//! - [`SpendWitness`] - oracle authorization for one spend
//! - [`Attestation`] - standalone signed price observation
//! - [`VaultError`] - protocol error types

pub mod api;
pub mod attestation;
pub mod bytes;
pub mod covenant;
pub mod crypto;
pub mod error;
pub mod explorer;
pub mod types;
pub mod witness;

// Re-exports for convenience
pub use attestation::{Attestation, AttestationDigest, AttestationWitness, ATTESTED_ASSET};
pub use bytes::{CommitmentRoot, GenesisHash, SchnorrSignature, Sighash, XOnlyKey};
pub use covenant::{
    authority_params, CompiledCovenant, CovenantCompiler, CovenantParams, ParamValue, Program,
    AUTHORITY_PARAM, VAULT_SOURCE,
};
pub use error::{ErrorKind, Result, VaultError};
pub use explorer::Explorer;
pub use types::*;
pub use witness::{SpendWitness, WitnessArg, WitnessArgs};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::attestation::Attestation;
    pub use crate::bytes::{Sighash, XOnlyKey};
    pub use crate::error::{Result, VaultError};
    pub use crate::types::{Coin, SpendContext, SpendPhase};
    pub use crate::witness::SpendWitness;
}
