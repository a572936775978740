//! Covenant compiler interface.
//!
//! The compiler turns program source plus named parameters into a
//! [`Program`] that knows its own address and commitment root and can
//! derive spend digests and final transactions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::bytes::{CommitmentRoot, Sighash, XOnlyKey};
use crate::error::Result;
use crate::types::{Covenant, SpendContext};
use crate::witness::SpendWitness;

/// Name of the parameter holding the oracle key.
pub const AUTHORITY_PARAM: &str = "AUTHORITY";

/// Vault program: the oracle must sign the spend's sighash.
///
/// The PRICE witness field is not checked on chain; it records the price the
/// oracle attested to when it signed.
pub const VAULT_SOURCE: &str = "fn main () {
  jet::bip_0340_verify((param::AUTHORITY, jet::sig_all_hash()), witness::SIG);
}";

/// A compile-time parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Pubkey(XOnlyKey),
}

impl ParamValue {
    /// Bytes committed to by the program's commitment root.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            ParamValue::Pubkey(key) => key.as_bytes().to_vec(),
        }
    }
}

/// Named compile-time parameters, ordered by name.
pub type CovenantParams = BTreeMap<String, ParamValue>;

/// Parameters for the vault program bound to `authority`.
pub fn authority_params(authority: XOnlyKey) -> CovenantParams {
    let mut params = CovenantParams::new();
    params.insert(AUTHORITY_PARAM.to_string(), ParamValue::Pubkey(authority));
    params
}

/// A compiled, parameterized covenant program.
pub trait Program: Send + Sync {
    /// Encoded address that locks funds under this program.
    fn address(&self) -> &str;

    fn commitment_root(&self) -> CommitmentRoot;

    fn source_text(&self) -> &str;

    /// Fails with `InvalidInput` if this program cannot pay to `destination`.
    fn check_destination(&self, destination: &str) -> Result<()>;

    /// Digest the covenant requires a signature over for this spend.
    fn compute_sighash(&self, ctx: &SpendContext) -> Result<Sighash>;

    /// Serialize the final transaction carrying `witness`.
    fn assemble(&self, ctx: &SpendContext, witness: &SpendWitness) -> Result<Vec<u8>>;
}

/// Compiles program source into a [`Program`].
#[async_trait]
pub trait CovenantCompiler: Send + Sync {
    async fn compile(&self, source: &str, params: &CovenantParams) -> Result<Arc<dyn Program>>;
}

/// A covenant together with the program that implements it.
#[derive(Clone)]
pub struct CompiledCovenant {
    pub covenant: Covenant,
    pub program: Arc<dyn Program>,
}

impl CompiledCovenant {
    pub fn new(authority: XOnlyKey, program: Arc<dyn Program>) -> Self {
        let covenant = Covenant {
            authority,
            commitment_root: program.commitment_root(),
            address: program.address().to_string(),
            source_text: program.source_text().to_string(),
        };
        Self { covenant, program }
    }
}

impl fmt::Debug for CompiledCovenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCovenant")
            .field("covenant", &self.covenant)
            .finish_non_exhaustive()
    }
}
