//! Standalone price attestations.
//!
//! An attestation is a display artifact: the oracle signs
//! `SHA256(asset || u32_be(cents) || timestamp)`, a message that can never
//! collide with a transaction sighash. Its witness is a distinct type from
//! [`SpendWitness`](crate::witness::SpendWitness) so it cannot be handed to
//! the spend builder by mistake.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bytes::{SchnorrSignature, XOnlyKey};
use crate::crypto::{sha256, verify_schnorr};
use crate::error::{Result, VaultError};
use crate::witness::WitnessArgs;

/// Asset pair the oracle reports on.
pub const ATTESTED_ASSET: &str = "BTC/USD";

/// Digest of a canonical attestation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestationDigest([u8; 32]);

impl AttestationDigest {
    /// Hash the canonical message for `(asset, cents, timestamp)`.
    pub fn compute(asset: &str, price_cents: u32, timestamp: &str) -> Self {
        Self(sha256(&attestation_message(asset, price_cents, timestamp)))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// `asset || u32_be(cents) || timestamp`.
pub fn attestation_message(asset: &str, price_cents: u32, timestamp: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(asset.len() + 4 + timestamp.len());
    message.extend_from_slice(asset.as_bytes());
    message.extend_from_slice(&price_cents.to_be_bytes());
    message.extend_from_slice(timestamp.as_bytes());
    message
}

/// RFC 3339 with milliseconds and a `Z` suffix, e.g. `2024-05-01T12:00:00.000Z`.
pub fn attestation_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Signature and price carried by an attestation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WitnessArgs", into = "WitnessArgs")]
pub struct AttestationWitness {
    pub signature: SchnorrSignature,
    pub price_cents: u32,
}

impl TryFrom<WitnessArgs> for AttestationWitness {
    type Error = VaultError;

    fn try_from(args: WitnessArgs) -> Result<Self> {
        let (signature, price_cents) = args.into_parts()?;
        Ok(Self { signature, price_cents })
    }
}

impl From<AttestationWitness> for WitnessArgs {
    fn from(witness: AttestationWitness) -> Self {
        WitnessArgs::new(witness.signature, witness.price_cents)
    }
}

/// A signed, timestamped price observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    /// Signing time, formatted by [`attestation_timestamp`].
    pub timestamp: String,

    pub asset: String,

    /// Observed price as a decimal, for display only.
    pub price: Decimal,

    /// Oracle public key the witness verifies against.
    pub pubkey: XOnlyKey,

    pub witness: AttestationWitness,
}

impl Attestation {
    /// Digest this attestation's witness signs.
    pub fn digest(&self) -> AttestationDigest {
        AttestationDigest::compute(&self.asset, self.witness.price_cents, &self.timestamp)
    }

    /// Recompute the message and check the signature against `pubkey`.
    pub fn verify(&self) -> bool {
        verify_schnorr(&self.pubkey, self.digest().as_bytes(), &self.witness.signature)
    }
}
