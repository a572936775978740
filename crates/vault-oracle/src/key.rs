//! The oracle's Schnorr signing key.
//!
//! One key per process. It signs two kinds of 32-byte digests, spend
//! sighashes and attestation digests, through separate methods so a caller
//! can never pass one where the other is expected.

use std::fmt;

use bitcoin::secp256k1::{All, Keypair, Message, Secp256k1};
use rand::RngCore;
use tracing::warn;
use vault_core::{AttestationDigest, Result, SchnorrSignature, Sighash, VaultError, XOnlyKey};
use zeroize::Zeroizing;

/// Process-wide oracle signing key.
pub struct OracleKey {
    secp: Secp256k1<All>,
    keypair: Keypair,
    public_key: XOnlyKey,
    ephemeral: bool,
}

impl OracleKey {
    /// Load the configured key, or generate an ephemeral one when `secret_hex`
    /// is `None`.
    pub fn load(secret_hex: Option<&str>) -> Result<Self> {
        match secret_hex {
            Some(secret) => Self::from_hex(secret),
            None => {
                let key = Self::generate();
                warn!(
                    pubkey = %key.public_key(),
                    "No oracle secret configured; using an ephemeral key. Funds locked to this vault become unspendable after restart"
                );
                Ok(key)
            }
        }
    }

    /// Parse a 32-byte secret key from hex (optional `0x` prefix).
    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let trimmed = secret_hex.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|_| VaultError::invalid("oracle secret key is not valid hex"))?,
        );
        if bytes.len() != 32 {
            return Err(VaultError::invalid(format!(
                "oracle secret key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Self::from_secret(&bytes, false)
    }

    /// Fresh random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let mut bytes = Zeroizing::new([0u8; 32]);
            rng.fill_bytes(&mut bytes[..]);
            // Zero or >= curve order; astronomically rare.
            if let Ok(key) = Self::from_secret(&bytes[..], true) {
                return key;
            }
        }
    }

    fn from_secret(bytes: &[u8], ephemeral: bool) -> Result<Self> {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_seckey_slice(&secp, bytes)
            .map_err(|_| VaultError::invalid("oracle secret key is out of range"))?;
        let (xonly, _parity) = keypair.x_only_public_key();
        Ok(Self {
            secp,
            keypair,
            public_key: XOnlyKey::from_bytes(xonly.serialize()),
            ephemeral,
        })
    }

    pub fn public_key(&self) -> XOnlyKey {
        self.public_key
    }

    /// True when the key was generated at startup rather than configured.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// BIP-340 signature over a spend sighash.
    pub fn sign_sighash(&self, sighash: &Sighash) -> SchnorrSignature {
        self.sign_digest(sighash.to_bytes())
    }

    /// BIP-340 signature over an attestation digest.
    pub fn sign_attestation(&self, digest: &AttestationDigest) -> SchnorrSignature {
        self.sign_digest(*digest.as_bytes())
    }

    fn sign_digest(&self, digest: [u8; 32]) -> SchnorrSignature {
        let message = Message::from_digest(digest);
        let signature = self.secp.sign_schnorr_no_aux_rand(&message, &self.keypair);
        SchnorrSignature::from_bytes(signature.serialize())
    }
}

impl fmt::Debug for OracleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleKey")
            .field("public_key", &self.public_key)
            .field("ephemeral", &self.ephemeral)
            .finish_non_exhaustive()
    }
}
