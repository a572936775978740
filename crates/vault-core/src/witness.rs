//! Witness arguments supplied to the vault covenant at spend time.
//!
//! On the wire a witness is a map from field name to a typed value:
//!
//! ```json
//! { "SIG":   { "type": "Signature", "value": "0x…" },
//!   "PRICE": { "type": "u32",       "value": "6512345" } }
//! ```
//!
//! [`WitnessArgs`] mirrors that shape exactly; [`SpendWitness`] is the
//! validated form the spend builder accepts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::bytes::{SchnorrSignature, Sighash, XOnlyKey};
use crate::crypto::verify_schnorr;
use crate::error::{Result, VaultError};

/// A single typed witness value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum WitnessArg {
    /// 64-byte BIP-340 signature.
    #[serde(rename = "Signature")]
    Signature(#[serde(with = "prefixed_hex")] SchnorrSignature),

    /// Unsigned 32-bit integer, carried as a decimal string.
    #[serde(rename = "u32")]
    U32(#[serde(with = "u32_text")] u32),
}

impl WitnessArg {
    fn type_name(&self) -> &'static str {
        match self {
            WitnessArg::Signature(_) => "Signature",
            WitnessArg::U32(_) => "u32",
        }
    }
}

/// Raw witness map as exchanged with clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessArgs {
    #[serde(rename = "SIG")]
    pub sig: WitnessArg,

    #[serde(rename = "PRICE")]
    pub price: WitnessArg,
}

impl WitnessArgs {
    /// Build the map from a signature and a price in cents.
    pub fn new(signature: SchnorrSignature, price_cents: u32) -> Self {
        Self {
            sig: WitnessArg::Signature(signature),
            price: WitnessArg::U32(price_cents),
        }
    }

    /// Check both fields carry the expected types and unpack them.
    pub fn into_parts(self) -> Result<(SchnorrSignature, u32)> {
        let signature = match self.sig {
            WitnessArg::Signature(sig) => sig,
            other => {
                return Err(VaultError::invalid(format!(
                    "witness SIG must be a Signature, got {}",
                    other.type_name()
                )))
            }
        };
        let price_cents = match self.price {
            WitnessArg::U32(cents) => cents,
            other => {
                return Err(VaultError::invalid(format!(
                    "witness PRICE must be a u32, got {}",
                    other.type_name()
                )))
            }
        };
        Ok((signature, price_cents))
    }
}

/// Oracle authorization for one specific spend.
///
/// `signature` covers a [`Sighash`]; `price_cents` records the price the
/// oracle observed when it signed. Only this type is accepted by the spend
/// builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WitnessArgs", into = "WitnessArgs")]
pub struct SpendWitness {
    pub signature: SchnorrSignature,
    pub price_cents: u32,
}

impl SpendWitness {
    pub fn new(signature: SchnorrSignature, price_cents: u32) -> Self {
        Self { signature, price_cents }
    }

    /// PRICE field as it is placed on the witness stack.
    pub fn price_bytes(&self) -> [u8; 4] {
        self.price_cents.to_be_bytes()
    }

    /// Check the signature against `authority` over `sighash`.
    pub fn verify(&self, authority: &XOnlyKey, sighash: &Sighash) -> bool {
        verify_schnorr(authority, sighash.as_bytes(), &self.signature)
    }
}

impl TryFrom<WitnessArgs> for SpendWitness {
    type Error = VaultError;

    fn try_from(args: WitnessArgs) -> Result<Self> {
        let (signature, price_cents) = args.into_parts()?;
        Ok(Self { signature, price_cents })
    }
}

impl From<SpendWitness> for WitnessArgs {
    fn from(witness: SpendWitness) -> Self {
        WitnessArgs::new(witness.signature, witness.price_cents)
    }
}

mod prefixed_hex {
    use super::*;

    pub fn serialize<S: Serializer>(sig: &SchnorrSignature, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&format!("0x{}", sig.to_hex()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<SchnorrSignature, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

mod u32_text {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Number(u32),
    }

    pub fn serialize<S: Serializer>(value: &u32, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
        match Repr::deserialize(d)? {
            Repr::Number(n) => Ok(n),
            Repr::Text(text) => text
                .trim()
                .parse()
                .map_err(|e| serde::de::Error::custom(format!("invalid u32 {:?}: {}", text, e))),
        }
    }
}
