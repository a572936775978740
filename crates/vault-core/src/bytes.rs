//! Fixed-length byte values that travel as hex strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VaultError;

/// Decode a hex string into exactly `N` bytes.
///
/// Accepts an optional `0x` prefix and surrounding whitespace.
pub fn decode_fixed<const N: usize>(input: &str) -> Result<[u8; N], VaultError> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(trimmed)?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        VaultError::invalid(format!("expected {} bytes, got {}", N, b.len()))
    })
}

macro_rules! hex_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Length in bytes.
            pub const LEN: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_bytes(self) -> [u8; $len] {
                self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from a byte slice of exactly the right length.
            pub fn from_slice(slice: &[u8]) -> Result<Self, VaultError> {
                let bytes: [u8; $len] = slice.try_into().map_err(|_| {
                    VaultError::invalid(format!(
                        "{}: expected {} bytes, got {}",
                        stringify!($name),
                        $len,
                        slice.len()
                    ))
                })?;
                Ok(Self(bytes))
            }
        }

        impl FromStr for $name {
            type Err = VaultError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_bytes!(
    /// The 32-byte digest a spend's authority signature must cover.
    Sighash,
    32
);

hex_bytes!(
    /// BIP-340 x-only public key.
    XOnlyKey,
    32
);

hex_bytes!(
    /// Commitment root of a compiled covenant program.
    CommitmentRoot,
    32
);

hex_bytes!(
    /// Genesis block hash, used as a network salt for sighashes.
    GenesisHash,
    32
);

hex_bytes!(
    /// BIP-340 Schnorr signature.
    SchnorrSignature,
    64
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_prefix() {
        let plain: Sighash = "11".repeat(32).parse().unwrap();
        let prefixed: Sighash = format!("0x{}", "11".repeat(32)).parse().unwrap();
        assert_eq!(plain, prefixed);
        assert_eq!(plain.as_bytes(), &[0x11; 32]);
    }

    #[test]
    fn test_wrong_length_is_invalid_input() {
        let err = "abcd".parse::<Sighash>().unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));

        let err = "zz".repeat(32).parse::<Sighash>().unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));
    }

    #[test]
    fn test_serde_as_hex_string() {
        let sig = SchnorrSignature::from_bytes([0xab; 64]);
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(64)));
        let back: SchnorrSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);
    }
}
