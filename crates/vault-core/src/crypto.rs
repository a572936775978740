//! Hashing and signature verification shared by the oracle and its clients.

use bitcoin::secp256k1::{schnorr, Message, Secp256k1, XOnlyPublicKey};
use sha2::{Digest, Sha256};

use crate::bytes::{SchnorrSignature, XOnlyKey};

/// BIP-340 tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || parts...)`.
pub fn tagged_hash(tag: &str, parts: &[&[u8]]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut hasher = Sha256::new();
    hasher.update(&tag_hash);
    hasher.update(&tag_hash);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Plain SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Verify a BIP-340 signature over a 32-byte digest.
///
/// Malformed keys or signatures verify as false.
pub fn verify_schnorr(pubkey: &XOnlyKey, digest: &[u8; 32], signature: &SchnorrSignature) -> bool {
    let Ok(pubkey) = XOnlyPublicKey::from_slice(pubkey.as_bytes()) else {
        return false;
    };
    let Ok(signature) = schnorr::Signature::from_slice(signature.as_bytes()) else {
        return false;
    };
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(*digest);
    secp.verify_schnorr(&signature, &msg, &pubkey).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_hash_matches_manual_construction() {
        let tag = Sha256::digest(b"TapLeaf");
        let mut manual = Sha256::new();
        manual.update(&tag);
        manual.update(&tag);
        manual.update(b"abc");
        let expected: [u8; 32] = manual.finalize().into();

        assert_eq!(tagged_hash("TapLeaf", &[b"a".as_slice(), b"bc".as_slice()]), expected);
    }

    #[test]
    fn test_garbage_key_does_not_verify() {
        let key = XOnlyKey::from_bytes([0xff; 32]);
        let sig = SchnorrSignature::from_bytes([0x01; 64]);
        assert!(!verify_schnorr(&key, &[0u8; 32], &sig));
    }
}
