//! Standalone signed price attestations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use vault_core::attestation::attestation_timestamp;
use vault_core::{Attestation, AttestationDigest, AttestationWitness, Result, ATTESTED_ASSET};

use crate::key::OracleKey;
use crate::price::{to_cents, PriceFeed};

/// Signs the current price with the oracle key.
///
/// An attestation signs `asset || cents || timestamp`, never a transaction
/// digest, so it cannot authorize a spend.
pub struct AttestationService {
    prices: Arc<PriceFeed>,
    key: Arc<OracleKey>,
}

impl AttestationService {
    pub fn new(prices: Arc<PriceFeed>, key: Arc<OracleKey>) -> Self {
        Self { prices, key }
    }

    /// Attest to the current price.
    pub async fn attest(&self) -> Result<Attestation> {
        let price = self.prices.get_price().await?;
        self.attest_at(price, Utc::now())
    }

    /// Attest to `price` as observed at `at`.
    pub fn attest_at(&self, price: Decimal, at: DateTime<Utc>) -> Result<Attestation> {
        let price_cents = to_cents(price)?;
        let timestamp = attestation_timestamp(at);
        let digest = AttestationDigest::compute(ATTESTED_ASSET, price_cents, &timestamp);
        let signature = self.key.sign_attestation(&digest);

        Ok(Attestation {
            timestamp,
            asset: ATTESTED_ASSET.to_string(),
            price,
            pubkey: self.key.public_key(),
            witness: AttestationWitness {
                signature,
                price_cents,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticPriceSource;
    use chrono::TimeZone;
    use std::str::FromStr;
    use vault_core::crypto::verify_schnorr;
    use vault_core::Sighash;

    fn service(price: &str) -> AttestationService {
        let source = Arc::new(StaticPriceSource::new("primary", Decimal::from_str(price).unwrap()));
        let fallback = Arc::new(StaticPriceSource::failing("fallback"));
        AttestationService::new(Arc::new(PriceFeed::new(source, fallback)), Arc::new(OracleKey::generate()))
    }

    #[tokio::test]
    async fn test_attestation_verifies() {
        let svc = service("65000.123");
        let att = svc.attest().await.unwrap();
        assert_eq!(att.asset, "BTC/USD");
        assert_eq!(att.witness.price_cents, 6_500_012);
        assert!(att.verify());
    }

    #[test]
    fn test_timestamp_format() {
        let svc = service("1");
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let att = svc.attest_at(Decimal::ONE, at).unwrap();
        assert_eq!(att.timestamp, "2024-05-01T12:30:00.000Z");
    }

    #[test]
    fn test_tampered_attestation_fails() {
        let svc = service("1");
        let mut att = svc.attest_at(Decimal::ONE, Utc::now()).unwrap();
        att.witness.price_cents += 1;
        assert!(!att.verify());
    }

    #[test]
    fn test_attestation_binds_price() {
        let svc = service("1");
        let at = Utc::now();
        let one = svc.attest_at(Decimal::ONE, at).unwrap();
        let two = svc.attest_at(Decimal::TWO, at).unwrap();
        assert_ne!(one.digest(), two.digest());

        let unrelated = Sighash::from_bytes([9u8; 32]);
        assert!(!verify_schnorr(&one.pubkey, unrelated.as_bytes(), &one.witness.signature));
    }
}
