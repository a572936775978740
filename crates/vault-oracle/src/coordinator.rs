//! The withdrawal handshake.
//!
//! A spend goes through three stateless calls:
//!
//! 1. [`VaultCoordinator::compute_sighash`]: pick a coin, derive the digest.
//! 2. [`VaultCoordinator::sign_sighash`]: sign a client-supplied digest with
//!    the current price.
//! 3. [`VaultCoordinator::build_tx`]: rebuild the same spend and attach the
//!    witness.
//!
//! Nothing is remembered between calls. If the vault's coins change in
//! between, step 3 builds a different spend and the witness no longer
//! verifies.

use std::sync::Arc;

use tracing::{info, warn};
use vault_core::api::{BuiltTransaction, SignedSighash};
use vault_core::{
    Attestation, ChainTip, CompiledCovenant, Covenant, CovenantCompiler, Explorer, Result, Sighash,
    SpendContext, SpendPhase, SpendWitness, VaultInfo, XOnlyKey,
};

use crate::attest::AttestationService;
use crate::config::OracleConfig;
use crate::covenant::CovenantCache;
use crate::key::OracleKey;
use crate::price::{to_cents, PriceFeed, PriceSource};
use crate::spend::{check_destination, SpendBuilder};
use crate::upstream::bounded;
use crate::utxo::UtxoSelector;

/// Entry point for every vault operation the node exposes.
pub struct VaultCoordinator {
    config: OracleConfig,
    key: Arc<OracleKey>,
    explorer: Arc<dyn Explorer>,
    prices: Arc<PriceFeed>,
    covenants: CovenantCache,
    utxos: UtxoSelector,
    builder: SpendBuilder,
    attestations: AttestationService,
}

impl VaultCoordinator {
    pub fn new(
        config: OracleConfig,
        key: Arc<OracleKey>,
        explorer: Arc<dyn Explorer>,
        compiler: Arc<dyn CovenantCompiler>,
        primary: Arc<dyn PriceSource>,
        fallback: Arc<dyn PriceSource>,
    ) -> Self {
        let timeout = config.upstream_timeout;
        let prices = Arc::new(
            PriceFeed::new(primary, fallback)
                .with_ttl(config.price_ttl)
                .with_timeout(timeout),
        );
        Self {
            covenants: CovenantCache::new(compiler).with_timeout(timeout),
            utxos: UtxoSelector::new(explorer.clone()).with_timeout(timeout),
            builder: SpendBuilder::new(explorer.clone()).with_timeout(timeout),
            attestations: AttestationService::new(prices.clone(), key.clone()),
            config,
            key,
            explorer,
            prices,
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    pub fn authority(&self) -> XOnlyKey {
        self.key.public_key()
    }

    pub fn prices(&self) -> &PriceFeed {
        &self.prices
    }

    pub fn covenants(&self) -> &CovenantCache {
        &self.covenants
    }

    /// Compile the covenant for this oracle's key.
    pub async fn initialize(&self) -> Result<Covenant> {
        Ok(self.covenants.get_or_compile(self.authority()).await?.covenant)
    }

    /// Address, commitment root, authority and balance of the vault.
    ///
    /// Compiles the covenant if needed. An explorer failure fails the call;
    /// an unknown balance is never reported as zero.
    pub async fn vault_info(&self) -> Result<VaultInfo> {
        let compiled = self.covenants.get_or_compile(self.authority()).await?;
        let balance = match self.utxos.balance(&compiled.covenant.address).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(address = %compiled.covenant.address, error = %e, "Could not read vault balance");
                return Err(e);
            }
        };
        Ok(VaultInfo::new(&compiled.covenant, balance))
    }

    /// Signed statement of the current price.
    pub async fn attestation(&self) -> Result<Attestation> {
        self.attestations.attest().await
    }

    /// Digest the oracle must sign to send the vault's largest coin, minus
    /// the fee, to `destination`.
    pub async fn compute_sighash(&self, destination: &str, fee_sats: Option<u64>) -> Result<Sighash> {
        let (covenant, ctx) = self.prepare(destination, fee_sats).await?;
        let sighash = self.builder.compute_sighash(&covenant, &ctx)?;
        info!(
            phase = ?SpendPhase::SighashComputed,
            txid = %ctx.coin.txid,
            amount = ctx.amount_sats,
            fee = ctx.fee_sats,
            sighash = %sighash,
            "Computed spend sighash"
        );
        Ok(sighash)
    }

    /// Sign `sighash` together with the current price.
    ///
    /// The oracle does not check that `sighash` belongs to a spend it
    /// computed.
    pub async fn sign_sighash(&self, sighash: &Sighash) -> Result<SignedSighash> {
        let price = self.prices.get_price().await?;
        let price_cents = to_cents(price)?;
        let signature = self.key.sign_sighash(sighash);
        info!(phase = ?SpendPhase::Signed, sighash = %sighash, price = %price, "Signed spend sighash");
        Ok(SignedSighash {
            price,
            witness: SpendWitness::new(signature, price_cents),
        })
    }

    /// Serialize the spend to `destination` carrying `witness`.
    ///
    /// Broadcasting is left to the caller.
    pub async fn build_tx(
        &self,
        destination: &str,
        witness: &SpendWitness,
        fee_sats: Option<u64>,
    ) -> Result<BuiltTransaction> {
        let (covenant, ctx) = self.prepare(destination, fee_sats).await?;
        let raw = self.builder.build_transaction(&covenant, &ctx, witness)?;
        info!(
            phase = ?SpendPhase::Built,
            txid = %ctx.coin.txid,
            amount = ctx.amount_sats,
            bytes = raw.len(),
            "Built signed spend"
        );
        Ok(BuiltTransaction {
            signed_hex: hex::encode(raw),
            amount: ctx.amount_sats,
            fee: ctx.fee_sats,
            to: ctx.destination,
        })
    }

    pub async fn chain_tip(&self) -> Result<ChainTip> {
        bounded("explorer", self.config.upstream_timeout, self.explorer.tip()).await
    }

    async fn prepare(&self, destination: &str, fee_sats: Option<u64>) -> Result<(CompiledCovenant, SpendContext)> {
        let covenant = self.covenants.get().await?;
        check_destination(&covenant, destination)?;
        let fee_sats = fee_sats.unwrap_or(self.config.default_fee_sats);
        let coin = self.utxos.select(&covenant.covenant.address).await?;
        let ctx = self.builder.prepare(&covenant, coin, destination, fee_sats).await?;
        Ok((covenant, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{regtest_address, CountingCompiler, FakeExplorer, StaticPriceSource};
    use bitcoin::consensus::encode;
    use bitcoin::{Address, Network, Transaction};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use vault_core::crypto::verify_schnorr;
    use vault_core::ErrorKind;

    struct Harness {
        coordinator: VaultCoordinator,
        explorer: Arc<FakeExplorer>,
        primary: Arc<StaticPriceSource>,
        fallback: Arc<StaticPriceSource>,
        compiler: Arc<CountingCompiler>,
    }

    fn harness() -> Harness {
        let explorer = Arc::new(FakeExplorer::new());
        let primary = Arc::new(StaticPriceSource::new("primary", Decimal::from_str("65000").unwrap()));
        let fallback = Arc::new(StaticPriceSource::new("fallback", Decimal::from_str("64900").unwrap()));
        let compiler = Arc::new(CountingCompiler::new(Network::Regtest));
        let coordinator = VaultCoordinator::new(
            OracleConfig::default(),
            Arc::new(OracleKey::generate()),
            explorer.clone(),
            compiler.clone(),
            primary.clone(),
            fallback.clone(),
        );
        Harness {
            coordinator,
            explorer,
            primary,
            fallback,
            compiler,
        }
    }

    #[tokio::test]
    async fn test_spend_requires_initialized_covenant() {
        let h = harness();
        let err = h.coordinator.compute_sighash(&regtest_address(2), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CovenantUninitialized);
    }

    #[tokio::test]
    async fn test_vault_info_compiles_once() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        h.explorer.fund(&covenant.address, Network::Regtest, 40_000);
        h.explorer.fund(&covenant.address, Network::Regtest, 2_000);

        let info = h.coordinator.vault_info().await.unwrap();
        let again = h.coordinator.vault_info().await.unwrap();
        assert_eq!(info, again);
        assert_eq!(info.balance_sats, 42_000);
        assert_eq!(info.authority, h.coordinator.authority());
        assert_eq!(h.compiler.calls(), 1);
    }

    #[tokio::test]
    async fn test_vault_info_fails_during_explorer_outage() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        h.explorer.fund(&covenant.address, Network::Regtest, 40_000);
        h.explorer.set_failing(true);

        let err = h.coordinator.vault_info().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        assert_eq!(h.explorer.utxo_calls(), 1);

        h.explorer.set_failing(false);
        assert_eq!(h.coordinator.vault_info().await.unwrap().balance_sats, 40_000);
    }

    #[tokio::test]
    async fn test_bad_destination_rejected_before_explorer() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        h.explorer.fund(&covenant.address, Network::Regtest, 100_000);
        h.explorer.set_failing(true);

        let err = h.coordinator.compute_sighash("not-an-address", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let witness = SpendWitness::new(vault_core::SchnorrSignature::from_bytes([1u8; 64]), 1);
        let err = h.coordinator.build_tx("", &witness, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(h.explorer.utxo_calls(), 0);
        assert_eq!(h.explorer.raw_tx_calls(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_withdrawal() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        let coin = h.explorer.fund(&covenant.address, Network::Regtest, 100_000);
        let destination = regtest_address(2);

        let sighash = h.coordinator.compute_sighash(&destination, Some(1_000)).await.unwrap();
        let signed = h.coordinator.sign_sighash(&sighash).await.unwrap();
        assert_eq!(signed.price, Decimal::from_str("65000").unwrap());
        assert_eq!(signed.witness.price_cents, 6_500_000);
        assert!(verify_schnorr(&covenant.authority, sighash.as_bytes(), &signed.witness.signature));

        let built = h.coordinator.build_tx(&destination, &signed.witness, Some(1_000)).await.unwrap();
        assert_eq!(built.amount, 99_000);
        assert_eq!(built.fee, 1_000);
        assert_eq!(built.to, destination);

        let tx: Transaction = encode::deserialize(&hex::decode(&built.signed_hex).unwrap()).unwrap();
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.input[0].previous_output.txid.to_string(), coin.txid);
        assert_eq!(tx.input[0].previous_output.vout, coin.output_index);
        assert_eq!(tx.output.len(), 1);
        assert_eq!(tx.output[0].value.to_sat(), 99_000);
        let expected_script = Address::from_str(&destination)
            .unwrap()
            .require_network(Network::Regtest)
            .unwrap()
            .script_pubkey();
        assert_eq!(tx.output[0].script_pubkey, expected_script);

        let stack: Vec<&[u8]> = tx.input[0].witness.iter().collect();
        assert_eq!(stack[0], signed.witness.signature.as_bytes().as_slice());
        assert_eq!(stack[1], &6_500_000u32.to_be_bytes()[..]);

        let rebuilt = h.coordinator.build_tx(&destination, &signed.witness, Some(1_000)).await.unwrap();
        assert_eq!(rebuilt, built);
    }

    #[tokio::test]
    async fn test_default_fee_applies() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        h.explorer.fund(&covenant.address, Network::Regtest, 100_000);
        let destination = regtest_address(2);

        let implicit = h.coordinator.compute_sighash(&destination, None).await.unwrap();
        let explicit = h.coordinator.compute_sighash(&destination, Some(1_000)).await.unwrap();
        assert_eq!(implicit, explicit);
    }

    #[tokio::test]
    async fn test_fee_consuming_coin_rejected() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        h.explorer.fund(&covenant.address, Network::Regtest, 1_000);
        let err = h.coordinator.compute_sighash(&regtest_address(2), Some(1_000)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_empty_vault_has_no_funds() {
        let h = harness();
        h.coordinator.initialize().await.unwrap();
        let err = h.coordinator.compute_sighash(&regtest_address(2), None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoFundsAvailable);
    }

    #[tokio::test]
    async fn test_sign_fails_without_price() {
        let h = harness();
        h.primary.fail();
        h.fallback.fail();
        let err = h.coordinator.sign_sighash(&Sighash::from_bytes([3u8; 32])).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PriceUnavailable);
        assert!(h.coordinator.prices().last_quote().await.is_none());
    }

    #[tokio::test]
    async fn test_attestation_does_not_authorize_spend() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        h.explorer.fund(&covenant.address, Network::Regtest, 100_000);
        let destination = regtest_address(2);
        let sighash = h.coordinator.compute_sighash(&destination, None).await.unwrap();

        let attestation = h.coordinator.attestation().await.unwrap();
        assert!(attestation.verify());
        assert!(!verify_schnorr(&attestation.pubkey, sighash.as_bytes(), &attestation.witness.signature));

        let forged = SpendWitness::new(attestation.witness.signature, attestation.witness.price_cents);
        let err = h.coordinator.build_tx(&destination, &forged, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_witness_for_other_destination_rejected() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        h.explorer.fund(&covenant.address, Network::Regtest, 100_000);

        let sighash = h.coordinator.compute_sighash(&regtest_address(2), None).await.unwrap();
        let signed = h.coordinator.sign_sighash(&sighash).await.unwrap();
        let err = h
            .coordinator
            .build_tx(&regtest_address(3), &signed.witness, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_chain_tip() {
        let h = harness();
        let covenant = h.coordinator.initialize().await.unwrap();
        h.explorer.fund(&covenant.address, Network::Regtest, 100_000);
        let tip = h.coordinator.chain_tip().await.unwrap();
        assert_eq!(tip.height, 1);
    }
}
