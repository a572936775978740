//! Spend construction: context, sighash and final transaction.
//!
//! [`SpendBuilder::prepare`] gathers chain data. The other two steps are
//! pure functions of the context, so a sighash computed earlier and a
//! transaction built later agree as long as the chain has not moved.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OnceCell;
use tracing::debug;
use vault_core::{
    spend_amount, Coin, CompiledCovenant, Explorer, GenesisHash, Result, Sighash, SpendContext,
    SpendWitness, VaultError,
};

use crate::upstream::{bounded, DEFAULT_UPSTREAM_TIMEOUT};

pub struct SpendBuilder {
    explorer: Arc<dyn Explorer>,
    timeout: Duration,
    genesis: OnceCell<GenesisHash>,
}

impl SpendBuilder {
    pub fn new(explorer: Arc<dyn Explorer>) -> Self {
        Self {
            explorer,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            genesis: OnceCell::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Genesis hash of the explorer's chain, fetched once.
    pub async fn genesis(&self) -> Result<GenesisHash> {
        self.genesis
            .get_or_try_init(|| bounded("explorer", self.timeout, self.explorer.genesis_hash()))
            .await
            .copied()
    }

    /// Collect everything needed to spend `coin` to `destination`.
    ///
    /// Amount and destination are validated before any network call.
    pub async fn prepare(
        &self,
        covenant: &CompiledCovenant,
        coin: Coin,
        destination: &str,
        fee_sats: u64,
    ) -> Result<SpendContext> {
        check_destination(covenant, destination)?;
        spend_amount(&coin, fee_sats)?;

        let prev_tx = bounded("explorer", self.timeout, self.explorer.fetch_raw_tx(&coin.txid)).await?;
        let genesis = self.genesis().await?;
        debug!(txid = %coin.txid, bytes = prev_tx.len(), "Fetched funding transaction");

        SpendContext::new(coin, prev_tx, destination.trim(), fee_sats, genesis)
    }

    /// Digest the oracle has to sign for this spend.
    pub fn compute_sighash(&self, covenant: &CompiledCovenant, ctx: &SpendContext) -> Result<Sighash> {
        covenant.program.compute_sighash(ctx)
    }

    /// Serialize the signed spend.
    ///
    /// The witness signature must verify under the covenant authority for
    /// this exact context; anything else would produce a transaction the
    /// chain rejects.
    pub fn build_transaction(
        &self,
        covenant: &CompiledCovenant,
        ctx: &SpendContext,
        witness: &SpendWitness,
    ) -> Result<Vec<u8>> {
        let sighash = covenant.program.compute_sighash(ctx)?;
        if !witness.verify(&covenant.covenant.authority, &sighash) {
            return Err(VaultError::invalid(format!(
                "witness signature does not authorize this spend (sighash {})",
                sighash
            )));
        }
        covenant.program.assemble(ctx, witness)
    }
}

/// Reject a blank or unpayable destination.
pub(crate) fn check_destination(covenant: &CompiledCovenant, destination: &str) -> Result<()> {
    if destination.trim().is_empty() {
        return Err(VaultError::invalid("provide a destination address"));
    }
    covenant.program.check_destination(destination)
}
