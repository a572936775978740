//! Coin selection for the vault address.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use vault_core::{Coin, Explorer, Result, VaultError};

use crate::upstream::{bounded, DEFAULT_UPSTREAM_TIMEOUT};

/// Picks the coin a withdrawal spends.
#[derive(Clone)]
pub struct UtxoSelector {
    explorer: Arc<dyn Explorer>,
    timeout: Duration,
}

impl UtxoSelector {
    pub fn new(explorer: Arc<dyn Explorer>) -> Self {
        Self {
            explorer,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The largest coin at `address`.
    pub async fn select(&self, address: &str) -> Result<Coin> {
        let coins = self.list(address).await?;
        let count = coins.len();
        let coin = select_largest(coins).ok_or_else(|| VaultError::NoFundsAvailable {
            address: address.to_string(),
        })?;
        debug!(txid = %coin.txid, vout = coin.output_index, value = coin.value, of = count, "Selected vault coin");
        Ok(coin)
    }

    /// Sum of all coins at `address`.
    pub async fn balance(&self, address: &str) -> Result<u64> {
        let coins = self.list(address).await?;
        Ok(coins.iter().fold(0u64, |sum, c| sum.saturating_add(c.value)))
    }

    async fn list(&self, address: &str) -> Result<Vec<Coin>> {
        bounded("explorer", self.timeout, self.explorer.list_utxos(address)).await
    }
}

/// Largest coin by value; the first one listed wins a tie.
pub fn select_largest(coins: Vec<Coin>) -> Option<Coin> {
    coins
        .into_iter()
        .reduce(|best, coin| if coin.value > best.value { coin } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeExplorer;
    use vault_core::ErrorKind;

    fn coin(txid: &str, value: u64) -> Coin {
        Coin {
            txid: txid.into(),
            output_index: 0,
            value,
        }
    }

    #[test]
    fn test_select_largest_first_wins_ties() {
        let picked = select_largest(vec![coin("a", 5), coin("b", 9), coin("c", 9), coin("d", 1)]).unwrap();
        assert_eq!(picked.txid, "b");
        assert!(select_largest(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn test_empty_address_has_no_funds() {
        let selector = UtxoSelector::new(Arc::new(FakeExplorer::new()));
        let err = selector.select("bcrt1pvault").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoFundsAvailable);
        assert_eq!(selector.balance("bcrt1pvault").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_balance_sums_coins() {
        let explorer = Arc::new(FakeExplorer::new());
        explorer.add_coin("bcrt1pvault", coin("a", 1_000));
        explorer.add_coin("bcrt1pvault", coin("b", 2_500));
        explorer.add_coin("bcrt1pother", coin("c", 7));
        let selector = UtxoSelector::new(explorer);
        assert_eq!(selector.balance("bcrt1pvault").await.unwrap(), 3_500);
        assert_eq!(selector.select("bcrt1pvault").await.unwrap().txid, "b");
    }
}
