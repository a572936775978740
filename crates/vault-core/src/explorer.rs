//! Blockchain explorer interface.

use async_trait::async_trait;

use crate::bytes::GenesisHash;
use crate::error::Result;
use crate::types::{ChainTip, Coin};

/// Read and broadcast access to the chain.
#[async_trait]
pub trait Explorer: Send + Sync {
    /// Unspent outputs paying `address`.
    async fn list_utxos(&self, address: &str) -> Result<Vec<Coin>>;

    /// Raw bytes of a confirmed or mempool transaction.
    async fn fetch_raw_tx(&self, txid: &str) -> Result<Vec<u8>>;

    /// Hash of block 0.
    async fn genesis_hash(&self) -> Result<GenesisHash>;

    async fn tip(&self) -> Result<ChainTip>;

    /// Submit a serialized transaction; returns its txid.
    async fn broadcast(&self, tx: &[u8]) -> Result<String>;
}
