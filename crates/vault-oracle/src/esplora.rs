//! Esplora REST client.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use vault_core::{ChainTip, Coin, Explorer, GenesisHash, Result, VaultError};

use crate::upstream::{get_json, get_text};

const SERVICE: &str = "explorer";

/// [`Explorer`] backed by an Esplora instance (Blockstream, mempool.space).
#[derive(Debug, Clone)]
pub struct EsploraExplorer {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    /// Absent for confidential outputs.
    value: Option<u64>,
}

impl EsploraExplorer {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn into_coins(utxos: Vec<EsploraUtxo>) -> Vec<Coin> {
    utxos
        .into_iter()
        .filter_map(|u| {
            u.value.map(|value| Coin {
                txid: u.txid,
                output_index: u.vout,
                value,
            })
        })
        .collect()
}

#[async_trait]
impl Explorer for EsploraExplorer {
    async fn list_utxos(&self, address: &str) -> Result<Vec<Coin>> {
        let utxos: Vec<EsploraUtxo> =
            get_json(&self.client, SERVICE, &self.url(&format!("/address/{}/utxo", address))).await?;
        let listed = utxos.len();
        let coins = into_coins(utxos);
        debug!(address, listed, spendable = coins.len(), "Listed UTXOs");
        Ok(coins)
    }

    async fn fetch_raw_tx(&self, txid: &str) -> Result<Vec<u8>> {
        let body = get_text(&self.client, SERVICE, &self.url(&format!("/tx/{}/hex", txid))).await?;
        hex::decode(&body).map_err(|e| VaultError::upstream(SERVICE, format!("tx {} is not hex: {}", txid, e)))
    }

    async fn genesis_hash(&self) -> Result<GenesisHash> {
        let body = get_text(&self.client, SERVICE, &self.url("/block-height/0")).await?;
        body.parse()
            .map_err(|e| VaultError::upstream(SERVICE, format!("bad genesis hash: {}", e)))
    }

    async fn tip(&self) -> Result<ChainTip> {
        let height = get_text(&self.client, SERVICE, &self.url("/blocks/tip/height")).await?;
        let height = height
            .parse::<u64>()
            .map_err(|e| VaultError::upstream(SERVICE, format!("bad tip height {:?}: {}", height, e)))?;
        let hash = get_text(&self.client, SERVICE, &self.url("/blocks/tip/hash")).await?;
        Ok(ChainTip { height, hash })
    }

    async fn broadcast(&self, tx: &[u8]) -> Result<String> {
        let response = self
            .client
            .post(self.url("/tx"))
            .body(hex::encode(tx))
            .send()
            .await
            .map_err(|e| VaultError::upstream(SERVICE, e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| VaultError::upstream(SERVICE, e))?;
        if !status.is_success() {
            return Err(VaultError::upstream(SERVICE, format!("broadcast rejected ({}): {}", status, body.trim())));
        }
        let txid = body.trim().to_string();
        info!(txid = %txid, "Broadcast transaction");
        Ok(txid)
    }
}
