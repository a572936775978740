//! Vault node client.

use reqwest::Response;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use vault_core::api::{
    BuildTxRequest, BuiltTransaction, ErrorBody, SighashRequest, SighashResponse, SignRequest,
    SignedSighash, VaultResponse,
};
use vault_core::{
    Attestation, Explorer, Result, Sighash, SpendPhase, SpendWitness, VaultError, VaultInfo,
};

const SERVICE: &str = "vault node";

/// Client for a vault node.
#[derive(Clone)]
pub struct VaultClient {
    /// Base URL of the node.
    base_url: String,

    http_client: reqwest::Client,
}

/// Everything produced by a completed withdrawal handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub sighash: Sighash,

    /// Price the oracle signed at.
    pub price: Decimal,

    pub witness: SpendWitness,

    /// Serialized transaction, ready to broadcast.
    pub signed_hex: String,

    pub amount: u64,

    pub fee: u64,
}

impl Withdrawal {
    /// Push the signed transaction to the network through `explorer`.
    ///
    /// The node never broadcasts; this is the client's last step. Returns the
    /// txid reported by the explorer.
    pub async fn broadcast(&self, explorer: &dyn Explorer) -> Result<String> {
        let raw = hex::decode(&self.signed_hex)?;
        let txid = explorer.broadcast(&raw).await?;
        info!(phase = ?SpendPhase::Broadcast, txid = %txid, amount = self.amount, "Broadcast withdrawal");
        Ok(txid)
    }
}

impl VaultClient {
    /// Connect to a vault node.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::with_client(url, reqwest::Client::new()).await
    }

    /// Connect using a preconfigured HTTP client.
    pub async fn with_client(url: &str, http_client: reqwest::Client) -> Result<Self> {
        let base_url = url.trim_end_matches('/').to_string();

        // Verify connection with health check
        http_client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VaultError::upstream(SERVICE, e))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Vault address, commitment root, authority and balance.
    pub async fn vault(&self) -> Result<VaultInfo> {
        let response: VaultResponse = self.get("/vault").await?;
        Ok(response.vault)
    }

    /// Signed statement of the current price.
    pub async fn attestation(&self) -> Result<Attestation> {
        self.get("/attest").await
    }

    /// Ask the node for the digest of a withdrawal to `to`.
    pub async fn compute_sighash(&self, to: &str, fee_sats: Option<u64>) -> Result<Sighash> {
        let request = SighashRequest {
            to: to.to_string(),
            fee_sats,
        };
        let response: SighashResponse = self.post("/vault/sighash", &request).await?;
        Ok(response.sighash)
    }

    /// Have the oracle sign `sighash` at the current price.
    pub async fn sign_sighash(&self, sighash: &Sighash) -> Result<SignedSighash> {
        self.post("/vault/sign", &SignRequest { sighash: *sighash }).await
    }

    /// Build the signed transaction for a withdrawal to `to`.
    pub async fn build_tx(
        &self,
        to: &str,
        witness: &SpendWitness,
        fee_sats: Option<u64>,
    ) -> Result<BuiltTransaction> {
        let request = BuildTxRequest {
            to: to.to_string(),
            witness: *witness,
            fee_sats,
        };
        self.post("/vault/tx", &request).await
    }

    /// Run the full handshake: sighash, signature, transaction.
    ///
    /// The oracle's signature is checked against the vault authority before
    /// the transaction is requested.
    pub async fn withdraw(&self, to: &str, fee_sats: Option<u64>) -> Result<Withdrawal> {
        let vault = self.vault().await?;
        let sighash = self.compute_sighash(to, fee_sats).await?;
        let signed = self.sign_sighash(&sighash).await?;
        if !signed.witness.verify(&vault.authority, &sighash) {
            return Err(VaultError::invalid(format!(
                "oracle signature does not verify against vault authority {}",
                vault.authority
            )));
        }
        debug!(sighash = %sighash, price = %signed.price, "Oracle signed withdrawal");

        let built = self.build_tx(to, &signed.witness, fee_sats).await?;
        Ok(Withdrawal {
            sighash,
            price: signed.price,
            witness: signed.witness,
            signed_hex: built.signed_hex,
            amount: built.amount,
            fee: built.fee,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .http_client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .map_err(|e| VaultError::upstream(SERVICE, e))?;
        decode(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| VaultError::upstream(SERVICE, e))?;
        decode(response).await
    }
}

/// Parse a success body, or rebuild the node's error.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| VaultError::upstream(SERVICE, e))?;

    if status.is_success() {
        return serde_json::from_str(&text)
            .map_err(|e| VaultError::upstream(SERVICE, format!("unexpected response body: {}", e)));
    }
    Err(node_error(status.as_u16(), &text))
}

fn node_error(status: u16, text: &str) -> VaultError {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => body.cause,
        Err(_) => VaultError::upstream(SERVICE, format!("HTTP {}: {}", status, text)),
    }
}
