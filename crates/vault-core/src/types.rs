//! Common types used across the vault spend protocol.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bytes::{CommitmentRoot, GenesisHash, XOnlyKey};
use crate::error::{Result, VaultError};

/// Phase of the three-step spend handshake.
///
/// The oracle keeps no per-spend state; the phase is implied by which call a
/// client is making and is used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendPhase {
    /// Nothing requested yet.
    Idle,
    /// Client holds the digest for its intended spend.
    SighashComputed,
    /// Oracle has signed the digest at the current price.
    Signed,
    /// Final transaction bytes assembled.
    Built,
    /// Client pushed the transaction to the network.
    Broadcast,
}

/// An unspent output at the vault address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    /// Funding transaction id (display hex).
    pub txid: String,

    /// Output index within the funding transaction.
    #[serde(rename = "vout")]
    pub output_index: u32,

    /// Value in satoshis.
    pub value: u64,
}

/// A price reading and when it was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
    /// Name of the source that produced the quote.
    pub source: String,
}

/// Public description of the compiled vault covenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Covenant {
    /// Oracle key the covenant checks signatures against.
    pub authority: XOnlyKey,

    pub commitment_root: CommitmentRoot,

    /// Address funds are locked at.
    pub address: String,

    pub source_text: String,
}

/// Everything needed to derive a spend's digest and final transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendContext {
    pub coin: Coin,

    /// Raw bytes of the transaction that created `coin`.
    pub prev_tx: Vec<u8>,

    pub destination: String,

    pub fee_sats: u64,

    /// `coin.value - fee_sats`, always > 0.
    pub amount_sats: u64,

    /// Network salt committed to by the sighash.
    pub genesis: GenesisHash,
}

impl SpendContext {
    /// Derive a context, rejecting empty destinations and fees that consume
    /// the whole coin.
    pub fn new(
        coin: Coin,
        prev_tx: Vec<u8>,
        destination: impl Into<String>,
        fee_sats: u64,
        genesis: GenesisHash,
    ) -> Result<Self> {
        let destination = destination.into();
        if destination.trim().is_empty() {
            return Err(VaultError::invalid("provide a destination address"));
        }
        let amount_sats = spend_amount(&coin, fee_sats)?;
        Ok(Self {
            coin,
            prev_tx,
            destination,
            fee_sats,
            amount_sats,
            genesis,
        })
    }
}

/// Amount left for the destination after paying `fee_sats` out of `coin`.
pub fn spend_amount(coin: &Coin, fee_sats: u64) -> Result<u64> {
    match coin.value.checked_sub(fee_sats) {
        Some(amount) if amount > 0 => Ok(amount),
        _ => Err(VaultError::InsufficientFunds {
            value_sats: coin.value,
            fee_sats,
        }),
    }
}

/// Vault summary served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInfo {
    #[serde(rename = "cmr")]
    pub commitment_root: CommitmentRoot,

    #[serde(rename = "p2tr")]
    pub address: String,

    pub authority: XOnlyKey,

    pub balance_sats: u64,

    #[serde(rename = "source")]
    pub source_text: String,
}

impl VaultInfo {
    pub fn new(covenant: &Covenant, balance_sats: u64) -> Self {
        Self {
            commitment_root: covenant.commitment_root,
            address: covenant.address.clone(),
            authority: covenant.authority,
            balance_sats,
            source_text: covenant.source_text.clone(),
        }
    }
}

/// Current best block of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTip {
    pub height: u64,
    pub hash: String,
}
