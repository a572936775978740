//! Command line and environment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use bitcoin::Network;
use clap::Parser;
use vault_core::api::DEFAULT_FEE_SATS;
use vault_oracle::sources::{BINANCE_URL, COINGECKO_URL};
use vault_oracle::OracleConfig;

pub const DEFAULT_ESPLORA: &str = "https://blockstream.info/testnet/api";

/// Oracle node for price-gated vault withdrawals.
#[derive(Debug, Clone, Parser)]
#[command(name = "vault-node", version, about)]
pub struct Args {
    /// Address to serve HTTP on.
    #[arg(long, env = "VAULT_LISTEN", default_value = "127.0.0.1:8940")]
    pub listen: SocketAddr,

    /// Esplora API base URL.
    #[arg(long, env = "VAULT_ESPLORA", default_value = DEFAULT_ESPLORA)]
    pub esplora: String,

    /// Network addresses are encoded for: bitcoin, testnet, signet or regtest.
    #[arg(long, env = "VAULT_NETWORK", default_value = "testnet")]
    pub network: Network,

    /// Hex-encoded 32-byte oracle secret. A random key is used when unset.
    #[arg(long = "oracle-key", env = "ORACLE_SECRET_KEY", hide_env_values = true)]
    pub oracle_key: Option<String>,

    /// Fee for withdrawals that do not specify one.
    #[arg(long, env = "VAULT_DEFAULT_FEE_SATS", default_value_t = DEFAULT_FEE_SATS)]
    pub default_fee_sats: u64,

    /// Bound on every explorer, price and compiler call.
    #[arg(long, env = "VAULT_UPSTREAM_TIMEOUT_MS", default_value_t = 10_000)]
    pub upstream_timeout_ms: u64,

    /// How long a fetched price is reused.
    #[arg(long, env = "VAULT_PRICE_TTL_MS", default_value_t = 5_000)]
    pub price_ttl_ms: u64,

    #[arg(long, default_value = BINANCE_URL)]
    pub binance_url: String,

    #[arg(long, default_value = COINGECKO_URL)]
    pub coingecko_url: String,
}

impl Args {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            default_fee_sats: self.default_fee_sats,
            upstream_timeout: self.upstream_timeout(),
            price_ttl: Duration::from_millis(self.price_ttl_ms),
        }
    }
}
