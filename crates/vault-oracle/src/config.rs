//! Oracle tuning knobs.

use std::time::Duration;

use vault_core::api::DEFAULT_FEE_SATS;

use crate::price::PRICE_TTL;
use crate::upstream::DEFAULT_UPSTREAM_TIMEOUT;

/// Configuration for a [`crate::VaultCoordinator`].
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Fee used when a request does not name one.
    pub default_fee_sats: u64,

    /// Bound on every explorer, price and compiler call.
    pub upstream_timeout: Duration,

    pub price_ttl: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            default_fee_sats: DEFAULT_FEE_SATS,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            price_ttl: PRICE_TTL,
        }
    }
}
