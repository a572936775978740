//! Price feed with a primary source, a fallback and a short-lived cache.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, error, warn};
use vault_core::{PriceQuote, Result, VaultError};
use vault_state::TtlCell;

use crate::upstream::{bounded, DEFAULT_UPSTREAM_TIMEOUT};

/// How long a fetched price is served without refetching.
pub const PRICE_TTL: Duration = Duration::from_secs(5);

/// Something that can report the current BTC/USD price.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name used in logs and quotes.
    fn name(&self) -> &str;

    async fn fetch_price(&self) -> Result<Decimal>;
}

/// BTC/USD feed shared by signing and attestation.
pub struct PriceFeed {
    primary: Arc<dyn PriceSource>,
    fallback: Arc<dyn PriceSource>,
    cache: TtlCell<PriceQuote>,
    timeout: Duration,
}

impl PriceFeed {
    pub fn new(primary: Arc<dyn PriceSource>, fallback: Arc<dyn PriceSource>) -> Self {
        Self {
            primary,
            fallback,
            cache: TtlCell::new(PRICE_TTL),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache = TtlCell::new(ttl);
        self
    }

    /// Bound on each individual source request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Current price, from cache if fresh.
    pub async fn get_price(&self) -> Result<Decimal> {
        Ok(self.get_quote().await?.price)
    }

    /// Current price with its provenance.
    ///
    /// A failed refresh leaves the previous quote in place; the stale value
    /// is never returned as current.
    pub async fn get_quote(&self) -> Result<PriceQuote> {
        if let Some(quote) = self.cache.fresh().await {
            debug!(price = %quote.price, source = %quote.source, "Serving cached price");
            return Ok(quote);
        }

        if let Some(age) = self.cache.age().await {
            debug!(age_ms = age.as_millis() as u64, "Cached price expired; refreshing");
        }
        let quote = self.fetch().await?;
        self.cache.publish(quote.clone()).await;
        Ok(quote)
    }

    /// Last published quote, however old.
    pub async fn last_quote(&self) -> Option<PriceQuote> {
        self.cache.stale().await
    }

    async fn fetch(&self) -> Result<PriceQuote> {
        let primary_err = match self.fetch_from(self.primary.as_ref()).await {
            Ok(quote) => return Ok(quote),
            Err(e) => e,
        };
        warn!(source = self.primary.name(), error = %primary_err, "Primary price source failed; trying fallback");

        match self.fetch_from(self.fallback.as_ref()).await {
            Ok(quote) => Ok(quote),
            Err(fallback_err) => {
                error!(
                    primary = %primary_err,
                    fallback = %fallback_err,
                    "All price sources failed"
                );
                Err(VaultError::PriceUnavailable(format!(
                    "{}: {}; {}: {}",
                    self.primary.name(),
                    primary_err,
                    self.fallback.name(),
                    fallback_err
                )))
            }
        }
    }

    async fn fetch_from(&self, source: &dyn PriceSource) -> Result<PriceQuote> {
        let price = bounded(source.name(), self.timeout, source.fetch_price()).await?;
        if price <= Decimal::ZERO {
            return Err(VaultError::upstream(source.name(), format!("non-positive price {}", price)));
        }
        Ok(PriceQuote {
            price,
            observed_at: Utc::now(),
            source: source.name().to_string(),
        })
    }
}

/// Convert a USD price to integer cents, rounding half away from zero.
pub fn to_cents(price: Decimal) -> Result<u32> {
    let cents = (price * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    cents
        .to_u32()
        .ok_or_else(|| VaultError::PriceUnavailable(format!("price {} does not fit in u32 cents", price)))
}
