//! Public exchange price sources.

use std::str::FromStr;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use vault_core::{Result, VaultError};

use crate::price::PriceSource;
use crate::upstream::get_json;

pub const BINANCE_URL: &str = "https://api.binance.com/api/v3/ticker/price?symbol=BTCUSDT";
pub const COINGECKO_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

/// Binance BTCUSDT ticker. Price arrives as a decimal string.
#[derive(Debug, Clone)]
pub struct BinanceSource {
    client: Client,
    url: String,
}

impl BinanceSource {
    pub fn new(client: Client) -> Self {
        Self::with_url(client, BINANCE_URL)
    }

    pub fn with_url(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[async_trait]
impl PriceSource for BinanceSource {
    fn name(&self) -> &str {
        "binance"
    }

    async fn fetch_price(&self) -> Result<Decimal> {
        let ticker: TickerPrice = get_json(&self.client, self.name(), &self.url).await?;
        parse_ticker(&ticker.price)
    }
}

fn parse_ticker(price: &str) -> Result<Decimal> {
    Decimal::from_str(price.trim())
        .map_err(|e| VaultError::upstream("binance", format!("unparseable price {:?}: {}", price, e)))
}

/// CoinGecko simple price endpoint, `{"bitcoin": {"usd": <number>}}`.
#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    client: Client,
    url: String,
}

impl CoinGeckoSource {
    pub fn new(client: Client) -> Self {
        Self::with_url(client, COINGECKO_URL)
    }

    pub fn with_url(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    bitcoin: UsdQuote,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: f64,
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_price(&self) -> Result<Decimal> {
        let body: SimplePrice = get_json(&self.client, self.name(), &self.url).await?;
        usd_to_decimal(body.bitcoin.usd)
    }
}

fn usd_to_decimal(usd: f64) -> Result<Decimal> {
    Decimal::try_from(usd)
        .map(|d| d.normalize())
        .map_err(|e| VaultError::upstream("coingecko", format!("unrepresentable price {}: {}", usd, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_binance_body() {
        let ticker: TickerPrice =
            serde_json::from_str(r#"{"symbol":"BTCUSDT","price":"65123.45000000"}"#).unwrap();
        assert_eq!(parse_ticker(&ticker.price).unwrap(), Decimal::from_str("65123.45").unwrap());
        assert!(parse_ticker("n/a").is_err());
    }

    #[test]
    fn test_parse_coingecko_body() {
        let body: SimplePrice = serde_json::from_str(r#"{"bitcoin":{"usd":65123.5}}"#).unwrap();
        assert_eq!(usd_to_decimal(body.bitcoin.usd).unwrap(), Decimal::from_str("65123.5").unwrap());
    }

    #[test]
    fn test_coingecko_rejects_missing_field() {
        assert!(serde_json::from_str::<SimplePrice>(r#"{"data":{"usd":1}}"#).is_err());
        assert!(usd_to_decimal(f64::NAN).is_err());
    }
}
