//! Helpers for talking to upstream services.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use vault_core::{Result, VaultError};

/// Default bound on any single upstream call.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `fut`, turning an expired `limit` into `UpstreamUnavailable`.
pub async fn bounded<T, F>(service: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(VaultError::upstream(
            service,
            format!("no response within {}ms", limit.as_millis()),
        )),
    }
}

pub(crate) async fn get_json<T: DeserializeOwned>(client: &Client, service: &str, url: &str) -> Result<T> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| VaultError::upstream(service, e))?;
    response
        .json::<T>()
        .await
        .map_err(|e| VaultError::upstream(service, format!("unexpected response body: {}", e)))
}

pub(crate) async fn get_text(client: &Client, service: &str, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| VaultError::upstream(service, e))?;
    let body = response
        .text()
        .await
        .map_err(|e| VaultError::upstream(service, e))?;
    Ok(body.trim().to_string())
}
