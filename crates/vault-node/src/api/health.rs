//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use vault_core::XOnlyKey;

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Oracle public key.
    pub authority: XOnlyKey,
    /// Whether the vault covenant has been compiled.
    pub covenant_ready: bool,
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let covenant_ready = state.coordinator.covenants().is_initialized();
    Json(HealthResponse {
        status: if covenant_ready { "healthy" } else { "starting" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        authority: state.coordinator.authority(),
        covenant_ready,
    })
}
