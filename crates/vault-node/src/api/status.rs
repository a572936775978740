//! Node status endpoint.

use axum::extract::State;
use axum::Json;
use vault_core::api::{NodeStatus, OrderTotal, StatusResponse};

use super::error::ApiResult;
use crate::state::AppState;

/// Chain tip and order totals.
pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let tip = state.coordinator.chain_tip().await?;
    let orders = state
        .ledger
        .list(&[])
        .await?
        .into_iter()
        .map(|entry| OrderTotal {
            key: entry.key,
            total: entry.total,
        })
        .collect();
    Ok(Json(StatusResponse {
        status: NodeStatus { tip, orders },
    }))
}
