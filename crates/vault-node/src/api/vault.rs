//! Vault and withdrawal endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use vault_core::api::{
    BuildTxRequest, BuiltTransaction, SighashRequest, SighashResponse, SignRequest, SignedSighash,
    VaultResponse,
};
use vault_core::Attestation;

use super::error::ApiResult;
use crate::state::AppState;

/// Vault address, commitment root, authority and balance.
pub async fn get_vault(State(state): State<AppState>) -> ApiResult<VaultResponse> {
    let vault = state.coordinator.vault_info().await?;
    Ok(Json(VaultResponse { vault }))
}

/// Signed statement of the current price.
pub async fn get_attestation(State(state): State<AppState>) -> ApiResult<Attestation> {
    Ok(Json(state.coordinator.attestation().await?))
}

/// Phase one: digest to sign for a withdrawal to `to`.
pub async fn compute_sighash(
    State(state): State<AppState>,
    payload: Result<Json<SighashRequest>, JsonRejection>,
) -> ApiResult<SighashResponse> {
    let Json(req) = payload?;
    let sighash = state.coordinator.compute_sighash(&req.to, req.fee_sats).await?;
    Ok(Json(SighashResponse { sighash }))
}

/// Phase two: oracle signature over a sighash, bound to the current price.
pub async fn sign_sighash(
    State(state): State<AppState>,
    payload: Result<Json<SignRequest>, JsonRejection>,
) -> ApiResult<SignedSighash> {
    let Json(req) = payload?;
    Ok(Json(state.coordinator.sign_sighash(&req.sighash).await?))
}

/// Phase three: the signed transaction, for the client to broadcast.
pub async fn build_tx(
    State(state): State<AppState>,
    payload: Result<Json<BuildTxRequest>, JsonRejection>,
) -> ApiResult<BuiltTransaction> {
    let Json(req) = payload?;
    let built = state
        .coordinator
        .build_tx(&req.to, &req.witness, req.fee_sats)
        .await?;
    Ok(Json(built))
}
