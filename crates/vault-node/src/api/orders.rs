//! Make/take order bookkeeping.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use tracing::info;
use vault_core::api::{OrderRequest, OrderResponse};

use super::error::ApiResult;
use crate::state::AppState;

/// Add an order's amount to the running total for its price.
pub async fn record_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> ApiResult<OrderResponse> {
    let Json(order) = payload?;
    let (side, terms) = match order {
        OrderRequest::Make(terms) => ("made", terms),
        OrderRequest::Take(terms) => ("took", terms),
    };

    let entry = state
        .ledger
        .add(vec![side.to_string(), terms.price.to_string()], terms.amount)
        .await?;
    info!(side, price = terms.price, amount = terms.amount, total = entry.total, "Recorded order");

    let response = match order {
        OrderRequest::Make(_) => OrderResponse::Made {
            price: terms.price,
            amount: terms.amount,
            total: entry.total,
        },
        OrderRequest::Take(_) => OrderResponse::Took {
            price: terms.price,
            amount: terms.amount,
            total: entry.total,
        },
    };
    Ok(Json(response))
}
