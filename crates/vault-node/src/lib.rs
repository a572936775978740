//! # Vault Node
//!
//! HTTP node serving the vault oracle.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use vault_oracle::{
    BinanceSource, CoinGeckoSource, EsploraExplorer, OracleKey, TaprootCompiler, VaultCoordinator,
};

pub mod api;
pub mod config;
pub mod state;

pub use config::Args;
pub use state::AppState;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Wire up the production collaborators and compile the covenant.
pub async fn build_state(args: &Args) -> anyhow::Result<AppState> {
    let key = OracleKey::load(args.oracle_key.as_deref())?;
    if !key.is_ephemeral() {
        info!(pubkey = %key.public_key(), "Loaded oracle key");
    }

    let client = reqwest::Client::builder()
        .timeout(args.upstream_timeout())
        .build()?;
    let coordinator = Arc::new(VaultCoordinator::new(
        args.oracle_config(),
        Arc::new(key),
        Arc::new(EsploraExplorer::new(client.clone(), args.esplora.clone())),
        Arc::new(TaprootCompiler::new(args.network)),
        Arc::new(BinanceSource::with_url(client.clone(), args.binance_url.clone())),
        Arc::new(CoinGeckoSource::with_url(client, args.coingecko_url.clone())),
    ));

    match coordinator.initialize().await {
        Ok(covenant) => info!(address = %covenant.address, network = %args.network, "Vault ready"),
        // Spend routes answer CovenantUninitialized until a compile succeeds.
        Err(e) => warn!(error = %e, "Vault covenant unavailable at startup"),
    }

    Ok(AppState::in_memory(coordinator))
}

/// Run the vault node until interrupted.
pub async fn run_server(args: Args) -> anyhow::Result<()> {
    info!("Vault node starting...");

    let state = build_state(&args).await?;
    let app = create_router(state);

    let listener = TcpListener::bind(args.listen).await?;
    info!("Listening on http://{}", args.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Vault node stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/", get(api::status::get_status))
        // Vault
        .route("/vault", get(api::vault::get_vault).post(api::vault::sign_sighash))
        .route("/vault/sighash", post(api::vault::compute_sighash))
        .route("/vault/sign", post(api::vault::sign_sighash))
        .route("/vault/tx", post(api::vault::build_tx))
        .route("/attest", get(api::vault::get_attestation))
        // Bookkeeping
        .route("/orders", post(api::orders::record_order))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests;
