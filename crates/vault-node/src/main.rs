//! Vault node binary.

use clap::Parser;
use vault_node::{init_tracing, run_server, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing()?;
    run_server(args).await
}
