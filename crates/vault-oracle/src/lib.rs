//! # Vault Oracle
//!
//! The oracle side of the vault: price feed, signing key, covenant cache,
//! coin selection, spend construction and attestations, tied together by
//! [`VaultCoordinator`].
//!
//! Upstream collaborators are traits: [`PriceSource`] here,
//! [`vault_core::Explorer`] and [`vault_core::CovenantCompiler`] in core.
//! [`BinanceSource`], [`CoinGeckoSource`], [`EsploraExplorer`] and
//! [`TaprootCompiler`] are the production implementations.

pub mod attest;
pub mod config;
pub mod coordinator;
pub mod covenant;
pub mod esplora;
pub mod key;
pub mod price;
pub mod program;
pub mod sources;
pub mod spend;
pub mod upstream;
pub mod utxo;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use attest::AttestationService;
pub use config::OracleConfig;
pub use coordinator::VaultCoordinator;
pub use covenant::CovenantCache;
pub use esplora::EsploraExplorer;
pub use key::OracleKey;
pub use price::{to_cents, PriceFeed, PriceSource, PRICE_TTL};
pub use program::{TaprootCompiler, TaprootProgram};
pub use sources::{BinanceSource, CoinGeckoSource};
pub use spend::SpendBuilder;
pub use utxo::UtxoSelector;
