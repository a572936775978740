//! In-memory fakes for tests.
//!
//! Compiled into this crate's own tests and, behind the `testing` feature,
//! available to dependents.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{Keypair, Secp256k1, SecretKey};
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use rust_decimal::Decimal;
use vault_core::{
    ChainTip, Coin, CovenantCompiler, CovenantParams, Explorer, GenesisHash, Program, Result, VaultError,
};

use crate::price::PriceSource;
use crate::program::TaprootCompiler;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Price source returning a settable price, or failing.
pub struct StaticPriceSource {
    name: String,
    price: Mutex<Option<Decimal>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticPriceSource {
    pub fn new(name: &str, price: Decimal) -> Self {
        Self {
            name: name.to_string(),
            price: Mutex::new(Some(price)),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        let source = Self::new(name, Decimal::ZERO);
        source.fail();
        source
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, price: Decimal) {
        *lock(&self.price) = Some(price);
    }

    pub fn fail(&self) {
        *lock(&self.price) = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_price(&self) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let price = *lock(&self.price);
        price.ok_or_else(|| VaultError::upstream(self.name.clone(), "source offline"))
    }
}

#[derive(Default)]
struct FakeChain {
    utxos: HashMap<String, Vec<Coin>>,
    txs: HashMap<String, Vec<u8>>,
    broadcasts: Vec<Vec<u8>>,
    nonce: u32,
}

/// Explorer over an in-memory set of coins and transactions.
pub struct FakeExplorer {
    chain: Mutex<FakeChain>,
    genesis: GenesisHash,
    failing: AtomicBool,
    utxo_calls: AtomicUsize,
    raw_tx_calls: AtomicUsize,
    genesis_calls: AtomicUsize,
}

impl Default for FakeExplorer {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeExplorer {
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(FakeChain::default()),
            genesis: GenesisHash::from_bytes([0x06; 32]),
            failing: AtomicBool::new(false),
            utxo_calls: AtomicUsize::new(0),
            raw_tx_calls: AtomicUsize::new(0),
            genesis_calls: AtomicUsize::new(0),
        }
    }

    /// List `coin` under `address` without a backing transaction.
    pub fn add_coin(&self, address: &str, coin: Coin) {
        lock(&self.chain).utxos.entry(address.to_string()).or_default().push(coin);
    }

    /// Create a transaction paying `value` to `address` and list its output.
    ///
    /// Panics if `address` is not valid for `network`.
    pub fn fund(&self, address: &str, network: Network, value: u64) -> Coin {
        let script_pubkey = Address::from_str(address)
            .and_then(|a| a.require_network(network))
            .map(|a| a.script_pubkey())
            .unwrap_or_else(|e| panic!("cannot fund {}: {}", address, e));

        let mut chain = lock(&self.chain);
        chain.nonce += 1;
        let tx = fund_transaction(script_pubkey, value, chain.nonce);
        let coin = Coin {
            txid: tx.compute_txid().to_string(),
            output_index: 0,
            value,
        };
        chain.txs.insert(coin.txid.clone(), encode::serialize(&tx));
        chain.utxos.entry(address.to_string()).or_default().push(coin.clone());
        coin
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn utxo_calls(&self) -> usize {
        self.utxo_calls.load(Ordering::SeqCst)
    }

    pub fn raw_tx_calls(&self) -> usize {
        self.raw_tx_calls.load(Ordering::SeqCst)
    }

    pub fn genesis_calls(&self) -> usize {
        self.genesis_calls.load(Ordering::SeqCst)
    }

    /// Raw transactions passed to [`Explorer::broadcast`].
    pub fn broadcasts(&self) -> Vec<Vec<u8>> {
        lock(&self.chain).broadcasts.clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VaultError::upstream("explorer", "fake explorer offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl Explorer for FakeExplorer {
    async fn list_utxos(&self, address: &str) -> Result<Vec<Coin>> {
        self.utxo_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(lock(&self.chain).utxos.get(address).cloned().unwrap_or_default())
    }

    async fn fetch_raw_tx(&self, txid: &str) -> Result<Vec<u8>> {
        self.raw_tx_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        lock(&self.chain)
            .txs
            .get(txid)
            .cloned()
            .ok_or_else(|| VaultError::upstream("explorer", format!("unknown tx {}", txid)))
    }

    async fn genesis_hash(&self) -> Result<GenesisHash> {
        self.genesis_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.genesis)
    }

    async fn tip(&self) -> Result<ChainTip> {
        self.check_online()?;
        let chain = lock(&self.chain);
        Ok(ChainTip {
            height: chain.nonce as u64,
            hash: format!("{:064x}", chain.nonce),
        })
    }

    async fn broadcast(&self, tx: &[u8]) -> Result<String> {
        self.check_online()?;
        let decoded: Transaction =
            encode::deserialize(tx).map_err(|e| VaultError::invalid(format!("undecodable tx: {}", e)))?;
        lock(&self.chain).broadcasts.push(tx.to_vec());
        Ok(decoded.compute_txid().to_string())
    }
}

/// Compiler wrapper counting calls, optionally failing.
pub struct CountingCompiler {
    inner: TaprootCompiler,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingCompiler {
    pub fn new(network: Network) -> Self {
        Self {
            inner: TaprootCompiler::new(network),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CovenantCompiler for CountingCompiler {
    async fn compile(&self, source: &str, params: &CovenantParams) -> Result<Arc<dyn Program>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(VaultError::invalid("compiler rejected program"));
        }
        self.inner.compile(source, params).await
    }
}

/// Transaction with one output paying `value` to `script_pubkey`.
///
/// `nonce` only varies the txid.
pub fn fund_transaction(script_pubkey: ScriptBuf, value: u64, nonce: u32) -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![TxIn {
            previous_output: OutPoint::new(Txid::all_zeros(), nonce),
            script_sig: ScriptBuf::new(),
            sequence: Sequence::MAX,
            witness: Witness::new(),
        }],
        output: vec![TxOut {
            value: Amount::from_sat(value),
            script_pubkey,
        }],
    }
}

/// Key-path P2TR regtest address derived from a repeated-byte secret.
///
/// `seed` must be non-zero.
pub fn regtest_address(seed: u8) -> String {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[seed; 32]).unwrap_or_else(|e| panic!("seed {}: {}", seed, e));
    let (xonly, _) = Keypair::from_secret_key(&secp, &secret).x_only_public_key();
    Address::p2tr(&secp, xonly, None, Network::Regtest).to_string()
}
