//! Reference covenant compiler targeting Taproot.
//!
//! The program is committed to as a single tapleaf under an unspendable
//! internal key, so the only way to spend is the script path. The leaf
//! script is the 32-byte commitment root; its interpreter is expected to
//! check `bip_0340_verify(AUTHORITY, sig_all_hash, SIG)` against the witness
//! stack `[SIG, PRICE, leaf, control block]`.
//!
//! `sig_all_hash` is the BIP-341 script-path sighash of the spending
//! transaction, salted with the chain's genesis hash.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::key::XOnlyPublicKey;
use bitcoin::secp256k1::Secp256k1;
use bitcoin::sighash::{Prevouts, SighashCache, TapSighashType};
use bitcoin::taproot::{LeafVersion, TapLeafHash, TaprootBuilder};
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness,
};
use tracing::debug;
use vault_core::crypto::tagged_hash;
use vault_core::{
    CommitmentRoot, CovenantCompiler, CovenantParams, Program, Result, Sighash, SpendContext,
    SpendWitness, VaultError,
};

/// BIP-341 "H" point: an x-only key with no known discrete log.
pub const NUMS_INTERNAL_KEY: &str = "50929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0";

/// Tapleaf version the program is committed under.
pub const PROGRAM_LEAF_VERSION: u8 = 0xbe;

const COMMITMENT_TAG: &str = "vault/commitment-root";
const SIGHASH_TAG: &str = "vault/sig_all_hash";

/// Compiles vault programs into Taproot outputs on one network.
#[derive(Debug, Clone)]
pub struct TaprootCompiler {
    network: Network,
}

impl TaprootCompiler {
    pub fn new(network: Network) -> Self {
        Self { network }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Deterministic compile: the same source and params always yield the
    /// same commitment root and address.
    pub fn compile_program(&self, source: &str, params: &CovenantParams) -> Result<TaprootProgram> {
        let referenced = referenced_params(source);
        if referenced.is_empty() {
            return Err(VaultError::invalid("program references no parameters"));
        }
        for name in &referenced {
            if !params.contains_key(name) {
                return Err(VaultError::invalid(format!("missing parameter {}", name)));
            }
        }
        for name in params.keys() {
            if !referenced.contains(name) {
                return Err(VaultError::invalid(format!("unused parameter {}", name)));
            }
        }

        let cmr = commitment_root(source, params);
        let leaf_script = ScriptBuf::from_bytes(cmr.as_bytes().to_vec());
        let leaf_version = LeafVersion::from_consensus(PROGRAM_LEAF_VERSION)
            .map_err(|e| VaultError::invalid(e.to_string()))?;

        let secp = Secp256k1::verification_only();
        let internal_key = XOnlyPublicKey::from_str(NUMS_INTERNAL_KEY)
            .map_err(|e| VaultError::invalid(format!("internal key: {}", e)))?;
        let spend_info = TaprootBuilder::new()
            .add_leaf_with_ver(0, leaf_script.clone(), leaf_version)
            .map_err(|e| VaultError::invalid(e.to_string()))?
            .finalize(&secp, internal_key)
            .map_err(|_| VaultError::invalid("incomplete taproot tree"))?;
        let control_block = spend_info
            .control_block(&(leaf_script.clone(), leaf_version))
            .ok_or_else(|| VaultError::invalid("leaf missing from taproot tree"))?
            .serialize();

        let address = Address::p2tr_tweaked(spend_info.output_key(), self.network);
        debug!(cmr = %cmr, address = %address, "Compiled covenant program");

        Ok(TaprootProgram {
            network: self.network,
            source_text: source.to_string(),
            cmr,
            leaf_script,
            leaf_version,
            control_block,
            script_pubkey: address.script_pubkey(),
            address: address.to_string(),
        })
    }
}

#[async_trait]
impl CovenantCompiler for TaprootCompiler {
    async fn compile(&self, source: &str, params: &CovenantParams) -> Result<Arc<dyn Program>> {
        Ok(Arc::new(self.compile_program(source, params)?))
    }
}

/// Names following `param::` in program source.
fn referenced_params(source: &str) -> BTreeSet<String> {
    source
        .match_indices("param::")
        .map(|(at, marker)| {
            source[at + marker.len()..]
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect::<String>()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

fn commitment_root(source: &str, params: &CovenantParams) -> CommitmentRoot {
    let mut preimage = Vec::with_capacity(source.len() + 64);
    preimage.extend_from_slice(&(source.len() as u32).to_be_bytes());
    preimage.extend_from_slice(source.as_bytes());
    // BTreeMap iterates in name order.
    for (name, value) in params {
        preimage.extend_from_slice(name.as_bytes());
        preimage.push(0);
        preimage.extend_from_slice(&value.to_bytes());
    }
    CommitmentRoot::from_bytes(tagged_hash(COMMITMENT_TAG, &[&preimage[..]]))
}

/// A compiled vault program locked at a P2TR address.
#[derive(Debug, Clone)]
pub struct TaprootProgram {
    network: Network,
    source_text: String,
    cmr: CommitmentRoot,
    leaf_script: ScriptBuf,
    leaf_version: LeafVersion,
    control_block: Vec<u8>,
    script_pubkey: ScriptBuf,
    address: String,
}

impl TaprootProgram {
    pub fn script_pubkey(&self) -> &ScriptBuf {
        &self.script_pubkey
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Parse `destination` as an address on this program's network.
    fn destination(&self, destination: &str) -> Result<Address> {
        Address::from_str(destination.trim())
            .map_err(|e| VaultError::invalid(format!("bad destination {}: {}", destination, e)))?
            .require_network(self.network)
            .map_err(|e| VaultError::invalid(format!("bad destination {}: {}", destination, e)))
    }

    fn unsigned_spend(&self, ctx: &SpendContext) -> Result<(Transaction, TxOut)> {
        let txid = Txid::from_str(&ctx.coin.txid)
            .map_err(|e| VaultError::invalid(format!("bad txid {}: {}", ctx.coin.txid, e)))?;
        let prevout = self.funding_output(ctx, txid)?;
        let destination = self.destination(&ctx.destination)?;

        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(txid, ctx.coin.output_index),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(ctx.amount_sats),
                script_pubkey: destination.script_pubkey(),
            }],
        };
        Ok((tx, prevout))
    }

    /// The output being spent, checked against the explorer's claims.
    fn funding_output(&self, ctx: &SpendContext, txid: Txid) -> Result<TxOut> {
        let prev: Transaction = encode::deserialize(&ctx.prev_tx)
            .map_err(|e| VaultError::upstream("explorer", format!("undecodable funding tx: {}", e)))?;
        if prev.compute_txid() != txid {
            return Err(VaultError::upstream("explorer", format!("returned a different tx for {}", txid)));
        }
        let output = prev
            .output
            .get(ctx.coin.output_index as usize)
            .cloned()
            .ok_or_else(|| {
                VaultError::upstream("explorer", format!("{}:{} does not exist", txid, ctx.coin.output_index))
            })?;
        if output.script_pubkey != self.script_pubkey {
            return Err(VaultError::upstream(
                "explorer",
                format!("{}:{} is not locked to this vault", txid, ctx.coin.output_index),
            ));
        }
        if output.value.to_sat() != ctx.coin.value {
            return Err(VaultError::upstream(
                "explorer",
                format!("reported value {} but output holds {}", ctx.coin.value, output.value.to_sat()),
            ));
        }
        Ok(output)
    }
}

impl Program for TaprootProgram {
    fn address(&self) -> &str {
        &self.address
    }

    fn commitment_root(&self) -> CommitmentRoot {
        self.cmr
    }

    fn source_text(&self) -> &str {
        &self.source_text
    }

    fn check_destination(&self, destination: &str) -> Result<()> {
        self.destination(destination).map(|_| ())
    }

    fn compute_sighash(&self, ctx: &SpendContext) -> Result<Sighash> {
        let (tx, prevout) = self.unsigned_spend(ctx)?;
        let leaf_hash = TapLeafHash::from_script(&self.leaf_script, self.leaf_version);
        let prevouts = [prevout];
        let tap_sighash = SighashCache::new(&tx)
            .taproot_script_spend_signature_hash(0, &Prevouts::All(&prevouts), leaf_hash, TapSighashType::Default)
            .map_err(|e| VaultError::invalid(format!("sighash: {}", e)))?;

        let digest = tagged_hash(
            SIGHASH_TAG,
            &[&ctx.genesis.as_bytes()[..], &tap_sighash.as_byte_array()[..]],
        );
        Ok(Sighash::from_bytes(digest))
    }

    fn assemble(&self, ctx: &SpendContext, witness: &SpendWitness) -> Result<Vec<u8>> {
        let (mut tx, _) = self.unsigned_spend(ctx)?;
        tx.input[0].witness = Witness::from_slice(&[
            witness.signature.as_bytes().to_vec(),
            witness.price_bytes().to_vec(),
            self.leaf_script.to_bytes(),
            self.control_block.clone(),
        ]);
        Ok(encode::serialize(&tx))
    }
}
