//! Compile-once cache for the vault covenant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, RwLock};
use tracing::{error, info};
use vault_core::{
    authority_params, CompiledCovenant, CovenantCompiler, Result, VaultError, XOnlyKey, VAULT_SOURCE,
};

use crate::upstream::{bounded, DEFAULT_UPSTREAM_TIMEOUT};

const COMPILER: &str = "covenant compiler";

/// Holds the single covenant this process locks funds to.
///
/// Concurrent first callers share one compile. A failed compile leaves the
/// cache empty so the next call retries.
pub struct CovenantCache {
    compiler: Arc<dyn CovenantCompiler>,
    source: String,
    timeout: Duration,
    cell: OnceCell<CompiledCovenant>,
    last_error: RwLock<Option<String>>,
    compiles: AtomicUsize,
}

impl CovenantCache {
    pub fn new(compiler: Arc<dyn CovenantCompiler>) -> Self {
        Self {
            compiler,
            source: VAULT_SOURCE.to_string(),
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
            cell: OnceCell::new(),
            last_error: RwLock::new(None),
            compiles: AtomicUsize::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The covenant for `authority`, compiling it on first use.
    ///
    /// Asking for a different authority after the first compile is an error;
    /// the process is bound to one key.
    pub async fn get_or_compile(&self, authority: XOnlyKey) -> Result<CompiledCovenant> {
        let result = self.cell.get_or_try_init(|| self.compile(authority)).await;
        match result {
            Ok(compiled) => {
                if compiled.covenant.authority != authority {
                    return Err(VaultError::invalid(format!(
                        "covenant is bound to {}, not {}",
                        compiled.covenant.authority, authority
                    )));
                }
                Ok(compiled.clone())
            }
            Err(e) => {
                *self.last_error.write().await = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// The covenant if it has been compiled, without compiling.
    pub async fn get(&self) -> Result<CompiledCovenant> {
        if let Some(compiled) = self.cell.get() {
            return Ok(compiled.clone());
        }
        let reason = match self.last_error.read().await.as_deref() {
            Some(last) => format!("last compile failed: {}", last),
            None => "vault has not been compiled yet".to_string(),
        };
        Err(VaultError::CovenantUninitialized(reason))
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of compile attempts so far.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::SeqCst)
    }

    async fn compile(&self, authority: XOnlyKey) -> Result<CompiledCovenant> {
        self.compiles.fetch_add(1, Ordering::SeqCst);
        info!(authority = %authority, "Compiling vault covenant");

        let params = authority_params(authority);
        let program = bounded(COMPILER, self.timeout, self.compiler.compile(&self.source, &params))
            .await
            .map_err(|e| match e {
                VaultError::UpstreamUnavailable { .. } => e,
                other => VaultError::upstream(COMPILER, other),
            });
        let program = match program {
            Ok(program) => program,
            Err(e) => {
                error!(error = %e, "Covenant compile failed");
                return Err(e);
            }
        };

        *self.last_error.write().await = None;
        let compiled = CompiledCovenant::new(authority, program);
        info!(
            address = %compiled.covenant.address,
            cmr = %compiled.covenant.commitment_root,
            "Vault covenant ready"
        );
        Ok(compiled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingCompiler;
    use bitcoin::Network;
    use vault_core::ErrorKind;

    fn key(b: u8) -> XOnlyKey {
        XOnlyKey::from_bytes([b; 32])
    }

    #[tokio::test]
    async fn test_get_before_compile() {
        let cache = CovenantCache::new(Arc::new(CountingCompiler::new(Network::Regtest)));
        let err = cache.get().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CovenantUninitialized);
        assert!(!cache.is_initialized());
    }

    #[tokio::test]
    async fn test_compiles_once() {
        let compiler = Arc::new(CountingCompiler::new(Network::Regtest));
        let cache = Arc::new(CovenantCache::new(compiler.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_compile(key(1)).await })
            })
            .collect();
        let mut addresses = Vec::new();
        for handle in handles {
            addresses.push(handle.await.unwrap().unwrap().covenant.address);
        }

        assert_eq!(compiler.calls(), 1);
        assert!(addresses.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.get().await.unwrap().covenant.address, addresses[0]);
    }

    #[tokio::test]
    async fn test_other_authority_rejected() {
        let cache = CovenantCache::new(Arc::new(CountingCompiler::new(Network::Regtest)));
        cache.get_or_compile(key(1)).await.unwrap();
        let err = cache.get_or_compile(key(2)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let compiler = Arc::new(CountingCompiler::new(Network::Regtest));
        compiler.set_failing(true);
        let cache = CovenantCache::new(compiler.clone());

        let err = cache.get_or_compile(key(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamUnavailable);
        match cache.get().await.unwrap_err() {
            VaultError::CovenantUninitialized(reason) => assert!(reason.contains("last compile failed")),
            other => panic!("unexpected {:?}", other),
        }

        compiler.set_failing(false);
        cache.get_or_compile(key(1)).await.unwrap();
        assert_eq!(cache.compile_count(), 2);
        assert!(cache.is_initialized());
    }
}
