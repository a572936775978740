//! Key-value ledger for order bookkeeping.
//!
//! Keys are short paths such as `["made", "65000"]`; values are running
//! totals updated with atomic sums.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use vault_core::{Result, VaultError};

/// Path-shaped ledger key.
pub type LedgerKey = Vec<String>;

/// Current total stored under a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub key: LedgerKey,

    pub total: u64,

    /// Ledger-wide version at the last update of this key.
    pub version: u64,

    pub updated_at: DateTime<Utc>,
}

/// Trait for ledgers.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Add `amount` to the total at `key`, returning the updated entry.
    async fn add(&self, key: LedgerKey, amount: u64) -> Result<LedgerEntry>;

    /// Entries whose key starts with `prefix`, in key order.
    async fn list(&self, prefix: &[String]) -> Result<Vec<LedgerEntry>>;
}

#[derive(Default)]
struct Inner {
    entries: BTreeMap<LedgerKey, LedgerEntry>,
    version: u64,
}

/// In-memory implementation of [`Ledger`].
#[derive(Clone, Default)]
pub struct InMemoryLedger {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryLedger {
    /// Create a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn add(&self, key: LedgerKey, amount: u64) -> Result<LedgerEntry> {
        if key.is_empty() {
            return Err(VaultError::invalid("ledger key must not be empty"));
        }

        let mut inner = self.inner.write().await;
        let current = inner.entries.get(&key).map(|e| e.total).unwrap_or(0);
        let total = current
            .checked_add(amount)
            .ok_or_else(|| VaultError::invalid(format!("ledger total overflow at {:?}", key)))?;

        inner.version += 1;
        let entry = LedgerEntry {
            key: key.clone(),
            total,
            version: inner.version,
            updated_at: Utc::now(),
        };
        inner.entries.insert(key, entry.clone());

        Ok(entry)
    }

    async fn list(&self, prefix: &[String]) -> Result<Vec<LedgerEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .values()
            .filter(|e| e.key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(parts: &[&str]) -> LedgerKey {
        parts.iter().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_add_accumulates() {
        let ledger = InMemoryLedger::new();

        ledger.add(key(&["made", "100"]), 2).await.unwrap();
        let entry = ledger.add(key(&["made", "100"]), 3).await.unwrap();

        assert_eq!(entry.total, 5);
        assert_eq!(ledger.list(&key(&["made", "100"])).await.unwrap(), vec![entry]);
    }

    #[tokio::test]
    async fn test_versioning() {
        let ledger = InMemoryLedger::new();

        let e1 = ledger.add(key(&["made", "1"]), 1).await.unwrap();
        let e2 = ledger.add(key(&["took", "1"]), 1).await.unwrap();

        assert!(e2.version > e1.version);
        let e3 = ledger.add(key(&["made", "1"]), 1).await.unwrap();
        assert_eq!(e3.version, 3);
        assert_eq!(e3.total, 2);
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let ledger = InMemoryLedger::new();

        ledger.add(key(&["made", "100"]), 1).await.unwrap();
        ledger.add(key(&["made", "200"]), 1).await.unwrap();
        ledger.add(key(&["took", "100"]), 1).await.unwrap();

        let made = ledger.list(&key(&["made"])).await.unwrap();
        assert_eq!(made.len(), 2);
        assert_eq!(ledger.list(&[]).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let ledger = InMemoryLedger::new();
        assert!(ledger.add(Vec::new(), 1).await.is_err());
    }

    #[tokio::test]
    async fn test_overflow_leaves_total_unchanged() {
        let ledger = InMemoryLedger::new();

        ledger.add(key(&["made", "1"]), u64::MAX).await.unwrap();
        assert!(ledger.add(key(&["made", "1"]), 1).await.is_err());
        let kept = ledger.list(&key(&["made", "1"])).await.unwrap();
        assert_eq!(kept[0].total, u64::MAX);
    }
}
