//! Shared cache cells.
//!
//! Writers compute a complete value first and then [`TtlCell::publish`] it
//! in one assignment, so readers see either the old record or the new one.
//! No lock is held while the value is being computed; concurrent refreshes
//! may both run and the last publish wins.

use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct Stamped<T> {
    value: T,
    stored_at: Instant,
}

/// A single-value cache cell whose content goes stale after `ttl`.
///
/// Stale values are kept until replaced; [`TtlCell::stale`] still returns
/// them.
#[derive(Debug)]
pub struct TtlCell<T> {
    ttl: Duration,
    slot: RwLock<Option<Stamped<T>>>,
}

impl<T: Clone> TtlCell<T> {
    /// Create an empty cell.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached value if it was published less than `ttl` ago.
    pub async fn fresh(&self) -> Option<T> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|s| s.stored_at.elapsed() < self.ttl)
            .map(|s| s.value.clone())
    }

    /// The cached value regardless of age.
    pub async fn stale(&self) -> Option<T> {
        self.slot.read().await.as_ref().map(|s| s.value.clone())
    }

    /// Time since the last publish.
    pub async fn age(&self) -> Option<Duration> {
        self.slot.read().await.as_ref().map(|s| s.stored_at.elapsed())
    }

    /// Replace the cached value.
    pub async fn publish(&self, value: T) {
        let stamped = Stamped {
            value,
            stored_at: Instant::now(),
        };
        *self.slot.write().await = Some(stamped);
    }
}
