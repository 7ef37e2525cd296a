//! Concurrency guard: exclusive, transaction-scoped leases.
//!
//! A unit of work takes a lease on every row it is about to read-for-update and
//! keeps it until it commits or is dropped. A second unit of work asking for the
//! same key blocks until the first one finishes, then re-reads the current value.
//! Unrelated keys never contend.
//!
//! Acquisition order across all services: entity lease (sale, transfer,
//! replenishment request, sale counter) → variant → stock keys in ascending
//! order. Waiting is bounded by the configured lease timeout.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::debug;

use stockhub_core::{DomainError, DomainResult, ReplenishmentId, SaleId, StoreId, TransferId, VariantId};
use stockhub_inventory::StockKey;

/// Something a unit of work can hold exclusively.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeaseKey {
    Stock(StockKey),
    Variant(VariantId),
    Sale(SaleId),
    Transfer(TransferId),
    Replenishment(ReplenishmentId),
    /// Per-store, per-day receipt counter.
    SaleCounter(StoreId, NaiveDate),
}

impl core::fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LeaseKey::Stock(key) => write!(f, "stock:{key}"),
            LeaseKey::Variant(id) => write!(f, "variant:{id}"),
            LeaseKey::Sale(id) => write!(f, "sale:{id}"),
            LeaseKey::Transfer(id) => write!(f, "transfer:{id}"),
            LeaseKey::Replenishment(id) => write!(f, "replenishment:{id}"),
            LeaseKey::SaleCounter(store, date) => write!(f, "sale_counter:{store}:{date}"),
        }
    }
}

/// Process-wide table of held leases.
#[derive(Debug, Default)]
pub struct LeaseTable {
    held: Mutex<HashSet<LeaseKey>>,
    released: Condvar,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free (or `timeout` elapses), then take it.
    pub fn acquire(&self, key: LeaseKey, timeout: Duration) -> DomainResult<()> {
        let deadline = Instant::now() + timeout;
        let mut held = self
            .held
            .lock()
            .map_err(|_| DomainError::persistence("lease table lock poisoned"))?;

        while held.contains(&key) {
            let now = Instant::now();
            if now >= deadline {
                return Err(DomainError::persistence(format!(
                    "timed out after {}ms waiting for lease on {key}",
                    timeout.as_millis()
                )));
            }
            debug!(lease = %key, "waiting for lease");
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|_| DomainError::persistence("lease table lock poisoned"))?;
            held = guard;
        }

        held.insert(key);
        debug!(lease = %key, "lease acquired");
        Ok(())
    }

    /// Give back a batch of leases and wake every waiter.
    ///
    /// Runs from `Drop`, so a poisoned table is still cleaned up.
    pub fn release_all<'a>(&self, keys: impl IntoIterator<Item = &'a LeaseKey>) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            held.remove(key);
        }
        drop(held);
        self.released.notify_all();
    }

    pub fn is_held(&self, key: &LeaseKey) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(key))
            .unwrap_or(false)
    }
}
