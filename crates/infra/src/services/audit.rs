//! Ledger consistency checks.

use std::sync::Arc;

use tracing::{instrument, warn};

use stockhub_core::{DomainError, DomainResult, VariantId};
use stockhub_inventory::{audit, LedgerDiscrepancy};

use crate::store::StockBackend;

#[derive(Debug)]
pub struct LedgerAuditService<B> {
    backend: Arc<B>,
}

impl<B> Clone for LedgerAuditService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: StockBackend> LedgerAuditService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Replay the whole ledger against the live table.
    #[instrument(skip(self), err)]
    pub fn audit(&self) -> DomainResult<Vec<LedgerDiscrepancy>> {
        let snapshot = self.backend.snapshot()?;
        let found = audit(&snapshot.rows, &snapshot.entries);
        for d in &found {
            warn!(
                stock = %d.key,
                live = ?d.live_quantity,
                ledger_sum = d.ledger_sum,
                broken_chain_at = ?d.broken_chain_at,
                "stock ledger discrepancy"
            );
        }
        Ok(found)
    }

    /// Units of `variant` in circulation: every store plus HQ.
    pub fn circulation(&self, variant: VariantId) -> DomainResult<i64> {
        let snapshot = self.backend.snapshot()?;
        let hq = snapshot
            .variants
            .iter()
            .find(|v| v.id == variant)
            .map(|v| v.hq_quantity)
            .ok_or_else(|| DomainError::not_found(format!("variant {variant}")))?;
        snapshot
            .rows
            .iter()
            .filter(|row| row.key().variant == variant)
            .try_fold(hq, |acc, row| acc.checked_add(row.quantity()))
            .ok_or_else(|| {
                DomainError::invalid_state(format!("circulation of variant {variant} exceeds the i64 range"))
            })
    }
}
