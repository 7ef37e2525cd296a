//! The stock mutation primitive.
//!
//! Every quantity change in the system goes through [`apply_change`]: read the
//! row under its lease, let the aggregate decide, stage the new quantity and
//! exactly one ledger entry in the same unit of work.

use tracing::{debug, warn};

use stockhub_core::{Aggregate, DomainError, DomainResult, UserId};
use stockhub_inventory::{ChangeStock, StockChangeKind, StockChanged, StockKey, StockPolicy};

use crate::store::{LedgerAppend, UnitOfWork};

/// One pending quantity change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockEffect {
    pub key: StockKey,
    pub kind: StockChangeKind,
    pub delta: i64,
}

impl StockEffect {
    pub fn new(key: StockKey, kind: StockChangeKind, delta: i64) -> Self {
        Self { key, kind, delta }
    }
}

/// Change one (store, variant) quantity under the kind's default policy.
pub fn apply_change(
    tx: &mut dyn UnitOfWork,
    key: StockKey,
    kind: StockChangeKind,
    delta: i64,
    actor: UserId,
) -> DomainResult<StockChanged> {
    apply_change_with_policy(tx, key, kind, delta, kind.default_policy(), actor)
}

/// Change one (store, variant) quantity under an explicit policy.
///
/// On error nothing is staged; the caller drops the unit of work.
pub fn apply_change_with_policy(
    tx: &mut dyn UnitOfWork,
    key: StockKey,
    kind: StockChangeKind,
    delta: i64,
    policy: StockPolicy,
    actor: UserId,
) -> DomainResult<StockChanged> {
    let mut row = tx.lock_stock(key)?;
    let cmd = ChangeStock::new(key, kind, delta).with_policy(policy);
    let row_quantity = row.quantity();
    let events = row.execute(&cmd).inspect_err(|err| {
        if let DomainError::InsufficientStock { available, requested, .. } = err {
            warn!(stock = %key, kind = %kind, available, requested, "deduction refused");
        }
    })?;

    let mut last = None;
    for event in events {
        tx.append_ledger(LedgerAppend {
            key,
            kind: event.kind,
            delta: event.applied_delta,
            resulting_quantity: event.resulting_quantity,
            actor,
        });
        debug!(
            stock = %key,
            kind = %event.kind,
            delta = event.applied_delta,
            quantity = event.resulting_quantity,
            "stock change staged"
        );
        last = Some(event);
    }

    match last {
        Some(changed) => {
            tx.put_stock(row);
            Ok(changed)
        }
        // Clamped away entirely: nothing staged, nothing ledgered.
        None => Ok(StockChanged {
            key,
            kind,
            requested_delta: delta,
            applied_delta: 0,
            resulting_quantity: row_quantity,
        }),
    }
}

/// Apply several changes, taking every stock lease up front in ascending key order.
pub fn apply_effects(
    tx: &mut dyn UnitOfWork,
    effects: &[StockEffect],
    actor: UserId,
) -> DomainResult<Vec<StockChanged>> {
    let mut keys: Vec<StockKey> = effects.iter().map(|e| e.key).collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        tx.lock_stock(key)?;
    }

    effects
        .iter()
        .map(|e| apply_change(tx, e.key, e.kind, e.delta, actor))
        .collect()
}
