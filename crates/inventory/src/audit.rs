//! Ledger replay and consistency audit.
//!
//! The ledger is the sole source of truth for how a quantity was reached; these
//! helpers rebuild quantities from it and compare them with the live table.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::ledger::StockLedgerEntry;
use crate::stock::{StockKey, StoreStock};

/// A key whose live counter and ledger disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerDiscrepancy {
    pub key: StockKey,
    /// `None` when the ledger has entries for a row that does not exist.
    pub live_quantity: Option<i64>,
    pub ledger_sum: i64,
    /// Sequence of the first entry whose snapshot does not follow from the previous one.
    pub broken_chain_at: Option<u64>,
}

/// Rebuild per-key quantities by summing ledger deltas in sequence order.
pub fn replay<'a>(entries: impl IntoIterator<Item = &'a StockLedgerEntry>) -> BTreeMap<StockKey, i64> {
    let mut sums = BTreeMap::new();
    for entry in entries {
        let sum = sums.entry(entry.key).or_insert(0i64);
        *sum = sum.saturating_add(entry.delta);
    }
    sums
}

fn first_broken_link(entries: &[&StockLedgerEntry]) -> Option<u64> {
    let mut previous = 0i64;
    for entry in entries {
        if entry.previous_quantity() != previous {
            return Some(entry.sequence);
        }
        previous = entry.resulting_quantity;
    }
    None
}

/// Compare live rows with the ledger.
///
/// Reports every key where the live quantity differs from the sum of its
/// deltas, or where consecutive snapshots do not chain.
pub fn audit<'a>(
    rows: impl IntoIterator<Item = &'a StoreStock>,
    entries: &[StockLedgerEntry],
) -> Vec<LedgerDiscrepancy> {
    let live: BTreeMap<StockKey, i64> = rows.into_iter().map(|r| (r.key(), r.quantity())).collect();

    let mut by_key: BTreeMap<StockKey, Vec<&StockLedgerEntry>> = BTreeMap::new();
    for entry in entries {
        by_key.entry(entry.key).or_default().push(entry);
    }
    for chain in by_key.values_mut() {
        chain.sort_by_key(|e| e.sequence);
    }

    let keys: BTreeSet<StockKey> = live.keys().chain(by_key.keys()).copied().collect();

    let mut discrepancies = Vec::new();
    for key in keys {
        let chain = by_key.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        let ledger_sum = chain.iter().fold(0i64, |acc, e| acc.saturating_add(e.delta));
        let live_quantity = live.get(&key).copied();
        let broken_chain_at = first_broken_link(chain);

        let matches = live_quantity.unwrap_or(0) == ledger_sum
            && (live_quantity.is_some() || chain.is_empty());
        if !matches || broken_chain_at.is_some() {
            discrepancies.push(LedgerDiscrepancy {
                key,
                live_quantity,
                ledger_sum,
                broken_chain_at,
            });
        }
    }
    discrepancies
}
