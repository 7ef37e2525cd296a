use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockhub_core::{LedgerEntryId, UserId};

use crate::stock::StockKey;

/// Why a store quantity changed. One tag per ledger entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockChangeKind {
    Sale,
    RefundFull,
    RefundPartial,
    ShipOut,
    ShipIn,
    OrderIn,
    ReturnOut,
    ManualUpdate,
}

/// How a change that would drive the quantity below zero is treated.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockPolicy {
    /// Fail with `InsufficientStock`, mutate nothing.
    RequireNonNegative,
    /// Floor the result at zero and record only what was actually applied.
    ClampAtZero,
    /// No check (restocking paths; deltas are positive).
    Unchecked,
}

impl StockChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockChangeKind::Sale => "SALE",
            StockChangeKind::RefundFull => "REFUND_FULL",
            StockChangeKind::RefundPartial => "REFUND_PARTIAL",
            StockChangeKind::ShipOut => "SHIP_OUT",
            StockChangeKind::ShipIn => "SHIP_IN",
            StockChangeKind::OrderIn => "ORDER_IN",
            StockChangeKind::ReturnOut => "RETURN_OUT",
            StockChangeKind::ManualUpdate => "MANUAL_UPDATE",
        }
    }

    /// Default policy for the operation class this kind belongs to.
    ///
    /// Manual adjustments clamp; the infrastructure layer may override that
    /// per configuration.
    pub fn default_policy(&self) -> StockPolicy {
        match self {
            StockChangeKind::Sale | StockChangeKind::ShipOut | StockChangeKind::ReturnOut => {
                StockPolicy::RequireNonNegative
            }
            StockChangeKind::ManualUpdate => StockPolicy::ClampAtZero,
            StockChangeKind::RefundFull
            | StockChangeKind::RefundPartial
            | StockChangeKind::ShipIn
            | StockChangeKind::OrderIn => StockPolicy::Unchecked,
        }
    }
}

impl core::fmt::Display for StockChangeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one quantity change.
///
/// Never updated or deleted. `delta` is what was applied to the counter, so for
/// every key the running sum of deltas equals the live quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    pub id: LedgerEntryId,
    /// Global, monotonically increasing position in the ledger (gaps allowed).
    pub sequence: u64,
    pub key: StockKey,
    pub kind: StockChangeKind,
    pub delta: i64,
    /// Quantity after this change.
    pub resulting_quantity: i64,
    pub actor: UserId,
    pub recorded_at: DateTime<Utc>,
}

impl StockLedgerEntry {
    /// Quantity immediately before this change.
    pub fn previous_quantity(&self) -> i64 {
        self.resulting_quantity.saturating_sub(self.delta)
    }
}
