use serde::{Deserialize, Serialize};

use stockhub_core::{Aggregate, AggregateRoot, DomainError, DomainResult, StoreId, VariantId};

use crate::ledger::{StockChangeKind, StockPolicy};

/// The (store, variant) pair a counter and its ledger are keyed by.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub store: StoreId,
    pub variant: VariantId,
}

impl StockKey {
    pub fn new(store: StoreId, variant: VariantId) -> Self {
        Self { store, variant }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.store, self.variant)
    }
}

/// Aggregate root: one row of the store stock table.
///
/// Rows are created lazily with quantity 0 on first reference and live forever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStock {
    key: StockKey,
    quantity: i64,
    /// Last physical count, for reconciliation only.
    actual_stock: Option<i64>,
    version: u64,
}

impl StoreStock {
    /// A not-yet-persisted row (quantity 0).
    pub fn empty(key: StockKey) -> Self {
        Self {
            key,
            quantity: 0,
            actual_stock: None,
            version: 0,
        }
    }

    pub fn key(&self) -> StockKey {
        self.key
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn actual_stock(&self) -> Option<i64> {
        self.actual_stock
    }

    /// System quantity minus the last physical count.
    pub fn discrepancy(&self) -> Option<i64> {
        self.actual_stock.map(|actual| self.quantity - actual)
    }

    /// Record (or clear) a physical count. Does not touch the quantity or the ledger.
    pub fn record_actual_stock(&mut self, actual: Option<i64>) -> DomainResult<Option<i64>> {
        if let Some(count) = actual {
            if count < 0 {
                return Err(DomainError::validation("physical count cannot be negative"));
            }
        }
        self.actual_stock = actual;
        self.version += 1;
        Ok(self.discrepancy())
    }
}

impl AggregateRoot for StoreStock {
    type Id = StockKey;

    fn id(&self) -> &Self::Id {
        &self.key
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: change the quantity by a signed delta under a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeStock {
    pub key: StockKey,
    pub kind: StockChangeKind,
    pub delta: i64,
    pub policy: StockPolicy,
}

impl ChangeStock {
    /// Change using the kind's default policy.
    pub fn new(key: StockKey, kind: StockChangeKind, delta: i64) -> Self {
        Self {
            key,
            kind,
            delta,
            policy: kind.default_policy(),
        }
    }

    pub fn with_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// Event: the quantity changed. Becomes exactly one ledger entry.
///
/// Not emitted when a clamp leaves the quantity where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChanged {
    pub key: StockKey,
    pub kind: StockChangeKind,
    /// What the caller asked for; differs from `applied_delta` only when clamped.
    pub requested_delta: i64,
    pub applied_delta: i64,
    pub resulting_quantity: i64,
}

impl Aggregate for StoreStock {
    type Command = ChangeStock;
    type Event = StockChanged;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        self.quantity = event.resulting_quantity;

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, cmd: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        if cmd.key != self.key {
            return Err(DomainError::validation(format!(
                "stock key mismatch (row {}, command {})",
                self.key, cmd.key
            )));
        }
        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }

        let proposed = self.quantity.checked_add(cmd.delta).ok_or_else(|| {
            DomainError::validation(format!("delta {} overflows quantity of {}", cmd.delta, self.key))
        })?;
        let resulting = match cmd.policy {
            StockPolicy::RequireNonNegative if proposed < 0 => {
                let requested = cmd
                    .delta
                    .checked_neg()
                    .ok_or_else(|| DomainError::validation("delta is out of range"))?;
                return Err(DomainError::insufficient_stock(
                    self.key.store,
                    self.key.variant,
                    self.quantity,
                    requested,
                ));
            }
            StockPolicy::ClampAtZero => proposed.max(0),
            StockPolicy::RequireNonNegative | StockPolicy::Unchecked => proposed,
        };

        // A deduction clamped away entirely changes nothing and is not ledgered.
        if resulting == self.quantity {
            return Ok(vec![]);
        }

        Ok(vec![StockChanged {
            key: self.key,
            kind: cmd.kind,
            requested_delta: cmd.delta,
            applied_delta: resulting - self.quantity,
            resulting_quantity: resulting,
        }])
    }
}
