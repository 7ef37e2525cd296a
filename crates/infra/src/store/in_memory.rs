use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};

use stockhub_catalog::Variant;
use stockhub_core::{
    DomainError, DomainResult, LedgerEntryId, ReplenishmentId, SaleId, StoreId, TransferId,
    VariantId,
};
use stockhub_inventory::{StockKey, StockLedgerEntry, StoreStock};
use stockhub_replenishment::{Direction, ReplenishmentRequest};
use stockhub_sales::Sale;
use stockhub_transfers::Transfer;

use super::r#trait::{LedgerAppend, LedgerSnapshot, StockBackend, UnitOfWork};
use crate::config::StockConfig;
use crate::lease::{LeaseKey, LeaseTable};

#[derive(Debug, Default)]
struct Tables {
    variants: HashMap<VariantId, Variant>,
    stock: BTreeMap<StockKey, StoreStock>,
    ledger: Vec<StockLedgerEntry>,
    next_sequence: u64,
    sales: HashMap<SaleId, Sale>,
    transfers: HashMap<TransferId, Transfer>,
    replenishments: HashMap<ReplenishmentId, ReplenishmentRequest>,
    daily_counters: HashMap<(StoreId, NaiveDate), u32>,
}

/// In-memory backend.
///
/// Intended for tests/dev and single-process deployments. Committed state lives
/// behind one `RwLock`; row-level exclusion comes from the lease table, so the
/// table lock is only held for the duration of a read or a commit.
#[derive(Debug)]
pub struct InMemoryStockBackend {
    tables: RwLock<Tables>,
    leases: LeaseTable,
    lease_timeout: Duration,
}

impl Default for InMemoryStockBackend {
    fn default() -> Self {
        Self::new(&StockConfig::default())
    }
}

impl InMemoryStockBackend {
    pub fn new(config: &StockConfig) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            leases: LeaseTable::new(),
            lease_timeout: config.lease_timeout,
        }
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| DomainError::persistence("lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| DomainError::persistence("lock poisoned"))
    }
}

impl StockBackend for InMemoryStockBackend {
    fn begin(&self) -> DomainResult<Box<dyn UnitOfWork + '_>> {
        Ok(Box::new(InMemoryUnitOfWork {
            backend: self,
            held: HashSet::new(),
            staged: Staged::default(),
        }))
    }

    fn upsert_variant(&self, variant: Variant) -> DomainResult<()> {
        variant.validate()?;
        self.write()?.variants.insert(variant.id, variant);
        Ok(())
    }

    fn variant(&self, id: VariantId) -> DomainResult<Option<Variant>> {
        Ok(self.read()?.variants.get(&id).cloned())
    }

    fn stock(&self, key: StockKey) -> DomainResult<Option<StoreStock>> {
        Ok(self.read()?.stock.get(&key).cloned())
    }

    fn store_stock(&self, store: StoreId) -> DomainResult<Vec<StoreStock>> {
        Ok(self
            .read()?
            .stock
            .values()
            .filter(|row| row.key().store == store)
            .cloned()
            .collect())
    }

    fn ledger(&self, key: Option<StockKey>) -> DomainResult<Vec<StockLedgerEntry>> {
        Ok(self
            .read()?
            .ledger
            .iter()
            .filter(|e| key.is_none_or(|k| e.key == k))
            .cloned()
            .collect())
    }

    fn snapshot(&self) -> DomainResult<LedgerSnapshot> {
        let tables = self.read()?;
        Ok(LedgerSnapshot {
            rows: tables.stock.values().cloned().collect(),
            entries: tables.ledger.clone(),
            variants: tables.variants.values().cloned().collect(),
        })
    }

    fn sale(&self, id: SaleId) -> DomainResult<Option<Sale>> {
        Ok(self.read()?.sales.get(&id).cloned())
    }

    fn sales(&self, store: StoreId, from: NaiveDate, to: NaiveDate) -> DomainResult<Vec<Sale>> {
        Ok(self
            .read()?
            .sales
            .values()
            .filter(|s| s.store() == Some(store) && (from..=to).contains(&s.sale_date()))
            .cloned()
            .collect())
    }

    fn transfer(&self, id: TransferId) -> DomainResult<Option<Transfer>> {
        Ok(self.read()?.transfers.get(&id).cloned())
    }

    fn transfers(&self, store: Option<StoreId>) -> DomainResult<Vec<Transfer>> {
        Ok(self
            .read()?
            .transfers
            .values()
            .filter(|t| store.is_none() || t.source() == store || t.target() == store)
            .cloned()
            .collect())
    }

    fn replenishment(&self, id: ReplenishmentId) -> DomainResult<Option<ReplenishmentRequest>> {
        Ok(self.read()?.replenishments.get(&id).cloned())
    }

    fn replenishments(
        &self,
        store: Option<StoreId>,
        direction: Direction,
    ) -> DomainResult<Vec<ReplenishmentRequest>> {
        Ok(self
            .read()?
            .replenishments
            .values()
            .filter(|r| r.direction() == direction)
            .filter(|r| store.is_none() || r.store() == store)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
struct Staged {
    stock: HashMap<StockKey, StoreStock>,
    ledger: Vec<(LedgerAppend, DateTime<Utc>)>,
    variants: HashMap<VariantId, Variant>,
    sales: HashMap<SaleId, Sale>,
    transfers: HashMap<TransferId, Transfer>,
    replenishments: HashMap<ReplenishmentId, ReplenishmentRequest>,
    daily_counters: HashMap<(StoreId, NaiveDate), u32>,
}

struct InMemoryUnitOfWork<'a> {
    backend: &'a InMemoryStockBackend,
    held: HashSet<LeaseKey>,
    staged: Staged,
}

impl InMemoryUnitOfWork<'_> {
    fn lock(&mut self, key: LeaseKey) -> DomainResult<()> {
        if self.held.contains(&key) {
            return Ok(());
        }
        self.backend.leases.acquire(key, self.backend.lease_timeout)?;
        self.held.insert(key);
        Ok(())
    }
}

impl UnitOfWork for InMemoryUnitOfWork<'_> {
    fn lock_stock(&mut self, key: StockKey) -> DomainResult<StoreStock> {
        self.lock(LeaseKey::Stock(key))?;
        if let Some(row) = self.staged.stock.get(&key) {
            return Ok(row.clone());
        }
        let committed = self.backend.read()?.stock.get(&key).cloned();
        Ok(committed.unwrap_or_else(|| StoreStock::empty(key)))
    }

    fn put_stock(&mut self, row: StoreStock) {
        self.staged.stock.insert(row.key(), row);
    }

    fn append_ledger(&mut self, entry: LedgerAppend) {
        self.staged.ledger.push((entry, Utc::now()));
    }

    fn variant(&mut self, id: VariantId) -> DomainResult<Option<Variant>> {
        if let Some(v) = self.staged.variants.get(&id) {
            return Ok(Some(v.clone()));
        }
        Ok(self.backend.read()?.variants.get(&id).cloned())
    }

    fn lock_variant(&mut self, id: VariantId) -> DomainResult<Option<Variant>> {
        self.lock(LeaseKey::Variant(id))?;
        self.variant(id)
    }

    fn put_variant(&mut self, variant: Variant) {
        self.staged.variants.insert(variant.id, variant);
    }

    fn lock_sale(&mut self, id: SaleId) -> DomainResult<Option<Sale>> {
        self.lock(LeaseKey::Sale(id))?;
        if let Some(s) = self.staged.sales.get(&id) {
            return Ok(Some(s.clone()));
        }
        Ok(self.backend.read()?.sales.get(&id).cloned())
    }

    fn put_sale(&mut self, sale: Sale) {
        self.staged.sales.insert(sale.id_typed(), sale);
    }

    fn lock_transfer(&mut self, id: TransferId) -> DomainResult<Option<Transfer>> {
        self.lock(LeaseKey::Transfer(id))?;
        if let Some(t) = self.staged.transfers.get(&id) {
            return Ok(Some(t.clone()));
        }
        Ok(self.backend.read()?.transfers.get(&id).cloned())
    }

    fn put_transfer(&mut self, transfer: Transfer) {
        self.staged.transfers.insert(transfer.id_typed(), transfer);
    }

    fn lock_replenishment(&mut self, id: ReplenishmentId) -> DomainResult<Option<ReplenishmentRequest>> {
        self.lock(LeaseKey::Replenishment(id))?;
        if let Some(r) = self.staged.replenishments.get(&id) {
            return Ok(Some(r.clone()));
        }
        Ok(self.backend.read()?.replenishments.get(&id).cloned())
    }

    fn put_replenishment(&mut self, request: ReplenishmentRequest) {
        self.staged.replenishments.insert(request.id_typed(), request);
    }

    fn next_daily_number(&mut self, store: StoreId, date: NaiveDate) -> DomainResult<u32> {
        self.lock(LeaseKey::SaleCounter(store, date))?;
        let current = match self.staged.daily_counters.get(&(store, date)) {
            Some(n) => *n,
            None => self
                .backend
                .read()?
                .daily_counters
                .get(&(store, date))
                .copied()
                .unwrap_or(0),
        };
        let next = current + 1;
        self.staged.daily_counters.insert((store, date), next);
        Ok(next)
    }

    fn commit(mut self: Box<Self>) -> DomainResult<()> {
        let staged = std::mem::take(&mut self.staged);
        let mut tables = self.backend.write()?;

        tables.stock.extend(staged.stock);
        for (entry, recorded_at) in staged.ledger {
            tables.next_sequence += 1;
            let sequence = tables.next_sequence;
            tables.ledger.push(StockLedgerEntry {
                id: LedgerEntryId::new(),
                sequence,
                key: entry.key,
                kind: entry.kind,
                delta: entry.delta,
                resulting_quantity: entry.resulting_quantity,
                actor: entry.actor,
                recorded_at,
            });
        }
        tables.variants.extend(staged.variants);
        tables.sales.extend(staged.sales);
        tables.transfers.extend(staged.transfers);
        tables.replenishments.extend(staged.replenishments);
        tables.daily_counters.extend(staged.daily_counters);

        // Leases are released when `self` drops, after the tables guard.
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork<'_> {
    fn drop(&mut self) {
        self.backend.leases.release_all(self.held.iter());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockhub_core::{Aggregate, Money, UserId};
    use stockhub_inventory::{ChangeStock, StockChangeKind};

    fn test_key() -> StockKey {
        StockKey::new(StoreId::new(), VariantId::new())
    }

    fn staged_change(tx: &mut dyn UnitOfWork, key: StockKey, delta: i64) {
        let mut row = tx.lock_stock(key).unwrap();
        row.execute(&ChangeStock::new(key, StockChangeKind::OrderIn, delta))
            .unwrap();
        tx.append_ledger(LedgerAppend {
            key,
            kind: StockChangeKind::OrderIn,
            delta,
            resulting_quantity: row.quantity(),
            actor: UserId::new(),
        });
        tx.put_stock(row);
    }

    #[test]
    fn commit_publishes_rows_and_sequenced_ledger() {
        let backend = InMemoryStockBackend::default();
        let (a, b) = (test_key(), test_key());

        let mut tx = backend.begin().unwrap();
        staged_change(tx.as_mut(), a, 5);
        staged_change(tx.as_mut(), b, 2);
        assert!(backend.stock(a).unwrap().is_none());
        tx.commit().unwrap();

        assert_eq!(backend.stock(a).unwrap().unwrap().quantity(), 5);
        let ledger = backend.ledger(None).unwrap();
        assert_eq!(ledger.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(backend.ledger(Some(b)).unwrap().len(), 1);
    }

    #[test]
    fn dropped_unit_of_work_rolls_back_and_releases() {
        let backend = InMemoryStockBackend::default();
        let key = test_key();

        {
            let mut tx = backend.begin().unwrap();
            staged_change(tx.as_mut(), key, 5);
            assert!(backend.leases.is_held(&LeaseKey::Stock(key)));
        }

        assert!(backend.stock(key).unwrap().is_none());
        assert!(backend.ledger(None).unwrap().is_empty());
        assert!(!backend.leases.is_held(&LeaseKey::Stock(key)));
    }

    #[test]
    fn leases_are_reentrant_within_a_unit_of_work() {
        let backend = InMemoryStockBackend::default();
        let key = test_key();
        let mut tx = backend.begin().unwrap();
        tx.lock_stock(key).unwrap();
        tx.lock_stock(key).unwrap();
    }

    #[test]
    fn daily_numbers_only_advance_on_commit() {
        let backend = InMemoryStockBackend::default();
        let store = StoreId::new();
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        {
            let mut tx = backend.begin().unwrap();
            assert_eq!(tx.next_daily_number(store, date).unwrap(), 1);
        }
        let mut tx = backend.begin().unwrap();
        assert_eq!(tx.next_daily_number(store, date).unwrap(), 1);
        assert_eq!(tx.next_daily_number(store, date).unwrap(), 2);
        tx.commit().unwrap();

        let mut tx = backend.begin().unwrap();
        assert_eq!(tx.next_daily_number(store, date).unwrap(), 3);
    }

    #[test]
    fn upsert_variant_validates_record() {
        let backend = InMemoryStockBackend::default();
        let bad = Variant::new(VariantId::new(), "", "JK-1", "Jacket")
            .with_prices(Money::new(1), Money::new(1));
        assert!(matches!(
            backend.upsert_variant(bad),
            Err(DomainError::Validation(_))
        ));
    }
}
