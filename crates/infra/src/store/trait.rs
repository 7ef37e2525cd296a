use chrono::NaiveDate;

use stockhub_catalog::Variant;
use stockhub_core::{
    DomainResult, ReplenishmentId, SaleId, StoreId, TransferId, UserId, VariantId,
};
use stockhub_inventory::{StockChangeKind, StockKey, StockLedgerEntry, StoreStock};
use stockhub_replenishment::{Direction, ReplenishmentRequest};
use stockhub_sales::Sale;
use stockhub_transfers::Transfer;

/// A ledger entry staged by a unit of work. Identity and sequence are assigned
/// by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerAppend {
    pub key: StockKey,
    pub kind: StockChangeKind,
    pub delta: i64,
    pub resulting_quantity: i64,
    pub actor: UserId,
}

/// Rows, ledger and catalog as of one instant.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub rows: Vec<StoreStock>,
    pub entries: Vec<StockLedgerEntry>,
    pub variants: Vec<Variant>,
}

/// One all-or-nothing mutation.
///
/// `lock_*` methods take the row's lease (re-entrant within this unit of work)
/// before reading it, so the value returned is current and stays current until
/// commit. Writes are staged and only become visible on [`UnitOfWork::commit`].
/// Dropping without committing rolls back and releases every lease.
pub trait UnitOfWork {
    /// Read a stock row for update; absent rows come back empty (quantity 0).
    fn lock_stock(&mut self, key: StockKey) -> DomainResult<StoreStock>;

    fn put_stock(&mut self, row: StoreStock);

    fn append_ledger(&mut self, entry: LedgerAppend);

    /// Catalog read without a lease (prices, existence checks).
    fn variant(&mut self, id: VariantId) -> DomainResult<Option<Variant>>;

    fn lock_variant(&mut self, id: VariantId) -> DomainResult<Option<Variant>>;

    fn put_variant(&mut self, variant: Variant);

    fn lock_sale(&mut self, id: SaleId) -> DomainResult<Option<Sale>>;

    fn put_sale(&mut self, sale: Sale);

    fn lock_transfer(&mut self, id: TransferId) -> DomainResult<Option<Transfer>>;

    fn put_transfer(&mut self, transfer: Transfer);

    fn lock_replenishment(&mut self, id: ReplenishmentId) -> DomainResult<Option<ReplenishmentRequest>>;

    fn put_replenishment(&mut self, request: ReplenishmentRequest);

    /// Allocate the next receipt counter for `(store, date)`, starting at 1.
    ///
    /// Leases the counter until commit; take it after every other lease.
    fn next_daily_number(&mut self, store: StoreId, date: NaiveDate) -> DomainResult<u32>;

    fn commit(self: Box<Self>) -> DomainResult<()>;
}

/// Storage backend.
///
/// Reads return committed state only. Implementations must map their own
/// failures (poisoned locks, lease timeouts, IO) to `DomainError::Persistence`.
pub trait StockBackend: Send + Sync {
    fn begin(&self) -> DomainResult<Box<dyn UnitOfWork + '_>>;

    /// Insert or replace a catalog record.
    fn upsert_variant(&self, variant: Variant) -> DomainResult<()>;

    fn variant(&self, id: VariantId) -> DomainResult<Option<Variant>>;

    fn stock(&self, key: StockKey) -> DomainResult<Option<StoreStock>>;

    fn store_stock(&self, store: StoreId) -> DomainResult<Vec<StoreStock>>;

    /// Ledger entries in sequence order, optionally for one key.
    fn ledger(&self, key: Option<StockKey>) -> DomainResult<Vec<StockLedgerEntry>>;

    fn snapshot(&self) -> DomainResult<LedgerSnapshot>;

    fn sale(&self, id: SaleId) -> DomainResult<Option<Sale>>;

    /// Sales of `store` dated within `[from, to]`, in no particular order.
    fn sales(&self, store: StoreId, from: NaiveDate, to: NaiveDate) -> DomainResult<Vec<Sale>>;

    fn transfer(&self, id: TransferId) -> DomainResult<Option<Transfer>>;

    /// Transfers where `store` is either side (every transfer for `None`), in no
    /// particular order.
    fn transfers(&self, store: Option<StoreId>) -> DomainResult<Vec<Transfer>>;

    fn replenishment(&self, id: ReplenishmentId) -> DomainResult<Option<ReplenishmentRequest>>;

    /// Requests in `direction`, optionally for one store, in no particular order.
    fn replenishments(
        &self,
        store: Option<StoreId>,
        direction: Direction,
    ) -> DomainResult<Vec<ReplenishmentRequest>>;
}
