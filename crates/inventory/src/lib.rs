//! Store stock table and stock ledger domain.
//!
//! Business rules for per-(store, variant) quantities, implemented purely as
//! deterministic domain logic (no IO, no locking, no storage). The live counter
//! and the append-only ledger are kept in step by the infrastructure layer,
//! which persists one `StockLedgerEntry` per `StockChanged` event.

pub mod audit;
pub mod ledger;
pub mod stock;

pub use audit::{audit, replay, LedgerDiscrepancy};
pub use ledger::{StockChangeKind, StockLedgerEntry, StockPolicy};
pub use stock::{ChangeStock, StockChanged, StockKey, StoreStock};
