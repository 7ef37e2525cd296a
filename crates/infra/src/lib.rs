//! Infrastructure layer: storage backend, concurrency guard, configuration and
//! the workflow services built on them.

pub mod config;
pub mod lease;
pub mod ledger;
pub mod services;
pub mod store;


pub use config::{ConfigError, ManualAdjustPolicy, StockConfig};
pub use lease::{LeaseKey, LeaseTable};
pub use ledger::{apply_change, apply_change_with_policy, apply_effects, StockEffect};
pub use services::{
    AdjustmentOutcome, LedgerAuditService, NewSale, ReplenishmentService, SaleLine, SaleService,
    SalesStats, StockAdminService, TransferService,
};
pub use store::{InMemoryStockBackend, LedgerAppend, LedgerSnapshot, StockBackend, UnitOfWork};
