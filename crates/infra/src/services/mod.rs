//! Application services: one per workflow, each composing a `StockBackend`.
//!
//! Every mutating call runs in its own unit of work: load under leases, let the
//! aggregate decide, apply the implied stock changes through the ledger, stage
//! the aggregate, commit. Any error drops the unit of work and nothing persists.

pub mod audit;
pub mod replenishment;
pub mod sales;
pub mod stock;
pub mod transfers;

pub use audit::LedgerAuditService;
pub use replenishment::ReplenishmentService;
pub use sales::{NewSale, SaleLine, SaleService, SalesStats};
pub use stock::{AdjustmentOutcome, StockAdminService};
pub use transfers::TransferService;
