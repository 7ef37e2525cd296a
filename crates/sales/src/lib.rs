//! Point-of-sale transactions and refunds.
//!
//! This crate contains business rules for sales, implemented purely as
//! deterministic domain logic (no IO, no storage). Stock deductions and
//! restorations implied by the events are carried out by the infrastructure
//! layer in the same unit of work.

pub mod sale;

pub use sale::{
    ItemDraw, ItemsRefunded, PaymentMethod, PricedLine, RecordSale, RefundFull, RefundLine,
    RefundPartial, RestoredLine, Sale, SaleCommand, SaleEvent, SaleItem, SaleRecorded,
    SaleRefunded, SaleStatus,
};
