//! Persistence boundary for stock, ledger and workflow records.
//!
//! Services talk to a [`StockBackend`] for committed reads and open a
//! [`UnitOfWork`] for every mutation. A unit of work stages its writes, holds
//! the leases it took, and either commits everything or, when dropped, nothing.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryStockBackend;
pub use r#trait::{LedgerAppend, LedgerSnapshot, StockBackend, UnitOfWork};
