//! Variant catalog records.
//!
//! The catalog is owned by an external collaborator. This core reads identity
//! and prices from it and only ever changes `hq_quantity`, during replenishment.

pub mod variant;

pub use variant::Variant;
