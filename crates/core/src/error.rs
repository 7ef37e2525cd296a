//! Domain error model.

use thiserror::Error;

use crate::id::{StoreId, VariantId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every mutating operation is all-or-nothing: when one of these is returned the
/// enclosing unit of work has been rolled back and nothing was persisted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing/non-positive quantity, malformed request.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Actor not authorized for the target store or role.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Transition attempted from a status that does not permit it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A deduction would drive a store quantity negative on a path that must not.
    #[error(
        "insufficient stock for variant {variant} at store {store} (available: {available}, requested: {requested})"
    )]
    InsufficientStock {
        store: StoreId,
        variant: VariantId,
        available: i64,
        requested: i64,
    },

    /// A referenced entity is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// The underlying storage failed (poisoned lock, lease timeout, ...).
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn insufficient_stock(
        store: StoreId,
        variant: VariantId,
        available: i64,
        requested: i64,
    ) -> Self {
        Self::InsufficientStock {
            store,
            variant,
            available,
            requested,
        }
    }

    /// Stable machine-readable kind, handy for logs and request-layer mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::InvalidState(_) => "invalid_state",
            DomainError::InsufficientStock { .. } => "insufficient_stock",
            DomainError::NotFound(_) => "not_found",
            DomainError::Persistence(_) => "persistence",
        }
    }
}
