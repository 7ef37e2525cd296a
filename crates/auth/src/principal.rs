use serde::{Deserialize, Serialize};

use stockhub_core::{StoreId, UserId};

/// Which part of the organization an actor operates on behalf of.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "store_id", rename_all = "snake_case")]
pub enum Scope {
    /// Staff of a single store.
    Store(StoreId),
    /// Central hub staff; owns catalog-level quantity.
    Hq,
}

/// The acting user and the store (or HQ) they are scoped to.
///
/// Resolved by the request layer; this core only trusts what it is handed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub scope: Scope,
}

impl Actor {
    pub fn store(user_id: UserId, store_id: StoreId) -> Self {
        Self {
            user_id,
            scope: Scope::Store(store_id),
        }
    }

    pub fn hq(user_id: UserId) -> Self {
        Self {
            user_id,
            scope: Scope::Hq,
        }
    }

    /// The store this actor is scoped to, if any.
    pub fn store_id(&self) -> Option<StoreId> {
        match self.scope {
            Scope::Store(id) => Some(id),
            Scope::Hq => None,
        }
    }

    pub fn is_hq(&self) -> bool {
        matches!(self.scope, Scope::Hq)
    }
}
