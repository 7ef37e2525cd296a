use thiserror::Error;

use stockhub_core::{DomainError, StoreId};

use crate::{Action, Actor, Scope};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("'{action}' requires acting for store {expected}")]
    WrongStore { action: Action, expected: StoreId },

    #[error("'{action}' is restricted to HQ")]
    HqOnly { action: Action },
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::Forbidden(value.to_string())
    }
}

/// Allow only an actor scoped to exactly `store`.
///
/// - No IO
/// - No panics
/// - No business logic (pure scoping check)
pub fn authorize_store(actor: &Actor, store: StoreId, action: Action) -> Result<(), AuthzError> {
    match actor.scope {
        Scope::Store(id) if id == store => Ok(()),
        _ => Err(AuthzError::WrongStore {
            action,
            expected: store,
        }),
    }
}

/// Allow only HQ-scoped actors.
pub fn authorize_hq(actor: &Actor, action: Action) -> Result<(), AuthzError> {
    if actor.is_hq() {
        Ok(())
    } else {
        Err(AuthzError::HqOnly { action })
    }
}

/// Administrative paths: the store's own staff or HQ.
pub fn authorize_store_or_hq(
    actor: &Actor,
    store: StoreId,
    action: Action,
) -> Result<(), AuthzError> {
    if actor.is_hq() {
        return Ok(());
    }
    authorize_store(actor, store, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockhub_core::UserId;

    #[test]
    fn store_actor_is_limited_to_its_own_store() {
        let mine = StoreId::new();
        let other = StoreId::new();
        let actor = Actor::store(UserId::new(), mine);

        assert!(authorize_store(&actor, mine, Action::ShipTransfer).is_ok());
        let err = authorize_store(&actor, other, Action::ShipTransfer).unwrap_err();
        assert_eq!(
            err,
            AuthzError::WrongStore {
                action: Action::ShipTransfer,
                expected: other
            }
        );
    }

    #[test]
    fn hq_cannot_act_as_a_store() {
        let actor = Actor::hq(UserId::new());
        assert!(authorize_store(&actor, StoreId::new(), Action::RecordSale).is_err());
        assert!(authorize_hq(&actor, Action::ApproveReplenishment).is_ok());
    }

    #[test]
    fn store_actor_cannot_approve() {
        let actor = Actor::store(UserId::new(), StoreId::new());
        let err: DomainError = authorize_hq(&actor, Action::ApproveReplenishment)
            .unwrap_err()
            .into();
        match err {
            DomainError::Forbidden(msg) if msg.contains("replenishment.approve") => {}
            other => panic!("expected Forbidden, got {other:?}"),
        }
    }

    #[test]
    fn administrative_paths_accept_hq_or_own_store() {
        let store = StoreId::new();
        assert!(authorize_store_or_hq(&Actor::hq(UserId::new()), store, Action::AdjustStock).is_ok());
        assert!(
            authorize_store_or_hq(&Actor::store(UserId::new(), store), store, Action::AdjustStock)
                .is_ok()
        );
        assert!(
            authorize_store_or_hq(
                &Actor::store(UserId::new(), StoreId::new()),
                store,
                Action::AdjustStock
            )
            .is_err()
        );
    }
}
