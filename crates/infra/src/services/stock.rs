//! Stock administration: manual corrections, physical counts, stock queries.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use stockhub_auth::{authorize_store_or_hq, Action, Actor};
use stockhub_core::{DomainError, DomainResult, StoreId, VariantId};
use stockhub_inventory::{StockChangeKind, StockKey, StockLedgerEntry, StoreStock};

use crate::config::StockConfig;
use crate::ledger::apply_change_with_policy;
use crate::store::StockBackend;

/// Result of a manual adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustmentOutcome {
    pub quantity: i64,
    /// What was recorded in the ledger (differs from the request when clamped).
    pub applied_delta: i64,
    pub requested_delta: i64,
    /// System quantity minus the last physical count, if one was recorded.
    pub discrepancy: Option<i64>,
}

#[derive(Debug)]
pub struct StockAdminService<B> {
    backend: Arc<B>,
    config: StockConfig,
}

impl<B> Clone for StockAdminService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B: StockBackend> StockAdminService<B> {
    pub fn new(backend: Arc<B>, config: StockConfig) -> Self {
        Self { backend, config }
    }

    /// Shift a store quantity by hand (kind MANUAL_UPDATE).
    #[instrument(
        skip(self, actor),
        fields(user = %actor.user_id, store = %store, variant = %variant),
        err
    )]
    pub fn adjust_stock(
        &self,
        actor: &Actor,
        store: StoreId,
        variant: VariantId,
        delta: i64,
    ) -> DomainResult<AdjustmentOutcome> {
        authorize_store_or_hq(actor, store, Action::AdjustStock)?;

        let mut tx = self.backend.begin()?;
        if tx.variant(variant)?.is_none() {
            return Err(DomainError::not_found(format!("variant {variant}")));
        }

        let key = StockKey::new(store, variant);
        let changed = apply_change_with_policy(
            tx.as_mut(),
            key,
            StockChangeKind::ManualUpdate,
            delta,
            self.config.manual_adjust_policy.stock_policy(),
            actor.user_id,
        )?;
        let discrepancy = tx.lock_stock(key)?.discrepancy();
        tx.commit()?;

        info!(
            requested = changed.requested_delta,
            applied = changed.applied_delta,
            quantity = changed.resulting_quantity,
            "stock adjusted"
        );
        Ok(AdjustmentOutcome {
            quantity: changed.resulting_quantity,
            applied_delta: changed.applied_delta,
            requested_delta: changed.requested_delta,
            discrepancy,
        })
    }

    /// Record (or clear) a physical count. Not ledgered; quantity untouched.
    #[instrument(
        skip(self, actor),
        fields(user = %actor.user_id, store = %store, variant = %variant),
        err
    )]
    pub fn set_actual_stock(
        &self,
        actor: &Actor,
        store: StoreId,
        variant: VariantId,
        actual: Option<i64>,
    ) -> DomainResult<Option<i64>> {
        authorize_store_or_hq(actor, store, Action::RecordActualStock)?;

        let mut tx = self.backend.begin()?;
        if tx.variant(variant)?.is_none() {
            return Err(DomainError::not_found(format!("variant {variant}")));
        }

        let mut row = tx.lock_stock(StockKey::new(store, variant))?;
        let discrepancy = row.record_actual_stock(actual)?;
        tx.put_stock(row);
        tx.commit()?;

        info!(?actual, ?discrepancy, "physical count recorded");
        Ok(discrepancy)
    }

    /// Current quantity; 0 for a pair that was never stocked.
    pub fn stock(&self, store: StoreId, variant: VariantId) -> DomainResult<i64> {
        Ok(self
            .backend
            .stock(StockKey::new(store, variant))?
            .map(|row| row.quantity())
            .unwrap_or(0))
    }

    pub fn store_stock(&self, store: StoreId) -> DomainResult<Vec<StoreStock>> {
        self.backend.store_stock(store)
    }

    /// Every change to one pair, oldest first.
    pub fn ledger_history(
        &self,
        store: StoreId,
        variant: VariantId,
    ) -> DomainResult<Vec<StockLedgerEntry>> {
        self.backend.ledger(Some(StockKey::new(store, variant)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockhub_catalog::Variant;
    use stockhub_core::UserId;

    use crate::config::ManualAdjustPolicy;
    use crate::store::InMemoryStockBackend;

    fn setup(config: StockConfig) -> (StockAdminService<InMemoryStockBackend>, VariantId) {
        let backend = Arc::new(InMemoryStockBackend::new(&config));
        let variant = VariantId::new();
        backend
            .upsert_variant(Variant::new(variant, "8800000000004", "PT-1", "Pants"))
            .unwrap();
        (StockAdminService::new(backend, config), variant)
    }

    #[test]
    fn clamped_adjustment_reports_requested_and_applied() {
        let (service, variant) = setup(StockConfig::default());
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);

        service.adjust_stock(&actor, store, variant, 3).unwrap();
        let outcome = service.adjust_stock(&actor, store, variant, -5).unwrap();

        assert_eq!(
            outcome,
            AdjustmentOutcome {
                quantity: 0,
                applied_delta: -3,
                requested_delta: -5,
                discrepancy: None,
            }
        );
        let history = service.ledger_history(store, variant).unwrap();
        assert_eq!(history.iter().map(|e| e.delta).collect::<Vec<_>>(), vec![3, -3]);
    }

    #[test]
    fn reject_policy_fails_instead_of_clamping() {
        let config = StockConfig::default().with_manual_adjust_policy(ManualAdjustPolicy::Reject);
        let (service, variant) = setup(config);
        let store = StoreId::new();
        let actor = Actor::hq(UserId::new());

        service.adjust_stock(&actor, store, variant, 3).unwrap();
        match service.adjust_stock(&actor, store, variant, -5) {
            Err(DomainError::InsufficientStock { available: 3, requested: 5, .. }) => {}
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(service.stock(store, variant).unwrap(), 3);
    }

    #[test]
    fn extreme_deltas_fail_cleanly() {
        let config = StockConfig::default().with_manual_adjust_policy(ManualAdjustPolicy::Reject);
        let (service, variant) = setup(config);
        let store = StoreId::new();
        let actor = Actor::hq(UserId::new());
        service.adjust_stock(&actor, store, variant, 3).unwrap();

        assert!(matches!(
            service.adjust_stock(&actor, store, variant, i64::MIN),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            service.adjust_stock(&actor, store, variant, i64::MAX),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(service.stock(store, variant).unwrap(), 3);
        assert_eq!(service.ledger_history(store, variant).unwrap().len(), 1);
    }

    #[test]
    fn clamped_no_op_is_reported_but_not_ledgered() {
        let (service, variant) = setup(StockConfig::default());
        let store = StoreId::new();
        let actor = Actor::hq(UserId::new());

        let outcome = service.adjust_stock(&actor, store, variant, -4).unwrap();
        assert_eq!(
            outcome,
            AdjustmentOutcome {
                quantity: 0,
                applied_delta: 0,
                requested_delta: -4,
                discrepancy: None,
            }
        );
        assert!(service.ledger_history(store, variant).unwrap().is_empty());
    }

    #[test]
    fn other_store_cannot_adjust() {
        let (service, variant) = setup(StockConfig::default());
        let err = service
            .adjust_stock(&Actor::store(UserId::new(), StoreId::new()), StoreId::new(), variant, 1)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn physical_count_reports_discrepancy() {
        let (service, variant) = setup(StockConfig::default());
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);
        service.adjust_stock(&actor, store, variant, 7).unwrap();

        assert_eq!(service.set_actual_stock(&actor, store, variant, Some(5)).unwrap(), Some(2));
        assert_eq!(service.stock(store, variant).unwrap(), 7);
        assert_eq!(service.ledger_history(store, variant).unwrap().len(), 1);

        let outcome = service.adjust_stock(&actor, store, variant, -2).unwrap();
        assert_eq!(outcome.discrepancy, Some(0));

        assert!(matches!(
            service.set_actual_stock(&actor, store, variant, Some(-1)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn unstocked_pair_reads_zero() {
        let (service, variant) = setup(StockConfig::default());
        let store = StoreId::new();
        assert_eq!(service.stock(store, variant).unwrap(), 0);
        assert!(service.store_stock(store).unwrap().is_empty());
    }
}
