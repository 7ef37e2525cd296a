//! HQ ↔ store replenishment: store orders and store returns.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, instrument};

use stockhub_auth::Actor;
use stockhub_core::{Aggregate, DomainError, DomainResult, ReplenishmentId, StoreId, VariantId};
use stockhub_inventory::{StockChangeKind, StockKey};
use stockhub_replenishment::{
    ApproveRequest, CreateRequest, Direction, RejectRequest, ReplenishmentCommand,
    ReplenishmentEvent, ReplenishmentRequest,
};

use crate::ledger::apply_change;
use crate::store::{StockBackend, UnitOfWork};

#[derive(Debug)]
pub struct ReplenishmentService<B> {
    backend: Arc<B>,
}

impl<B> Clone for ReplenishmentService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: StockBackend> ReplenishmentService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Raised by store staff for their own store.
    #[instrument(
        skip(self, actor, note),
        fields(user = %actor.user_id, direction = direction.as_str(), variant = %variant),
        err
    )]
    pub fn create(
        &self,
        actor: &Actor,
        direction: Direction,
        variant: VariantId,
        quantity: i64,
        requested_for: NaiveDate,
        note: Option<String>,
    ) -> DomainResult<ReplenishmentRequest> {
        let store = actor
            .store_id()
            .ok_or_else(|| DomainError::forbidden("replenishment requests are raised by a store"))?;

        let mut tx = self.backend.begin()?;
        if tx.variant(variant)?.is_none() {
            return Err(DomainError::not_found(format!("variant {variant}")));
        }

        let mut request = ReplenishmentRequest::empty(ReplenishmentId::new());
        request.execute(&ReplenishmentCommand::Create(CreateRequest {
            request_id: request.id_typed(),
            direction,
            store,
            variant,
            quantity,
            requested_for,
            note,
            actor: *actor,
            occurred_at: Utc::now(),
        }))?;

        tx.put_replenishment(request.clone());
        tx.commit()?;

        info!(request_id = %request.id_typed(), store = %store, quantity, "replenishment requested");
        Ok(request)
    }

    /// HQ settles the request with `confirmed_quantity` and moves the stock.
    #[instrument(skip(self, actor), fields(user = %actor.user_id), err)]
    pub fn approve(
        &self,
        actor: &Actor,
        request_id: ReplenishmentId,
        confirmed_quantity: i64,
    ) -> DomainResult<ReplenishmentRequest> {
        let mut tx = self.backend.begin()?;
        let mut request = Self::load(tx.as_mut(), request_id)?;

        let events = request.execute(&ReplenishmentCommand::Approve(ApproveRequest {
            confirmed_quantity,
            actor: *actor,
            occurred_at: Utc::now(),
        }))?;

        for event in &events {
            if let ReplenishmentEvent::Approved(e) = event {
                let mut variant = tx
                    .lock_variant(e.variant)?
                    .ok_or_else(|| DomainError::not_found(format!("variant {}", e.variant)))?;
                let key = StockKey::new(e.store, e.variant);
                let kind = match e.direction {
                    Direction::Order => StockChangeKind::OrderIn,
                    Direction::Return => StockChangeKind::ReturnOut,
                };

                // A return fails here when the store cannot cover it.
                apply_change(tx.as_mut(), key, kind, e.store_delta(), actor.user_id)?;
                let hq_quantity = variant.shift_hq_quantity(e.hq_delta())?;
                tx.put_variant(variant);

                info!(
                    request_id = %request_id,
                    direction = e.direction.as_str(),
                    confirmed = e.confirmed_quantity,
                    hq_quantity,
                    "replenishment approved"
                );
            }
        }

        tx.put_replenishment(request.clone());
        tx.commit()?;
        Ok(request)
    }

    #[instrument(skip(self, actor), fields(user = %actor.user_id), err)]
    pub fn reject(
        &self,
        actor: &Actor,
        request_id: ReplenishmentId,
    ) -> DomainResult<ReplenishmentRequest> {
        let mut tx = self.backend.begin()?;
        let mut request = Self::load(tx.as_mut(), request_id)?;

        request.execute(&ReplenishmentCommand::Reject(RejectRequest {
            actor: *actor,
            occurred_at: Utc::now(),
        }))?;

        tx.put_replenishment(request.clone());
        tx.commit()?;

        info!(request_id = %request_id, "replenishment rejected");
        Ok(request)
    }

    fn load(tx: &mut dyn UnitOfWork, request_id: ReplenishmentId) -> DomainResult<ReplenishmentRequest> {
        tx.lock_replenishment(request_id)?.ok_or_else(|| {
            DomainError::not_found(format!("replenishment request {request_id}"))
        })
    }

    pub fn request(&self, request_id: ReplenishmentId) -> DomainResult<ReplenishmentRequest> {
        self.backend.replenishment(request_id)?.ok_or_else(|| {
            DomainError::not_found(format!("replenishment request {request_id}"))
        })
    }

    /// Requests in `direction`, for one store or all of them, newest first.
    pub fn requests(
        &self,
        store: Option<StoreId>,
        direction: Direction,
    ) -> DomainResult<Vec<ReplenishmentRequest>> {
        let mut requests = self.backend.replenishments(store, direction)?;
        requests.sort_by(|a, b| {
            (b.requested_for(), b.created_at()).cmp(&(a.requested_for(), a.created_at()))
        });
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockhub_catalog::Variant;
    use stockhub_core::UserId;
    use stockhub_replenishment::RequestStatus;

    use crate::store::InMemoryStockBackend;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn setup(hq_quantity: i64) -> (Arc<InMemoryStockBackend>, ReplenishmentService<InMemoryStockBackend>, VariantId) {
        let backend = Arc::new(InMemoryStockBackend::default());
        let variant = VariantId::new();
        backend
            .upsert_variant(
                Variant::new(variant, "8800000000003", "CT-1", "Coat").with_hq_quantity(hq_quantity),
            )
            .unwrap();
        (backend.clone(), ReplenishmentService::new(backend), variant)
    }

    #[test]
    fn hq_cannot_raise_requests() {
        let (_, service, variant) = setup(10);
        let err = service
            .create(&Actor::hq(UserId::new()), Direction::Order, variant, 1, test_date(), None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn approval_may_drive_hq_negative() {
        let (backend, service, variant) = setup(2);
        let store = StoreId::new();
        let request = service
            .create(&Actor::store(UserId::new(), store), Direction::Order, variant, 5, test_date(), None)
            .unwrap();

        let approved = service
            .approve(&Actor::hq(UserId::new()), request.id_typed(), 5)
            .unwrap();
        assert_eq!(approved.status(), RequestStatus::Approved);
        assert_eq!(backend.variant(variant).unwrap().unwrap().hq_quantity, -3);
        assert_eq!(
            backend.stock(StockKey::new(store, variant)).unwrap().unwrap().quantity(),
            5
        );
    }

    #[test]
    fn overflowing_confirmation_changes_nothing() {
        let (backend, service, variant) = setup(-10);
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);
        let hq = Actor::hq(UserId::new());

        let first = service
            .create(&actor, Direction::Order, variant, 5, test_date(), None)
            .unwrap();
        service.approve(&hq, first.id_typed(), 5).unwrap();

        // Store side overflows.
        let order = service
            .create(&actor, Direction::Order, variant, 1, test_date(), None)
            .unwrap();
        match service.approve(&hq, order.id_typed(), i64::MAX) {
            Err(DomainError::Validation(msg)) if msg.contains("overflows") => {}
            other => panic!("expected Validation, got {other:?}"),
        }
        assert_eq!(service.request(order.id_typed()).unwrap().status(), RequestStatus::Requested);
        assert_eq!(backend.variant(variant).unwrap().unwrap().hq_quantity, -15);
        assert_eq!(
            backend.stock(StockKey::new(store, variant)).unwrap().unwrap().quantity(),
            5
        );

        // HQ side overflows after the store side was staged.
        let other_store = StoreId::new();
        let order = service
            .create(&Actor::store(UserId::new(), other_store), Direction::Order, variant, 1, test_date(), None)
            .unwrap();
        assert!(matches!(
            service.approve(&hq, order.id_typed(), i64::MAX),
            Err(DomainError::Validation(_))
        ));
        assert!(backend.stock(StockKey::new(other_store, variant)).unwrap().is_none());
        assert_eq!(backend.ledger(None).unwrap().len(), 1);
    }

    #[test]
    fn rejected_return_moves_nothing() {
        let (backend, service, variant) = setup(0);
        let store = StoreId::new();
        let request = service
            .create(&Actor::store(UserId::new(), store), Direction::Return, variant, 4, test_date(), Some("damaged".into()))
            .unwrap();

        let rejected = service.reject(&Actor::hq(UserId::new()), request.id_typed()).unwrap();
        assert_eq!(rejected.status(), RequestStatus::Rejected);
        assert_eq!(rejected.note(), Some("damaged"));
        assert_eq!(backend.variant(variant).unwrap().unwrap().hq_quantity, 0);
        assert!(backend.ledger(None).unwrap().is_empty());
    }

    #[test]
    fn listing_filters_by_store_and_direction() {
        let (_, service, variant) = setup(10);
        let (a, b) = (StoreId::new(), StoreId::new());
        service
            .create(&Actor::store(UserId::new(), a), Direction::Order, variant, 1, test_date(), None)
            .unwrap();
        service
            .create(&Actor::store(UserId::new(), b), Direction::Order, variant, 1, test_date(), None)
            .unwrap();
        service
            .create(&Actor::store(UserId::new(), a), Direction::Return, variant, 1, test_date(), None)
            .unwrap();

        assert_eq!(service.requests(None, Direction::Order).unwrap().len(), 2);
        assert_eq!(service.requests(Some(a), Direction::Order).unwrap().len(), 1);
        assert_eq!(service.requests(Some(a), Direction::Return).unwrap().len(), 1);
    }
}
