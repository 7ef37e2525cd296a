//! Store-to-store transfer workflow.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use stockhub_auth::Actor;
use stockhub_core::{Aggregate, DomainError, DomainResult, StoreId, TransferId, VariantId};
use stockhub_inventory::{StockChangeKind, StockKey};
use stockhub_transfers::{
    ReceiveTransfer, RejectTransfer, RequestTransfer, ShipTransfer, Transfer, TransferCommand,
    TransferEvent,
};

use crate::ledger::{apply_effects, StockEffect};
use crate::store::StockBackend;

fn stock_effects(events: &[TransferEvent]) -> Vec<StockEffect> {
    events
        .iter()
        .filter_map(|event| match event {
            TransferEvent::Shipped(e) => Some(StockEffect::new(
                StockKey::new(e.source, e.variant),
                StockChangeKind::ShipOut,
                -e.quantity,
            )),
            TransferEvent::Received(e) => Some(StockEffect::new(
                StockKey::new(e.target, e.variant),
                StockChangeKind::ShipIn,
                e.quantity,
            )),
            TransferEvent::Requested(_) | TransferEvent::Rejected(_) => None,
        })
        .collect()
}

#[derive(Debug)]
pub struct TransferService<B> {
    backend: Arc<B>,
}

impl<B> Clone for TransferService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: StockBackend> TransferService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Raised by the receiving store, asking `source` to send stock.
    #[instrument(
        skip(self, actor),
        fields(user = %actor.user_id, source = %source, target = %target, variant = %variant),
        err
    )]
    pub fn request(
        &self,
        actor: &Actor,
        source: StoreId,
        target: StoreId,
        variant: VariantId,
        quantity: i64,
    ) -> DomainResult<Transfer> {
        let mut tx = self.backend.begin()?;
        if tx.variant(variant)?.is_none() {
            return Err(DomainError::not_found(format!("variant {variant}")));
        }

        let mut transfer = Transfer::empty(TransferId::new());
        transfer.execute(&TransferCommand::Request(RequestTransfer {
            transfer_id: transfer.id_typed(),
            source,
            target,
            variant,
            quantity,
            actor: *actor,
            occurred_at: Utc::now(),
        }))?;

        tx.put_transfer(transfer.clone());
        tx.commit()?;

        info!(transfer_id = %transfer.id_typed(), quantity, "transfer requested");
        Ok(transfer)
    }

    #[instrument(skip(self, actor), fields(user = %actor.user_id), err)]
    pub fn ship(&self, actor: &Actor, transfer_id: TransferId) -> DomainResult<Transfer> {
        self.transition(
            actor,
            transfer_id,
            TransferCommand::Ship(ShipTransfer {
                actor: *actor,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, actor), fields(user = %actor.user_id), err)]
    pub fn receive(&self, actor: &Actor, transfer_id: TransferId) -> DomainResult<Transfer> {
        self.transition(
            actor,
            transfer_id,
            TransferCommand::Receive(ReceiveTransfer {
                actor: *actor,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[instrument(skip(self, actor), fields(user = %actor.user_id), err)]
    pub fn reject(&self, actor: &Actor, transfer_id: TransferId) -> DomainResult<Transfer> {
        self.transition(
            actor,
            transfer_id,
            TransferCommand::Reject(RejectTransfer {
                actor: *actor,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn transition(
        &self,
        actor: &Actor,
        transfer_id: TransferId,
        command: TransferCommand,
    ) -> DomainResult<Transfer> {
        let mut tx = self.backend.begin()?;
        let mut transfer = tx
            .lock_transfer(transfer_id)?
            .ok_or_else(|| DomainError::not_found(format!("transfer {transfer_id}")))?;

        let events = transfer.execute(&command)?;
        apply_effects(tx.as_mut(), &stock_effects(&events), actor.user_id)?;
        tx.put_transfer(transfer.clone());
        tx.commit()?;

        for event in &events {
            info!(transfer_id = %transfer_id, event = event.event_type(), "transfer updated");
        }
        Ok(transfer)
    }

    pub fn transfer(&self, transfer_id: TransferId) -> DomainResult<Transfer> {
        self.backend
            .transfer(transfer_id)?
            .ok_or_else(|| DomainError::not_found(format!("transfer {transfer_id}")))
    }

    /// Transfers leaving `store`, newest first.
    pub fn outbound(&self, store: StoreId) -> DomainResult<Vec<Transfer>> {
        self.list(Some(store), |t| t.source() == Some(store))
    }

    /// Transfers arriving at `store`, newest first.
    pub fn inbound(&self, store: StoreId) -> DomainResult<Vec<Transfer>> {
        self.list(Some(store), |t| t.target() == Some(store))
    }

    /// Transfers touching `store` in either direction, or every transfer for
    /// `None` (the HQ overview), newest first.
    pub fn all(&self, store: Option<StoreId>) -> DomainResult<Vec<Transfer>> {
        self.list(store, |_| true)
    }

    fn list(
        &self,
        store: Option<StoreId>,
        keep: impl Fn(&Transfer) -> bool,
    ) -> DomainResult<Vec<Transfer>> {
        let mut transfers: Vec<Transfer> = self
            .backend
            .transfers(store)?
            .into_iter()
            .filter(|t| keep(t))
            .collect();
        transfers.sort_by(|a, b| (b.created_at(), b.id_typed()).cmp(&(a.created_at(), a.id_typed())));
        Ok(transfers)
    }
}
