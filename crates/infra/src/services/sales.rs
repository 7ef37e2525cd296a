//! Point-of-sale operations: record a sale, refund it fully or partly.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use stockhub_auth::{authorize_store, Action, Actor};
use stockhub_core::{Aggregate, DomainError, DomainResult, Money, SaleId, StoreId, VariantId};
use stockhub_inventory::{StockChangeKind, StockKey};
use stockhub_sales::{
    PaymentMethod, PricedLine, RecordSale, RefundFull, RefundLine, RefundPartial, Sale,
    SaleCommand, SaleEvent, SaleStatus,
};

use crate::ledger::{apply_effects, StockEffect};
use crate::store::StockBackend;

/// One line as entered at the till. The price comes from the catalog.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SaleLine {
    pub variant: VariantId,
    pub quantity: i64,
    pub discount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub store: StoreId,
    pub sale_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub is_online: bool,
    pub lines: Vec<SaleLine>,
}

/// Totals over the VALID sales of a period.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SalesStats {
    pub total_amount: Money,
    pub total_discount: Money,
    pub count: usize,
}

/// Stock effects implied by sale events.
fn stock_effects(events: &[SaleEvent]) -> Vec<StockEffect> {
    let mut effects = Vec::new();
    for event in events {
        match event {
            SaleEvent::SaleRecorded(e) => effects.extend(e.items.iter().map(|item| {
                StockEffect::new(
                    StockKey::new(e.store, item.variant),
                    StockChangeKind::Sale,
                    -item.quantity,
                )
            })),
            SaleEvent::SaleRefunded(e) => effects.extend(e.restored.iter().map(|line| {
                StockEffect::new(
                    StockKey::new(e.store, line.variant),
                    StockChangeKind::RefundFull,
                    line.quantity,
                )
            })),
            SaleEvent::ItemsRefunded(e) => effects.extend(e.restored.iter().map(|line| {
                StockEffect::new(
                    StockKey::new(e.store, line.variant),
                    StockChangeKind::RefundPartial,
                    line.quantity,
                )
            })),
        }
    }
    effects
}

#[derive(Debug)]
pub struct SaleService<B> {
    backend: Arc<B>,
}

impl<B> Clone for SaleService<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
        }
    }
}

impl<B: StockBackend> SaleService<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Record a sale and deduct every line from the store's stock.
    ///
    /// Any line that cannot be covered aborts the whole sale.
    #[instrument(
        skip(self, actor, sale),
        fields(store = %sale.store, user = %actor.user_id, lines = sale.lines.len()),
        err
    )]
    pub fn create_sale(&self, actor: &Actor, sale: NewSale) -> DomainResult<Sale> {
        authorize_store(actor, sale.store, Action::RecordSale)?;

        let mut tx = self.backend.begin()?;

        let mut priced = Vec::with_capacity(sale.lines.len());
        for line in &sale.lines {
            let variant = tx
                .variant(line.variant)?
                .ok_or_else(|| DomainError::not_found(format!("variant {}", line.variant)))?;
            priced.push(PricedLine {
                variant,
                quantity: line.quantity,
                discount: line.discount,
            });
        }

        let mut record = Sale::empty(SaleId::new());
        let mut draft = RecordSale {
            sale_id: record.id_typed(),
            store: sale.store,
            actor: *actor,
            sale_date: sale.sale_date,
            daily_number: 0,
            payment_method: sale.payment_method,
            is_online: sale.is_online,
            lines: priced,
            occurred_at: Utc::now(),
        };
        let planned = record.handle(&SaleCommand::RecordSale(draft.clone()))?;
        apply_effects(tx.as_mut(), &stock_effects(&planned), actor.user_id)?;

        // The receipt counter is the last lease taken, held only until commit.
        draft.daily_number = tx.next_daily_number(sale.store, sale.sale_date)?;
        record.execute(&SaleCommand::RecordSale(draft))?;
        tx.put_sale(record.clone());
        tx.commit()?;

        info!(
            sale_id = %record.id_typed(),
            receipt = %record.receipt_number(),
            total = %record.total_amount(),
            "sale recorded"
        );
        Ok(record)
    }

    /// Put every remaining unit back on the shelf and mark the sale REFUNDED.
    #[instrument(skip(self, actor), fields(user = %actor.user_id), err)]
    pub fn refund_full(&self, actor: &Actor, sale_id: SaleId) -> DomainResult<Sale> {
        let mut tx = self.backend.begin()?;
        let mut sale = tx
            .lock_sale(sale_id)?
            .ok_or_else(|| DomainError::not_found(format!("sale {sale_id}")))?;

        let events = sale.execute(&SaleCommand::RefundFull(RefundFull {
            actor: *actor,
            occurred_at: Utc::now(),
        }))?;

        apply_effects(tx.as_mut(), &stock_effects(&events), actor.user_id)?;
        tx.put_sale(sale.clone());
        tx.commit()?;

        info!(sale_id = %sale_id, receipt = %sale.receipt_number(), "sale refunded");
        Ok(sale)
    }

    /// Take back some units; the sale stays VALID until nothing remains.
    #[instrument(skip(self, actor, lines), fields(user = %actor.user_id, lines = lines.len()), err)]
    pub fn refund_partial(
        &self,
        actor: &Actor,
        sale_id: SaleId,
        lines: Vec<RefundLine>,
    ) -> DomainResult<Sale> {
        let mut tx = self.backend.begin()?;
        let mut sale = tx
            .lock_sale(sale_id)?
            .ok_or_else(|| DomainError::not_found(format!("sale {sale_id}")))?;

        let events = sale.execute(&SaleCommand::RefundPartial(RefundPartial {
            actor: *actor,
            lines,
            occurred_at: Utc::now(),
        }))?;

        apply_effects(tx.as_mut(), &stock_effects(&events), actor.user_id)?;
        tx.put_sale(sale.clone());
        tx.commit()?;

        info!(
            sale_id = %sale_id,
            total = %sale.total_amount(),
            status = ?sale.status(),
            "sale partially refunded"
        );
        Ok(sale)
    }

    pub fn sale(&self, sale_id: SaleId) -> DomainResult<Sale> {
        self.backend
            .sale(sale_id)?
            .ok_or_else(|| DomainError::not_found(format!("sale {sale_id}")))
    }

    /// Sales dated within `[from, to]`, newest first.
    pub fn sales_between(
        &self,
        store: StoreId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<Vec<Sale>> {
        let mut sales = self.backend.sales(store, from, to)?;
        sales.sort_by(|a, b| {
            (b.sale_date(), b.daily_number()).cmp(&(a.sale_date(), a.daily_number()))
        });
        Ok(sales)
    }

    pub fn sales_stats(
        &self,
        store: StoreId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DomainResult<SalesStats> {
        let stats = self
            .backend
            .sales(store, from, to)?
            .iter()
            .filter(|s| s.status() == SaleStatus::Valid)
            .fold(SalesStats::default(), |mut acc, s| {
                acc.total_amount = acc.total_amount.saturating_add(s.total_amount());
                acc.total_discount = acc.total_discount.saturating_add(s.total_discount());
                acc.count += 1;
                acc
            });
        Ok(stats)
    }
}
