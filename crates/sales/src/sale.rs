use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use stockhub_auth::{authorize_store, Action, Actor};
use stockhub_catalog::Variant;
use stockhub_core::{
    Aggregate, AggregateRoot, DomainError, Money, SaleId, StoreId, UserId, VariantId,
};

/// Sale status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    Valid,
    Refunded,
}

/// How the customer paid (free-form label chosen at the till, e.g. "card").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentMethod(String);

impl PaymentMethod {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Sale line item: a price snapshot taken from the catalog at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleItem {
    pub line_no: u32,
    pub variant: VariantId,
    pub product_number: String,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub original_price: Money,
    pub unit_price: Money,
    pub discount: Money,
    pub discounted_price: Money,
    /// Remaining (not yet refunded) quantity.
    pub quantity: i64,
    pub subtotal: Money,
}

/// Aggregate root: Sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    id: SaleId,
    store: Option<StoreId>,
    recorded_by: Option<UserId>,
    sale_date: NaiveDate,
    daily_number: u32,
    payment_method: PaymentMethod,
    is_online: bool,
    status: SaleStatus,
    total_amount: Money,
    items: Vec<SaleItem>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Sale {
    /// Create an empty, not-yet-recorded aggregate instance.
    pub fn empty(id: SaleId) -> Self {
        Self {
            id,
            store: None,
            recorded_by: None,
            sale_date: NaiveDate::MIN,
            daily_number: 0,
            payment_method: PaymentMethod::new(""),
            is_online: false,
            status: SaleStatus::Valid,
            total_amount: Money::ZERO,
            items: Vec::new(),
            created_at: None,
            updated_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> SaleId {
        self.id
    }

    pub fn store(&self) -> Option<StoreId> {
        self.store
    }

    pub fn recorded_by(&self) -> Option<UserId> {
        self.recorded_by
    }

    pub fn sale_date(&self) -> NaiveDate {
        self.sale_date
    }

    pub fn daily_number(&self) -> u32 {
        self.daily_number
    }

    pub fn payment_method(&self) -> &PaymentMethod {
        &self.payment_method
    }

    pub fn is_online(&self) -> bool {
        self.is_online
    }

    pub fn status(&self) -> SaleStatus {
        self.status
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn items(&self) -> &[SaleItem] {
        &self.items
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_recorded(&self) -> bool {
        self.created
    }

    /// `YYYYMMDD-NNNN`: sale date and the per-store daily counter.
    pub fn receipt_number(&self) -> String {
        format!("{}-{:04}", self.sale_date.format("%Y%m%d"), self.daily_number)
    }

    /// Discount granted on what has not been refunded.
    pub fn total_discount(&self) -> Money {
        self.items
            .iter()
            .map(|i| i.discount.saturating_times(i.quantity))
            .sum()
    }
}

impl AggregateRoot for Sale {
    type Id = SaleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// One requested line, priced from the catalog record (never from the caller).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub variant: Variant,
    pub quantity: i64,
    pub discount: Money,
}

/// Command: RecordSale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSale {
    pub sale_id: SaleId,
    pub store: StoreId,
    pub actor: Actor,
    pub sale_date: NaiveDate,
    pub daily_number: u32,
    pub payment_method: PaymentMethod,
    pub is_online: bool,
    pub lines: Vec<PricedLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RefundFull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundFull {
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// A requested (variant, quantity) to take back.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundLine {
    pub variant: VariantId,
    pub quantity: i64,
}

/// Command: RefundPartial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPartial {
    pub actor: Actor,
    pub lines: Vec<RefundLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleCommand {
    RecordSale(RecordSale),
    RefundFull(RefundFull),
    RefundPartial(RefundPartial),
}

/// Event: SaleRecorded. Each item is deducted from store stock (kind SALE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRecorded {
    pub sale_id: SaleId,
    pub store: StoreId,
    pub recorded_by: UserId,
    pub sale_date: NaiveDate,
    pub daily_number: u32,
    pub payment_method: PaymentMethod,
    pub is_online: bool,
    pub items: Vec<SaleItem>,
    pub total_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Quantity going back on the shelf.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredLine {
    pub variant: VariantId,
    pub quantity: i64,
}

/// Event: SaleRefunded (full). Each restored line is credited back (kind REFUND_FULL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleRefunded {
    pub sale_id: SaleId,
    pub store: StoreId,
    pub restored: Vec<RestoredLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Quantity taken from one item by a partial refund.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraw {
    pub line_no: u32,
    pub quantity: i64,
    pub amount: Money,
}

/// Event: ItemsRefunded (partial). Restored lines are credited back (kind REFUND_PARTIAL).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemsRefunded {
    pub sale_id: SaleId,
    pub store: StoreId,
    /// One entry per requested variant, in request order.
    pub restored: Vec<RestoredLine>,
    pub draws: Vec<ItemDraw>,
    pub refunded_amount: Money,
    /// Every item reached zero; the sale becomes REFUNDED.
    pub fully_refunded: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleEvent {
    SaleRecorded(SaleRecorded),
    SaleRefunded(SaleRefunded),
    ItemsRefunded(ItemsRefunded),
}

impl SaleEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            SaleEvent::SaleRecorded(_) => "sales.sale.recorded",
            SaleEvent::SaleRefunded(_) => "sales.sale.refunded",
            SaleEvent::ItemsRefunded(_) => "sales.sale.items_refunded",
        }
    }
}

impl Aggregate for Sale {
    type Command = SaleCommand;
    type Event = SaleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            SaleEvent::SaleRecorded(e) => {
                self.id = e.sale_id;
                self.store = Some(e.store);
                self.recorded_by = Some(e.recorded_by);
                self.sale_date = e.sale_date;
                self.daily_number = e.daily_number;
                self.payment_method = e.payment_method.clone();
                self.is_online = e.is_online;
                self.status = SaleStatus::Valid;
                self.items = e.items.clone();
                self.total_amount = e.total_amount;
                self.created_at = Some(e.occurred_at);
                self.updated_at = Some(e.occurred_at);
                self.created = true;
            }
            SaleEvent::SaleRefunded(e) => {
                // Item snapshots and total stay as recorded.
                self.status = SaleStatus::Refunded;
                self.updated_at = Some(e.occurred_at);
            }
            SaleEvent::ItemsRefunded(e) => {
                for draw in &e.draws {
                    if let Some(item) = self.items.iter_mut().find(|i| i.line_no == draw.line_no) {
                        item.quantity -= draw.quantity;
                        item.subtotal -= draw.amount;
                    }
                }
                self.total_amount -= e.refunded_amount;
                if e.fully_refunded {
                    self.status = SaleStatus::Refunded;
                }
                self.updated_at = Some(e.occurred_at);
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            SaleCommand::RecordSale(cmd) => self.handle_record(cmd),
            SaleCommand::RefundFull(cmd) => self.handle_refund_full(cmd),
            SaleCommand::RefundPartial(cmd) => self.handle_refund_partial(cmd),
        }
    }
}

fn amount_overflow(product_name: &str) -> DomainError {
    DomainError::validation(format!("line amount is out of range ({product_name})"))
}

impl Sale {
    fn ensure_refundable(&self, actor: &Actor) -> Result<StoreId, DomainError> {
        let store = match (self.created, self.store) {
            (true, Some(store)) => store,
            _ => return Err(DomainError::not_found(format!("sale {}", self.id))),
        };
        authorize_store(actor, store, Action::RefundSale)?;

        if self.status == SaleStatus::Refunded {
            return Err(DomainError::invalid_state(format!(
                "sale {} is already refunded",
                self.receipt_number()
            )));
        }
        Ok(store)
    }

    fn handle_record(&self, cmd: &RecordSale) -> Result<Vec<SaleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invalid_state("sale already recorded"));
        }
        if cmd.sale_id != self.id {
            return Err(DomainError::validation("sale_id mismatch"));
        }
        authorize_store(&cmd.actor, cmd.store, Action::RecordSale)?;

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("a sale needs at least one item"));
        }

        let mut items = Vec::with_capacity(cmd.lines.len());
        let mut gross_total = Money::ZERO;
        let mut total_amount = Money::ZERO;
        for (idx, line) in cmd.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "quantity must be positive ({})",
                    line.variant.product_name
                )));
            }

            let unit_price = line.variant.sale_price;
            let discount = line.discount.max(Money::ZERO);
            if discount > unit_price {
                return Err(DomainError::validation(format!(
                    "discount {discount} exceeds unit price {unit_price} ({})",
                    line.variant.product_name
                )));
            }
            let discounted_price = unit_price - discount;

            // The gross amount bounds both the subtotal and the discount total.
            let overflow = || amount_overflow(&line.variant.product_name);
            let gross = unit_price.checked_times(line.quantity).ok_or_else(overflow)?;
            gross_total = gross_total.checked_add(gross).ok_or_else(overflow)?;
            let subtotal = discounted_price
                .checked_times(line.quantity)
                .ok_or_else(overflow)?;
            total_amount = total_amount.checked_add(subtotal).ok_or_else(overflow)?;

            items.push(SaleItem {
                line_no: (idx as u32) + 1,
                variant: line.variant.id,
                product_number: line.variant.product_number.clone(),
                product_name: line.variant.product_name.clone(),
                color: line.variant.color.clone(),
                size: line.variant.size.clone(),
                original_price: line.variant.original_price,
                unit_price,
                discount,
                discounted_price,
                quantity: line.quantity,
                subtotal,
            });
        }

        Ok(vec![SaleEvent::SaleRecorded(SaleRecorded {
            sale_id: cmd.sale_id,
            store: cmd.store,
            recorded_by: cmd.actor.user_id,
            sale_date: cmd.sale_date,
            daily_number: cmd.daily_number,
            payment_method: cmd.payment_method.clone(),
            is_online: cmd.is_online,
            items,
            total_amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refund_full(&self, cmd: &RefundFull) -> Result<Vec<SaleEvent>, DomainError> {
        let store = self.ensure_refundable(&cmd.actor)?;

        let restored = self
            .items
            .iter()
            .filter(|i| i.quantity > 0)
            .map(|i| RestoredLine {
                variant: i.variant,
                quantity: i.quantity,
            })
            .collect();

        Ok(vec![SaleEvent::SaleRefunded(SaleRefunded {
            sale_id: self.id,
            store,
            restored,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_refund_partial(&self, cmd: &RefundPartial) -> Result<Vec<SaleEvent>, DomainError> {
        let store = self.ensure_refundable(&cmd.actor)?;

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("nothing to refund"));
        }

        // Merge repeated variants, keeping first-seen order.
        let mut requested: Vec<RestoredLine> = Vec::new();
        for line in &cmd.lines {
            if line.quantity <= 0 {
                return Err(DomainError::validation("refund quantity must be positive"));
            }
            match requested.iter_mut().find(|r| r.variant == line.variant) {
                Some(existing) => {
                    existing.quantity = existing
                        .quantity
                        .checked_add(line.quantity)
                        .ok_or_else(|| DomainError::validation("refund quantity is out of range"))?;
                }
                None => requested.push(RestoredLine {
                    variant: line.variant,
                    quantity: line.quantity,
                }),
            }
        }

        let mut remaining: Vec<i64> = self.items.iter().map(|i| i.quantity).collect();
        let mut draws = Vec::new();
        let mut refunded_amount = Money::ZERO;

        for line in &requested {
            let candidates: Vec<usize> = self
                .items
                .iter()
                .enumerate()
                .filter(|(_, item)| item.variant == line.variant)
                .map(|(idx, _)| idx)
                .collect();
            if candidates.is_empty() {
                return Err(DomainError::not_found(format!(
                    "variant {} is not part of sale {}",
                    line.variant,
                    self.receipt_number()
                )));
            }

            let available = candidates
                .iter()
                .fold(0i64, |acc, &idx| acc.saturating_add(remaining[idx]));
            if line.quantity > available {
                return Err(DomainError::invalid_state(format!(
                    "cannot refund {} of variant {} (remaining {available})",
                    line.quantity, line.variant
                )));
            }

            let mut outstanding = line.quantity;
            for idx in candidates {
                if outstanding == 0 {
                    break;
                }
                let take = outstanding.min(remaining[idx]);
                if take == 0 {
                    continue;
                }
                let item = &self.items[idx];
                let amount = item
                    .discounted_price
                    .checked_times(take)
                    .ok_or_else(|| amount_overflow(&item.product_name))?;
                draws.push(ItemDraw {
                    line_no: item.line_no,
                    quantity: take,
                    amount,
                });
                remaining[idx] -= take;
                refunded_amount += amount;
                outstanding -= take;
            }
        }

        let fully_refunded = remaining.iter().all(|&q| q == 0);

        Ok(vec![SaleEvent::ItemsRefunded(ItemsRefunded {
            sale_id: self.id,
            store,
            restored: requested,
            draws,
            refunded_amount,
            fully_refunded,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    fn test_variant(sale_price: i64) -> Variant {
        Variant::new(VariantId::new(), "8800000000001", "JK-100", "Down Jacket")
            .with_options("BLACK", "95")
            .with_prices(Money::new(sale_price * 2), Money::new(sale_price))
    }

    fn record_cmd(sale: &Sale, actor: Actor, store: StoreId, lines: Vec<PricedLine>) -> SaleCommand {
        SaleCommand::RecordSale(RecordSale {
            sale_id: sale.id_typed(),
            store,
            actor,
            sale_date: test_date(),
            daily_number: 7,
            payment_method: PaymentMethod::new("card"),
            is_online: false,
            lines,
            occurred_at: test_time(),
        })
    }

    /// Scenario B: 2 units at 10000 with 1000 off each.
    fn recorded_sale() -> (Sale, Actor, Variant) {
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);
        let variant = test_variant(10_000);
        let mut sale = Sale::empty(SaleId::new());
        let cmd = record_cmd(
            &sale,
            actor,
            store,
            vec![PricedLine {
                variant: variant.clone(),
                quantity: 2,
                discount: Money::new(1_000),
            }],
        );
        sale.execute(&cmd).unwrap();
        (sale, actor, variant)
    }

    #[test]
    fn record_sale_prices_from_catalog() {
        let (sale, _, variant) = recorded_sale();

        assert_eq!(sale.status(), SaleStatus::Valid);
        assert_eq!(sale.total_amount(), Money::new(18_000));
        let item = &sale.items()[0];
        assert_eq!(item.variant, variant.id);
        assert_eq!(item.unit_price, Money::new(10_000));
        assert_eq!(item.discounted_price, Money::new(9_000));
        assert_eq!(item.subtotal, Money::new(18_000));
        assert_eq!(sale.receipt_number(), "20240309-0007");
        assert_eq!(sale.total_discount(), Money::new(2_000));
    }

    #[test]
    fn discount_above_unit_price_is_rejected() {
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);
        let sale = Sale::empty(SaleId::new());
        let cmd = record_cmd(
            &sale,
            actor,
            store,
            vec![PricedLine {
                variant: test_variant(10_000),
                quantity: 1,
                discount: Money::new(10_001),
            }],
        );
        match sale.handle(&cmd) {
            Err(DomainError::Validation(msg)) if msg.contains("exceeds unit price") => {}
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn negative_discount_counts_as_none() {
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);
        let sale = Sale::empty(SaleId::new());
        let cmd = record_cmd(
            &sale,
            actor,
            store,
            vec![PricedLine {
                variant: test_variant(5_000),
                quantity: 3,
                discount: Money::new(-500),
            }],
        );
        let events = sale.handle(&cmd).unwrap();
        match &events[0] {
            SaleEvent::SaleRecorded(e) => {
                assert_eq!(e.items[0].discount, Money::ZERO);
                assert_eq!(e.total_amount, Money::new(15_000));
            }
            other => panic!("expected SaleRecorded, got {other:?}"),
        }
    }

    #[test]
    fn empty_or_non_positive_lines_are_rejected() {
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);
        let sale = Sale::empty(SaleId::new());

        let cmd = record_cmd(&sale, actor, store, vec![]);
        assert!(matches!(sale.handle(&cmd), Err(DomainError::Validation(_))));

        let cmd = record_cmd(
            &sale,
            actor,
            store,
            vec![PricedLine {
                variant: test_variant(1_000),
                quantity: 0,
                discount: Money::ZERO,
            }],
        );
        assert!(matches!(sale.handle(&cmd), Err(DomainError::Validation(_))));
    }

    #[test]
    fn line_amount_overflow_is_rejected() {
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);
        let sale = Sale::empty(SaleId::new());

        let huge = record_cmd(
            &sale,
            actor,
            store,
            vec![PricedLine {
                variant: test_variant(10_000),
                quantity: i64::MAX / 2,
                discount: Money::ZERO,
            }],
        );
        match sale.handle(&huge) {
            Err(DomainError::Validation(msg)) if msg.contains("out of range") => {}
            other => panic!("expected Validation, got {other:?}"),
        }

        // Each line fits on its own; the total does not.
        let line = PricedLine {
            variant: test_variant(1),
            quantity: i64::MAX,
            discount: Money::ZERO,
        };
        let total = record_cmd(&sale, actor, store, vec![line.clone(), line]);
        assert!(matches!(sale.handle(&total), Err(DomainError::Validation(_))));
    }

    #[test]
    fn fully_discounted_huge_line_reports_discount_without_overflow() {
        let store = StoreId::new();
        let actor = Actor::store(UserId::new(), store);
        let mut sale = Sale::empty(SaleId::new());
        let cmd = record_cmd(
            &sale,
            actor,
            store,
            vec![PricedLine {
                variant: test_variant(1),
                quantity: i64::MAX,
                discount: Money::new(1),
            }],
        );
        sale.execute(&cmd).unwrap();
        assert_eq!(sale.total_amount(), Money::ZERO);
        assert_eq!(sale.total_discount(), Money::new(i64::MAX));
    }

    #[test]
    fn overflowing_refund_request_is_rejected() {
        let (sale, actor, variant) = recorded_sale();
        let err = sale
            .handle(&SaleCommand::RefundPartial(RefundPartial {
                actor,
                lines: vec![
                    RefundLine { variant: variant.id, quantity: i64::MAX },
                    RefundLine { variant: variant.id, quantity: 1 },
                ],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn other_store_cannot_record() {
        let sale = Sale::empty(SaleId::new());
        let actor = Actor::store(UserId::new(), StoreId::new());
        let cmd = record_cmd(
            &sale,
            actor,
            StoreId::new(),
            vec![PricedLine {
                variant: test_variant(1_000),
                quantity: 1,
                discount: Money::ZERO,
            }],
        );
        assert!(matches!(sale.handle(&cmd), Err(DomainError::Forbidden(_))));
    }

    #[test]
    fn partial_refund_keeps_sale_valid() {
        // Scenario C.
        let (mut sale, actor, variant) = recorded_sale();

        let events = sale
            .execute(&SaleCommand::RefundPartial(RefundPartial {
                actor,
                lines: vec![RefundLine {
                    variant: variant.id,
                    quantity: 1,
                }],
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            SaleEvent::ItemsRefunded(e) => {
                assert_eq!(e.refunded_amount, Money::new(9_000));
                assert_eq!(e.restored, vec![RestoredLine { variant: variant.id, quantity: 1 }]);
                assert!(!e.fully_refunded);
            }
            other => panic!("expected ItemsRefunded, got {other:?}"),
        }
        assert_eq!(sale.status(), SaleStatus::Valid);
        assert_eq!(sale.total_amount(), Money::new(9_000));
        assert_eq!(sale.items()[0].quantity, 1);
        assert_eq!(sale.items()[0].subtotal, Money::new(9_000));
    }

    #[test]
    fn refunding_everything_piecewise_marks_refunded() {
        let (mut sale, actor, variant) = recorded_sale();
        for _ in 0..2 {
            sale.execute(&SaleCommand::RefundPartial(RefundPartial {
                actor,
                lines: vec![RefundLine {
                    variant: variant.id,
                    quantity: 1,
                }],
                occurred_at: test_time(),
            }))
            .unwrap();
        }
        assert_eq!(sale.status(), SaleStatus::Refunded);
        assert_eq!(sale.total_amount(), Money::ZERO);
    }

    #[test]
    fn refunding_more_than_remaining_is_invalid_state() {
        let (sale, actor, variant) = recorded_sale();
        let before = sale.clone();

        let err = sale
            .handle(&SaleCommand::RefundPartial(RefundPartial {
                actor,
                lines: vec![
                    RefundLine { variant: variant.id, quantity: 2 },
                    RefundLine { variant: variant.id, quantity: 1 },
                ],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
        assert_eq!(sale, before);
    }

    #[test]
    fn refunding_unknown_variant_is_not_found() {
        let (sale, actor, _) = recorded_sale();
        let err = sale
            .handle(&SaleCommand::RefundPartial(RefundPartial {
                actor,
                lines: vec![RefundLine {
                    variant: VariantId::new(),
                    quantity: 1,
                }],
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[test]
    fn full_refund_restores_remaining_and_blocks_further_refunds() {
        let (mut sale, actor, variant) = recorded_sale();
        sale.execute(&SaleCommand::RefundPartial(RefundPartial {
            actor,
            lines: vec![RefundLine { variant: variant.id, quantity: 1 }],
            occurred_at: test_time(),
        }))
        .unwrap();

        let events = sale
            .execute(&SaleCommand::RefundFull(RefundFull {
                actor,
                occurred_at: test_time(),
            }))
            .unwrap();
        match &events[0] {
            SaleEvent::SaleRefunded(e) => {
                assert_eq!(e.restored, vec![RestoredLine { variant: variant.id, quantity: 1 }]);
            }
            other => panic!("expected SaleRefunded, got {other:?}"),
        }
        assert_eq!(sale.status(), SaleStatus::Refunded);

        let err = sale
            .handle(&SaleCommand::RefundFull(RefundFull {
                actor,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn refund_by_other_store_is_forbidden() {
        let (sale, _, _) = recorded_sale();
        let stranger = Actor::store(UserId::new(), StoreId::new());
        let err = sale
            .handle(&SaleCommand::RefundFull(RefundFull {
                actor: stranger,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden(_)));
    }

    #[test]
    fn refund_of_unrecorded_sale_is_not_found() {
        let sale = Sale::empty(SaleId::new());
        let err = sale
            .handle(&SaleCommand::RefundFull(RefundFull {
                actor: Actor::store(UserId::new(), StoreId::new()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 128,
                ..ProptestConfig::default()
            })]

            /// Property: the sale total always equals the sum of item subtotals,
            /// and each subtotal equals discounted price times remaining quantity.
            #[test]
            fn totals_track_remaining_quantities(
                lines in prop::collection::vec((1i64..10, 0i64..5_000, 0i64..5), 1..5),
                refunds in prop::collection::vec((0usize..5, 1i64..4), 0..8)
            ) {
                let store = StoreId::new();
                let actor = Actor::store(UserId::new(), store);
                let mut sale = Sale::empty(SaleId::new());
                let priced: Vec<PricedLine> = lines
                    .iter()
                    .map(|(qty, price, disc)| PricedLine {
                        variant: test_variant(*price),
                        quantity: *qty,
                        discount: Money::new((*disc).min(*price)),
                    })
                    .collect();
                let variants: Vec<VariantId> = priced.iter().map(|l| l.variant.id).collect();
                sale.execute(&record_cmd(&sale, actor, store, priced)).unwrap();

                for (pick, qty) in refunds {
                    let variant = variants[pick % variants.len()];
                    let _ = sale.execute(&SaleCommand::RefundPartial(RefundPartial {
                        actor,
                        lines: vec![RefundLine { variant, quantity: qty }],
                        occurred_at: test_time(),
                    }));

                    let subtotal_sum: Money = sale.items().iter().map(|i| i.subtotal).sum();
                    prop_assert_eq!(sale.total_amount(), subtotal_sum);
                    for item in sale.items() {
                        prop_assert!(item.quantity >= 0);
                        prop_assert_eq!(Some(item.subtotal), item.discounted_price.checked_times(item.quantity));
                    }
                    let all_zero = sale.items().iter().all(|i| i.quantity == 0);
                    prop_assert_eq!(all_zero, sale.status() == SaleStatus::Refunded);
                }
            }
        }
    }
}
