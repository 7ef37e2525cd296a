use serde::{Deserialize, Serialize};

use stockhub_core::{DomainError, DomainResult, Money, VariantId};

/// A sellable SKU: product + color + size, with its own prices and HQ-held count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub barcode: String,
    pub product_number: String,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub original_price: Money,
    /// Authoritative point-of-sale price.
    pub sale_price: Money,
    /// Quantity held by HQ. Not floor-checked: an inconsistent catalog may drive it negative.
    pub hq_quantity: i64,
}

impl Variant {
    pub fn new(
        id: VariantId,
        barcode: impl Into<String>,
        product_number: impl Into<String>,
        product_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            barcode: barcode.into(),
            product_number: product_number.into(),
            product_name: product_name.into(),
            color: String::new(),
            size: String::new(),
            original_price: Money::ZERO,
            sale_price: Money::ZERO,
            hq_quantity: 0,
        }
    }

    pub fn with_options(mut self, color: impl Into<String>, size: impl Into<String>) -> Self {
        self.color = color.into();
        self.size = size.into();
        self
    }

    pub fn with_prices(mut self, original_price: Money, sale_price: Money) -> Self {
        self.original_price = original_price;
        self.sale_price = sale_price;
        self
    }

    pub fn with_hq_quantity(mut self, hq_quantity: i64) -> Self {
        self.hq_quantity = hq_quantity;
        self
    }

    /// Sanity checks applied when a record enters the catalog.
    pub fn validate(&self) -> DomainResult<()> {
        if self.barcode.trim().is_empty() {
            return Err(DomainError::validation("barcode cannot be empty"));
        }
        if self.product_number.trim().is_empty() {
            return Err(DomainError::validation("product number cannot be empty"));
        }
        if self.original_price.is_negative() || self.sale_price.is_negative() {
            return Err(DomainError::validation("prices cannot be negative"));
        }
        Ok(())
    }

    /// Shift the HQ-held quantity by `delta` and return the new value.
    ///
    /// Unchanged on overflow.
    pub fn shift_hq_quantity(&mut self, delta: i64) -> DomainResult<i64> {
        self.hq_quantity = self.hq_quantity.checked_add(delta).ok_or_else(|| {
            DomainError::validation(format!(
                "HQ quantity of {} cannot absorb {delta}",
                self.product_number
            ))
        })?;
        Ok(self.hq_quantity)
    }
}
