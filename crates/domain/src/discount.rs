//! Discount entity and price adjustment.

use common::DiscountId;
use serde::{Deserialize, Serialize};

/// A discount row from the reference data.
///
/// Applies to either an order or a pizza through the respective join tables.
/// `is_percent` selects between percentage and flat-amount semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    pub name: String,
    pub amount: f64,
    pub is_percent: bool,
}

impl Discount {
    pub fn new(id: DiscountId, name: impl Into<String>, amount: f64, is_percent: bool) -> Self {
        Self {
            id,
            name: name.into(),
            amount,
            is_percent,
        }
    }

    /// Applies this discount to a price.
    ///
    /// Percentage discounts multiply by `(1 - amount/100)`; flat discounts
    /// subtract `amount`.
    pub fn apply(&self, price: f64) -> f64 {
        if self.is_percent {
            price * (1.0 - self.amount / 100.0)
        } else {
            price - self.amount
        }
    }

    /// Applies a list of discounts in list order.
    ///
    /// Order matters: percentage and flat discounts do not commute in
    /// general, and the submitted prices were computed in this order.
    pub fn apply_all(price: f64, discounts: &[Discount]) -> f64 {
        discounts.iter().fold(price, |p, d| d.apply(p))
    }
}
