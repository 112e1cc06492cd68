//! Topping reference data and per-size consumption amounts.

use common::ToppingId;
use serde::{Deserialize, Serialize};

use crate::pizza::Size;

/// A topping row: pricing, per-size consumption, and inventory counters.
///
/// Rows are pre-existing reference data; the order flow never creates them.
/// Inventory counters are mutated only through the store's ledger
/// operations (restock and the commit-path consumption).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topping {
    pub id: ToppingId,
    pub name: String,
    /// Inventory units consumed by one (undoubled) serving, per size.
    pub small_amt: f64,
    pub med_amt: f64,
    pub lg_amt: f64,
    pub xl_amt: f64,
    /// Customer price per consumption unit.
    pub cust_price: f64,
    /// Business cost per consumption unit.
    pub bus_price: f64,
    /// Informational reorder threshold; never blocks consumption.
    pub min_invt: f64,
    pub cur_invt: f64,
}

impl Topping {
    /// Consumption amount for one undoubled serving at the given size.
    pub fn amount_for(&self, size: Size) -> f64 {
        match size {
            Size::Small => self.small_amt,
            Size::Medium => self.med_amt,
            Size::Large => self.lg_amt,
            Size::XLarge => self.xl_amt,
        }
    }

    /// Whole inventory units deducted for one serving.
    ///
    /// Per-size amounts are fractional, but consumption is always deducted
    /// in whole units: the (possibly doubled) amount is rounded up.
    pub fn units_required(&self, size: Size, doubled: bool) -> f64 {
        let amount = self.amount_for(size) * if doubled { 2.0 } else { 1.0 };
        amount.ceil()
    }

    /// True when stock has fallen under the reorder threshold.
    pub fn below_minimum(&self) -> bool {
        self.cur_invt < self.min_invt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topping() -> Topping {
        Topping {
            id: ToppingId::new(1),
            name: "Pepperoni".to_string(),
            small_amt: 0.6,
            med_amt: 1.0,
            lg_amt: 1.5,
            xl_amt: 2.25,
            cust_price: 1.5,
            bus_price: 0.75,
            min_invt: 20.0,
            cur_invt: 100.0,
        }
    }

    #[test]
    fn amount_for_selects_the_size_column() {
        let t = topping();
        assert_eq!(t.amount_for(Size::Small), 0.6);
        assert_eq!(t.amount_for(Size::Medium), 1.0);
        assert_eq!(t.amount_for(Size::Large), 1.5);
        assert_eq!(t.amount_for(Size::XLarge), 2.25);
    }

    #[test]
    fn units_required_rounds_up_to_whole_units() {
        let t = topping();
        assert_eq!(t.units_required(Size::Small, false), 1.0);
        assert_eq!(t.units_required(Size::Medium, false), 1.0);
        assert_eq!(t.units_required(Size::Large, false), 2.0);
    }

    #[test]
    fn doubled_serving_doubles_before_rounding() {
        let t = topping();
        // 0.6 * 2 = 1.2 -> 2 whole units, not 2 * ceil(0.6) = 2.
        assert_eq!(t.units_required(Size::Small, true), 2.0);
        // 1.0 * 2 = 2.0 exactly.
        assert_eq!(t.units_required(Size::Medium, true), 2.0);
        assert_eq!(t.units_required(Size::XLarge, true), 5.0);
    }

    #[test]
    fn below_minimum_is_informational_threshold() {
        let mut t = topping();
        assert!(!t.below_minimum());
        t.cur_invt = 19.0;
        assert!(t.below_minimum());
    }
}
