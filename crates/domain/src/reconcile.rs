//! Topping-double reconciliation.
//!
//! Some call paths submit pizzas whose topping attachments are not reliably
//! flagged doubled, but whose prices already include the doubling. Before
//! such a pizza is persisted, the flags must be inferred back from the
//! price so that inventory consumption and the stored link rows are right.

use crate::discount::Discount;
use crate::pizza::Pizza;
use crate::pricing::Price;

/// Tolerance used when comparing submitted against computed prices.
pub const PRICE_EPSILON: f64 = 1e-6;

/// Infers doubled flags from a pizza's submitted prices.
///
/// Starting from the undoubled expected price (base plus one serving of
/// every attachment, pizza discounts applied to the customer side), the
/// residual against the submitted prices is attributed greedily: each
/// not-yet-doubled attachment is flagged, in attachment order, whenever both
/// residuals still cover its marginal doubling cost.
///
/// This is a single-pass, order-dependent heuristic, not an exact solver:
/// when two attachments have the same marginal cost the earlier one wins,
/// and a decision is never revisited. That behavior is load-bearing for
/// callers that priced their pizzas the same way.
pub fn reconcile_doubles(pizza: &mut Pizza, base: Price) {
    let mut expected_customer = base.customer;
    let mut expected_business = base.business;
    for item in &pizza.toppings {
        let amount = item.topping.amount_for(pizza.size);
        expected_customer += amount * item.topping.cust_price;
        expected_business += amount * item.topping.bus_price;
    }
    expected_customer = Discount::apply_all(expected_customer, &pizza.discounts);

    let mut delta_customer = pizza.cust_price - expected_customer;
    let mut delta_business = pizza.bus_price - expected_business;

    let size = pizza.size;
    for item in &mut pizza.toppings {
        if item.doubled {
            continue;
        }
        let amount = item.topping.amount_for(size);
        let marginal_customer = amount * item.topping.cust_price;
        let marginal_business = amount * item.topping.bus_price;
        if delta_customer + PRICE_EPSILON >= marginal_customer
            && delta_business + PRICE_EPSILON >= marginal_business
        {
            item.doubled = true;
            delta_customer -= marginal_customer;
            delta_business -= marginal_business;
            tracing::debug!(
                topping = %item.topping.name,
                marginal_customer,
                "inferred doubled topping from price residual"
            );
        }
    }
}
