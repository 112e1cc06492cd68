//! Price pairs and expected-price computation.

use serde::{Deserialize, Serialize};

use crate::discount::Discount;
use crate::order::Order;
use crate::pizza::Pizza;

/// Customer price and business cost for one priced item.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Price {
    pub customer: f64,
    pub business: f64,
}

impl Price {
    /// The "no price data" fallback returned for unknown size/crust
    /// combinations. Callers must not read this as "free".
    pub const ZERO: Price = Price {
        customer: 0.0,
        business: 0.0,
    };

    pub fn new(customer: f64, business: f64) -> Self {
        Self { customer, business }
    }

    pub fn is_zero(&self) -> bool {
        self.customer == 0.0 && self.business == 0.0
    }
}

impl std::ops::Add for Price {
    type Output = Price;

    fn add(self, rhs: Self) -> Self::Output {
        Price {
            customer: self.customer + rhs.customer,
            business: self.business + rhs.business,
        }
    }
}

impl std::ops::AddAssign for Price {
    fn add_assign(&mut self, rhs: Self) {
        self.customer += rhs.customer;
        self.business += rhs.business;
    }
}

/// Computes a pizza's price from its base price and current topping flags.
///
/// Customer price is base plus topping charges (doubled toppings at 2x),
/// adjusted by the pizza-level discounts in list order. Business cost is
/// base cost plus topping costs; discounts do not reduce cost.
pub fn expected_pizza_price(base: Price, pizza: &Pizza) -> Price {
    let mut customer = base.customer;
    let mut business = base.business;
    for item in &pizza.toppings {
        let amount = item.topping.amount_for(pizza.size) * if item.doubled { 2.0 } else { 1.0 };
        customer += amount * item.topping.cust_price;
        business += amount * item.topping.bus_price;
    }
    Price {
        customer: Discount::apply_all(customer, &pizza.discounts),
        business,
    }
}

/// Computes an order's totals from its pizzas' submitted prices.
///
/// Customer total is the sum of pizza prices adjusted by the order-level
/// discounts in list order; business total is the plain cost sum.
pub fn order_totals(order: &Order) -> Price {
    let customer: f64 = order.pizzas.iter().map(|p| p.cust_price).sum();
    let business: f64 = order.pizzas.iter().map(|p| p.bus_price).sum();
    Price {
        customer: Discount::apply_all(customer, &order.discounts),
        business,
    }
}
