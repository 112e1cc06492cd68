//! Order aggregate: shared header plus the closed order-type variants.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId};
use serde::{Deserialize, Serialize};

use crate::discount::Discount;
use crate::pizza::Pizza;

/// Structured delivery address.
///
/// The legacy front end transmits addresses as one tab-separated string of
/// five fields; [`Address::from_tab_separated`] is the adapter kept for that
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub house_num: i32,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: i32,
}

impl Address {
    /// Parses "houseNum \t street \t city \t state \t zip".
    ///
    /// Parsing is lenient: missing fields and unparsable numbers fall back
    /// to zero/empty values instead of failing, so a malformed address never
    /// aborts an order commit.
    pub fn from_tab_separated(s: &str) -> Self {
        let mut fields = s.split('\t');
        let mut next = || fields.next().unwrap_or("").trim().to_string();
        let house_num = next().parse().unwrap_or(0);
        let street = next();
        let city = next();
        let state = next();
        let zip = next().parse().unwrap_or(0);
        Self {
            house_num,
            street,
            city,
            state,
            zip,
        }
    }

    /// Serializes back to the tab-separated wire form.
    pub fn to_tab_separated(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}",
            self.house_num, self.street, self.city, self.state, self.zip
        )
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}, {}, {} {}",
            self.house_num, self.street, self.city, self.state, self.zip
        )
    }
}

/// The three order types, each carrying its one type-specific attribute.
///
/// This set is closed: commit and state-machine logic dispatch over it with
/// exhaustive matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    Dinein { table_num: i32 },
    Pickup { picked_up: bool },
    Delivery { address: Address, delivered: bool },
}

impl OrderType {
    /// The `order_type` column value for this variant.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderType::Dinein { .. } => "dinein",
            OrderType::Pickup { .. } => "pickup",
            OrderType::Delivery { .. } => "delivery",
        }
    }
}

/// Target of an order state-machine transition.
///
/// Order completion and type-specific fulfillment are orthogonal flags, not
/// a linear chain: an order can be prepared before or after pickup/delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTransition {
    /// Order completion: marks the order complete and its pizzas completed.
    Prepared,
    /// Pickup fulfillment; meaningful only for pickup orders.
    PickedUp,
    /// Delivery fulfillment; meaningful only for delivery orders.
    Delivered,
}

/// An order: shared header, one typed variant, pizzas, and discounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Store-assigned key; `None` until committed.
    pub id: Option<OrderId>,
    /// `None` for walk-in orders.
    pub customer: Option<CustomerId>,
    pub order_type: OrderType,
    pub placed_at: DateTime<Utc>,
    /// Submitted customer price for the whole order.
    pub cust_price: f64,
    /// Submitted business cost for the whole order.
    pub bus_price: f64,
    pub is_complete: bool,
    pub pizzas: Vec<Pizza>,
    /// Order-level discounts in application order.
    pub discounts: Vec<Discount>,
}

impl Order {
    /// Creates an uncommitted order for a customer (`None` = walk-in).
    pub fn new(order_type: OrderType, customer: Option<CustomerId>) -> Self {
        Self {
            id: None,
            customer,
            order_type,
            placed_at: Utc::now(),
            cust_price: 0.0,
            bus_price: 0.0,
            is_complete: false,
            pizzas: Vec::new(),
            discounts: Vec::new(),
        }
    }

    pub fn add_pizza(&mut self, pizza: Pizza) {
        self.pizzas.push(pizza);
    }

    pub fn add_discount(&mut self, discount: Discount) {
        self.discounts.push(discount);
    }

    /// True when no customer record is attached.
    pub fn is_walk_in(&self) -> bool {
        self.customer.is_none()
    }
}
