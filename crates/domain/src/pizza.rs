//! Pizza aggregate: size and crust enumerations, lifecycle state, and the
//! ordered topping attachments.

use chrono::{DateTime, Utc};
use common::{OrderId, PizzaId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::discount::Discount;
use crate::topping::Topping;

/// A string did not match any variant of a closed enumeration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {what}: {value:?}")]
pub struct UnknownVariant {
    pub what: &'static str,
    pub value: String,
}

/// Pizza size. Closed set of four values matching the `baseprice` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Size {
    Small,
    Medium,
    Large,
    XLarge,
}

impl Size {
    pub const ALL: [Size; 4] = [Size::Small, Size::Medium, Size::Large, Size::XLarge];

    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Small => "Small",
            Size::Medium => "Medium",
            Size::Large => "Large",
            Size::XLarge => "XLarge",
        }
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Size {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Small" => Ok(Size::Small),
            "Medium" => Ok(Size::Medium),
            "Large" => Ok(Size::Large),
            "XLarge" => Ok(Size::XLarge),
            other => Err(UnknownVariant {
                what: "size",
                value: other.to_string(),
            }),
        }
    }
}

/// Crust type. Closed set of four values matching the `baseprice` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crust {
    Thin,
    Original,
    Pan,
    GlutenFree,
}

impl Crust {
    pub const ALL: [Crust; 4] = [Crust::Thin, Crust::Original, Crust::Pan, Crust::GlutenFree];

    pub fn as_str(&self) -> &'static str {
        match self {
            Crust::Thin => "Thin",
            Crust::Original => "Original",
            Crust::Pan => "Pan",
            Crust::GlutenFree => "Gluten-Free",
        }
    }
}

impl std::fmt::Display for Crust {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Crust {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Thin" => Ok(Crust::Thin),
            "Original" => Ok(Crust::Original),
            "Pan" => Ok(Crust::Pan),
            "Gluten-Free" => Ok(Crust::GlutenFree),
            other => Err(UnknownVariant {
                what: "crust",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of a pizza row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PizzaState {
    #[default]
    InProgress,
    Completed,
}

impl PizzaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PizzaState::InProgress => "in_progress",
            PizzaState::Completed => "completed",
        }
    }
}

impl std::fmt::Display for PizzaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PizzaState {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(PizzaState::InProgress),
            "completed" => Ok(PizzaState::Completed),
            other => Err(UnknownVariant {
                what: "pizza state",
                value: other.to_string(),
            }),
        }
    }
}

/// A topping attached to one pizza.
///
/// `doubled` is pizza-scoped: the same topping row can be doubled on one
/// pizza and single on another. Doubled means 2x the per-size consumption
/// amount and 2x the per-unit price for this pizza.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToppingItem {
    pub topping: Topping,
    pub doubled: bool,
}

/// A pizza within an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pizza {
    /// Store-assigned key; `None` until committed.
    pub id: Option<PizzaId>,
    /// Owning order; `None` until committed.
    pub order_id: Option<OrderId>,
    pub size: Size,
    pub crust: Crust,
    pub state: PizzaState,
    pub created_at: DateTime<Utc>,
    /// Submitted customer price for the whole pizza.
    pub cust_price: f64,
    /// Submitted business cost for the whole pizza.
    pub bus_price: f64,
    /// Topping attachments in submission order.
    pub toppings: Vec<ToppingItem>,
    /// Pizza-level discounts in application order.
    pub discounts: Vec<Discount>,
}

impl Pizza {
    /// Creates an uncommitted, in-progress pizza with no price set.
    pub fn new(size: Size, crust: Crust) -> Self {
        Self {
            id: None,
            order_id: None,
            size,
            crust,
            state: PizzaState::InProgress,
            created_at: Utc::now(),
            cust_price: 0.0,
            bus_price: 0.0,
            toppings: Vec::new(),
            discounts: Vec::new(),
        }
    }

    pub fn add_topping(&mut self, topping: Topping, doubled: bool) {
        self.toppings.push(ToppingItem { topping, doubled });
    }

    pub fn add_discount(&mut self, discount: Discount) {
        self.discounts.push(discount);
    }

    /// "Large Original" style display label.
    pub fn label(&self) -> String {
        format!("{} {}", self.size, self.crust)
    }

    /// Collapses duplicate topping attachments for persistence.
    ///
    /// The store keeps at most one link row per (pizza, topping) pair, so
    /// repeated attachments of the same topping id fold into a single item
    /// whose doubled flag is the OR across the duplicates. First-seen order
    /// is preserved.
    pub fn collapsed_toppings(&self) -> Vec<ToppingItem> {
        let mut collapsed: Vec<ToppingItem> = Vec::with_capacity(self.toppings.len());
        for item in &self.toppings {
            match collapsed
                .iter_mut()
                .find(|seen| seen.topping.id == item.topping.id)
            {
                Some(seen) => seen.doubled |= item.doubled,
                None => collapsed.push(item.clone()),
            }
        }
        collapsed
    }
}
