//! Domain model for the pizzeria backend.
//!
//! This crate provides the value-like entities persisted by the store and
//! every piece of pure order logic:
//! - Customer, Topping, Discount, Pizza, and Order (with its three closed
//!   order-type variants)
//! - price computation for pizzas and whole orders
//! - the topping-double reconciler that infers doubled flags from a
//!   submitted price

pub mod customer;
pub mod discount;
pub mod order;
pub mod pizza;
pub mod pricing;
pub mod reconcile;
pub mod topping;

pub use customer::Customer;
pub use discount::Discount;
pub use order::{Address, Order, OrderTransition, OrderType};
pub use pizza::{Crust, Pizza, PizzaState, Size, ToppingItem, UnknownVariant};
pub use pricing::{Price, expected_pizza_price, order_totals};
pub use reconcile::{PRICE_EPSILON, reconcile_doubles};
pub use topping::Topping;
