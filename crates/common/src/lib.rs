//! Shared identifier types for the pizzeria backend.
//!
//! Every persisted entity is keyed by a store-assigned surrogate key. The
//! newtypes here keep those keys from being mixed up across tables.

mod types;

pub use types::{CustomerId, DiscountId, OrderId, PizzaId, ToppingId};
