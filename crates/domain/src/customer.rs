//! Customer entity.

use common::CustomerId;
use serde::{Deserialize, Serialize};

/// Name shown for orders with no customer record (walk-in / dine-in).
pub const WALK_IN_NAME: &str = "IN STORE";

/// A registered customer.
///
/// Customers are created on self-service registration or looked up by phone
/// at order time. The phone number is unique per business rule; the schema
/// does not enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Store-assigned key; `None` until the customer has been added.
    pub id: Option<CustomerId>,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

impl Customer {
    /// Creates an unregistered customer.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: phone.into(),
        }
    }

    /// Returns "First Last" for display.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
