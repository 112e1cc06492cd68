use serde::{Deserialize, Serialize};

/// Declares a typed wrapper over an `i64` surrogate key.
///
/// The store assigns these keys at insert time; callers never invent them
/// except when seeding reference data.
macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw key from the store.
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw key.
            pub fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

id_type! {
    /// Key of a `customer` row.
    CustomerId
}

id_type! {
    /// Key of an `ordertable` row.
    OrderId
}

id_type! {
    /// Key of a `pizza` row.
    PizzaId
}

id_type! {
    /// Key of a `topping` row.
    ToppingId
}

id_type! {
    /// Key of a `discount` row.
    DiscountId
}
