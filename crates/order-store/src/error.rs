use common::{OrderId, ToppingId};
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Stock could not cover a consumption inside the commit transaction.
    /// The whole transaction rolls back; nothing is persisted.
    #[error(
        "insufficient inventory for {topping}: need {required} whole units, {available} on hand"
    )]
    InsufficientInventory {
        topping: String,
        required: f64,
        available: f64,
    },

    /// A pizza referenced a topping id missing from the reference data.
    #[error("unknown topping: {0}")]
    UnknownTopping(ToppingId),

    /// A pizza commit targeted an order that does not exist.
    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),

    /// Restock quantities must be non-negative.
    #[error("invalid restock quantity: {0}")]
    InvalidRestock(f64),

    /// A stored string did not map back onto a closed domain enumeration.
    #[error("corrupt row: {0}")]
    Corrupt(#[from] domain::UnknownVariant),

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
