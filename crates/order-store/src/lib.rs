//! Relational store for the pizzeria backend.
//!
//! The [`OrderStore`] trait is the seam between front-end callers and the
//! storage backends:
//! - [`PostgresOrderStore`] persists to PostgreSQL via sqlx, with the order
//!   commit wrapped in a single database transaction.
//! - [`InMemoryOrderStore`] provides the same contract for tests and
//!   docker-less callers.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod reports;
pub mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use query::StatusFilter;
pub use reports::{ProfitByOrderTypeRow, ProfitByPizzaRow, ToppingPopularityRow};
pub use store::{CommitOptions, OrderStore};
