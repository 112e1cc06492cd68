//! Typed reporting queries over the SQL views.
//!
//! The presentation layer renders these rows; this module only shapes them.
//! The views live in the migrations, so the surface is Postgres-only.

use sqlx::Row;

use crate::error::Result;
use crate::postgres::PostgresOrderStore;

/// How often each topping appears on a pizza.
#[derive(Debug, Clone, PartialEq)]
pub struct ToppingPopularityRow {
    pub topping: String,
    pub count: i64,
}

/// Profit per size/crust combination per month.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitByPizzaRow {
    pub size: String,
    pub crust: String,
    pub profit: f64,
    pub month: String,
}

/// Revenue, cost, and profit per order type per month.
///
/// The view's grand-total row carries `None` for both type and month.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfitByOrderTypeRow {
    pub order_type: Option<String>,
    pub month: Option<String>,
    pub total_price: f64,
    pub total_cost: f64,
    pub profit: f64,
}

impl PostgresOrderStore {
    /// Topping usage counts, most popular first.
    pub async fn topping_popularity(&self) -> Result<Vec<ToppingPopularityRow>> {
        let rows = sqlx::query(
            "SELECT topping, topping_count FROM topping_popularity \
             ORDER BY topping_count DESC, topping",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ToppingPopularityRow {
                    topping: row.try_get("topping")?,
                    count: row.try_get("topping_count")?,
                })
            })
            .collect()
    }

    /// Monthly profit per size/crust combination.
    pub async fn profit_by_pizza(&self) -> Result<Vec<ProfitByPizzaRow>> {
        let rows = sqlx::query(
            "SELECT size, crust_type, profit, order_month FROM profit_by_pizza \
             ORDER BY order_month, size, crust_type",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ProfitByPizzaRow {
                    size: row.try_get("size")?,
                    crust: row.try_get("crust_type")?,
                    profit: row.try_get("profit")?,
                    month: row.try_get("order_month")?,
                })
            })
            .collect()
    }

    /// Monthly totals per order type, with a grand-total row last.
    pub async fn profit_by_order_type(&self) -> Result<Vec<ProfitByOrderTypeRow>> {
        let rows = sqlx::query(
            "SELECT order_type, order_month, total_price, total_cost, profit \
             FROM profit_by_order_type \
             ORDER BY order_type NULLS LAST, order_month",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ProfitByOrderTypeRow {
                    order_type: row.try_get("order_type")?,
                    month: row.try_get("order_month")?,
                    total_price: row.try_get("total_price")?,
                    total_cost: row.try_get("total_cost")?,
                    profit: row.try_get("profit")?,
                })
            })
            .collect()
    }
}
