use async_trait::async_trait;
use chrono::NaiveDate;
use common::{CustomerId, DiscountId, OrderId, PizzaId, ToppingId};
use domain::{Customer, Discount, Order, OrderTransition, Pizza, Price, Topping};

use crate::error::Result;
use crate::query::StatusFilter;

/// Discount ids in first-seen order, duplicates dropped.
///
/// The join tables key on (owner, discount), so a discount listed twice
/// must produce a single link row, like duplicate toppings do.
pub(crate) fn dedup_discount_ids(discounts: &[Discount]) -> Vec<DiscountId> {
    let mut ids: Vec<DiscountId> = Vec::with_capacity(discounts.len());
    for d in discounts {
        if !ids.contains(&d.id) {
            ids.push(d.id);
        }
    }
    ids
}

/// Per-call switches for the commit path.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommitOptions {
    /// Run the topping-double reconciler on each pizza before persisting.
    ///
    /// Set this when the caller's doubled flags are not trustworthy but the
    /// submitted prices are. When unset, flags are taken as-is.
    pub reconcile_doubles: bool,
}

impl CommitOptions {
    /// Options that trust the caller's doubled flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that re-infer doubled flags from the submitted prices.
    pub fn with_reconciliation() -> Self {
        Self {
            reconcile_doubles: true,
        }
    }
}

/// Core trait for order store backends.
///
/// All implementations must be thread-safe (`Send + Sync`), and every
/// multi-row write below is atomic: it either fully persists or leaves the
/// store untouched.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Durably records an order with all of its pizzas, topping links,
    /// discount links, and inventory consumption, as one atomic unit.
    ///
    /// On success the generated order and pizza ids are assigned back onto
    /// the aggregate and the order id is returned. On any failure —
    /// including [`StoreError::InsufficientInventory`](crate::StoreError) —
    /// nothing is persisted and no inventory changes.
    async fn commit_order(&self, order: &mut Order, options: CommitOptions) -> Result<OrderId>;

    /// Appends one pizza to an already-committed order, under the same
    /// atomicity and inventory guarantees as [`commit_order`].
    ///
    /// [`commit_order`]: OrderStore::commit_order
    async fn commit_pizza(
        &self,
        order_id: OrderId,
        pizza: &mut Pizza,
        options: CommitOptions,
    ) -> Result<PizzaId>;

    /// Registers a customer and returns the generated id (also assigned
    /// back onto the customer).
    async fn add_customer(&self, customer: &mut Customer) -> Result<CustomerId>;

    /// Advances an order through the state machine.
    ///
    /// Returns `false` when the transition matched nothing: an unknown
    /// order id, or a pickup/delivery transition on an order of the wrong
    /// type. The wrong-type case is deliberately a no-op, not an error.
    async fn advance(&self, order_id: OrderId, target: OrderTransition) -> Result<bool>;

    /// Adds stock for a topping. The quantity must be non-negative; there
    /// is no upper bound.
    async fn restock(&self, topping_id: ToppingId, quantity: f64) -> Result<()>;

    /// Fetches orders by completion status, fully assembled (subtype data,
    /// pizzas with toppings and discounts), ordered by id.
    async fn orders(&self, filter: StatusFilter) -> Result<Vec<Order>>;

    /// Fetches the orders placed on a calendar date, ordered by id.
    async fn orders_by_date(&self, date: NaiveDate) -> Result<Vec<Order>>;

    /// Fetches one order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Fetches the most recently committed order.
    async fn last_order(&self) -> Result<Option<Order>>;

    /// Lists all customers, ordered by id.
    async fn customers(&self) -> Result<Vec<Customer>>;

    /// Looks up a customer by phone number.
    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>>;

    /// Display name for a customer reference; walk-in orders (and dangling
    /// references) resolve to the in-store name.
    async fn customer_name(&self, id: Option<CustomerId>) -> Result<String>;

    /// Lists the topping reference data, ordered by id.
    async fn toppings(&self) -> Result<Vec<Topping>>;

    /// Looks up a topping by name.
    async fn find_topping_by_name(&self, name: &str) -> Result<Option<Topping>>;

    /// Lists the discount reference data, ordered by id.
    async fn discounts(&self) -> Result<Vec<Discount>>;

    /// Looks up a discount by name.
    async fn find_discount_by_name(&self, name: &str) -> Result<Option<Discount>>;

    /// Base price pair for a size/crust combination.
    ///
    /// An unknown combination yields [`Price::ZERO`], meaning "no price
    /// data" rather than "free".
    async fn base_price(&self, size: domain::Size, crust: domain::Crust) -> Result<Price>;
}
