//! In-memory order store implementation for testing.
//!
//! Provides the same contract as the PostgreSQL implementation. Atomicity
//! is by copy-apply-swap: every write works on a clone of the whole state
//! and the clone only replaces the live state when the write succeeds, so a
//! failed commit leaves nothing behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{CustomerId, OrderId, PizzaId, ToppingId};
use domain::customer::WALK_IN_NAME;
use domain::{
    Crust, Customer, Discount, Order, OrderTransition, OrderType, Pizza, PizzaState, Price, Size,
    Topping, reconcile_doubles,
};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::query::StatusFilter;
use crate::store::{CommitOptions, OrderStore};

#[derive(Debug, Clone, Default)]
struct MemState {
    customers: BTreeMap<i64, Customer>,
    toppings: BTreeMap<i64, Topping>,
    discounts: BTreeMap<i64, Discount>,
    base_prices: HashMap<(Size, Crust), Price>,
    orders: BTreeMap<i64, Order>,
    next_customer_id: i64,
    next_order_id: i64,
    next_pizza_id: i64,
}

impl MemState {
    fn base_price(&self, size: Size, crust: Crust) -> Price {
        self.base_prices
            .get(&(size, crust))
            .copied()
            .unwrap_or(Price::ZERO)
    }

    fn insert_order(&mut self, order: &Order) -> Result<(OrderId, Vec<PizzaId>)> {
        self.next_order_id += 1;
        let order_id = OrderId::new(self.next_order_id);

        let mut stored = order.clone();
        stored.id = Some(order_id);
        // Fulfillment flags always start unset, as in the subtype inserts.
        match &mut stored.order_type {
            OrderType::Pickup { picked_up } => *picked_up = false,
            OrderType::Delivery { delivered, .. } => *delivered = false,
            OrderType::Dinein { .. } => {}
        }

        let mut pizza_ids = Vec::with_capacity(stored.pizzas.len());
        for pizza in &mut stored.pizzas {
            pizza_ids.push(self.insert_pizza(order_id, pizza)?);
        }
        stored.discounts = dedup_discounts(&stored.discounts);

        self.orders.insert(order_id.as_i64(), stored);
        Ok((order_id, pizza_ids))
    }

    /// Stores one pizza under an order: collapses duplicate toppings,
    /// consumes inventory, and assigns the generated id.
    fn insert_pizza(&mut self, order_id: OrderId, pizza: &mut Pizza) -> Result<PizzaId> {
        pizza.toppings = pizza.collapsed_toppings();
        for item in &pizza.toppings {
            self.consume(&item.topping, pizza.size, item.doubled)?;
        }
        pizza.discounts = dedup_discounts(&pizza.discounts);

        self.next_pizza_id += 1;
        let pizza_id = PizzaId::new(self.next_pizza_id);
        pizza.id = Some(pizza_id);
        pizza.order_id = Some(order_id);
        Ok(pizza_id)
    }

    fn consume(&mut self, topping: &Topping, size: Size, doubled: bool) -> Result<()> {
        let required = topping.units_required(size, doubled);
        let Some(row) = self.toppings.get_mut(&topping.id.as_i64()) else {
            return Err(StoreError::UnknownTopping(topping.id));
        };
        if row.cur_invt < required {
            return Err(StoreError::InsufficientInventory {
                topping: row.name.clone(),
                required,
                available: row.cur_invt,
            });
        }
        row.cur_invt -= required;
        Ok(())
    }

    /// Re-joins the attachment rows against the current topping reference
    /// data, the way the SQL read side does.
    fn assemble(&self, order: &Order) -> Order {
        let mut assembled = order.clone();
        for pizza in &mut assembled.pizzas {
            for item in &mut pizza.toppings {
                if let Some(current) = self.toppings.get(&item.topping.id.as_i64()) {
                    item.topping = current.clone();
                }
            }
        }
        assembled
    }
}

fn dedup_discounts(discounts: &[Discount]) -> Vec<Discount> {
    let mut out: Vec<Discount> = Vec::with_capacity(discounts.len());
    for d in discounts {
        if !out.iter().any(|seen| seen.id == d.id) {
            out.push(d.clone());
        }
    }
    out
}

/// In-memory order store.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<MemState>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a topping row. Reference data is pre-existing; the order flow
    /// never creates it, so tests insert it up front with explicit ids.
    pub async fn insert_topping(&self, topping: Topping) {
        let mut state = self.state.write().await;
        state.toppings.insert(topping.id.as_i64(), topping);
    }

    /// Seeds a discount row.
    pub async fn insert_discount(&self, discount: Discount) {
        let mut state = self.state.write().await;
        state.discounts.insert(discount.id.as_i64(), discount);
    }

    /// Seeds one base-price cell.
    pub async fn set_base_price(&self, size: Size, crust: Crust, price: Price) {
        let mut state = self.state.write().await;
        state.base_prices.insert((size, crust), price);
    }

    /// Current stock for a topping, if it exists.
    pub async fn topping_inventory(&self, id: ToppingId) -> Option<f64> {
        let state = self.state.read().await;
        state.toppings.get(&id.as_i64()).map(|t| t.cur_invt)
    }

    /// Number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn commit_order(&self, order: &mut Order, options: CommitOptions) -> Result<OrderId> {
        let mut state = self.state.write().await;

        if options.reconcile_doubles {
            for pizza in order.pizzas.iter_mut() {
                let base = state.base_price(pizza.size, pizza.crust);
                reconcile_doubles(pizza, base);
            }
        }

        let mut work = state.clone();
        let (order_id, pizza_ids) = work.insert_order(order)?;
        *state = work;

        order.id = Some(order_id);
        for (pizza, pizza_id) in order.pizzas.iter_mut().zip(pizza_ids) {
            pizza.id = Some(pizza_id);
            pizza.order_id = Some(order_id);
        }
        Ok(order_id)
    }

    async fn commit_pizza(
        &self,
        order_id: OrderId,
        pizza: &mut Pizza,
        options: CommitOptions,
    ) -> Result<PizzaId> {
        let mut state = self.state.write().await;

        if !state.orders.contains_key(&order_id.as_i64()) {
            return Err(StoreError::UnknownOrder(order_id));
        }
        if options.reconcile_doubles {
            let base = state.base_price(pizza.size, pizza.crust);
            reconcile_doubles(pizza, base);
        }

        let mut work = state.clone();
        let mut stored = pizza.clone();
        let pizza_id = work.insert_pizza(order_id, &mut stored)?;
        let Some(target) = work.orders.get_mut(&order_id.as_i64()) else {
            return Err(StoreError::UnknownOrder(order_id));
        };
        target.pizzas.push(stored);
        *state = work;

        pizza.id = Some(pizza_id);
        pizza.order_id = Some(order_id);
        Ok(pizza_id)
    }

    async fn add_customer(&self, customer: &mut Customer) -> Result<CustomerId> {
        let mut state = self.state.write().await;
        state.next_customer_id += 1;
        let id = CustomerId::new(state.next_customer_id);
        customer.id = Some(id);
        state.customers.insert(id.as_i64(), customer.clone());
        Ok(id)
    }

    async fn advance(&self, order_id: OrderId, target: OrderTransition) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(order) = state.orders.get_mut(&order_id.as_i64()) else {
            return Ok(false);
        };

        let applied = match target {
            OrderTransition::Prepared => {
                order.is_complete = true;
                for pizza in &mut order.pizzas {
                    pizza.state = PizzaState::Completed;
                }
                true
            }
            OrderTransition::PickedUp => match &mut order.order_type {
                OrderType::Pickup { picked_up } => {
                    *picked_up = true;
                    true
                }
                _ => false,
            },
            OrderTransition::Delivered => match &mut order.order_type {
                OrderType::Delivery { delivered, .. } => {
                    *delivered = true;
                    true
                }
                _ => false,
            },
        };
        Ok(applied)
    }

    async fn restock(&self, topping_id: ToppingId, quantity: f64) -> Result<()> {
        if quantity < 0.0 {
            return Err(StoreError::InvalidRestock(quantity));
        }
        let mut state = self.state.write().await;
        let Some(topping) = state.toppings.get_mut(&topping_id.as_i64()) else {
            return Err(StoreError::UnknownTopping(topping_id));
        };
        topping.cur_invt += quantity;
        Ok(())
    }

    async fn orders(&self, filter: StatusFilter) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| filter.matches(o.is_complete))
            .map(|o| state.assemble(o))
            .collect())
    }

    async fn orders_by_date(&self, date: NaiveDate) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.placed_at.date_naive() == date)
            .map(|o| state.assemble(o))
            .collect())
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id.as_i64()).map(|o| state.assemble(o)))
    }

    async fn last_order(&self) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .last_key_value()
            .map(|(_, o)| state.assemble(o)))
    }

    async fn customers(&self) -> Result<Vec<Customer>> {
        let state = self.state.read().await;
        Ok(state.customers.values().cloned().collect())
    }

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        let state = self.state.read().await;
        Ok(state
            .customers
            .values()
            .find(|c| c.phone == phone)
            .cloned())
    }

    async fn customer_name(&self, id: Option<CustomerId>) -> Result<String> {
        let Some(id) = id else {
            return Ok(WALK_IN_NAME.to_string());
        };
        let state = self.state.read().await;
        Ok(state
            .customers
            .get(&id.as_i64())
            .map(Customer::full_name)
            .unwrap_or_else(|| WALK_IN_NAME.to_string()))
    }

    async fn toppings(&self) -> Result<Vec<Topping>> {
        let state = self.state.read().await;
        Ok(state.toppings.values().cloned().collect())
    }

    async fn find_topping_by_name(&self, name: &str) -> Result<Option<Topping>> {
        let state = self.state.read().await;
        Ok(state.toppings.values().find(|t| t.name == name).cloned())
    }

    async fn discounts(&self) -> Result<Vec<Discount>> {
        let state = self.state.read().await;
        Ok(state.discounts.values().cloned().collect())
    }

    async fn find_discount_by_name(&self, name: &str) -> Result<Option<Discount>> {
        let state = self.state.read().await;
        Ok(state.discounts.values().find(|d| d.name == name).cloned())
    }

    async fn base_price(&self, size: Size, crust: Crust) -> Result<Price> {
        let state = self.state.read().await;
        Ok(state.base_price(size, crust))
    }
}
