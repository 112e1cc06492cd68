//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{CustomerId, OrderId, ToppingId};
use domain::{
    Address, Crust, Customer, Order, OrderTransition, OrderType, Pizza, PizzaState, Price, Size,
    Topping, order_totals,
};
use order_store::{CommitOptions, OrderStore, PostgresOrderStore, StatusFilter, StoreError};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Run the migrations once on a temporary pool
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresOrderStore::new(temp_pool.clone())
                .run_migrations()
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool, cleared tables, and the standard
/// reference data (two toppings, one discount, one base price).
async fn get_test_store() -> PostgresOrderStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE pizza_discount, order_discount, pizza_topping, pizza, \
         dinein, pickup, delivery, ordertable, customer, topping, discount, baseprice \
         RESTART IDENTITY CASCADE",
    )
    .execute(&pool)
    .await
    .unwrap();

    seed_reference_data(&pool).await;
    PostgresOrderStore::new(pool)
}

async fn seed_reference_data(pool: &PgPool) {
    for (id, name, cust, bus) in [(1i64, "Pepperoni", 1.5, 0.6), (2, "Cheese", 1.0, 0.4)] {
        sqlx::query(
            "INSERT INTO topping \
             (top_id, top_name, small_amt, med_amt, lg_amt, xl_amt, cust_price, bus_price, min_invt, cur_invt) \
             VALUES ($1, $2, 0.5, 0.75, 1.0, 1.5, $3, $4, 20, 100)",
        )
        .bind(id)
        .bind(name)
        .bind(cust)
        .bind(bus)
        .execute(pool)
        .await
        .unwrap();
    }

    sqlx::query(
        "INSERT INTO discount (discount_id, discount_name, amount, is_percent) \
         VALUES (1, '10% off', 10, TRUE)",
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO baseprice (size, crust_type, cust_price, bus_price) \
         VALUES ('Large', 'Original', 10.0, 4.0)",
    )
    .execute(pool)
    .await
    .unwrap();
}

async fn topping_row(store: &PostgresOrderStore, name: &str) -> Topping {
    store.find_topping_by_name(name).await.unwrap().unwrap()
}

async fn stock_of(store: &PostgresOrderStore, name: &str) -> f64 {
    topping_row(store, name).await.cur_invt
}

fn delivery_type() -> OrderType {
    OrderType::Delivery {
        address: Address::from_tab_separated("123\tMain St\tClemson\tSC\t29634"),
        delivered: false,
    }
}

/// One Large/Original pizza: Pepperoni single, Cheese doubled, $13.50/$5.40.
async fn scenario_pizza(store: &PostgresOrderStore, cheese_flagged: bool) -> Pizza {
    let mut pizza = Pizza::new(Size::Large, Crust::Original);
    pizza.state = PizzaState::Completed;
    pizza.add_topping(topping_row(store, "Pepperoni").await, false);
    pizza.add_topping(topping_row(store, "Cheese").await, cheese_flagged);
    pizza.cust_price = 13.5;
    pizza.bus_price = 5.4;
    pizza
}

#[tokio::test]
async fn commit_and_assemble_round_trip() {
    let store = get_test_store().await;

    let mut order = Order::new(delivery_type(), None);
    order.add_pizza(scenario_pizza(&store, true).await);
    let discount = store
        .find_discount_by_name("10% off")
        .await
        .unwrap()
        .unwrap();
    order.add_discount(discount);
    let totals = order_totals(&order);
    order.cust_price = totals.customer;
    order.bus_price = totals.business;

    let order_id = store
        .commit_order(&mut order, CommitOptions::new())
        .await
        .unwrap();
    assert_eq!(order.id, Some(order_id));
    assert_eq!(order.pizzas[0].order_id, Some(order_id));

    let stored = store.order(order_id).await.unwrap().unwrap();
    assert!((stored.cust_price - 12.15).abs() < 1e-9);
    assert!(!stored.is_complete);
    match &stored.order_type {
        OrderType::Delivery { address, delivered } => {
            assert_eq!(address.street, "Main St");
            assert_eq!(address.zip, 29634);
            assert!(!delivered);
        }
        other => panic!("expected delivery, got {other:?}"),
    }
    assert_eq!(stored.discounts.len(), 1);
    assert_eq!(stored.pizzas.len(), 1);

    let pizza = &stored.pizzas[0];
    assert_eq!(pizza.state, PizzaState::Completed);
    assert_eq!(pizza.toppings.len(), 2);
    let cheese = pizza
        .toppings
        .iter()
        .find(|i| i.topping.name == "Cheese")
        .unwrap();
    assert!(cheese.doubled);

    // Pepperoni 1 whole unit, Cheese doubled 2 whole units.
    assert_eq!(stock_of(&store, "Pepperoni").await, 99.0);
    assert_eq!(stock_of(&store, "Cheese").await, 98.0);
}

#[tokio::test]
async fn insufficient_inventory_rolls_back_the_whole_commit() {
    let store = get_test_store().await;
    sqlx::query(
        "INSERT INTO topping \
         (top_id, top_name, small_amt, med_amt, lg_amt, xl_amt, cust_price, bus_price, min_invt, cur_invt) \
         VALUES (3, 'Anchovy', 0.6, 0.8, 1.0, 1.2, 2.0, 1.0, 5, 0.5)",
    )
    .execute(store.pool())
    .await
    .unwrap();

    let mut order = Order::new(delivery_type(), None);
    order.add_pizza(scenario_pizza(&store, false).await);
    let mut starved = Pizza::new(Size::Small, Crust::Original);
    starved.add_topping(topping_row(&store, "Anchovy").await, false);
    order.add_pizza(starved);

    let err = store
        .commit_order(&mut order, CommitOptions::new())
        .await
        .unwrap_err();
    match err {
        StoreError::InsufficientInventory {
            topping,
            required,
            available,
        } => {
            assert_eq!(topping, "Anchovy");
            assert_eq!(required, 1.0);
            assert_eq!(available, 0.5);
        }
        other => panic!("expected InsufficientInventory, got {other:?}"),
    }

    // Pre-call state exactly: no orders, no inventory movement, no ids.
    assert!(store.orders(StatusFilter::All).await.unwrap().is_empty());
    assert_eq!(stock_of(&store, "Pepperoni").await, 100.0);
    assert_eq!(stock_of(&store, "Cheese").await, 100.0);
    assert_eq!(stock_of(&store, "Anchovy").await, 0.5);
    assert!(order.id.is_none());
    assert!(order.pizzas[0].id.is_none());
}

#[tokio::test]
async fn duplicate_topping_collapses_into_one_doubled_link() {
    let store = get_test_store().await;

    let mut pizza = Pizza::new(Size::Large, Crust::Original);
    let cheese = topping_row(&store, "Cheese").await;
    pizza.add_topping(cheese.clone(), true);
    pizza.add_topping(cheese, false);
    let mut order = Order::new(OrderType::Pickup { picked_up: false }, None);
    order.add_pizza(pizza);

    let order_id = store
        .commit_order(&mut order, CommitOptions::new())
        .await
        .unwrap();

    let link_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pizza_topping pt \
         JOIN pizza p ON p.pizza_id = pt.pizza_id WHERE p.order_id = $1",
    )
    .bind(order_id.as_i64())
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(link_count, 1);

    let stored = store.order(order_id).await.unwrap().unwrap();
    assert!(stored.pizzas[0].toppings[0].doubled);
    assert_eq!(stock_of(&store, "Cheese").await, 98.0);
}

#[tokio::test]
async fn reconciliation_on_commit_recovers_the_doubled_cheese() {
    let store = get_test_store().await;

    // Price says Cheese was doubled; the flag went missing on the way in.
    let mut order = Order::new(delivery_type(), None);
    order.add_pizza(scenario_pizza(&store, false).await);

    let order_id = store
        .commit_order(&mut order, CommitOptions::with_reconciliation())
        .await
        .unwrap();

    let stored = store.order(order_id).await.unwrap().unwrap();
    let flags: Vec<(String, bool)> = stored.pizzas[0]
        .toppings
        .iter()
        .map(|i| (i.topping.name.clone(), i.doubled))
        .collect();
    assert!(flags.contains(&("Cheese".to_string(), true)));
    assert!(flags.contains(&("Pepperoni".to_string(), false)));
    assert_eq!(stock_of(&store, "Cheese").await, 98.0);
}

#[tokio::test]
async fn advance_prepared_completes_order_and_pizzas() {
    let store = get_test_store().await;
    let mut order = Order::new(OrderType::Pickup { picked_up: false }, None);
    let mut pizza = scenario_pizza(&store, true).await;
    pizza.state = PizzaState::InProgress;
    order.add_pizza(pizza);
    let order_id = store
        .commit_order(&mut order, CommitOptions::new())
        .await
        .unwrap();

    assert!(
        store
            .advance(order_id, OrderTransition::Prepared)
            .await
            .unwrap()
    );

    let stored = store.order(order_id).await.unwrap().unwrap();
    assert!(stored.is_complete);
    assert!(
        stored
            .pizzas
            .iter()
            .all(|p| p.state == PizzaState::Completed)
    );

    // A pickup order can then be picked up; the delivered transition
    // matches nothing on it.
    assert!(
        store
            .advance(order_id, OrderTransition::PickedUp)
            .await
            .unwrap()
    );
    assert!(
        !store
            .advance(order_id, OrderTransition::Delivered)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn pickup_transition_on_a_delivery_order_is_a_noop() {
    let store = get_test_store().await;
    let mut order = Order::new(delivery_type(), None);
    let order_id = store
        .commit_order(&mut order, CommitOptions::new())
        .await
        .unwrap();

    assert!(
        !store
            .advance(order_id, OrderTransition::PickedUp)
            .await
            .unwrap()
    );

    let stored = store.order(order_id).await.unwrap().unwrap();
    assert!(!stored.is_complete);
    match stored.order_type {
        OrderType::Delivery { delivered, .. } => assert!(!delivered),
        other => panic!("expected delivery, got {other:?}"),
    }

    assert!(
        !store
            .advance(OrderId::new(999), OrderTransition::Prepared)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn commit_pizza_appends_under_the_same_guarantees() {
    let store = get_test_store().await;
    let mut order = Order::new(OrderType::Dinein { table_num: 4 }, None);
    let order_id = store
        .commit_order(&mut order, CommitOptions::new())
        .await
        .unwrap();

    let mut pizza = scenario_pizza(&store, true).await;
    let pizza_id = store
        .commit_pizza(order_id, &mut pizza, CommitOptions::new())
        .await
        .unwrap();
    assert_eq!(pizza.id, Some(pizza_id));

    let stored = store.order(order_id).await.unwrap().unwrap();
    assert_eq!(stored.pizzas.len(), 1);

    let mut another = scenario_pizza(&store, true).await;
    let err = store
        .commit_pizza(OrderId::new(404), &mut another, CommitOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownOrder(_)));
}

#[tokio::test]
async fn restock_and_inventory_validation() {
    let store = get_test_store().await;

    store.restock(ToppingId::new(1), 12.5).await.unwrap();
    assert_eq!(stock_of(&store, "Pepperoni").await, 112.5);

    let err = store.restock(ToppingId::new(1), -1.0).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidRestock(_)));

    let err = store.restock(ToppingId::new(99), 1.0).await.unwrap_err();
    assert!(matches!(err, StoreError::UnknownTopping(_)));
}

#[tokio::test]
async fn order_listings_and_filters() {
    let store = get_test_store().await;
    let mut first = Order::new(OrderType::Dinein { table_num: 1 }, None);
    let first_id = store
        .commit_order(&mut first, CommitOptions::new())
        .await
        .unwrap();
    let mut second = Order::new(delivery_type(), None);
    let second_id = store
        .commit_order(&mut second, CommitOptions::new())
        .await
        .unwrap();

    store
        .advance(first_id, OrderTransition::Prepared)
        .await
        .unwrap();

    assert_eq!(store.orders(StatusFilter::Open).await.unwrap().len(), 1);
    assert_eq!(store.orders(StatusFilter::Closed).await.unwrap().len(), 1);
    assert_eq!(store.orders(StatusFilter::All).await.unwrap().len(), 2);
    assert_eq!(
        store.last_order().await.unwrap().unwrap().id,
        Some(second_id)
    );

    let today = second.placed_at.date_naive();
    assert_eq!(store.orders_by_date(today).await.unwrap().len(), 2);
}

#[tokio::test]
async fn customer_registration_and_lookup() {
    let store = get_test_store().await;

    let mut customer = Customer::new("Ada", "Lovelace", "864-555-0100");
    let id = store.add_customer(&mut customer).await.unwrap();
    assert_eq!(customer.id, Some(id));

    let mut order = Order::new(OrderType::Pickup { picked_up: false }, Some(id));
    let order_id = store
        .commit_order(&mut order, CommitOptions::new())
        .await
        .unwrap();
    let stored = store.order(order_id).await.unwrap().unwrap();
    assert_eq!(stored.customer, Some(id));

    let found = store
        .find_customer_by_phone("864-555-0100")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.full_name(), "Ada Lovelace");
    assert!(
        store
            .find_customer_by_phone("000")
            .await
            .unwrap()
            .is_none()
    );

    assert_eq!(store.customer_name(Some(id)).await.unwrap(), "Ada Lovelace");
    assert_eq!(store.customer_name(None).await.unwrap(), "IN STORE");
    assert_eq!(
        store
            .customer_name(Some(CustomerId::new(77)))
            .await
            .unwrap(),
        "IN STORE"
    );
}

#[tokio::test]
async fn base_price_falls_back_to_zero_for_unknown_combinations() {
    let store = get_test_store().await;

    let known = store
        .base_price(Size::Large, Crust::Original)
        .await
        .unwrap();
    assert_eq!(known, Price::new(10.0, 4.0));

    let missing = store.base_price(Size::Small, Crust::Pan).await.unwrap();
    assert!(missing.is_zero());
}

#[tokio::test]
async fn reporting_views_aggregate_committed_orders() {
    let store = get_test_store().await;

    let mut order = Order::new(delivery_type(), None);
    order.add_pizza(scenario_pizza(&store, true).await);
    order.cust_price = 13.5;
    order.bus_price = 5.4;
    store
        .commit_order(&mut order, CommitOptions::new())
        .await
        .unwrap();

    let popularity = store.topping_popularity().await.unwrap();
    let cheese = popularity.iter().find(|r| r.topping == "Cheese").unwrap();
    assert_eq!(cheese.count, 1);

    let by_pizza = store.profit_by_pizza().await.unwrap();
    assert_eq!(by_pizza.len(), 1);
    assert_eq!(by_pizza[0].size, "Large");
    assert!((by_pizza[0].profit - 8.1).abs() < 1e-9);

    let by_type = store.profit_by_order_type().await.unwrap();
    let delivery = by_type
        .iter()
        .find(|r| r.order_type.as_deref() == Some("delivery"))
        .unwrap();
    assert!((delivery.profit - 8.1).abs() < 1e-9);
    let grand_total = by_type.iter().find(|r| r.order_type.is_none()).unwrap();
    assert!((grand_total.total_price - 13.5).abs() < 1e-9);
}
