//! PostgreSQL-backed order store implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{CustomerId, OrderId, PizzaId, ToppingId};
use domain::customer::WALK_IN_NAME;
use domain::{
    Address, Crust, Customer, Discount, Order, OrderTransition, OrderType, Pizza, PizzaState,
    Price, Size, Topping, ToppingItem, reconcile_doubles,
};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::error::{Result, StoreError};
use crate::query::StatusFilter;
use crate::store::{CommitOptions, OrderStore, dedup_discount_ids};

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn commit_order_tx(&self, order: &mut Order, options: CommitOptions) -> Result<OrderId> {
        let mut tx = self.pool.begin().await?;

        let raw_order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO ordertable (order_type, order_date, cust_price, bus_price, is_complete, cust_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING order_id
            "#,
        )
        .bind(order.order_type.kind())
        .bind(order.placed_at)
        .bind(order.cust_price)
        .bind(order.bus_price)
        .bind(order.is_complete)
        .bind(order.customer.map(|c| c.as_i64()))
        .fetch_one(&mut *tx)
        .await?;

        let order_id = OrderId::new(raw_order_id);
        insert_subtype(&mut tx, order_id, &order.order_type).await?;

        let mut pizza_ids = Vec::with_capacity(order.pizzas.len());
        for pizza in order.pizzas.iter_mut() {
            pizza_ids.push(insert_pizza(&mut tx, order_id, pizza, options).await?);
        }

        for discount_id in dedup_discount_ids(&order.discounts) {
            sqlx::query("INSERT INTO order_discount (order_id, discount_id) VALUES ($1, $2)")
                .bind(order_id.as_i64())
                .bind(discount_id.as_i64())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        // Generated keys are assigned back only once the transaction is
        // durable, so a rolled-back order never carries ids.
        order.id = Some(order_id);
        for (pizza, pizza_id) in order.pizzas.iter_mut().zip(pizza_ids) {
            pizza.id = Some(pizza_id);
            pizza.order_id = Some(order_id);
        }
        Ok(order_id)
    }

    async fn commit_pizza_tx(
        &self,
        order_id: OrderId,
        pizza: &mut Pizza,
        options: CommitOptions,
    ) -> Result<PizzaId> {
        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM ordertable WHERE order_id = $1)")
            .bind(order_id.as_i64())
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(StoreError::UnknownOrder(order_id));
        }

        let pizza_id = insert_pizza(&mut tx, order_id, pizza, options).await?;
        tx.commit().await?;

        pizza.id = Some(pizza_id);
        pizza.order_id = Some(order_id);
        Ok(pizza_id)
    }

    /// Rebuilds a full order aggregate from a header row.
    ///
    /// Returns `None` when the subtype row is missing; such orders are
    /// skipped from listings rather than failing the whole query.
    async fn assemble_order(&self, row: &PgRow) -> Result<Option<Order>> {
        let raw_order_id: i64 = row.try_get("order_id")?;
        let kind: String = row.try_get("order_type")?;

        let order_type = match kind.as_str() {
            "dinein" => {
                let table_num: Option<i32> =
                    sqlx::query_scalar("SELECT table_num FROM dinein WHERE order_id = $1")
                        .bind(raw_order_id)
                        .fetch_optional(&self.pool)
                        .await?;
                match table_num {
                    Some(table_num) => OrderType::Dinein { table_num },
                    None => return Ok(None),
                }
            }
            "pickup" => {
                let picked_up: Option<bool> =
                    sqlx::query_scalar("SELECT is_picked_up FROM pickup WHERE order_id = $1")
                        .bind(raw_order_id)
                        .fetch_optional(&self.pool)
                        .await?;
                match picked_up {
                    Some(picked_up) => OrderType::Pickup { picked_up },
                    None => return Ok(None),
                }
            }
            "delivery" => {
                let delivery = sqlx::query(
                    "SELECT house_num, street, city, state, zip, is_delivered FROM delivery WHERE order_id = $1",
                )
                .bind(raw_order_id)
                .fetch_optional(&self.pool)
                .await?;
                match delivery {
                    Some(d) => OrderType::Delivery {
                        address: Address {
                            house_num: d.try_get("house_num")?,
                            street: d.try_get("street")?,
                            city: d.try_get("city")?,
                            state: d.try_get("state")?,
                            zip: d.try_get("zip")?,
                        },
                        delivered: d.try_get("is_delivered")?,
                    },
                    None => return Ok(None),
                }
            }
            other => {
                return Err(StoreError::Corrupt(domain::UnknownVariant {
                    what: "order type",
                    value: other.to_string(),
                }));
            }
        };

        let order_id = OrderId::new(raw_order_id);
        Ok(Some(Order {
            id: Some(order_id),
            customer: row
                .try_get::<Option<i64>, _>("cust_id")?
                .map(CustomerId::new),
            order_type,
            placed_at: row.try_get("order_date")?,
            cust_price: row.try_get("cust_price")?,
            bus_price: row.try_get("bus_price")?,
            is_complete: row.try_get("is_complete")?,
            pizzas: self.pizzas_for_order(order_id).await?,
            discounts: self.discounts_for_order(order_id).await?,
        }))
    }

    async fn assemble_orders(&self, rows: Vec<PgRow>) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(order) = self.assemble_order(row).await? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    async fn pizzas_for_order(&self, order_id: OrderId) -> Result<Vec<Pizza>> {
        let rows = sqlx::query(
            r#"
            SELECT pizza_id, order_id, size, crust_type, pizza_state, pizza_date, cust_price, bus_price
            FROM pizza
            WHERE order_id = $1
            ORDER BY pizza_id
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        let mut pizzas = Vec::with_capacity(rows.len());
        for row in rows {
            let pizza_id = PizzaId::new(row.try_get("pizza_id")?);
            pizzas.push(Pizza {
                id: Some(pizza_id),
                order_id: Some(order_id),
                size: row.try_get::<String, _>("size")?.parse::<Size>()?,
                crust: row.try_get::<String, _>("crust_type")?.parse::<Crust>()?,
                state: row
                    .try_get::<String, _>("pizza_state")?
                    .parse::<PizzaState>()?,
                created_at: row.try_get("pizza_date")?,
                cust_price: row.try_get("cust_price")?,
                bus_price: row.try_get("bus_price")?,
                toppings: self.toppings_on_pizza(pizza_id).await?,
                discounts: self.discounts_for_pizza(pizza_id).await?,
            });
        }
        Ok(pizzas)
    }

    async fn toppings_on_pizza(&self, pizza_id: PizzaId) -> Result<Vec<ToppingItem>> {
        let rows = sqlx::query(
            r#"
            SELECT t.top_id, t.top_name, t.small_amt, t.med_amt, t.lg_amt, t.xl_amt,
                   t.cust_price, t.bus_price, t.min_invt, t.cur_invt, pt.is_double
            FROM topping t
            JOIN pizza_topping pt ON pt.top_id = t.top_id
            WHERE pt.pizza_id = $1
            ORDER BY t.top_id
            "#,
        )
        .bind(pizza_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ToppingItem {
                    doubled: row.try_get("is_double")?,
                    topping: row_to_topping(&row)?,
                })
            })
            .collect()
    }

    async fn discounts_for_order(&self, order_id: OrderId) -> Result<Vec<Discount>> {
        let rows = sqlx::query(
            r#"
            SELECT d.discount_id, d.discount_name, d.amount, d.is_percent
            FROM discount d
            JOIN order_discount od ON od.discount_id = d.discount_id
            WHERE od.order_id = $1
            ORDER BY d.discount_id
            "#,
        )
        .bind(order_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_discount).collect()
    }

    async fn discounts_for_pizza(&self, pizza_id: PizzaId) -> Result<Vec<Discount>> {
        let rows = sqlx::query(
            r#"
            SELECT d.discount_id, d.discount_name, d.amount, d.is_percent
            FROM discount d
            JOIN pizza_discount pd ON pd.discount_id = d.discount_id
            WHERE pd.pizza_id = $1
            ORDER BY d.discount_id
            "#,
        )
        .bind(pizza_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_discount).collect()
    }
}

/// Inserts the one subtype row matching the order's variant.
///
/// Pickup and delivery fulfillment flags always start unset; they advance
/// through the state machine, never at commit time.
async fn insert_subtype(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    order_type: &OrderType,
) -> Result<()> {
    match order_type {
        OrderType::Dinein { table_num } => {
            sqlx::query("INSERT INTO dinein (order_id, table_num) VALUES ($1, $2)")
                .bind(order_id.as_i64())
                .bind(table_num)
                .execute(&mut **tx)
                .await?;
        }
        OrderType::Pickup { .. } => {
            sqlx::query("INSERT INTO pickup (order_id, is_picked_up) VALUES ($1, FALSE)")
                .bind(order_id.as_i64())
                .execute(&mut **tx)
                .await?;
        }
        OrderType::Delivery { address, .. } => {
            sqlx::query(
                r#"
                INSERT INTO delivery (order_id, house_num, street, city, state, zip, is_delivered)
                VALUES ($1, $2, $3, $4, $5, $6, FALSE)
                "#,
            )
            .bind(order_id.as_i64())
            .bind(address.house_num)
            .bind(&address.street)
            .bind(&address.city)
            .bind(&address.state)
            .bind(address.zip)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

/// Inserts one pizza with its topping links, inventory consumption, and
/// pizza-level discount links. Caller owns the surrounding transaction.
async fn insert_pizza(
    tx: &mut Transaction<'_, Postgres>,
    order_id: OrderId,
    pizza: &mut Pizza,
    options: CommitOptions,
) -> Result<PizzaId> {
    if options.reconcile_doubles {
        let base = base_price_in_tx(tx, pizza.size, pizza.crust).await?;
        reconcile_doubles(pizza, base);
    }

    let raw_pizza_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO pizza (order_id, size, crust_type, pizza_state, pizza_date, cust_price, bus_price)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING pizza_id
        "#,
    )
    .bind(order_id.as_i64())
    .bind(pizza.size.as_str())
    .bind(pizza.crust.as_str())
    .bind(pizza.state.as_str())
    .bind(pizza.created_at)
    .bind(pizza.cust_price)
    .bind(pizza.bus_price)
    .fetch_one(&mut **tx)
    .await?;

    for item in pizza.collapsed_toppings() {
        consume(tx, &item.topping, pizza.size, item.doubled).await?;
        sqlx::query("INSERT INTO pizza_topping (pizza_id, top_id, is_double) VALUES ($1, $2, $3)")
            .bind(raw_pizza_id)
            .bind(item.topping.id.as_i64())
            .bind(item.doubled)
            .execute(&mut **tx)
            .await?;
    }

    for discount_id in dedup_discount_ids(&pizza.discounts) {
        sqlx::query("INSERT INTO pizza_discount (pizza_id, discount_id) VALUES ($1, $2)")
            .bind(raw_pizza_id)
            .bind(discount_id.as_i64())
            .execute(&mut **tx)
            .await?;
    }

    Ok(PizzaId::new(raw_pizza_id))
}

/// Deducts whole-unit stock for one topping serving.
///
/// The decrement is conditional on sufficient stock, so concurrent commits
/// cannot drive the counter negative; a zero-row update means the guard
/// failed and the transaction must roll back.
async fn consume(
    tx: &mut Transaction<'_, Postgres>,
    topping: &Topping,
    size: Size,
    doubled: bool,
) -> Result<()> {
    let required = topping.units_required(size, doubled);
    let updated =
        sqlx::query("UPDATE topping SET cur_invt = cur_invt - $1 WHERE top_id = $2 AND cur_invt >= $1")
            .bind(required)
            .bind(topping.id.as_i64())
            .execute(&mut **tx)
            .await?
            .rows_affected();

    if updated == 0 {
        let available: Option<f64> =
            sqlx::query_scalar("SELECT cur_invt FROM topping WHERE top_id = $1")
                .bind(topping.id.as_i64())
                .fetch_optional(&mut **tx)
                .await?;
        return Err(match available {
            Some(available) => StoreError::InsufficientInventory {
                topping: topping.name.clone(),
                required,
                available,
            },
            None => StoreError::UnknownTopping(topping.id),
        });
    }
    Ok(())
}

async fn base_price_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    size: Size,
    crust: Crust,
) -> Result<Price> {
    let row = sqlx::query(
        "SELECT cust_price, bus_price FROM baseprice WHERE size = $1 AND crust_type = $2",
    )
    .bind(size.as_str())
    .bind(crust.as_str())
    .fetch_optional(&mut **tx)
    .await?;

    match row {
        Some(row) => Ok(Price::new(
            row.try_get("cust_price")?,
            row.try_get("bus_price")?,
        )),
        None => Ok(Price::ZERO),
    }
}

fn row_to_topping(row: &PgRow) -> Result<Topping> {
    Ok(Topping {
        id: ToppingId::new(row.try_get("top_id")?),
        name: row.try_get("top_name")?,
        small_amt: row.try_get("small_amt")?,
        med_amt: row.try_get("med_amt")?,
        lg_amt: row.try_get("lg_amt")?,
        xl_amt: row.try_get("xl_amt")?,
        cust_price: row.try_get("cust_price")?,
        bus_price: row.try_get("bus_price")?,
        min_invt: row.try_get("min_invt")?,
        cur_invt: row.try_get("cur_invt")?,
    })
}

fn row_to_discount(row: &PgRow) -> Result<Discount> {
    Ok(Discount {
        id: common::DiscountId::new(row.try_get("discount_id")?),
        name: row.try_get("discount_name")?,
        amount: row.try_get("amount")?,
        is_percent: row.try_get("is_percent")?,
    })
}

fn row_to_customer(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: Some(CustomerId::new(row.try_get("cust_id")?)),
        first_name: row.try_get("fname")?,
        last_name: row.try_get("lname")?,
        phone: row.try_get("phone")?,
    })
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn commit_order(&self, order: &mut Order, options: CommitOptions) -> Result<OrderId> {
        let started = std::time::Instant::now();
        let result = self.commit_order_tx(order, options).await;
        match &result {
            Ok(order_id) => {
                metrics::counter!("orders_committed").increment(1);
                metrics::histogram!("order_commit_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    %order_id,
                    order_type = order.order_type.kind(),
                    pizzas = order.pizzas.len(),
                    "order committed"
                );
            }
            Err(error) => {
                metrics::counter!("order_commit_rollbacks").increment(1);
                tracing::warn!(%error, "order commit rolled back");
            }
        }
        result
    }

    async fn commit_pizza(
        &self,
        order_id: OrderId,
        pizza: &mut Pizza,
        options: CommitOptions,
    ) -> Result<PizzaId> {
        let result = self.commit_pizza_tx(order_id, pizza, options).await;
        match &result {
            Ok(pizza_id) => {
                metrics::counter!("pizzas_committed").increment(1);
                tracing::info!(%order_id, %pizza_id, "pizza committed");
            }
            Err(error) => {
                metrics::counter!("order_commit_rollbacks").increment(1);
                tracing::warn!(%order_id, %error, "pizza commit rolled back");
            }
        }
        result
    }

    async fn add_customer(&self, customer: &mut Customer) -> Result<CustomerId> {
        let raw_id: i64 = sqlx::query_scalar(
            "INSERT INTO customer (fname, lname, phone) VALUES ($1, $2, $3) RETURNING cust_id",
        )
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.phone)
        .fetch_one(&self.pool)
        .await?;

        let id = CustomerId::new(raw_id);
        customer.id = Some(id);
        Ok(id)
    }

    async fn advance(&self, order_id: OrderId, target: OrderTransition) -> Result<bool> {
        let applied = match target {
            OrderTransition::Prepared => {
                let mut tx = self.pool.begin().await?;
                let updated =
                    sqlx::query("UPDATE ordertable SET is_complete = TRUE WHERE order_id = $1")
                        .bind(order_id.as_i64())
                        .execute(&mut *tx)
                        .await?
                        .rows_affected();
                sqlx::query("UPDATE pizza SET pizza_state = $1 WHERE order_id = $2")
                    .bind(PizzaState::Completed.as_str())
                    .bind(order_id.as_i64())
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                updated > 0
            }
            OrderTransition::PickedUp => {
                sqlx::query("UPDATE pickup SET is_picked_up = TRUE WHERE order_id = $1")
                    .bind(order_id.as_i64())
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
                    > 0
            }
            OrderTransition::Delivered => {
                sqlx::query("UPDATE delivery SET is_delivered = TRUE WHERE order_id = $1")
                    .bind(order_id.as_i64())
                    .execute(&self.pool)
                    .await?
                    .rows_affected()
                    > 0
            }
        };

        if !applied {
            tracing::debug!(%order_id, ?target, "state transition matched nothing");
        }
        Ok(applied)
    }

    async fn restock(&self, topping_id: ToppingId, quantity: f64) -> Result<()> {
        if quantity < 0.0 {
            return Err(StoreError::InvalidRestock(quantity));
        }
        let updated = sqlx::query("UPDATE topping SET cur_invt = cur_invt + $1 WHERE top_id = $2")
            .bind(quantity)
            .bind(topping_id.as_i64())
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::UnknownTopping(topping_id));
        }
        Ok(())
    }

    async fn orders(&self, filter: StatusFilter) -> Result<Vec<Order>> {
        let sql = format!(
            "SELECT order_id, order_type, order_date, cust_price, bus_price, is_complete, cust_id \
             FROM ordertable{} ORDER BY order_id",
            filter.where_clause()
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        self.assemble_orders(rows).await
    }

    async fn orders_by_date(&self, date: NaiveDate) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            "SELECT order_id, order_type, order_date, cust_price, bus_price, is_complete, cust_id \
             FROM ordertable WHERE order_date::date = $1 ORDER BY order_id",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        self.assemble_orders(rows).await
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT order_id, order_type, order_date, cust_price, bus_price, is_complete, cust_id \
             FROM ordertable WHERE order_id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.assemble_order(&row).await,
            None => Ok(None),
        }
    }

    async fn last_order(&self) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT order_id, order_type, order_date, cust_price, bus_price, is_complete, cust_id \
             FROM ordertable ORDER BY order_id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.assemble_order(&row).await,
            None => Ok(None),
        }
    }

    async fn customers(&self) -> Result<Vec<Customer>> {
        let rows =
            sqlx::query("SELECT cust_id, fname, lname, phone FROM customer ORDER BY cust_id")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(row_to_customer).collect()
    }

    async fn find_customer_by_phone(&self, phone: &str) -> Result<Option<Customer>> {
        let row = sqlx::query("SELECT cust_id, fname, lname, phone FROM customer WHERE phone = $1")
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_customer).transpose()
    }

    async fn customer_name(&self, id: Option<CustomerId>) -> Result<String> {
        let Some(id) = id else {
            return Ok(WALK_IN_NAME.to_string());
        };
        let row = sqlx::query("SELECT fname, lname FROM customer WHERE cust_id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(format!(
                "{} {}",
                row.try_get::<String, _>("fname")?,
                row.try_get::<String, _>("lname")?
            )),
            None => Ok(WALK_IN_NAME.to_string()),
        }
    }

    async fn toppings(&self) -> Result<Vec<Topping>> {
        let rows = sqlx::query(
            "SELECT top_id, top_name, small_amt, med_amt, lg_amt, xl_amt, \
             cust_price, bus_price, min_invt, cur_invt FROM topping ORDER BY top_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_topping).collect()
    }

    async fn find_topping_by_name(&self, name: &str) -> Result<Option<Topping>> {
        let row = sqlx::query(
            "SELECT top_id, top_name, small_amt, med_amt, lg_amt, xl_amt, \
             cust_price, bus_price, min_invt, cur_invt FROM topping WHERE top_name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_topping).transpose()
    }

    async fn discounts(&self) -> Result<Vec<Discount>> {
        let rows = sqlx::query(
            "SELECT discount_id, discount_name, amount, is_percent FROM discount ORDER BY discount_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_discount).collect()
    }

    async fn find_discount_by_name(&self, name: &str) -> Result<Option<Discount>> {
        let row = sqlx::query(
            "SELECT discount_id, discount_name, amount, is_percent FROM discount WHERE discount_name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_discount).transpose()
    }

    async fn base_price(&self, size: Size, crust: Crust) -> Result<Price> {
        let row = sqlx::query(
            "SELECT cust_price, bus_price FROM baseprice WHERE size = $1 AND crust_type = $2",
        )
        .bind(size.as_str())
        .bind(crust.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Price::new(
                row.try_get("cust_price")?,
                row.try_get("bus_price")?,
            )),
            None => Ok(Price::ZERO),
        }
    }
}
