use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CustomerId, Money, MovementId, OrderId, OrderItemId, OrderStatus, VariantId,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Acquire, PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::model::{
    Customer, InventoryMovement, MovementType, NewCustomer, NewMovement, NewOrder, NewOrderItem,
    Order, OrderDetails, OrderItem, OrderSummary, StockChange, Variant,
};
use crate::store::{Store, UnitOfWork};
use crate::{MovementQuery, Result, StoreError};

const VARIANT_COLUMNS: &str = "id, product_id, name, price, stock_quantity";
const ORDER_COLUMNS: &str =
    "id, order_number, customer_id, status, total_amount, payment_method, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, order_id, variant_id, quantity, unit_price, subtotal";
const MOVEMENT_COLUMNS: &str = "id, variant_id, type, quantity, previous_stock, new_stock, reference_id, note, user_id, created_at";

/// PostgreSQL-backed order store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts or replaces a catalog variant.
    ///
    /// The catalog owns variants; this exists for seeding and tests.
    pub async fn upsert_variant(&self, variant: &Variant) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, name, price, stock_quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                product_id = EXCLUDED.product_id,
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                stock_quantity = EXCLUDED.stock_quantity,
                updated_at = NOW()
            "#,
        )
        .bind(variant.id.as_uuid())
        .bind(variant.product_id)
        .bind(&variant.name)
        .bind(variant.price.minor())
        .bind(variant.stock_quantity)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_items(&self, order_id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY seq ASC"
        ))
        .bind(order_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn with_items(&self, row: Option<PgRow>) -> Result<Option<OrderDetails>> {
        match row {
            Some(row) => {
                let order = row_to_order(&row)?;
                let items = self.load_items(order.id).await?;
                Ok(Some(OrderDetails { order, items }))
            }
            None => Ok(None),
        }
    }
}

fn bind_count(name: &'static str, value: usize) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| StoreError::InvalidQuery(format!("{name} {value} is out of range")))
}

fn row_to_variant(row: &PgRow) -> Result<Variant> {
    Ok(Variant {
        id: VariantId::from_uuid(row.try_get::<Uuid, _>("id")?),
        product_id: row.try_get("product_id")?,
        name: row.try_get("name")?,
        price: Money::from_minor(row.try_get("price")?),
        stock_quantity: row.try_get("stock_quantity")?,
    })
}

fn row_to_customer(row: &PgRow) -> Result<Customer> {
    Ok(Customer {
        id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id")?),
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<OrderStatus>()
        .map_err(|e| StoreError::InvalidColumn {
            column: "orders.status",
            value: e.0,
        })?;

    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_number: row.try_get("order_number")?,
        customer_id: row
            .try_get::<Option<Uuid>, _>("customer_id")?
            .map(CustomerId::from_uuid),
        status,
        total_amount: Money::from_minor(row.try_get("total_amount")?),
        payment_method: row.try_get("payment_method")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

fn row_to_item(row: &PgRow) -> Result<OrderItem> {
    let quantity: i64 = row.try_get("quantity")?;
    let quantity = u32::try_from(quantity).map_err(|_| StoreError::InvalidColumn {
        column: "order_items.quantity",
        value: quantity.to_string(),
    })?;

    Ok(OrderItem {
        id: OrderItemId::from_uuid(row.try_get::<Uuid, _>("id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
        quantity,
        unit_price: Money::from_minor(row.try_get("unit_price")?),
        subtotal: Money::from_minor(row.try_get("subtotal")?),
    })
}

fn row_to_movement(row: &PgRow) -> Result<InventoryMovement> {
    let kind: String = row.try_get("type")?;
    let movement_type =
        MovementType::parse(&kind).ok_or_else(|| StoreError::InvalidColumn {
            column: "inventory_movements.type",
            value: kind.clone(),
        })?;

    Ok(InventoryMovement {
        id: MovementId::from_uuid(row.try_get::<Uuid, _>("id")?),
        variant_id: VariantId::from_uuid(row.try_get::<Uuid, _>("variant_id")?),
        movement_type,
        quantity: row.try_get("quantity")?,
        previous_stock: row.try_get("previous_stock")?,
        new_stock: row.try_get("new_stock")?,
        reference_id: row.try_get("reference_id")?,
        note: row.try_get("note")?,
        user_id: row.try_get("user_id")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl Store for PostgresStore {
    type Tx = PostgresUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx> {
        let tx = self.pool.begin().await?;
        Ok(PostgresUnitOfWork { tx })
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<Variant>> {
        let row = sqlx::query(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_variant).transpose()
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<Customer>> {
        let row = sqlx::query(
            "SELECT id, first_name, last_name, email, phone FROM customers WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_customer).transpose()
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderDetails>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        self.with_items(row).await
    }

    async fn get_order_by_number(&self, order_number: i64) -> Result<Option<OrderDetails>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number)
        .fetch_optional(&self.pool)
        .await?;

        self.with_items(row).await
    }

    async fn list_orders(&self) -> Result<Vec<OrderSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT o.id, o.order_number, o.customer_id, o.status, o.total_amount,
                   o.payment_method, o.created_at, o.updated_at,
                   c.first_name AS customer_first_name,
                   c.last_name AS customer_last_name,
                   c.email AS customer_email
            FROM orders o
            LEFT JOIN customers c ON c.id = o.customer_id
            ORDER BY o.order_number DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OrderSummary {
                    order: row_to_order(row)?,
                    customer_first_name: row.try_get("customer_first_name")?,
                    customer_last_name: row.try_get("customer_last_name")?,
                    customer_email: row.try_get("customer_email")?,
                })
            })
            .collect()
    }

    async fn list_movements(&self, query: MovementQuery) -> Result<Vec<InventoryMovement>> {
        let mut sql = format!("SELECT {MOVEMENT_COLUMNS} FROM inventory_movements WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.variant_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND variant_id = ${param_count}"));
        }
        if query.movement_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND type = ${param_count}"));
        }
        if query.reference_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND reference_id = ${param_count}"));
        }

        sql.push_str(" ORDER BY seq DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(id) = query.variant_id {
            sqlx_query = sqlx_query.bind(id.as_uuid());
        }
        if let Some(kind) = query.movement_type {
            sqlx_query = sqlx_query.bind(kind.as_str());
        }
        if let Some(reference) = query.reference_id {
            sqlx_query = sqlx_query.bind(reference);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(bind_count("limit", limit)?);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(bind_count("offset", offset)?);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_movement).collect()
    }

    async fn low_stock_variants(&self, threshold: i64) -> Result<Vec<Variant>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {VARIANT_COLUMNS}
            FROM product_variants
            WHERE COALESCE(stock_quantity, 0) < $1
            ORDER BY COALESCE(stock_quantity, 0) ASC, id ASC
            "#
        ))
        .bind(threshold)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_variant).collect()
    }
}

/// Unit of work backed by a PostgreSQL transaction.
///
/// Row locks taken by `lock_*` are held until commit or rollback. Steps that
/// may fail without aborting the unit of work run inside a savepoint.
pub struct PostgresUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PostgresUnitOfWork {
    async fn lock_variant(&mut self, id: VariantId) -> Result<Option<Variant>> {
        // Row locks taken inside a savepoint are kept after it is released.
        let mut savepoint = Acquire::begin(&mut self.tx).await?;

        let row = sqlx::query(&format!(
            "SELECT {VARIANT_COLUMNS} FROM product_variants WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *savepoint)
        .await?;

        savepoint.commit().await?;
        row.as_ref().map(row_to_variant).transpose()
    }

    async fn customer_exists(&mut self, id: CustomerId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM customers WHERE id = $1)")
                .bind(id.as_uuid())
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(exists)
    }

    async fn insert_customer(&mut self, customer: NewCustomer) -> Result<Customer> {
        let id = CustomerId::new();
        let mut savepoint = Acquire::begin(&mut self.tx).await?;

        sqlx::query(
            r#"
            INSERT INTO customers (id, first_name, last_name, email, phone)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id.as_uuid())
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .execute(&mut *savepoint)
        .await?;

        savepoint.commit().await?;

        Ok(Customer {
            id,
            first_name: customer.first_name,
            last_name: customer.last_name,
            email: customer.email,
            phone: customer.phone,
        })
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, customer_id, status, total_amount, payment_method)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id.as_uuid())
        .bind(order.customer_id.map(|id| id.as_uuid()))
        .bind(order.status.as_str())
        .bind(order.total_amount.minor())
        .bind(&order.payment_method)
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_order(&row)
    }

    async fn insert_item(&mut self, item: NewOrderItem) -> Result<OrderItem> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO order_items (id, order_id, variant_id, quantity, unit_price, subtotal)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(OrderItemId::new().as_uuid())
        .bind(item.order_id.as_uuid())
        .bind(item.variant_id.as_uuid())
        .bind(i64::from(item.quantity))
        .bind(item.unit_price.minor())
        .bind(item.subtotal.minor())
        .fetch_one(&mut *self.tx)
        .await?;

        row_to_item(&row)
    }

    async fn adjust_stock(&mut self, id: VariantId, delta: i64) -> Result<Option<StockChange>> {
        let mut savepoint = Acquire::begin(&mut self.tx).await?;

        // Floor check and write in one statement; no row back means refused.
        let new_stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE product_variants
            SET stock_quantity = COALESCE(stock_quantity, 0) + $2, updated_at = NOW()
            WHERE id = $1 AND COALESCE(stock_quantity, 0) + $2 >= 0
            RETURNING stock_quantity
            "#,
        )
        .bind(id.as_uuid())
        .bind(delta)
        .fetch_optional(&mut *savepoint)
        .await?
        .flatten();

        savepoint.commit().await?;

        let Some(new_stock) = new_stock else {
            tracing::debug!(variant_id = %id, delta, "stock update refused");
            return Ok(None);
        };

        Ok(Some(StockChange {
            variant_id: id,
            previous_stock: new_stock - delta,
            new_stock,
        }))
    }

    async fn append_movement(&mut self, movement: NewMovement) -> Result<InventoryMovement> {
        let mut savepoint = Acquire::begin(&mut self.tx).await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO inventory_movements
                (id, variant_id, type, quantity, previous_stock, new_stock, reference_id, note, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(MovementId::new().as_uuid())
        .bind(movement.variant_id.as_uuid())
        .bind(movement.movement_type.as_str())
        .bind(movement.quantity)
        .bind(movement.previous_stock)
        .bind(movement.new_stock)
        .bind(&movement.reference_id)
        .bind(&movement.note)
        .bind(movement.user_id)
        .fetch_one(&mut *savepoint)
        .await?;

        savepoint.commit().await?;
        row_to_movement(&row)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn order_items(&mut self, id: OrderId) -> Result<Vec<OrderItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY seq ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(row_to_item).collect()
    }

    async fn update_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE orders SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        match row {
            Some(row) => row_to_order(&row),
            None => Err(StoreError::NotFound {
                entity: "Order",
                id: id.to_string(),
            }),
        }
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        metrics::counter!("store_transactions_committed_total").increment(1);
        Ok(())
    }
}
