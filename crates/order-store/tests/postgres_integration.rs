//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p order-store --test postgres_integration
//! ```

use std::sync::Arc;

use order_store::{
    Money, MovementQuery, MovementType, NewCustomer, NewMovement, NewOrder, NewOrderItem, OrderId,
    OrderStatus, PostgresStore, StockChange, Store, StoreExt, UnitOfWork, Variant, VariantId,
};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
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

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_order_tables.sql"
            ))
            .execute(&temp_pool)
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

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let store = PostgresStore::connect(&info.connection_string, 5)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE inventory_movements, order_items, orders, customers, product_variants",
    )
    .execute(store.pool())
    .await
    .unwrap();

    store
}

/// A store over the same database whose row locks give up after 100ms.
async fn impatient_store() -> PostgresStore {
    let info = get_container_info().await;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET lock_timeout = '100ms'").await?;
                Ok(())
            })
        })
        .connect(&info.connection_string)
        .await
        .unwrap();
    PostgresStore::new(pool)
}

async fn seed_variant(store: &PostgresStore, stock: i64) -> VariantId {
    let variant = Variant::new("M / Black", Money::from_minor(2500), stock);
    store.upsert_variant(&variant).await.unwrap();
    variant.id
}

fn pending_order(total: i64) -> NewOrder {
    NewOrder {
        id: OrderId::new(),
        customer_id: None,
        status: OrderStatus::Pending,
        total_amount: Money::from_minor(total),
        payment_method: Some("cash".to_string()),
    }
}

/// Reserves one unit the way order intake does: lock, decrement, record.
async fn sell_one(store: PostgresStore, variant_id: VariantId) -> bool {
    let mut tx = store.begin().await.unwrap();
    tx.lock_variant(variant_id).await.unwrap().unwrap();

    let Some(change) = tx.adjust_stock(variant_id, -1).await.unwrap() else {
        return false;
    };

    let order = tx.insert_order(pending_order(2500)).await.unwrap();
    tx.append_movement(NewMovement::from_change(
        change,
        MovementType::Sale,
        order.id,
        "Order created",
    ))
    .await
    .unwrap();
    tx.commit().await.unwrap();
    true
}

#[tokio::test]
#[serial]
async fn commit_persists_order_items_and_ledger() {
    let store = get_test_store().await;
    let variant_id = seed_variant(&store, 5).await;

    let mut tx = store.begin().await.unwrap();
    tx.lock_variant(variant_id).await.unwrap().unwrap();
    let change = tx.adjust_stock(variant_id, -2).await.unwrap().unwrap();
    assert_eq!(change.previous_stock, 5);
    assert_eq!(change.new_stock, 3);

    let order = tx.insert_order(pending_order(5000)).await.unwrap();
    tx.insert_item(NewOrderItem {
        order_id: order.id,
        variant_id,
        quantity: 2,
        unit_price: Money::from_minor(2500),
        subtotal: Money::from_minor(5000),
    })
    .await
    .unwrap();
    tx.append_movement(NewMovement::from_change(
        change,
        MovementType::Sale,
        order.id,
        "Order created",
    ))
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let details = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(details.order.status, OrderStatus::Pending);
    assert_eq!(details.order.total_amount, Money::from_minor(5000));
    assert_eq!(details.items.len(), 1);
    assert_eq!(details.items[0].quantity, 2);

    let by_number = store
        .get_order_by_number(order.order_number)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_number.order.id, order.id);

    assert_eq!(store.stock_of(variant_id).await.unwrap(), Some(3));

    let movements = store
        .list_movements(MovementQuery::for_reference(order.id))
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].movement_type, MovementType::Sale);
    assert_eq!(movements[0].quantity, 2);
    assert_eq!(movements[0].user_id, None);
}

#[tokio::test]
#[serial]
async fn dropped_unit_of_work_rolls_back() {
    let store = get_test_store().await;
    let variant_id = seed_variant(&store, 4).await;

    let order_id = {
        let mut tx = store.begin().await.unwrap();
        tx.adjust_stock(variant_id, -4).await.unwrap().unwrap();
        tx.insert_order(pending_order(100)).await.unwrap().id
    };

    assert_eq!(store.stock_of(variant_id).await.unwrap(), Some(4));
    assert!(!store.order_exists(order_id).await.unwrap());
}

#[tokio::test]
#[serial]
async fn adjust_stock_refuses_to_go_negative() {
    let store = get_test_store().await;
    let variant_id = seed_variant(&store, 1).await;

    let mut tx = store.begin().await.unwrap();
    assert!(tx.adjust_stock(variant_id, -2).await.unwrap().is_none());
    assert!(tx.adjust_stock(VariantId::new(), -1).await.unwrap().is_none());

    let change = tx.adjust_stock(variant_id, -1).await.unwrap().unwrap();
    assert_eq!(change.new_stock, 0);
    tx.commit().await.unwrap();

    assert_eq!(store.stock_of(variant_id).await.unwrap(), Some(0));
}

#[tokio::test]
#[serial]
async fn unset_stock_counter_counts_as_zero() {
    let store = get_test_store().await;
    let mut variant = Variant::new("One size", Money::from_minor(900), 0);
    variant.stock_quantity = None;
    store.upsert_variant(&variant).await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert!(tx.adjust_stock(variant.id, -1).await.unwrap().is_none());
    let change = tx.adjust_stock(variant.id, 3).await.unwrap().unwrap();
    assert_eq!(change.previous_stock, 0);
    assert_eq!(change.new_stock, 3);
}

#[tokio::test]
#[serial]
async fn failed_step_leaves_unit_of_work_usable() {
    let store = get_test_store().await;
    let variant_id = seed_variant(&store, 2).await;

    let mut tx = store.begin().await.unwrap();

    // Unknown variant violates the ledger's foreign key.
    let orphan = NewMovement::from_change(
        StockChange {
            variant_id: VariantId::new(),
            previous_stock: 1,
            new_stock: 0,
        },
        MovementType::Sale,
        OrderId::new(),
        "Order created",
    );
    assert!(tx.append_movement(orphan).await.is_err());

    let customer = tx
        .insert_customer(NewCustomer {
            first_name: "Abebe".to_string(),
            last_name: "Kebede".to_string(),
            email: None,
            phone: Some("+251911000000".to_string()),
        })
        .await
        .unwrap();
    tx.adjust_stock(variant_id, -1).await.unwrap().unwrap();
    tx.commit().await.unwrap();

    assert_eq!(store.stock_of(variant_id).await.unwrap(), Some(1));
    let stored = store.get_customer(customer.id).await.unwrap().unwrap();
    assert_eq!(stored.first_name, "Abebe");
    assert_eq!(stored.last_name, "Kebede");
}

#[tokio::test]
#[serial]
async fn failed_variant_lock_leaves_unit_of_work_usable() {
    let store = get_test_store().await;
    let busy = seed_variant(&store, 4).await;
    let free = seed_variant(&store, 4).await;

    let mut setup = store.begin().await.unwrap();
    let order = setup.insert_order(pending_order(5000)).await.unwrap();
    setup.commit().await.unwrap();

    // Another transaction holds the lock on `busy` for the whole test.
    let mut holder = store.begin().await.unwrap();
    holder.lock_variant(busy).await.unwrap().unwrap();

    // Cancellation with best-effort restock: one lock times out, the rest
    // of the unit of work still commits.
    let impatient = impatient_store().await;
    let mut tx = impatient.begin().await.unwrap();
    tx.lock_order(order.id).await.unwrap().unwrap();
    tx.update_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert!(tx.lock_variant(busy).await.is_err());
    tx.lock_variant(free).await.unwrap().unwrap();
    let change = tx.adjust_stock(free, 2).await.unwrap().unwrap();
    tx.append_movement(NewMovement::from_change(
        change,
        MovementType::Cancellation,
        order.id,
        "Order cancelled",
    ))
    .await
    .unwrap();
    tx.commit().await.unwrap();
    drop(holder);

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order.status, OrderStatus::Cancelled);
    assert_eq!(store.stock_of(free).await.unwrap(), Some(6));
    assert_eq!(store.stock_of(busy).await.unwrap(), Some(4));
    let ledger = store
        .list_movements(MovementQuery::for_reference(order.id))
        .await
        .unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].variant_id, free);
}

#[tokio::test]
#[serial]
async fn concurrent_buyers_cannot_oversell_last_unit() {
    let store = get_test_store().await;
    let variant_id = seed_variant(&store, 1).await;

    let first = tokio::spawn(sell_one(store.clone(), variant_id));
    let second = tokio::spawn(sell_one(store.clone(), variant_id));

    let results = [first.await.unwrap(), second.await.unwrap()];
    assert_eq!(results.iter().filter(|sold| **sold).count(), 1);

    assert_eq!(store.stock_of(variant_id).await.unwrap(), Some(0));
    assert_eq!(store.list_orders().await.unwrap().len(), 1);
    let movements = store
        .list_movements(MovementQuery::new().variant_id(variant_id))
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
}

#[tokio::test]
#[serial]
async fn order_numbers_are_unique_and_increasing() {
    let store = get_test_store().await;

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let mut tx = store.begin().await.unwrap();
        numbers.push(tx.insert_order(pending_order(100)).await.unwrap().order_number);
        tx.commit().await.unwrap();
    }

    assert!(numbers.windows(2).all(|pair| pair[0] < pair[1]));

    let listed = store.list_orders().await.unwrap();
    assert_eq!(listed.len(), 3);
    assert_eq!(listed[0].order.order_number, numbers[2]);
}

#[tokio::test]
#[serial]
async fn list_orders_joins_buyer() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let customer = tx
        .insert_customer(NewCustomer {
            first_name: "Abebe".to_string(),
            last_name: "Kebede".to_string(),
            email: Some("abebe@example.com".to_string()),
            phone: None,
        })
        .await
        .unwrap();
    let anonymous = tx.insert_order(pending_order(100)).await.unwrap();
    let named = tx
        .insert_order(NewOrder {
            customer_id: Some(customer.id),
            ..pending_order(200)
        })
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let listed = store.list_orders().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].order.id, named.id);
    assert_eq!(listed[0].customer_first_name.as_deref(), Some("Abebe"));
    assert_eq!(listed[0].customer_last_name.as_deref(), Some("Kebede"));
    assert_eq!(
        listed[0].customer_email.as_deref(),
        Some("abebe@example.com")
    );
    assert_eq!(listed[1].order.id, anonymous.id);
    assert_eq!(listed[1].customer_first_name, None);
}

#[tokio::test]
#[serial]
async fn update_status_under_row_lock() {
    let store = get_test_store().await;

    let mut tx = store.begin().await.unwrap();
    let order = tx.insert_order(pending_order(100)).await.unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    let locked = tx.lock_order(order.id).await.unwrap().unwrap();
    assert_eq!(locked.status, OrderStatus::Pending);
    let updated = tx
        .update_order_status(order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Cancelled);
    assert!(updated.updated_at >= order.updated_at);
    tx.commit().await.unwrap();

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.order.status, OrderStatus::Cancelled);

    let mut tx = store.begin().await.unwrap();
    assert!(
        tx.update_order_status(OrderId::new(), OrderStatus::Completed)
            .await
            .is_err()
    );
}

#[tokio::test]
#[serial]
async fn ledger_queries_filter_and_page() {
    let store = get_test_store().await;
    let variant_id = seed_variant(&store, 10).await;
    let order_id = OrderId::new();

    let mut tx = store.begin().await.unwrap();
    for delta in [-2, -1, 3] {
        let change = tx.adjust_stock(variant_id, delta).await.unwrap().unwrap();
        let kind = if delta < 0 {
            MovementType::Sale
        } else {
            MovementType::Cancellation
        };
        tx.append_movement(NewMovement::from_change(change, kind, order_id, "test"))
            .await
            .unwrap();
    }
    tx.commit().await.unwrap();

    let all = store.list_movements(MovementQuery::new()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].movement_type, MovementType::Cancellation);
    assert_eq!(all[2].previous_stock, 10);

    let sales = store
        .list_movements(MovementQuery::new().movement_type(MovementType::Sale))
        .await
        .unwrap();
    assert_eq!(sales.len(), 2);

    let second_page = store
        .list_movements(MovementQuery::new().variant_id(variant_id).page(2, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].new_stock, 8);
}

#[tokio::test]
#[serial]
async fn low_stock_lists_variants_below_threshold() {
    let store = get_test_store().await;
    let empty = seed_variant(&store, 0).await;
    let few = seed_variant(&store, 3).await;
    seed_variant(&store, 50).await;

    let mut unset = Variant::new("Unset", Money::from_minor(100), 0);
    unset.stock_quantity = None;
    store.upsert_variant(&unset).await.unwrap();

    let out_of_stock = store.low_stock_variants(1).await.unwrap();
    assert_eq!(out_of_stock.len(), 2);
    assert!(out_of_stock.iter().any(|v| v.id == empty));
    assert!(out_of_stock.iter().any(|v| v.id == unset.id));

    let low = store.low_stock_variants(5).await.unwrap();
    assert_eq!(low.len(), 3);
    assert_eq!(low[2].id, few);
}
