pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{CustomerId, Money, MovementId, OrderId, OrderItemId, OrderStatus, VariantId};
pub use error::{Result, StoreError};
pub use memory::{FaultPoint, InMemoryStore, InMemoryUnitOfWork};
pub use model::{
    Customer, InventoryMovement, MovementType, NewCustomer, NewMovement, NewOrder, NewOrderItem,
    Order, OrderDetails, OrderItem, OrderSummary, StockChange, Variant,
};
pub use postgres::{PostgresStore, PostgresUnitOfWork};
pub use query::{DEFAULT_PAGE_SIZE, MovementQuery};
pub use store::{Store, StoreExt, UnitOfWork};
