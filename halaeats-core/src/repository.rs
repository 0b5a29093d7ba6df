use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::order::{Order, OrderStatus};
use crate::CoreResult;

/// Repository trait for placed orders
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn save_order(&self, order: &Order) -> CoreResult<()>;

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>>;

    /// Orders of a restaurant whose slot starts within `[from, to)`.
    async fn list_orders_for_restaurant(
        &self,
        restaurant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Order>>;

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> CoreResult<()>;
}
