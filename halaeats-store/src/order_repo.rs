use async_trait::async_trait;
use chrono::{DateTime, Utc};
use halaeats_core::{CoreError, CoreResult, Order, OrderLine, OrderRepository, OrderStatus, OrderType};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::storage_err;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ORDER_COLUMNS: &str = "id, customer_id, restaurant_id, order_type, lines, address_id, slot_id, \
     slot_starts_at, payment_method, payment_reference, subtotal_cents, tax_cents, \
     delivery_fee_cents, total_cents, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: String,
    restaurant_id: Uuid,
    order_type: String,
    lines: Json<Vec<OrderLine>>,
    address_id: Option<Uuid>,
    slot_id: Uuid,
    slot_starts_at: DateTime<Utc>,
    payment_method: String,
    payment_reference: Option<String>,
    subtotal_cents: i32,
    tax_cents: i32,
    delivery_fee_cents: i32,
    total_cents: i32,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = CoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let order_type = OrderType::parse_lenient(&row.order_type).ok_or_else(|| {
            CoreError::InternalError(format!("order {} has unknown type '{}'", row.id, row.order_type))
        })?;
        let status: OrderStatus = row.status.parse().map_err(CoreError::InternalError)?;

        Ok(Order {
            id: row.id,
            customer_id: row.customer_id,
            restaurant_id: row.restaurant_id,
            order_type,
            lines: row.lines.0,
            address_id: row.address_id,
            slot_id: row.slot_id,
            slot_starts_at: row.slot_starts_at,
            payment_method: row.payment_method,
            payment_reference: row.payment_reference,
            subtotal_cents: row.subtotal_cents,
            tax_cents: row.tax_cents,
            delivery_fee_cents: row.delivery_fee_cents,
            total_cents: row.total_cents,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn save_order(&self, order: &Order) -> CoreResult<()> {
        sqlx::query(&format!(
            r#"
            INSERT INTO orders ({})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
            ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(&order.customer_id)
        .bind(order.restaurant_id)
        .bind(order.order_type.as_str())
        .bind(Json(&order.lines))
        .bind(order.address_id)
        .bind(order.slot_id)
        .bind(order.slot_starts_at)
        .bind(&order.payment_method)
        .bind(&order.payment_reference)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.delivery_fee_cents)
        .bind(order.total_cents)
        .bind(order.status.as_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        tracing::info!("Order {} persisted", order.id);
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

        row.map(Order::try_from).transpose()
    }

    async fn list_orders_for_restaurant(
        &self,
        restaurant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM orders
            WHERE restaurant_id = $1 AND slot_starts_at >= $2 AND slot_starts_at < $3
            ORDER BY slot_starts_at, created_at
            "#,
            ORDER_COLUMNS
        ))
        .bind(restaurant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.into_iter().map(Order::try_from).collect()
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> CoreResult<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("order {}", id)));
        }
        Ok(())
    }
}
