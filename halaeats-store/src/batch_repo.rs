use async_trait::async_trait;
use chrono::{DateTime, Utc};
use halaeats_core::{CoreResult, DeliveryBatch, DeliveryService};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::storage_err;

pub struct PgDeliveryService {
    pool: PgPool,
}

impl PgDeliveryService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    store_id: Uuid,
    order_ids: Vec<Uuid>,
    pickup_time: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<BatchRow> for DeliveryBatch {
    fn from(row: BatchRow) -> Self {
        DeliveryBatch {
            id: row.id,
            store_id: row.store_id,
            order_ids: row.order_ids,
            pickup_time: row.pickup_time,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl DeliveryService for PgDeliveryService {
    async fn create_delivery_batch(
        &self,
        store_id: Uuid,
        order_ids: Vec<Uuid>,
        pickup_time: DateTime<Utc>,
    ) -> CoreResult<DeliveryBatch> {
        let batch = DeliveryBatch::new(store_id, order_ids, pickup_time);

        sqlx::query(
            r#"
            INSERT INTO delivery_batches (id, store_id, order_ids, pickup_time, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(batch.id)
        .bind(batch.store_id)
        .bind(&batch.order_ids)
        .bind(batch.pickup_time)
        .bind(batch.created_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(batch)
    }

    async fn get_delivery_batches(&self, store_id: Uuid) -> CoreResult<Vec<DeliveryBatch>> {
        let rows: Vec<BatchRow> = sqlx::query_as(
            r#"
            SELECT id, store_id, order_ids, pickup_time, created_at
            FROM delivery_batches
            WHERE store_id = $1
            ORDER BY pickup_time DESC, created_at DESC
            "#,
        )
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.into_iter().map(DeliveryBatch::from).collect())
    }
}
