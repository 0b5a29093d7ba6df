use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;
use crate::CoreResult;

/// A priced, time-bound delivery offer for one address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryQuote {
    pub id: Uuid,
    pub address_id: Uuid,
    pub fee_cents: i32,
    pub estimated_minutes: u32,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DeliveryQuote {
    pub fn new(address_id: Uuid, fee_cents: i32, estimated_minutes: u32, valid_for: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            address_id,
            fee_cents,
            estimated_minutes,
            issued_at: now,
            expires_at: now + valid_for,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Check if the quote can still be honoured
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// A quote only applies to the address it was issued for.
    pub fn is_valid_for(&self, address_id: Uuid) -> bool {
        self.address_id == address_id && self.is_valid()
    }
}

#[async_trait]
pub trait QuoteService: Send + Sync {
    /// Price delivery to the given address.
    async fn quote_for_address(&self, address: &Address) -> CoreResult<DeliveryQuote>;
}

/// Orders from one store collected under a common pickup time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryBatch {
    pub id: Uuid,
    pub store_id: Uuid,
    pub order_ids: Vec<Uuid>,
    pub pickup_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryBatch {
    pub fn new(store_id: Uuid, order_ids: Vec<Uuid>, pickup_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            store_id,
            order_ids,
            pickup_time,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait DeliveryService: Send + Sync {
    async fn create_delivery_batch(
        &self,
        store_id: Uuid,
        order_ids: Vec<Uuid>,
        pickup_time: DateTime<Utc>,
    ) -> CoreResult<DeliveryBatch>;

    /// All batches of a store, newest pickup first.
    async fn get_delivery_batches(&self, store_id: Uuid) -> CoreResult<Vec<DeliveryBatch>>;
}
