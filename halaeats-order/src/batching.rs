use chrono::{DateTime, Utc};
use halaeats_core::{CoreResult, DeliveryBatch, DeliveryService, Order, OrderStatus, OrderType};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedBatch {
    pub pickup_time: DateTime<Utc>,
    pub order_ids: Vec<Uuid>,
}

/// Groups a restaurant's open delivery orders into courier batches.
///
/// Orders sharing a slot start share a pickup time; groups above
/// `max_batch_size` are split in order of placement.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    max_batch_size: usize,
}

impl Default for BatchPlanner {
    fn default() -> Self {
        Self::new(8)
    }
}

impl BatchPlanner {
    pub fn new(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn batchable(order: &Order) -> bool {
        order.order_type == OrderType::Delivery
            && !matches!(order.status, OrderStatus::Cancelled | OrderStatus::Completed)
    }

    pub fn plan(&self, orders: &[Order]) -> Vec<PlannedBatch> {
        let mut groups: BTreeMap<DateTime<Utc>, Vec<&Order>> = BTreeMap::new();
        for order in orders.iter().filter(|o| Self::batchable(o)) {
            groups.entry(order.slot_starts_at).or_default().push(order);
        }

        let mut planned = Vec::new();
        for (pickup_time, mut members) in groups {
            members.sort_by_key(|o| (o.created_at, o.id));
            for chunk in members.chunks(self.max_batch_size) {
                planned.push(PlannedBatch {
                    pickup_time,
                    order_ids: chunk.iter().map(|o| o.id).collect(),
                });
            }
        }
        planned
    }

    /// Plan and persist batches for orders not already assigned to one.
    pub async fn create_batches(
        &self,
        service: &dyn DeliveryService,
        store_id: Uuid,
        orders: &[Order],
    ) -> CoreResult<Vec<DeliveryBatch>> {
        let assigned: HashSet<Uuid> = service
            .get_delivery_batches(store_id)
            .await?
            .into_iter()
            .flat_map(|b| b.order_ids)
            .collect();

        let pending: Vec<Order> = orders
            .iter()
            .filter(|o| o.restaurant_id == store_id && !assigned.contains(&o.id))
            .cloned()
            .collect();

        let mut created = Vec::new();
        for batch in self.plan(&pending) {
            let saved = service
                .create_delivery_batch(store_id, batch.order_ids, batch.pickup_time)
                .await?;
            tracing::info!(
                "Created delivery batch {} with {} orders for {}",
                saved.id,
                saved.order_ids.len(),
                saved.pickup_time
            );
            created.push(saved);
        }
        Ok(created)
    }
}
