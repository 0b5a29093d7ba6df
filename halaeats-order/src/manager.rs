use chrono::{Duration, NaiveDate, TimeZone, Utc};
use halaeats_core::{CoreError, Order, OrderRepository, OrderStatus};
use std::sync::Arc;
use uuid::Uuid;

/// Manages the restaurant-side lifecycle of placed orders.
///
/// `Placed → Confirmed → Preparing → Ready → Completed`, with `Cancelled`
/// reachable from anything that is not already finished.
pub struct OrderManager {
    repo: Arc<dyn OrderRepository>,
}

impl OrderManager {
    pub fn new(repo: Arc<dyn OrderRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_order(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.repo
            .get_order(order_id)
            .await?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    /// Transition: Placed → Confirmed
    pub async fn confirm(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.transition(order_id, OrderStatus::Confirmed).await
    }

    /// Transition: Confirmed → Preparing
    pub async fn start_preparing(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.transition(order_id, OrderStatus::Preparing).await
    }

    /// Transition: Preparing → Ready
    pub async fn mark_ready(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.transition(order_id, OrderStatus::Ready).await
    }

    /// Transition: Ready → Completed
    pub async fn complete(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.transition(order_id, OrderStatus::Completed).await
    }

    pub async fn cancel(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.transition(order_id, OrderStatus::Cancelled).await
    }

    pub async fn transition(&self, order_id: Uuid, to: OrderStatus) -> Result<Order, OrderError> {
        let mut order = self.get_order(order_id).await?;
        if !Self::can_transition(order.status, to) {
            return Err(OrderError::InvalidTransition {
                from: order.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        self.repo.update_order_status(order_id, to).await?;
        order.update_status(to);
        tracing::info!("Order {} moved to {}", order_id, to.as_str());
        Ok(order)
    }

    pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (from, to),
            (Placed, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, Ready)
                | (Ready, Completed)
                | (Placed | Confirmed | Preparing | Ready, Cancelled)
        )
    }

    /// A restaurant's orders whose slot starts on `date` (UTC), earliest slot first.
    pub async fn orders_for_day(&self, restaurant_id: Uuid, date: NaiveDate) -> Result<Vec<Order>, OrderError> {
        let start = Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN));
        let end = start + Duration::days(1);

        let mut orders = self
            .repo
            .list_orders_for_restaurant(restaurant_id, start, end)
            .await?;
        orders.sort_by_key(|o| (o.slot_starts_at, o.created_at));
        Ok(orders)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Order storage failed: {0}")]
    Storage(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use halaeats_core::{OrderLine, OrderType};
    use halaeats_store::memory::InMemoryOrderRepository;

    fn order(restaurant_id: Uuid, slot_starts_at: DateTime<Utc>) -> Order {
        let now = Utc::now();
        Order {
            id: Uuid::new_v4(),
            customer_id: "customer-1".to_string(),
            restaurant_id,
            order_type: OrderType::Pickup,
            lines: vec![OrderLine {
                dish_id: Uuid::new_v4(),
                name: "Falafel wrap".to_string(),
                unit_price_cents: 750,
                quantity: 2,
            }],
            address_id: None,
            slot_id: Uuid::new_v4(),
            slot_starts_at,
            payment_method: "Visa •••• 4242".to_string(),
            payment_reference: None,
            subtotal_cents: 1_500,
            tax_cents: 150,
            delivery_fee_cents: 0,
            total_cents: 1_650,
            status: OrderStatus::Placed,
            created_at: now,
            updated_at: now,
        }
    }

    fn manager() -> (OrderManager, Arc<InMemoryOrderRepository>) {
        let repo = Arc::new(InMemoryOrderRepository::new());
        (OrderManager::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let (manager, repo) = manager();
        let o = order(Uuid::new_v4(), Utc::now());
        repo.save_order(&o).await.unwrap();

        assert_eq!(manager.confirm(o.id).await.unwrap().status, OrderStatus::Confirmed);
        assert_eq!(manager.start_preparing(o.id).await.unwrap().status, OrderStatus::Preparing);
        assert_eq!(manager.mark_ready(o.id).await.unwrap().status, OrderStatus::Ready);
        assert_eq!(manager.complete(o.id).await.unwrap().status, OrderStatus::Completed);
        assert_eq!(manager.get_order(o.id).await.unwrap().status, OrderStatus::Completed);

        // Finished orders cannot be cancelled
        assert!(matches!(
            manager.cancel(o.id).await,
            Err(OrderError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_transition() {
        let (manager, repo) = manager();
        let o = order(Uuid::new_v4(), Utc::now());
        repo.save_order(&o).await.unwrap();

        // Cannot go directly from Placed to Ready
        assert!(manager.mark_ready(o.id).await.is_err());
        assert!(matches!(
            manager.confirm(Uuid::new_v4()).await,
            Err(OrderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_orders_for_day_sorted_by_slot() {
        let (manager, repo) = manager();
        let restaurant = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let at = |h: u32| Utc.from_utc_datetime(&day.and_hms_opt(h, 0, 0).unwrap());

        let late = order(restaurant, at(19));
        let early = order(restaurant, at(12));
        let next_day = order(restaurant, at(12) + Duration::days(1));
        let elsewhere = order(Uuid::new_v4(), at(13));
        for o in [&late, &early, &next_day, &elsewhere] {
            repo.save_order(o).await.unwrap();
        }

        let ids: Vec<Uuid> = manager
            .orders_for_day(restaurant, day)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }
}
