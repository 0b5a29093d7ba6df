use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct OrderPlacedEvent {
    pub order_id: Uuid,
    pub restaurant_id: Uuid,
    pub customer_id: String,
    pub order_type: String,
    pub slot_starts_at: i64,
    pub total_cents: i32,
    pub timestamp: i64,
}
