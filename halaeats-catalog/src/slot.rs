use async_trait::async_trait;
use chrono::{DateTime, Utc};
use halaeats_core::{CoreResult, OrderType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::menu::CatalogError;

/// A pickup/delivery window offered by a restaurant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlot {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: u32,
    pub booked: u32,
    pub order_types: Vec<OrderType>,
    pub is_active: bool,
}

impl TimeSlot {
    pub fn new(
        restaurant_id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        capacity: u32,
        order_types: Vec<OrderType>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            restaurant_id,
            starts_at,
            ends_at,
            capacity,
            booked: 0,
            order_types,
            is_active: true,
        }
    }

    /// A new, empty slot built from an owner's form.
    pub fn from_update(restaurant_id: Uuid, update: TimeSlotUpdate) -> Result<Self, CatalogError> {
        update.validate()?;
        let mut slot = Self::new(
            restaurant_id,
            update.starts_at,
            update.ends_at,
            update.capacity,
            update.order_types,
        );
        slot.is_active = update.is_active;
        Ok(slot)
    }

    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.booked)
    }

    pub fn has_capacity(&self) -> bool {
        self.is_active && self.remaining() > 0
    }

    pub fn supports(&self, order_type: OrderType) -> bool {
        self.order_types.contains(&order_type)
    }

    /// Whether a customer may pick this slot for the given order type.
    pub fn is_selectable_for(&self, order_type: OrderType, now: DateTime<Utc>) -> bool {
        self.has_capacity() && self.supports(order_type) && self.starts_at > now
    }

    /// Apply an owner edit. Capacity cannot drop below what is already booked.
    pub fn apply(&mut self, update: &TimeSlotUpdate) -> Result<(), CatalogError> {
        update.validate()?;
        if update.capacity < self.booked {
            return Err(CatalogError::InvalidSlot(format!(
                "capacity {} is below {} existing bookings",
                update.capacity, self.booked
            )));
        }
        self.starts_at = update.starts_at;
        self.ends_at = update.ends_at;
        self.capacity = update.capacity;
        self.order_types = update.order_types.clone();
        self.is_active = update.is_active;
        Ok(())
    }
}

/// Owner-side edit of a slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeSlotUpdate {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub capacity: u32,
    pub order_types: Vec<OrderType>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl TimeSlotUpdate {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.ends_at <= self.starts_at {
            return Err(CatalogError::InvalidSlot("slot must end after it starts".to_string()));
        }
        if self.order_types.is_empty() {
            return Err(CatalogError::InvalidSlot(
                "slot must allow at least one order type".to_string(),
            ));
        }
        Ok(())
    }
}

/// Customer-side slot listing and booking.
#[async_trait]
pub trait SlotService: Send + Sync {
    async fn list_slots(&self, restaurant_id: Uuid) -> CoreResult<Vec<TimeSlot>>;

    async fn get_slot(&self, slot_id: Uuid) -> CoreResult<Option<TimeSlot>>;

    /// Take one unit of capacity. Fails with `CoreError::Conflict` when the slot is full.
    async fn book_slot(&self, slot_id: Uuid) -> CoreResult<TimeSlot>;

    /// Give back one unit of capacity taken by [`SlotService::book_slot`].
    async fn release_slot(&self, slot_id: Uuid) -> CoreResult<TimeSlot>;
}
