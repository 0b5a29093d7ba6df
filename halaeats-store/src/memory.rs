//! Process-local implementations of every storage trait.
//!
//! Used when `database.backend = "memory"` and by the test suites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use halaeats_catalog::{CatalogError, Dish, Menu, MenuRepository, SlotService, TimeSlot, TimeSlotUpdate};
use halaeats_core::{
    Address, AddressDraft, AddressService, CoreError, CoreResult, DeliveryBatch, DeliveryService,
    Order, OrderRepository, OrderStatus,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// Addresses
// ============================================================================

#[derive(Default)]
pub struct InMemoryAddressService {
    addresses: RwLock<Vec<Address>>,
}

impl InMemoryAddressService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, address: Address) {
        self.addresses.write().await.push(address);
    }
}

fn clear_other_defaults(addresses: &mut [Address], keep: &Address) {
    if keep.is_default {
        for a in addresses
            .iter_mut()
            .filter(|a| a.user_id == keep.user_id && a.id != keep.id)
        {
            a.is_default = false;
        }
    }
}

#[async_trait]
impl AddressService for InMemoryAddressService {
    async fn get_user_addresses(&self, user_id: &str) -> CoreResult<Vec<Address>> {
        let addresses = self.addresses.read().await;
        Ok(addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn save_address(&self, user_id: &str, draft: AddressDraft) -> CoreResult<Address> {
        draft.validate()?;
        let mut address = Address::from_draft(user_id, draft);
        address.id = Uuid::new_v4();

        let mut addresses = self.addresses.write().await;
        clear_other_defaults(&mut addresses, &address);
        addresses.push(address.clone());
        Ok(address)
    }

    async fn update_address(&self, address: Address) -> CoreResult<Address> {
        let mut addresses = self.addresses.write().await;
        let index = addresses
            .iter()
            .position(|a| a.id == address.id && a.user_id == address.user_id)
            .ok_or_else(|| CoreError::NotFound(format!("address {}", address.id)))?;

        clear_other_defaults(&mut addresses, &address);
        addresses[index] = address.clone();
        Ok(address)
    }
}

// ============================================================================
// Menus and slots
// ============================================================================

#[derive(Default)]
pub struct InMemoryMenuRepository {
    dishes: RwLock<HashMap<Uuid, Dish>>,
    slots: RwLock<HashMap<Uuid, TimeSlot>>,
}

impl InMemoryMenuRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_slot(&self, slot: TimeSlot) {
        self.slots.write().await.insert(slot.id, slot);
    }

    fn sorted_slots(slots: &HashMap<Uuid, TimeSlot>, restaurant_id: Uuid) -> Vec<TimeSlot> {
        let mut out: Vec<TimeSlot> = slots
            .values()
            .filter(|s| s.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.starts_at, s.id));
        out
    }
}

#[async_trait]
impl MenuRepository for InMemoryMenuRepository {
    async fn fetch_menu(&self, restaurant_id: Uuid) -> Result<Menu, CatalogError> {
        let mut dishes: Vec<Dish> = self
            .dishes
            .read()
            .await
            .values()
            .filter(|d| d.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        dishes.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));

        let time_slots = Self::sorted_slots(&*self.slots.read().await, restaurant_id);
        Ok(Menu {
            restaurant_id,
            dishes,
            time_slots,
        })
    }

    async fn add_dish(&self, dish: &Dish) -> Result<(), CatalogError> {
        let mut dishes = self.dishes.write().await;
        if dishes.contains_key(&dish.id) {
            return Err(CatalogError::InvalidDish(format!("dish {} already exists", dish.id)));
        }
        dishes.insert(dish.id, dish.clone());
        Ok(())
    }

    async fn update_dish(&self, dish: &Dish) -> Result<(), CatalogError> {
        let mut dishes = self.dishes.write().await;
        match dishes.get_mut(&dish.id) {
            Some(existing) if existing.restaurant_id == dish.restaurant_id => {
                *existing = dish.clone();
                Ok(())
            }
            _ => Err(CatalogError::DishNotFound(dish.id.to_string())),
        }
    }

    async fn delete_dish(&self, restaurant_id: Uuid, dish_id: Uuid) -> Result<(), CatalogError> {
        let mut dishes = self.dishes.write().await;
        let owned = dishes
            .get(&dish_id)
            .is_some_and(|d| d.restaurant_id == restaurant_id);
        if !owned {
            return Err(CatalogError::DishNotFound(dish_id.to_string()));
        }
        dishes.remove(&dish_id);
        Ok(())
    }

    async fn get_dish(&self, restaurant_id: Uuid, dish_id: Uuid) -> Result<Option<Dish>, CatalogError> {
        let dishes = self.dishes.read().await;
        Ok(dishes
            .get(&dish_id)
            .filter(|d| d.restaurant_id == restaurant_id)
            .cloned())
    }

    async fn add_time_slot(&self, slot: &TimeSlot) -> Result<(), CatalogError> {
        let mut slots = self.slots.write().await;
        if slots.contains_key(&slot.id) {
            return Err(CatalogError::InvalidSlot(format!("slot {} already exists", slot.id)));
        }
        slots.insert(slot.id, slot.clone());
        Ok(())
    }

    async fn update_time_slot(
        &self,
        restaurant_id: Uuid,
        slot_id: Uuid,
        update: &TimeSlotUpdate,
    ) -> Result<TimeSlot, CatalogError> {
        let mut slots = self.slots.write().await;
        let slot = slots
            .get_mut(&slot_id)
            .filter(|s| s.restaurant_id == restaurant_id)
            .ok_or_else(|| CatalogError::SlotNotFound(slot_id.to_string()))?;
        slot.apply(update)?;
        Ok(slot.clone())
    }
}

#[async_trait]
impl SlotService for InMemoryMenuRepository {
    async fn list_slots(&self, restaurant_id: Uuid) -> CoreResult<Vec<TimeSlot>> {
        Ok(Self::sorted_slots(&*self.slots.read().await, restaurant_id))
    }

    async fn get_slot(&self, slot_id: Uuid) -> CoreResult<Option<TimeSlot>> {
        Ok(self.slots.read().await.get(&slot_id).cloned())
    }

    async fn book_slot(&self, slot_id: Uuid) -> CoreResult<TimeSlot> {
        let mut slots = self.slots.write().await;
        let slot = slots
            .get_mut(&slot_id)
            .ok_or_else(|| CoreError::NotFound(format!("time slot {}", slot_id)))?;
        if !slot.has_capacity() {
            return Err(CoreError::Conflict(format!("time slot {} is full", slot_id)));
        }
        slot.booked += 1;
        Ok(slot.clone())
    }

    async fn release_slot(&self, slot_id: Uuid) -> CoreResult<TimeSlot> {
        let mut slots = self.slots.write().await;
        let slot = slots
            .get_mut(&slot_id)
            .ok_or_else(|| CoreError::NotFound(format!("time slot {}", slot_id)))?;
        slot.booked = slot.booked.saturating_sub(1);
        Ok(slot.clone())
    }
}

// ============================================================================
// Orders
// ============================================================================

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn save_order(&self, order: &Order) -> CoreResult<()> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.id) {
            return Err(CoreError::Conflict(format!("order {} already exists", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get_order(&self, id: Uuid) -> CoreResult<Option<Order>> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn list_orders_for_restaurant(
        &self,
        restaurant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> CoreResult<Vec<Order>> {
        let mut out: Vec<Order> = self
            .orders
            .read()
            .await
            .values()
            .filter(|o| o.restaurant_id == restaurant_id && o.slot_starts_at >= from && o.slot_starts_at < to)
            .cloned()
            .collect();
        out.sort_by_key(|o| (o.slot_starts_at, o.created_at));
        Ok(out)
    }

    async fn update_order_status(&self, id: Uuid, status: OrderStatus) -> CoreResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("order {}", id)))?;
        order.update_status(status);
        Ok(())
    }
}

// ============================================================================
// Delivery batches
// ============================================================================

#[derive(Default)]
pub struct InMemoryDeliveryService {
    batches: RwLock<Vec<DeliveryBatch>>,
}

impl InMemoryDeliveryService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeliveryService for InMemoryDeliveryService {
    async fn create_delivery_batch(
        &self,
        store_id: Uuid,
        order_ids: Vec<Uuid>,
        pickup_time: DateTime<Utc>,
    ) -> CoreResult<DeliveryBatch> {
        if order_ids.is_empty() {
            return Err(CoreError::ValidationError("a batch needs at least one order".to_string()));
        }
        let batch = DeliveryBatch::new(store_id, order_ids, pickup_time);
        self.batches.write().await.push(batch.clone());
        Ok(batch)
    }

    async fn get_delivery_batches(&self, store_id: Uuid) -> CoreResult<Vec<DeliveryBatch>> {
        let mut out: Vec<DeliveryBatch> = self
            .batches
            .read()
            .await
            .iter()
            .filter(|b| b.store_id == store_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.pickup_time
                .cmp(&a.pickup_time)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use halaeats_core::OrderType;

    fn draft(line1: &str, is_default: bool) -> AddressDraft {
        AddressDraft {
            line1: line1.to_string(),
            city: "Amman".to_string(),
            postal_code: "11183".to_string(),
            is_default,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_new_default_address_clears_previous_default() {
        let service = InMemoryAddressService::new();
        let first = service.save_address("u1", draft("1 Rainbow St", true)).await.unwrap();
        let second = service.save_address("u1", draft("2 Rainbow St", true)).await.unwrap();
        service.save_address("u2", draft("3 Rainbow St", true)).await.unwrap();

        let mine = service.get_user_addresses("u1").await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(!mine.iter().find(|a| a.id == first.id).unwrap().is_default);
        assert!(mine.iter().find(|a| a.id == second.id).unwrap().is_default);
        assert!(service.get_user_addresses("u2").await.unwrap()[0].is_default);
    }

    #[tokio::test]
    async fn test_update_address_requires_owner() {
        let service = InMemoryAddressService::new();
        let mut saved = service.save_address("u1", draft("1 Rainbow St", false)).await.unwrap();
        saved.user_id = "intruder".to_string();
        assert!(matches!(
            service.update_address(saved).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_slot_booking_respects_capacity() {
        let repo = InMemoryMenuRepository::new();
        let start = Utc::now() + Duration::hours(2);
        let slot = TimeSlot::new(Uuid::new_v4(), start, start + Duration::minutes(30), 1, vec![OrderType::Pickup]);
        let id = slot.id;
        repo.insert_slot(slot).await;

        assert_eq!(repo.book_slot(id).await.unwrap().booked, 1);
        assert!(matches!(repo.book_slot(id).await, Err(CoreError::Conflict(_))));
        assert_eq!(repo.release_slot(id).await.unwrap().booked, 0);
        assert_eq!(repo.release_slot(id).await.unwrap().booked, 0);
        assert!(matches!(repo.book_slot(Uuid::new_v4()).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_batches_listed_newest_first() {
        let service = InMemoryDeliveryService::new();
        let store = Uuid::new_v4();
        let now = Utc::now();
        service.create_delivery_batch(store, vec![Uuid::new_v4()], now).await.unwrap();
        service
            .create_delivery_batch(store, vec![Uuid::new_v4()], now + Duration::hours(1))
            .await
            .unwrap();
        assert!(service.create_delivery_batch(store, vec![], now).await.is_err());

        let batches = service.get_delivery_batches(store).await.unwrap();
        assert_eq!(batches.len(), 2);
        assert!(batches[0].pickup_time > batches[1].pickup_time);
        assert!(service.get_delivery_batches(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
