use halaeats_core::{Notice, Notifier};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache::MenuCache;
use crate::menu::{CatalogError, Dish, DishDraft, Menu, MenuRepository};
use crate::slot::{TimeSlot, TimeSlotUpdate};

/// Owner-dashboard operations over a restaurant's menu.
///
/// Reads go through the injected [`MenuCache`]. Every mutation invalidates
/// the cached menu of that restaurant once the repository accepts it; a
/// failed mutation leaves the cache alone, is logged, and raises an error
/// notice before the error is handed back.
pub struct RestaurantService {
    repo: Arc<dyn MenuRepository>,
    cache: Arc<dyn MenuCache>,
    notifier: Arc<dyn Notifier>,
}

impl RestaurantService {
    pub fn new(
        repo: Arc<dyn MenuRepository>,
        cache: Arc<dyn MenuCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self { repo, cache, notifier }
    }

    pub async fn fetch_menu(&self, restaurant_id: Uuid) -> Result<Menu, CatalogError> {
        match self.cache.get(restaurant_id).await {
            Ok(Some(menu)) => return Ok(menu),
            Ok(None) => {}
            // A broken cache degrades to a repository read.
            Err(e) => warn!("Menu cache read failed for {}: {}", restaurant_id, e),
        }

        let menu = match self.repo.fetch_menu(restaurant_id).await {
            Ok(menu) => menu,
            Err(e) => {
                error!("Failed to fetch menu for {}: {}", restaurant_id, e);
                self.notifier.notify(Notice::error("Could not load the menu"));
                return Err(e);
            }
        };

        if let Err(e) = self.cache.put(&menu).await {
            warn!("Menu cache fill failed for {}: {}", restaurant_id, e);
        }
        Ok(menu)
    }

    pub async fn add_dish(&self, restaurant_id: Uuid, draft: DishDraft) -> Result<Dish, CatalogError> {
        let result = async {
            draft.validate()?;
            let dish = Dish::from_draft(restaurant_id, draft);
            self.repo.add_dish(&dish).await?;
            Ok::<_, CatalogError>(dish)
        }
        .await;

        self.settle(restaurant_id, "add dish", "Dish added", result).await
    }

    pub async fn update_dish(
        &self,
        restaurant_id: Uuid,
        dish_id: Uuid,
        draft: DishDraft,
    ) -> Result<Dish, CatalogError> {
        let result = async {
            draft.validate()?;
            let mut dish = self
                .repo
                .get_dish(restaurant_id, dish_id)
                .await?
                .ok_or_else(|| CatalogError::DishNotFound(dish_id.to_string()))?;
            dish.apply(draft);
            self.repo.update_dish(&dish).await?;
            Ok::<_, CatalogError>(dish)
        }
        .await;

        self.settle(restaurant_id, "update dish", "Dish updated", result).await
    }

    pub async fn delete_dish(&self, restaurant_id: Uuid, dish_id: Uuid) -> Result<(), CatalogError> {
        let result = self.repo.delete_dish(restaurant_id, dish_id).await;
        self.settle(restaurant_id, "delete dish", "Dish removed", result).await
    }

    pub async fn add_time_slot(&self, restaurant_id: Uuid, update: TimeSlotUpdate) -> Result<TimeSlot, CatalogError> {
        let result = async {
            let slot = TimeSlot::from_update(restaurant_id, update)?;
            self.repo.add_time_slot(&slot).await?;
            Ok::<_, CatalogError>(slot)
        }
        .await;

        self.settle(restaurant_id, "add time slot", "Time slot added", result).await
    }

    pub async fn update_time_slot(
        &self,
        restaurant_id: Uuid,
        slot_id: Uuid,
        update: TimeSlotUpdate,
    ) -> Result<TimeSlot, CatalogError> {
        let result = async {
            update.validate()?;
            self.repo.update_time_slot(restaurant_id, slot_id, &update).await
        }
        .await;

        self.settle(restaurant_id, "update time slot", "Time slot updated", result).await
    }

    async fn settle<T>(
        &self,
        restaurant_id: Uuid,
        action: &str,
        success_message: &str,
        result: Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        match result {
            Ok(value) => {
                if let Err(e) = self.cache.invalidate(restaurant_id).await {
                    // Entry will age out via TTL.
                    warn!("Menu cache invalidation failed for {}: {}", restaurant_id, e);
                }
                info!("{} succeeded for restaurant {}", action, restaurant_id);
                self.notifier.notify(Notice::success(success_message));
                Ok(value)
            }
            Err(e) => {
                error!("Failed to {} for restaurant {}: {}", action, restaurant_id, e);
                self.notifier.notify(Notice::error(format!("Could not {}: {}", action, e)));
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryMenuCache;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use halaeats_core::{MemoryNotifier, NoticeLevel, OrderType};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct FakeMenuRepo {
        dishes: Mutex<Vec<Dish>>,
        slots: Mutex<Vec<TimeSlot>>,
        fetches: AtomicUsize,
        fail_writes: AtomicBool,
    }

    impl FakeMenuRepo {
        fn check_writes(&self) -> Result<(), CatalogError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(CatalogError::Storage("database offline".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MenuRepository for FakeMenuRepo {
        async fn fetch_menu(&self, restaurant_id: Uuid) -> Result<Menu, CatalogError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Menu {
                restaurant_id,
                dishes: self.dishes.lock().await.clone(),
                time_slots: self.slots.lock().await.clone(),
            })
        }

        async fn add_dish(&self, dish: &Dish) -> Result<(), CatalogError> {
            self.check_writes()?;
            self.dishes.lock().await.push(dish.clone());
            Ok(())
        }

        async fn update_dish(&self, dish: &Dish) -> Result<(), CatalogError> {
            self.check_writes()?;
            let mut dishes = self.dishes.lock().await;
            let slot = dishes
                .iter_mut()
                .find(|d| d.id == dish.id)
                .ok_or_else(|| CatalogError::DishNotFound(dish.id.to_string()))?;
            *slot = dish.clone();
            Ok(())
        }

        async fn delete_dish(&self, _restaurant_id: Uuid, dish_id: Uuid) -> Result<(), CatalogError> {
            self.check_writes()?;
            let mut dishes = self.dishes.lock().await;
            let before = dishes.len();
            dishes.retain(|d| d.id != dish_id);
            if dishes.len() == before {
                return Err(CatalogError::DishNotFound(dish_id.to_string()));
            }
            Ok(())
        }

        async fn get_dish(&self, _restaurant_id: Uuid, dish_id: Uuid) -> Result<Option<Dish>, CatalogError> {
            Ok(self.dishes.lock().await.iter().find(|d| d.id == dish_id).cloned())
        }

        async fn add_time_slot(&self, slot: &TimeSlot) -> Result<(), CatalogError> {
            self.check_writes()?;
            self.slots.lock().await.push(slot.clone());
            Ok(())
        }

        async fn update_time_slot(
            &self,
            _restaurant_id: Uuid,
            slot_id: Uuid,
            update: &TimeSlotUpdate,
        ) -> Result<TimeSlot, CatalogError> {
            self.check_writes()?;
            let mut slots = self.slots.lock().await;
            let slot = slots
                .iter_mut()
                .find(|s| s.id == slot_id)
                .ok_or_else(|| CatalogError::SlotNotFound(slot_id.to_string()))?;
            slot.apply(update)?;
            Ok(slot.clone())
        }
    }

    fn draft(name: &str) -> DishDraft {
        DishDraft {
            name: name.to_string(),
            description: None,
            price_cents: 1200,
            category: None,
            is_available: true,
            dietary_tags: vec![],
        }
    }

    fn service() -> (RestaurantService, Arc<FakeMenuRepo>, Arc<InMemoryMenuCache>, Arc<MemoryNotifier>) {
        let repo = Arc::new(FakeMenuRepo::default());
        let cache = Arc::new(InMemoryMenuCache::default());
        let notifier = Arc::new(MemoryNotifier::new());
        let svc = RestaurantService::new(repo.clone(), cache.clone(), notifier.clone());
        (svc, repo, cache, notifier)
    }

    #[tokio::test]
    async fn test_fetch_menu_reads_through_cache() {
        let (svc, repo, _cache, _notifier) = service();
        let restaurant_id = Uuid::new_v4();

        svc.fetch_menu(restaurant_id).await.unwrap();
        svc.fetch_menu(restaurant_id).await.unwrap();
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_successful_mutation_invalidates_menu() {
        let (svc, repo, cache, notifier) = service();
        let restaurant_id = Uuid::new_v4();

        svc.fetch_menu(restaurant_id).await.unwrap();
        let dish = svc.add_dish(restaurant_id, draft("Kunafa")).await.unwrap();
        assert!(cache.get(restaurant_id).await.unwrap().is_none());

        let menu = svc.fetch_menu(restaurant_id).await.unwrap();
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(menu.dish(dish.id).map(|d| d.name.as_str()), Some("Kunafa"));

        let notices = notifier.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cache_and_notifies() {
        let (svc, repo, cache, notifier) = service();
        let restaurant_id = Uuid::new_v4();

        svc.fetch_menu(restaurant_id).await.unwrap();
        repo.fail_writes.store(true, Ordering::SeqCst);

        let result = svc.add_dish(restaurant_id, draft("Kunafa")).await;
        assert!(matches!(result, Err(CatalogError::Storage(_))));
        assert!(cache.get(restaurant_id).await.unwrap().is_some());

        let notices = notifier.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_invalid_draft_never_reaches_repository() {
        let (svc, repo, _cache, notifier) = service();
        let result = svc.add_dish(Uuid::new_v4(), draft(" ")).await;
        assert!(matches!(result, Err(CatalogError::InvalidDish(_))));
        assert!(repo.dishes.lock().await.is_empty());
        assert_eq!(notifier.drain()[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_update_missing_dish_is_not_found() {
        let (svc, _repo, _cache, _notifier) = service();
        let result = svc.update_dish(Uuid::new_v4(), Uuid::new_v4(), draft("Maqluba")).await;
        assert!(matches!(result, Err(CatalogError::DishNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_time_slot_invalidates_menu() {
        let (svc, repo, cache, _notifier) = service();
        let restaurant_id = Uuid::new_v4();
        let start = Utc::now() + Duration::hours(3);
        let slot = TimeSlot::new(restaurant_id, start, start + Duration::minutes(30), 4, vec![OrderType::Pickup]);
        repo.slots.lock().await.push(slot.clone());

        svc.fetch_menu(restaurant_id).await.unwrap();
        let updated = svc
            .update_time_slot(
                restaurant_id,
                slot.id,
                TimeSlotUpdate {
                    starts_at: slot.starts_at,
                    ends_at: slot.ends_at,
                    capacity: 10,
                    order_types: vec![OrderType::Pickup, OrderType::Delivery],
                    is_active: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.capacity, 10);
        assert!(cache.get(restaurant_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_time_slot_validates_and_invalidates() {
        let (svc, repo, cache, _notifier) = service();
        let restaurant_id = Uuid::new_v4();
        let start = Utc::now() + Duration::hours(1);
        svc.fetch_menu(restaurant_id).await.unwrap();

        let backwards = TimeSlotUpdate {
            starts_at: start,
            ends_at: start - Duration::minutes(15),
            capacity: 3,
            order_types: vec![OrderType::Delivery],
            is_active: true,
        };
        assert!(matches!(
            svc.add_time_slot(restaurant_id, backwards).await,
            Err(CatalogError::InvalidSlot(_))
        ));
        assert!(cache.get(restaurant_id).await.unwrap().is_some());

        let slot = svc
            .add_time_slot(
                restaurant_id,
                TimeSlotUpdate {
                    starts_at: start,
                    ends_at: start + Duration::minutes(15),
                    capacity: 3,
                    order_types: vec![OrderType::Delivery],
                    is_active: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(slot.booked, 0);
        assert_eq!(repo.slots.lock().await.len(), 1);
        assert!(cache.get(restaurant_id).await.unwrap().is_none());
    }
}
