use async_trait::async_trait;
use halaeats_core::CoreResult;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::menu::Menu;

/// Read-through cache for restaurant menus. Owners of a `MenuCache`
/// invalidate it explicitly after every successful mutation.
#[async_trait]
pub trait MenuCache: Send + Sync {
    async fn get(&self, restaurant_id: Uuid) -> CoreResult<Option<Menu>>;

    async fn put(&self, menu: &Menu) -> CoreResult<()>;

    async fn invalidate(&self, restaurant_id: Uuid) -> CoreResult<()>;
}

/// Process-local cache with a fixed time-to-live per entry.
pub struct InMemoryMenuCache {
    entries: RwLock<HashMap<Uuid, (Instant, Menu)>>,
    ttl: Duration,
}

impl InMemoryMenuCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for InMemoryMenuCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl MenuCache for InMemoryMenuCache {
    async fn get(&self, restaurant_id: Uuid) -> CoreResult<Option<Menu>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&restaurant_id)
            .filter(|(stored_at, _)| stored_at.elapsed() < self.ttl)
            .map(|(_, menu)| menu.clone()))
    }

    async fn put(&self, menu: &Menu) -> CoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(menu.restaurant_id, (Instant::now(), menu.clone()));
        Ok(())
    }

    async fn invalidate(&self, restaurant_id: Uuid) -> CoreResult<()> {
        let mut entries = self.entries.write().await;
        entries.remove(&restaurant_id);
        Ok(())
    }
}
