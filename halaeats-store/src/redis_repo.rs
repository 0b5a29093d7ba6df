use async_trait::async_trait;
use halaeats_catalog::{Menu, MenuCache};
use halaeats_core::{CoreError, CoreResult};
use redis::{AsyncCommands, RedisResult};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn set_json(&self, key: &str, value: &str, ttl_seconds: u64) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds).await
    }

    pub async fn get_json(&self, key: &str) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.get(key).await
    }

    pub async fn del_key(&self, key: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del(key).await
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

/// Menus cached as JSON under `menu:{restaurant_id}` with a TTL.
pub struct RedisMenuCache {
    redis: RedisClient,
    ttl_seconds: u64,
}

impl RedisMenuCache {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(restaurant_id: Uuid) -> String {
        format!("menu:{}", restaurant_id)
    }
}

fn cache_err(err: redis::RedisError) -> CoreError {
    CoreError::Unavailable(format!("menu cache: {}", err))
}

#[async_trait]
impl MenuCache for RedisMenuCache {
    async fn get(&self, restaurant_id: Uuid) -> CoreResult<Option<Menu>> {
        let raw = self
            .redis
            .get_json(&Self::key(restaurant_id))
            .await
            .map_err(cache_err)?;

        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(menu) => Ok(Some(menu)),
                Err(e) => {
                    // Treat an unreadable entry as a miss; the next put overwrites it.
                    tracing::warn!("Discarding malformed cached menu for {}: {}", restaurant_id, e);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn put(&self, menu: &Menu) -> CoreResult<()> {
        let json = serde_json::to_string(menu).map_err(CoreError::internal)?;
        self.redis
            .set_json(&Self::key(menu.restaurant_id), &json, self.ttl_seconds)
            .await
            .map_err(cache_err)
    }

    async fn invalidate(&self, restaurant_id: Uuid) -> CoreResult<()> {
        self.redis
            .del_key(&Self::key(restaurant_id))
            .await
            .map_err(cache_err)?;
        info!("Menu cache invalidated for {}", restaurant_id);
        Ok(())
    }
}
