pub mod app_config;
pub mod database;
pub mod address_repo;
pub mod menu_repo;
pub mod order_repo;
pub mod batch_repo;
pub mod redis_repo;
pub mod memory;

pub use app_config::Config;
pub use database::DbClient;
pub use redis_repo::{RedisClient, RedisMenuCache};
