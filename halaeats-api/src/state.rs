use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use halaeats_catalog::{InMemoryMenuCache, MenuCache, MenuRepository, RestaurantService, SlotService};
use halaeats_core::{AddressService, DeliveryService, Notifier, OrderRepository, TracingNotifier};
use halaeats_order::{
    BatchPlanner, CheckoutService, MockPaymentAdapter, OrderManager, PaymentOrchestrator,
    QuoteConfig, SessionStore, TaxPolicy, ZoneQuoteService,
};
use halaeats_shared::models::events::OrderPlacedEvent;
use halaeats_store::address_repo::PgAddressService;
use halaeats_store::app_config::{CheckoutRules, Config, DeliveryRules, StorageBackend};
use halaeats_store::batch_repo::PgDeliveryService;
use halaeats_store::memory::{
    InMemoryAddressService, InMemoryDeliveryService, InMemoryMenuRepository, InMemoryOrderRepository,
};
use halaeats_store::menu_repo::PgMenuRepository;
use halaeats_store::order_repo::PgOrderRepository;
use halaeats_store::{DbClient, RedisClient, RedisMenuCache};
use tokio::sync::broadcast;

use crate::middleware::resiliency::CircuitBreaker;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
    /// Shared key restaurant staff exchange for an owner token. Owner login
    /// is disabled when unset.
    pub owner_access_key: Option<String>,
}

pub struct ResiliencyState {
    pub payment_cb: CircuitBreaker,
}

impl Default for ResiliencyState {
    fn default() -> Self {
        Self {
            payment_cb: CircuitBreaker::new("payment", 5, Duration::from_secs(30)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub restaurants: Arc<RestaurantService>,
    pub orders: Arc<OrderManager>,
    pub slots: Arc<dyn SlotService>,
    pub deliveries: Arc<dyn DeliveryService>,
    pub planner: BatchPlanner,
    pub sse_tx: broadcast::Sender<OrderPlacedEvent>,
    pub auth: AuthConfig,
    pub resiliency: Arc<ResiliencyState>,
}

/// Storage implementations behind every collaborator trait.
pub struct Backends {
    pub addresses: Arc<dyn AddressService>,
    pub menus: Arc<dyn MenuRepository>,
    pub slots: Arc<dyn SlotService>,
    pub orders: Arc<dyn OrderRepository>,
    pub deliveries: Arc<dyn DeliveryService>,
    pub cache: Arc<dyn MenuCache>,
}

impl Backends {
    pub fn in_memory(cache: Arc<dyn MenuCache>) -> Self {
        let menu = Arc::new(InMemoryMenuRepository::new());
        Self {
            addresses: Arc::new(InMemoryAddressService::new()),
            menus: menu.clone(),
            slots: menu,
            orders: Arc::new(InMemoryOrderRepository::new()),
            deliveries: Arc::new(InMemoryDeliveryService::new()),
            cache,
        }
    }

    pub fn postgres(db: &DbClient, cache: Arc<dyn MenuCache>) -> Self {
        let pool = db.pool.clone();
        let menu = Arc::new(PgMenuRepository::new(pool.clone()));
        Self {
            addresses: Arc::new(PgAddressService::new(pool.clone())),
            menus: menu.clone(),
            slots: menu,
            orders: Arc::new(PgOrderRepository::new(pool.clone())),
            deliveries: Arc::new(PgDeliveryService::new(pool)),
            cache,
        }
    }

    /// Connect whatever the configuration asks for. With Postgres, rule
    /// overrides stored in the database replace the file values.
    pub async fn connect(config: &Config) -> anyhow::Result<(Self, CheckoutRules, DeliveryRules)> {
        let cache: Arc<dyn MenuCache> = match &config.redis.url {
            Some(url) => {
                let redis = RedisClient::new(url).await.context("Failed to open Redis client")?;
                redis.ping().await.context("Failed to reach Redis")?;
                tracing::info!("Menu cache: redis");
                Arc::new(RedisMenuCache::new(redis, config.checkout.menu_cache_ttl_seconds))
            }
            None => {
                tracing::info!("Menu cache: in-process");
                Arc::new(InMemoryMenuCache::new(Duration::from_secs(
                    config.checkout.menu_cache_ttl_seconds,
                )))
            }
        };

        match config.database.backend {
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on restart");
                Ok((
                    Self::in_memory(cache),
                    config.checkout.clone(),
                    config.delivery.clone(),
                ))
            }
            StorageBackend::Postgres => {
                let url = config
                    .database
                    .url
                    .as_deref()
                    .context("database.url is required for the postgres backend")?;
                let db = DbClient::new(url).await.context("Failed to connect to Postgres")?;
                db.migrate().await.context("Failed to run migrations")?;
                let (checkout, delivery) = db
                    .fetch_rule_overrides(config.checkout.clone(), config.delivery.clone())
                    .await
                    .context("Failed to load checkout rules")?;
                Ok((Self::postgres(&db, cache), checkout, delivery))
            }
        }
    }
}

impl AppState {
    pub fn build(
        backends: Backends,
        checkout: &CheckoutRules,
        delivery: &DeliveryRules,
        auth: AuthConfig,
    ) -> Self {
        let (sse_tx, _) = broadcast::channel(100);
        let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

        let quotes = Arc::new(ZoneQuoteService::new(QuoteConfig {
            base_fee_cents: delivery.base_fee_cents,
            zone_fees: delivery.zone_fees.clone(),
            validity_seconds: delivery.quote_validity_seconds,
            estimated_minutes: delivery.estimated_minutes,
            excluded_prefixes: delivery.excluded_prefixes.clone(),
        }));
        let payments = Arc::new(
            PaymentOrchestrator::new(Arc::new(MockPaymentAdapter)).with_currency(checkout.currency.clone()),
        );
        let sessions = Arc::new(SessionStore::new(chrono::Duration::seconds(
            checkout.session_ttl_seconds,
        )));

        let checkout_service = CheckoutService::new(
            sessions,
            backends.addresses.clone(),
            quotes,
            backends.slots.clone(),
            backends.orders.clone(),
            payments,
        )
        .with_tax(TaxPolicy::new(checkout.tax_rate_bps))
        .with_max_line_quantity(checkout.max_line_quantity)
        .with_notifier(notifier.clone())
        .with_events(sse_tx.clone());

        Self {
            checkout: Arc::new(checkout_service),
            restaurants: Arc::new(RestaurantService::new(
                backends.menus.clone(),
                backends.cache.clone(),
                notifier,
            )),
            orders: Arc::new(OrderManager::new(backends.orders.clone())),
            slots: backends.slots,
            deliveries: backends.deliveries,
            planner: BatchPlanner::new(delivery.max_batch_size),
            sse_tx,
            auth,
            resiliency: Arc::new(ResiliencyState::default()),
        }
    }
}
