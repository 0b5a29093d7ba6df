use halaeats_core::CoreError;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::info;

use crate::app_config::{CheckoutRules, DeliveryRules};

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }

    /// Overlay operator-tunable rules stored in `checkout_rules` on top of
    /// the file configuration. Rows look like `{"value": <number>}`.
    pub async fn fetch_rule_overrides(
        &self,
        mut checkout: CheckoutRules,
        mut delivery: DeliveryRules,
    ) -> Result<(CheckoutRules, DeliveryRules), sqlx::Error> {
        let rows: Vec<(String, Value)> =
            sqlx::query_as("SELECT rule_key, rule_value FROM checkout_rules")
                .fetch_all(&self.pool)
                .await?;

        for (key, value) in rows {
            if let Some(v) = value.get("value") {
                apply_rule(&key, v, &mut checkout, &mut delivery);
            }
        }
        Ok((checkout, delivery))
    }
}

fn apply_rule(key: &str, v: &Value, checkout: &mut CheckoutRules, delivery: &mut DeliveryRules) {
    match key {
        "tax_rate_bps" => {
            if let Some(n) = v.as_u64() {
                checkout.tax_rate_bps = n as u32;
            }
        }
        "max_line_quantity" => {
            if let Some(n) = v.as_u64() {
                checkout.max_line_quantity = n as u32;
            }
        }
        "base_fee_cents" => {
            if let Some(n) = v.as_i64() {
                delivery.base_fee_cents = n as i32;
            }
        }
        "quote_validity_seconds" => {
            if let Some(n) = v.as_i64() {
                delivery.quote_validity_seconds = n;
            }
        }
        "estimated_minutes" => {
            if let Some(n) = v.as_u64() {
                delivery.estimated_minutes = n as u32;
            }
        }
        "max_batch_size" => {
            if let Some(n) = v.as_u64() {
                delivery.max_batch_size = n as usize;
            }
        }
        other => tracing::warn!("Ignoring unknown checkout rule '{}'", other),
    }
}

pub(crate) fn storage_err(err: sqlx::Error) -> CoreError {
    tracing::error!("Database error: {}", err);
    CoreError::internal(err)
}
