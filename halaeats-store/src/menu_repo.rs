use async_trait::async_trait;
use chrono::{DateTime, Utc};
use halaeats_catalog::{CatalogError, Dish, Menu, MenuRepository, SlotService, TimeSlot, TimeSlotUpdate};
use halaeats_core::{CoreError, CoreResult, OrderType};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::storage_err;

/// Dishes and time slots in Postgres. Serves both the owner-side
/// [`MenuRepository`] and the customer-side [`SlotService`].
pub struct PgMenuRepository {
    pool: PgPool,
}

impl PgMenuRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn slots_for(&self, restaurant_id: Uuid) -> CoreResult<Vec<TimeSlot>> {
        let rows: Vec<SlotRow> = sqlx::query_as(&format!(
            "SELECT {} FROM time_slots WHERE restaurant_id = $1 ORDER BY starts_at",
            SLOT_COLUMNS
        ))
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows.into_iter().map(TimeSlot::from).collect())
    }
}

fn catalog_err(err: sqlx::Error) -> CatalogError {
    tracing::error!("Menu storage error: {}", err);
    CatalogError::Storage(err.to_string())
}

const DISH_COLUMNS: &str =
    "id, restaurant_id, name, description, price_cents, category, is_available, dietary_tags";

const SLOT_COLUMNS: &str =
    "id, restaurant_id, starts_at, ends_at, capacity, booked, order_types, is_active";

#[derive(sqlx::FromRow)]
struct DishRow {
    id: Uuid,
    restaurant_id: Uuid,
    name: String,
    description: Option<String>,
    price_cents: i32,
    category: Option<String>,
    is_available: bool,
    dietary_tags: Vec<String>,
}

impl From<DishRow> for Dish {
    fn from(row: DishRow) -> Self {
        Dish {
            id: row.id,
            restaurant_id: row.restaurant_id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            category: row.category,
            is_available: row.is_available,
            dietary_tags: row.dietary_tags,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: Uuid,
    restaurant_id: Uuid,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    capacity: i32,
    booked: i32,
    order_types: Vec<String>,
    is_active: bool,
}

impl From<SlotRow> for TimeSlot {
    fn from(row: SlotRow) -> Self {
        TimeSlot {
            id: row.id,
            restaurant_id: row.restaurant_id,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
            capacity: row.capacity.max(0) as u32,
            booked: row.booked.max(0) as u32,
            order_types: row
                .order_types
                .iter()
                .filter_map(|t| OrderType::parse_lenient(t))
                .collect(),
            is_active: row.is_active,
        }
    }
}

fn order_type_names(types: &[OrderType]) -> Vec<String> {
    types.iter().map(|t| t.as_str().to_string()).collect()
}

#[async_trait]
impl MenuRepository for PgMenuRepository {
    async fn fetch_menu(&self, restaurant_id: Uuid) -> Result<Menu, CatalogError> {
        let dishes: Vec<DishRow> = sqlx::query_as(&format!(
            "SELECT {} FROM dishes WHERE restaurant_id = $1 ORDER BY category NULLS LAST, name",
            DISH_COLUMNS
        ))
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(catalog_err)?;

        let time_slots = self.slots_for(restaurant_id).await?;

        Ok(Menu {
            restaurant_id,
            dishes: dishes.into_iter().map(Dish::from).collect(),
            time_slots,
        })
    }

    async fn add_dish(&self, dish: &Dish) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO dishes (id, restaurant_id, name, description, price_cents, category, is_available, dietary_tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(dish.id)
        .bind(dish.restaurant_id)
        .bind(&dish.name)
        .bind(&dish.description)
        .bind(dish.price_cents)
        .bind(&dish.category)
        .bind(dish.is_available)
        .bind(&dish.dietary_tags)
        .execute(&self.pool)
        .await
        .map_err(catalog_err)?;
        Ok(())
    }

    async fn update_dish(&self, dish: &Dish) -> Result<(), CatalogError> {
        let result = sqlx::query(
            r#"
            UPDATE dishes
            SET name = $3, description = $4, price_cents = $5, category = $6, is_available = $7, dietary_tags = $8
            WHERE id = $1 AND restaurant_id = $2
            "#,
        )
        .bind(dish.id)
        .bind(dish.restaurant_id)
        .bind(&dish.name)
        .bind(&dish.description)
        .bind(dish.price_cents)
        .bind(&dish.category)
        .bind(dish.is_available)
        .bind(&dish.dietary_tags)
        .execute(&self.pool)
        .await
        .map_err(catalog_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::DishNotFound(dish.id.to_string()));
        }
        Ok(())
    }

    async fn delete_dish(&self, restaurant_id: Uuid, dish_id: Uuid) -> Result<(), CatalogError> {
        let result = sqlx::query("DELETE FROM dishes WHERE id = $1 AND restaurant_id = $2")
            .bind(dish_id)
            .bind(restaurant_id)
            .execute(&self.pool)
            .await
            .map_err(catalog_err)?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::DishNotFound(dish_id.to_string()));
        }
        Ok(())
    }

    async fn get_dish(&self, restaurant_id: Uuid, dish_id: Uuid) -> Result<Option<Dish>, CatalogError> {
        let row: Option<DishRow> = sqlx::query_as(&format!(
            "SELECT {} FROM dishes WHERE id = $1 AND restaurant_id = $2",
            DISH_COLUMNS
        ))
        .bind(dish_id)
        .bind(restaurant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_err)?;

        Ok(row.map(Dish::from))
    }

    async fn add_time_slot(&self, slot: &TimeSlot) -> Result<(), CatalogError> {
        sqlx::query(
            r#"
            INSERT INTO time_slots (id, restaurant_id, starts_at, ends_at, capacity, booked, order_types, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(slot.id)
        .bind(slot.restaurant_id)
        .bind(slot.starts_at)
        .bind(slot.ends_at)
        .bind(slot.capacity as i32)
        .bind(slot.booked as i32)
        .bind(order_type_names(&slot.order_types))
        .bind(slot.is_active)
        .execute(&self.pool)
        .await
        .map_err(catalog_err)?;
        Ok(())
    }

    async fn update_time_slot(
        &self,
        restaurant_id: Uuid,
        slot_id: Uuid,
        update: &TimeSlotUpdate,
    ) -> Result<TimeSlot, CatalogError> {
        update.validate()?;

        // The booked guard keeps capacity from dropping under concurrent bookings.
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            r#"
            UPDATE time_slots
            SET starts_at = $3, ends_at = $4, capacity = $5, order_types = $6, is_active = $7
            WHERE id = $1 AND restaurant_id = $2 AND booked <= $5
            RETURNING {}
            "#,
            SLOT_COLUMNS
        ))
        .bind(slot_id)
        .bind(restaurant_id)
        .bind(update.starts_at)
        .bind(update.ends_at)
        .bind(update.capacity as i32)
        .bind(order_type_names(&update.order_types))
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(catalog_err)?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        let existing: Option<(i32,)> =
            sqlx::query_as("SELECT booked FROM time_slots WHERE id = $1 AND restaurant_id = $2")
                .bind(slot_id)
                .bind(restaurant_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(catalog_err)?;

        match existing {
            Some((booked,)) => Err(CatalogError::InvalidSlot(format!(
                "capacity {} is below {} existing bookings",
                update.capacity, booked
            ))),
            None => Err(CatalogError::SlotNotFound(slot_id.to_string())),
        }
    }
}

#[async_trait]
impl SlotService for PgMenuRepository {
    async fn list_slots(&self, restaurant_id: Uuid) -> CoreResult<Vec<TimeSlot>> {
        self.slots_for(restaurant_id).await
    }

    async fn get_slot(&self, slot_id: Uuid) -> CoreResult<Option<TimeSlot>> {
        let row: Option<SlotRow> =
            sqlx::query_as(&format!("SELECT {} FROM time_slots WHERE id = $1", SLOT_COLUMNS))
                .bind(slot_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(row.map(TimeSlot::from))
    }

    async fn book_slot(&self, slot_id: Uuid) -> CoreResult<TimeSlot> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            r#"
            UPDATE time_slots SET booked = booked + 1
            WHERE id = $1 AND is_active AND booked < capacity
            RETURNING {}
            "#,
            SLOT_COLUMNS
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some(row) => Ok(row.into()),
            None => match self.get_slot(slot_id).await? {
                Some(_) => Err(CoreError::Conflict(format!("time slot {} is full", slot_id))),
                None => Err(CoreError::NotFound(format!("time slot {}", slot_id))),
            },
        }
    }

    async fn release_slot(&self, slot_id: Uuid) -> CoreResult<TimeSlot> {
        let row: Option<SlotRow> = sqlx::query_as(&format!(
            "UPDATE time_slots SET booked = GREATEST(booked - 1, 0) WHERE id = $1 RETURNING {}",
            SLOT_COLUMNS
        ))
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(TimeSlot::from)
            .ok_or_else(|| CoreError::NotFound(format!("time slot {}", slot_id)))
    }
}
