use async_trait::async_trait;
use halaeats_core::CoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slot::{TimeSlot, TimeSlotUpdate};

/// A dish on a restaurant's menu
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dish {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i32,
    pub category: Option<String>,
    pub is_available: bool,
    pub dietary_tags: Vec<String>,
}

impl Dish {
    pub fn from_draft(restaurant_id: Uuid, draft: DishDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            restaurant_id,
            name: draft.name.trim().to_string(),
            description: draft.description,
            price_cents: draft.price_cents,
            category: draft.category,
            is_available: draft.is_available,
            dietary_tags: draft.dietary_tags,
        }
    }

    /// Overwrite the editable fields, keeping id and owner.
    pub fn apply(&mut self, draft: DishDraft) {
        self.name = draft.name.trim().to_string();
        self.description = draft.description;
        self.price_cents = draft.price_cents;
        self.category = draft.category;
        self.is_available = draft.is_available;
        self.dietary_tags = draft.dietary_tags;
    }
}

/// Dish form payload from the owner dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DishDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_cents: i32,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
}

fn default_available() -> bool {
    true
}

impl DishDraft {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::InvalidDish("name is required".to_string()));
        }
        if self.price_cents < 0 {
            return Err(CatalogError::InvalidDish(format!(
                "price must not be negative (got {})",
                self.price_cents
            )));
        }
        Ok(())
    }
}

/// Everything the storefront needs to render a restaurant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Menu {
    pub restaurant_id: Uuid,
    pub dishes: Vec<Dish>,
    pub time_slots: Vec<TimeSlot>,
}

impl Menu {
    pub fn dish(&self, dish_id: Uuid) -> Option<&Dish> {
        self.dishes.iter().find(|d| d.id == dish_id)
    }

    pub fn available_dishes(&self) -> impl Iterator<Item = &Dish> {
        self.dishes.iter().filter(|d| d.is_available)
    }
}

/// Persistence for menus and the time slots shown alongside them.
#[async_trait]
pub trait MenuRepository: Send + Sync {
    async fn fetch_menu(&self, restaurant_id: Uuid) -> Result<Menu, CatalogError>;

    async fn add_dish(&self, dish: &Dish) -> Result<(), CatalogError>;

    async fn update_dish(&self, dish: &Dish) -> Result<(), CatalogError>;

    async fn delete_dish(&self, restaurant_id: Uuid, dish_id: Uuid) -> Result<(), CatalogError>;

    async fn get_dish(&self, restaurant_id: Uuid, dish_id: Uuid) -> Result<Option<Dish>, CatalogError>;

    async fn add_time_slot(&self, slot: &TimeSlot) -> Result<(), CatalogError>;

    async fn update_time_slot(
        &self,
        restaurant_id: Uuid,
        slot_id: Uuid,
        update: &TimeSlotUpdate,
    ) -> Result<TimeSlot, CatalogError>;
}

/// Catalog-related errors
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Dish not found: {0}")]
    DishNotFound(String),

    #[error("Time slot not found: {0}")]
    SlotNotFound(String),

    #[error("Invalid dish: {0}")]
    InvalidDish(String),

    #[error("Invalid time slot: {0}")]
    InvalidSlot(String),

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl From<CoreError> for CatalogError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(msg) => CatalogError::DishNotFound(msg),
            CoreError::ValidationError(msg) => CatalogError::InvalidDish(msg),
            other => CatalogError::Storage(other.to_string()),
        }
    }
}
