pub mod menu;
pub mod slot;
pub mod cache;
pub mod service;

pub use menu::{CatalogError, Dish, DishDraft, Menu, MenuRepository};
pub use slot::{SlotService, TimeSlot, TimeSlotUpdate};
pub use cache::{InMemoryMenuCache, MenuCache};
pub use service::RestaurantService;
