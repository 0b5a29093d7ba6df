use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use halaeats_catalog::{Dish, DishDraft, Menu, TimeSlot, TimeSlotUpdate};
use halaeats_core::{DeliveryBatch, Order, OrderStatus};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{any_auth_middleware, TokenClaims};
use crate::state::AppState;
use crate::stream::order_stream;

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    /// Defaults to today (UTC).
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct CreateBatchesRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Menu and slot reads are open to any signed-in user; every other route
/// requires an owner token for the restaurant in the path.
pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/{id}/menu", get(get_menu))
        .route("/{id}/slots", get(list_slots).post(add_slot))
        .route("/{id}/slots/{slot_id}", put(update_slot))
        .route("/{id}/dishes", post(add_dish))
        .route("/{id}/dishes/{dish_id}", put(update_dish).delete(delete_dish))
        .route("/{id}/orders", get(list_orders))
        .route("/{id}/orders/stream", get(order_stream))
        .route("/{id}/orders/{order_id}/status", put(update_order_status))
        .route("/{id}/batches", get(list_batches).post(create_batches))
        .layer(from_fn_with_state(state, any_auth_middleware))
}

fn day_or_today(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Utc::now().date_naive())
}

// ============================================================================
// Menu
// ============================================================================

async fn get_menu(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Menu>, AppError> {
    Ok(Json(state.restaurants.fetch_menu(id).await?))
}

async fn add_dish(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
    Json(draft): Json<DishDraft>,
) -> Result<(StatusCode, Json<Dish>), AppError> {
    claims.require_owner_of(id)?;
    let dish = state.restaurants.add_dish(id, draft).await?;
    Ok((StatusCode::CREATED, Json(dish)))
}

async fn update_dish(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path((id, dish_id)): Path<(Uuid, Uuid)>,
    Json(draft): Json<DishDraft>,
) -> Result<Json<Dish>, AppError> {
    claims.require_owner_of(id)?;
    Ok(Json(state.restaurants.update_dish(id, dish_id, draft).await?))
}

async fn delete_dish(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path((id, dish_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    claims.require_owner_of(id)?;
    state.restaurants.delete_dish(id, dish_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Time slots
// ============================================================================

async fn list_slots(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimeSlot>>, AppError> {
    Ok(Json(state.slots.list_slots(id).await?))
}

async fn add_slot(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
    Json(update): Json<TimeSlotUpdate>,
) -> Result<(StatusCode, Json<TimeSlot>), AppError> {
    claims.require_owner_of(id)?;
    let slot = state.restaurants.add_time_slot(id, update).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

async fn update_slot(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path((id, slot_id)): Path<(Uuid, Uuid)>,
    Json(update): Json<TimeSlotUpdate>,
) -> Result<Json<TimeSlot>, AppError> {
    claims.require_owner_of(id)?;
    Ok(Json(state.restaurants.update_time_slot(id, slot_id, update).await?))
}

// ============================================================================
// Orders and batches
// ============================================================================

async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    claims.require_owner_of(id)?;
    let orders = state.orders.orders_for_day(id, day_or_today(query.date)).await?;
    Ok(Json(orders))
}

async fn update_order_status(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path((id, order_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    claims.require_owner_of(id)?;
    let status: OrderStatus = req.status.trim().to_ascii_uppercase().parse().map_err(AppError::Validation)?;

    let order = state.orders.get_order(order_id).await?;
    if order.restaurant_id != id {
        return Err(AppError::NotFound(format!("Order not found: {}", order_id)));
    }
    Ok(Json(state.orders.transition(order_id, status).await?))
}

async fn create_batches(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
    body: Option<Json<CreateBatchesRequest>>,
) -> Result<(StatusCode, Json<Vec<DeliveryBatch>>), AppError> {
    claims.require_owner_of(id)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let day = day_or_today(req.date);

    let orders = state.orders.orders_for_day(id, day).await?;
    let batches = state
        .planner
        .create_batches(state.deliveries.as_ref(), id, &orders)
        .await?;
    tracing::info!("Restaurant {} batched {} orders into {} batches for {}", id, orders.len(), batches.len(), day);
    Ok((StatusCode::CREATED, Json(batches)))
}

async fn list_batches(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DeliveryBatch>>, AppError> {
    claims.require_owner_of(id)?;
    Ok(Json(state.deliveries.get_delivery_batches(id).await?))
}
