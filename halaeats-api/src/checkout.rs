use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Extension, Json, Router,
};
use halaeats_core::{AddressDraft, OrderType, PaymentMethod};
use halaeats_order::{AdvanceResult, Cart, CartLine, PlacedOrder, SessionView};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{customer_auth_middleware, CustomerClaims};
use crate::state::AppState;

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartCheckoutRequest {
    pub restaurant_id: Uuid,
    pub items: Vec<CartItemRequest>,
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethod>,
}

#[derive(Debug, Deserialize)]
pub struct CartItemRequest {
    pub dish_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct OrderTypeRequest {
    /// Free-form on the wire; unrecognised values clear the selection.
    pub order_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SelectAddressRequest {
    pub address_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SelectSlotRequest {
    pub slot_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SelectPaymentMethodRequest {
    pub payment_method_id: Uuid,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(start_checkout))
        .route("/{id}", get(get_checkout))
        .route("/{id}/refresh", post(refresh))
        .route("/{id}/order-type", put(set_order_type))
        .route("/{id}/addresses", post(save_address))
        .route("/{id}/address", put(set_address))
        .route("/{id}/quote", post(request_quote))
        .route("/{id}/slot", put(set_slot))
        .route("/{id}/payment-method", put(set_payment_method))
        .route("/{id}/advance", post(advance))
        .route("/{id}/back", post(back))
        .route("/{id}/place-order", post(place_order))
        .layer(from_fn_with_state(state, customer_auth_middleware))
}

// ============================================================================
// Handlers
// ============================================================================

/// Prices come from the current menu, never from the client.
async fn start_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(req): Json<StartCheckoutRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let menu = state.restaurants.fetch_menu(req.restaurant_id).await?;

    let mut lines = Vec::with_capacity(req.items.len());
    for item in &req.items {
        if item.quantity == 0 {
            return Err(AppError::Validation(format!("Quantity for dish {} must be positive", item.dish_id)));
        }
        let dish = menu
            .dish(item.dish_id)
            .filter(|d| d.is_available)
            .ok_or_else(|| AppError::Validation(format!("Dish {} is not available", item.dish_id)))?;
        lines.push(CartLine {
            dish_id: dish.id,
            name: dish.name.clone(),
            unit_price_cents: dish.price_cents,
            quantity: item.quantity,
        });
    }

    let view = state
        .checkout
        .start(&claims.sub, req.restaurant_id, Cart::new(lines), req.payment_methods)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn get_checkout(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.checkout.view(id, &claims.sub).await?))
}

/// Reload addresses and slots, e.g. after the customer returns to the tab.
async fn refresh(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let (addresses, slots) = tokio::join!(
        state.checkout.load_addresses(id, &claims.sub),
        state.checkout.load_slots(id, &claims.sub)
    );
    addresses?;
    slots?;
    Ok(Json(state.checkout.view(id, &claims.sub).await?))
}

async fn set_order_type(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<OrderTypeRequest>,
) -> Result<Json<SessionView>, AppError> {
    let order_type = req.order_type.as_deref().and_then(OrderType::parse_lenient);
    Ok(Json(state.checkout.select_order_type(id, &claims.sub, order_type).await?))
}

async fn save_address(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(draft): Json<AddressDraft>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.checkout.save_address(id, &claims.sub, draft).await?))
}

async fn set_address(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectAddressRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.checkout.select_address(id, &claims.sub, req.address_id).await?))
}

async fn request_quote(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.checkout.request_quote(id, &claims.sub).await?))
}

async fn set_slot(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectSlotRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.checkout.select_slot(id, &claims.sub, req.slot_id).await?))
}

async fn set_payment_method(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectPaymentMethodRequest>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(
        state
            .checkout
            .select_payment_method(id, &claims.sub, req.payment_method_id)
            .await?,
    ))
}

async fn advance(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<AdvanceResult>, AppError> {
    Ok(Json(state.checkout.advance(id, &claims.sub).await?))
}

async fn back(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.checkout.back(id, &claims.sub).await?))
}

async fn place_order(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<PlacedOrder>), AppError> {
    let placed = state.checkout.place_order(id, &claims.sub).await?;
    tracing::info!("Checkout {} placed order {}", id, placed.order.id);
    Ok((StatusCode::CREATED, Json(placed)))
}
