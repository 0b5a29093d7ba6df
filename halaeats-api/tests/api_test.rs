use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::Utc;
use halaeats_api::{
    app,
    state::{AppState, AuthConfig, Backends},
};
use halaeats_catalog::InMemoryMenuCache;
use halaeats_store::app_config::{CheckoutRules, DeliveryRules};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const OWNER_KEY: &str = "kitchen-key";

fn test_app() -> Router {
    let checkout = CheckoutRules {
        tax_rate_bps: 1_000,
        currency: "USD".to_string(),
        session_ttl_seconds: 1_800,
        menu_cache_ttl_seconds: 300,
        max_line_quantity: 50,
    };
    let delivery = DeliveryRules {
        zone_fees: HashMap::from([("111".to_string(), 800)]),
        excluded_prefixes: vec!["999".to_string()],
        ..DeliveryRules::default()
    };
    let backends = Backends::in_memory(Arc::new(InMemoryMenuCache::new(Duration::from_secs(300))));
    let state = AppState::build(
        backends,
        &checkout,
        &delivery,
        AuthConfig {
            secret: "test-secret".to_string(),
            expiration: 3_600,
            owner_access_key: Some(OWNER_KEY.to_string()),
        },
    );
    app(state)
}

async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn guest_token(app: &Router) -> String {
    let (status, body) = call(app, "POST", "/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

async fn owner_token(app: &Router, restaurant_id: Uuid) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/auth/owner",
        None,
        Some(json!({ "restaurant_id": restaurant_id, "access_key": OWNER_KEY })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

struct Kitchen {
    restaurant_id: Uuid,
    owner: String,
    dish_id: Uuid,
    slot_id: Uuid,
    slot_date: String,
}

/// A restaurant with one 20.00 dish and one slot three hours out.
async fn open_kitchen(app: &Router) -> Kitchen {
    let restaurant_id = Uuid::new_v4();
    let owner = owner_token(app, restaurant_id).await;

    let (status, dish) = call(
        app,
        "POST",
        &format!("/v1/restaurants/{}/dishes", restaurant_id),
        Some(&owner),
        Some(json!({ "name": "Mansaf", "price_cents": 2000, "category": "Mains" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let starts_at = Utc::now() + chrono::Duration::hours(3);
    let (status, slot) = call(
        app,
        "POST",
        &format!("/v1/restaurants/{}/slots", restaurant_id),
        Some(&owner),
        Some(json!({
            "starts_at": starts_at,
            "ends_at": starts_at + chrono::Duration::minutes(30),
            "capacity": 5,
            "order_types": ["delivery", "pickup"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    Kitchen {
        restaurant_id,
        owner,
        dish_id: dish["id"].as_str().unwrap().parse().unwrap(),
        slot_id: slot["id"].as_str().unwrap().parse().unwrap(),
        slot_date: starts_at.date_naive().to_string(),
    }
}

fn card(last4: &str) -> Value {
    json!({ "id": Uuid::new_v4(), "type": "card", "last4": last4, "brand": "Visa", "is_default": true })
}

async fn start_checkout(app: &Router, token: &str, kitchen: &Kitchen, card: Value) -> Value {
    let (status, view) = call(
        app,
        "POST",
        "/v1/checkout",
        Some(token),
        Some(json!({
            "restaurant_id": kitchen.restaurant_id,
            "items": [{ "dish_id": kitchen.dish_id, "quantity": 2 }],
            "payment_methods": [card],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", view);
    view
}

async fn advance_to_review(app: &Router, token: &str, id: &str) {
    for expected in ["address", "payment", "review"] {
        let (status, body) = call(app, "POST", &format!("/v1/checkout/{}/advance", id), Some(token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"]["outcome"], "moved");
        assert_eq!(body["outcome"]["step"], expected);
    }
}

#[tokio::test]
async fn test_health_and_missing_token() {
    let app = test_app();
    let (status, _) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, "GET", &format!("/v1/checkout/{}", Uuid::new_v4()), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, "GET", &format!("/v1/restaurants/{}/menu", Uuid::new_v4()), Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_owner_login_and_scope() {
    let app = test_app();
    let restaurant_id = Uuid::new_v4();

    let (status, _) = call(
        &app,
        "POST",
        "/auth/owner",
        None,
        Some(json!({ "restaurant_id": restaurant_id, "access_key": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let owner = owner_token(&app, restaurant_id).await;
    let guest = guest_token(&app).await;
    let dish = json!({ "name": "Falafel", "price_cents": 400 });

    // Customers and owners of other restaurants cannot edit the menu.
    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/restaurants/{}/dishes", restaurant_id),
        Some(&guest),
        Some(dish.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/restaurants/{}/dishes", Uuid::new_v4()),
        Some(&owner),
        Some(dish),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owner tokens are not customer tokens.
    let (status, _) = call(&app, "GET", &format!("/v1/checkout/{}", Uuid::new_v4()), Some(&owner), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_owner_dish_crud() {
    let app = test_app();
    let kitchen = open_kitchen(&app).await;
    let guest = guest_token(&app).await;
    let dish_uri = format!("/v1/restaurants/{}/dishes/{}", kitchen.restaurant_id, kitchen.dish_id);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/v1/restaurants/{}/dishes", kitchen.restaurant_id),
        Some(&kitchen.owner),
        Some(json!({ "name": "  ", "price_cents": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("name"));

    let (status, updated) = call(
        &app,
        "PUT",
        &dish_uri,
        Some(&kitchen.owner),
        Some(json!({ "name": "Mansaf", "price_cents": 2250 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price_cents"], 2250);

    let (status, menu) = call(&app, "GET", &format!("/v1/restaurants/{}/menu", kitchen.restaurant_id), Some(&guest), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(menu["dishes"][0]["price_cents"], 2250);

    let (status, _) = call(&app, "DELETE", &dish_uri, Some(&kitchen.owner), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, "DELETE", &dish_uri, Some(&kitchen.owner), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, menu) = call(&app, "GET", &format!("/v1/restaurants/{}/menu", kitchen.restaurant_id), Some(&guest), None).await;
    assert_eq!(menu["dishes"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_delivery_checkout_over_http() {
    let app = test_app();
    let kitchen = open_kitchen(&app).await;
    let guest = guest_token(&app).await;

    let view = start_checkout(&app, &guest, &kitchen, card("4242")).await;
    let id = view["id"].as_str().unwrap().to_string();
    assert_eq!(view["step"], "delivery_method");
    assert_eq!(view["continue_disabled"], true);
    assert_eq!(view["slots"].as_array().unwrap().len(), 1);
    assert_eq!(view["cart"]["lines"][0]["unit_price_cents"], 2000);

    let (status, view) = call(
        &app,
        "PUT",
        &format!("/v1/checkout/{}/order-type", id),
        Some(&guest),
        Some(json!({ "order_type": "delivery" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["order_type"], "delivery");

    let (status, view) = call(
        &app,
        "POST",
        &format!("/v1/checkout/{}/addresses", id),
        Some(&guest),
        Some(json!({ "line1": "7 Rainbow St", "city": "Amman", "postal_code": "11183", "is_default": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(view["selected_address_id"].is_string());
    assert_eq!(view["quote"]["fee_cents"], 800);

    let (status, view) = call(
        &app,
        "PUT",
        &format!("/v1/checkout/{}/slot", id),
        Some(&guest),
        Some(json!({ "slot_id": kitchen.slot_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["booked_slot_id"], kitchen.slot_id.to_string());
    assert_eq!(view["continue_disabled"], false);
    assert_eq!(view["total_cents"], 4000 + 400 + 800);

    advance_to_review(&app, &guest, &id).await;

    let (status, placed) = call(&app, "POST", &format!("/v1/checkout/{}/place-order", id), Some(&guest), None).await;
    assert_eq!(status, StatusCode::CREATED, "{}", placed);
    assert_eq!(placed["order"]["total_cents"], 5200);
    assert_eq!(placed["order"]["status"], "PLACED");
    let order_id = placed["order"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "POST", &format!("/v1/checkout/{}/place-order", id), Some(&guest), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Restaurant side: the order shows up, moves forward, and gets batched.
    let orders_uri = format!("/v1/restaurants/{}/orders?date={}", kitchen.restaurant_id, kitchen.slot_date);
    let (status, orders) = call(&app, "GET", &orders_uri, Some(&kitchen.owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders[0]["id"], order_id.as_str());

    let status_uri = format!("/v1/restaurants/{}/orders/{}/status", kitchen.restaurant_id, order_id);
    let (status, order) = call(&app, "PUT", &status_uri, Some(&kitchen.owner), Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "CONFIRMED");
    let (status, _) = call(&app, "PUT", &status_uri, Some(&kitchen.owner), Some(json!({ "status": "PLACED" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let batches_uri = format!("/v1/restaurants/{}/batches", kitchen.restaurant_id);
    let (status, batches) = call(&app, "POST", &batches_uri, Some(&kitchen.owner), Some(json!({ "date": kitchen.slot_date }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(batches.as_array().unwrap().len(), 1);
    assert_eq!(batches[0]["order_ids"][0], order_id.as_str());

    let (_, again) = call(&app, "POST", &batches_uri, Some(&kitchen.owner), Some(json!({ "date": kitchen.slot_date }))).await;
    assert_eq!(again.as_array().unwrap().len(), 0);
    let (_, listed) = call(&app, "GET", &batches_uri, Some(&kitchen.owner), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_declined_card_returns_payment_required() {
    let app = test_app();
    let kitchen = open_kitchen(&app).await;
    let guest = guest_token(&app).await;

    let view = start_checkout(&app, &guest, &kitchen, card("0002")).await;
    let id = view["id"].as_str().unwrap().to_string();

    let (status, _) = call(&app, "POST", &format!("/v1/checkout/{}/place-order", id), Some(&guest), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    call(&app, "PUT", &format!("/v1/checkout/{}/order-type", id), Some(&guest), Some(json!({ "order_type": "pickup" }))).await;
    call(&app, "PUT", &format!("/v1/checkout/{}/slot", id), Some(&guest), Some(json!({ "slot_id": kitchen.slot_id }))).await;
    advance_to_review(&app, &guest, &id).await;

    let (status, body) = call(&app, "POST", &format!("/v1/checkout/{}/place-order", id), Some(&guest), None).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "Payment declined");

    let (_, view) = call(&app, "GET", &format!("/v1/checkout/{}", id), Some(&guest), None).await;
    assert_eq!(view["step"], "review");
    assert!(view["placed_order_id"].is_null());
}

#[tokio::test]
async fn test_checkout_input_errors() {
    let app = test_app();
    let kitchen = open_kitchen(&app).await;
    let guest = guest_token(&app).await;

    let (status, _) = call(
        &app,
        "POST",
        "/v1/checkout",
        Some(&guest),
        Some(json!({ "restaurant_id": kitchen.restaurant_id, "items": [{ "dish_id": Uuid::new_v4(), "quantity": 1 }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/checkout",
        Some(&guest),
        Some(json!({ "restaurant_id": kitchen.restaurant_id, "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Large enough to wrap an i32 subtotal if it were multiplied unchecked.
    let (status, body) = call(
        &app,
        "POST",
        "/v1/checkout",
        Some(&guest),
        Some(json!({
            "restaurant_id": kitchen.restaurant_id,
            "items": [{ "dish_id": kitchen.dish_id, "quantity": 1_717_987 }],
            "payment_methods": [card("4242")],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let view = start_checkout(&app, &guest, &kitchen, card("4242")).await;
    let id = view["id"].as_str().unwrap().to_string();

    // Unrecognised order types clear the choice instead of failing.
    let (status, view) = call(
        &app,
        "PUT",
        &format!("/v1/checkout/{}/order-type", id),
        Some(&guest),
        Some(json!({ "order_type": "drone" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(view["order_type"].is_null());
    assert_eq!(view["continue_disabled"], true);

    let (status, _) = call(
        &app,
        "PUT",
        &format!("/v1/checkout/{}/slot", id),
        Some(&guest),
        Some(json!({ "slot_id": kitchen.slot_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    call(&app, "PUT", &format!("/v1/checkout/{}/order-type", id), Some(&guest), Some(json!({ "order_type": "pickup" }))).await;
    let (status, _) = call(
        &app,
        "PUT",
        &format!("/v1/checkout/{}/slot", id),
        Some(&guest),
        Some(json!({ "slot_id": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Another customer cannot see this session.
    let stranger = guest_token(&app).await;
    let (status, _) = call(&app, "GET", &format!("/v1/checkout/{}", id), Some(&stranger), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
