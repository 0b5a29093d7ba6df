pub mod auth;
pub mod checkout;
pub mod error;
pub mod middleware;
pub mod restaurants;
pub mod state;
pub mod stream;

use axum::{
    http::{header, Method},
    middleware::from_fn_with_state,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::resiliency::circuit_breaker_middleware;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::routes())
        .nest("/v1/checkout", checkout::routes(state.clone()))
        .nest("/v1/restaurants", restaurants::routes(state.clone()))
        .layer(from_fn_with_state(state.clone(), circuit_breaker_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
