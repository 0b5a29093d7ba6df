use axum::{extract::State, routing::post, Json, Router};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::{CustomerClaims, TokenClaims, CUSTOMER_ROLE, OWNER_ROLE};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct OwnerLoginRequest {
    pub restaurant_id: Uuid,
    pub access_key: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/guest", post(login_guest))
        .route("/owner", post(login_owner))
}

fn expiry(state: &AppState) -> usize {
    (Utc::now() + Duration::seconds(state.auth.expiration as i64)).timestamp() as usize
}

fn sign<T: Serialize>(state: &AppState, claims: &T) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(state.auth.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Token encoding failed: {}", e)))
}

async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let claims = CustomerClaims {
        sub: format!("guest-{}", Uuid::new_v4()),
        role: CUSTOMER_ROLE.to_owned(),
        exp: expiry(&state),
    };

    let token = sign(&state, &claims)?;
    tracing::info!("Issued guest token for {}", claims.sub);
    Ok(Json(AuthResponse { token }))
}

async fn login_owner(
    State(state): State<AppState>,
    Json(req): Json<OwnerLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let expected = state
        .auth
        .owner_access_key
        .as_deref()
        .ok_or_else(|| AppError::Forbidden("Owner login is disabled".to_string()))?;
    if req.access_key != expected {
        tracing::warn!("Rejected owner login for restaurant {}", req.restaurant_id);
        return Err(AppError::Unauthorized("Invalid access key".to_string()));
    }

    let claims = TokenClaims {
        sub: format!("owner-{}", req.restaurant_id),
        role: OWNER_ROLE.to_owned(),
        restaurant_id: Some(req.restaurant_id),
        exp: expiry(&state),
    };

    let token = sign(&state, &claims)?;
    tracing::info!("Issued owner token for restaurant {}", req.restaurant_id);
    Ok(Json(AuthResponse { token }))
}
