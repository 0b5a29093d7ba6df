use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

pub const CUSTOMER_ROLE: &str = "CUSTOMER";
pub const OWNER_ROLE: &str = "OWNER";

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CustomerClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

/// Claims accepted on routes open to both customers and restaurant owners.
/// Owner tokens carry the restaurant they manage.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<Uuid>,
    pub exp: usize,
}

impl TokenClaims {
    pub fn require_owner_of(&self, restaurant_id: Uuid) -> Result<(), AppError> {
        if self.role != OWNER_ROLE {
            return Err(AppError::Forbidden("Restaurant owner access required".to_string()));
        }
        if self.restaurant_id != Some(restaurant_id) {
            return Err(AppError::Forbidden("Token is not valid for this restaurant".to_string()));
        }
        Ok(())
    }
}

fn bearer_token(req: &Request) -> Result<&str, StatusCode> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)
}

fn decode_claims<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, StatusCode> {
    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| StatusCode::UNAUTHORIZED)
}

// ============================================================================
// Middleware
// ============================================================================

pub async fn customer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims: CustomerClaims = decode_claims(bearer_token(&req)?, &state.auth.secret)?;
    if claims.role != CUSTOMER_ROLE {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub async fn any_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims: TokenClaims = decode_claims(bearer_token(&req)?, &state.auth.secret)?;
    if claims.role != CUSTOMER_ROLE && claims.role != OWNER_ROLE {
        return Err(StatusCode::FORBIDDEN);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
