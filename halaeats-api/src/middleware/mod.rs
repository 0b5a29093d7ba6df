pub mod auth;
pub mod resiliency;

pub use auth::{any_auth_middleware, customer_auth_middleware, CustomerClaims, TokenClaims};
