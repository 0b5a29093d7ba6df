use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// One trial request is let through after the reset timeout.
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    opened_at: Option<Instant>,
}

/// Fails fast on a route whose downstream (the payment gateway) keeps
/// answering with server errors.
pub struct CircuitBreaker {
    pub name: String,
    circuit: RwLock<Circuit>,
    failure_count: AtomicUsize,
    failure_threshold: usize,
    reset_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(name: &str, threshold: usize, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            circuit: RwLock::new(Circuit {
                state: CircuitState::Closed,
                opened_at: None,
            }),
            failure_count: AtomicUsize::new(0),
            failure_threshold: threshold.max(1),
            reset_timeout: timeout,
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.circuit.read().await.state
    }

    /// Whether a request may pass. An open circuit past its timeout moves
    /// to half-open and admits the caller as the trial.
    pub async fn check(&self) -> bool {
        let mut circuit = self.circuit.write().await;
        match circuit.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let expired = circuit
                    .opened_at
                    .map(|at| at.elapsed() >= self.reset_timeout)
                    .unwrap_or(true);
                if expired {
                    circuit.state = CircuitState::HalfOpen;
                    tracing::info!("Circuit [{}] half-open, letting a trial request through", self.name);
                }
                expired
            }
        }
    }

    pub async fn record_success(&self) {
        let mut circuit = self.circuit.write().await;
        self.failure_count.store(0, Ordering::SeqCst);
        if circuit.state == CircuitState::HalfOpen {
            circuit.state = CircuitState::Closed;
            circuit.opened_at = None;
            tracing::info!("Circuit [{}] closed again", self.name);
        }
    }

    pub async fn record_failure(&self) {
        let count = self.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut circuit = self.circuit.write().await;
        if count >= self.failure_threshold || circuit.state == CircuitState::HalfOpen {
            circuit.state = CircuitState::Open;
            circuit.opened_at = Some(Instant::now());
            tracing::error!("Circuit [{}] opened after {} failures", self.name, count);
        }
    }
}

pub async fn circuit_breaker_middleware(
    State(state): State<AppState>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !req.uri().path().ends_with("/place-order") {
        return next.run(req).await;
    }

    let cb = &state.resiliency.payment_cb;
    if !cb.check().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Payments are temporarily unavailable, try again shortly" })),
        )
            .into_response();
    }

    let response = next.run(req).await;
    if response.status().is_server_error() {
        cb.record_failure().await;
    } else {
        cb.record_success().await;
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_opens_after_threshold() {
        let cb = CircuitBreaker::new("payment", 2, Duration::from_secs(60));
        assert!(cb.check().await);

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);
        assert!(!cb.check().await);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new("payment", 2, Duration::from_secs(60));
        cb.record_failure().await;
        cb.record_success().await;
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial() {
        let cb = CircuitBreaker::new("payment", 1, Duration::ZERO);
        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        // Zero timeout: the next check is the trial.
        assert!(cb.check().await);
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        cb.record_failure().await;
        assert_eq!(cb.state().await, CircuitState::Open);

        assert!(cb.check().await);
        cb.record_success().await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }
}
