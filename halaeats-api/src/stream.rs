use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension,
};
use futures_util::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::TokenClaims;
use crate::state::AppState;

/// Live feed of orders placed at one restaurant, for the owner dashboard.
pub async fn order_stream(
    State(state): State<AppState>,
    Extension(claims): Extension<TokenClaims>,
    Path(restaurant_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    claims.require_owner_of(restaurant_id)?;
    tracing::info!("Owner stream opened for restaurant {}", restaurant_id);

    let rx = state.sse_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |msg| async move {
        match msg {
            Ok(event) if event.restaurant_id == restaurant_id => {
                match Event::default().event("order_placed").json_data(&event) {
                    Ok(sse) => Some(Ok(sse)),
                    Err(e) => {
                        tracing::warn!("Failed to encode order event {}: {}", event.order_id, e);
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Order stream for {} lagged: {}", restaurant_id, e);
                None
            }
        }
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
