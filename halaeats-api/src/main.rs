use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use halaeats_api::{
    app,
    state::{AppState, AuthConfig, Backends},
};
use halaeats_store::app_config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "halaeats_api=debug,halaeats_order=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting HalaEats API on port {}", config.server.port);

    let (backends, checkout_rules, delivery_rules) = Backends::connect(&config).await?;
    let app_state = AppState::build(
        backends,
        &checkout_rules,
        &delivery_rules,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
            owner_access_key: config.auth.owner_access_key.clone(),
        },
    );

    // Abandoned checkouts are dropped once idle past the session TTL and
    // their booked slots released.
    let checkout = app_state.checkout.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            checkout.purge_idle_sessions(chrono::Utc::now()).await;
        }
    });

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
