use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use offerbook_api::{app, captcha::TurnstileVerifier, state::{AppState, AuthConfig}};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "offerbook_api=debug,offerbook_store=debug,tower_http=debug".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = offerbook_store::app_config::Config::load().context("Failed to load config")?;
    tracing::info!("Starting offerbook API on port {}", config.server.port);

    let backends = offerbook_store::build_ledger(&config.storage, &config.redis)
        .await
        .context("Failed to open the offer ledger")?;

    let verifier = TurnstileVerifier::new(&config.captcha)
        .context("Failed to build verification client")?;

    let app_state = AppState::new(backends, Arc::new(verifier), AuthConfig::from(&config.auth))
        .with_allowed_origins(config.cors.allowed_origins.clone());

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
