use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wisp::analytics::{BotClassifier, GeoService, VisitRecorder, WootheeParser};
use wisp::api::create_api_router;
use wisp::config::Config;
use wisp::redirect::{create_redirect_router, LinkConsumer};
use wisp::storage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(Config::from_env()?);
    info!("Loaded configuration");

    let storage = storage::connect(&config.database).await?;

    info!("Initializing database...");
    storage.init().await.context("failed to initialize database")?;
    info!("Database initialized successfully");

    let classifier = BotClassifier::new(&config.analytics.bot_patterns);
    info!("Bot classifier loaded with {} patterns", classifier.patterns().len());

    let geo = GeoService::from_config(&config.analytics)?;
    let recorder = VisitRecorder::new(Arc::clone(&storage), geo, Arc::new(WootheeParser::new()));
    let consumer = LinkConsumer::new(
        Arc::clone(&storage),
        classifier,
        config.links.consume_max_attempts,
    );

    let api_router = create_api_router(Arc::clone(&storage), Arc::clone(&config));
    let redirect_router = create_redirect_router(consumer, recorder, config.redirect_status);

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API server to {api_addr}"))?;
    info!("API server listening on http://{}", api_addr);

    let redirect_addr = format!(
        "{}:{}",
        config.redirect_server.host, config.redirect_server.port
    );
    let redirect_listener = tokio::net::TcpListener::bind(&redirect_addr)
        .await
        .with_context(|| format!("failed to bind redirect server to {redirect_addr}"))?;
    info!(
        "Redirect server listening on http://{} (status {})",
        redirect_addr,
        config.redirect_status.status_code().as_u16()
    );

    tokio::try_join!(
        axum::serve(api_listener, api_router).into_future(),
        axum::serve(redirect_listener, redirect_router).into_future(),
    )?;

    Ok(())
}
