use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::analytics::AnalyticsAggregator;
use crate::config::Config;
use crate::storage::Storage;

use super::analytics::get_analytics;
use super::handlers::{create_url, get_url, health_check, list_urls, AppState};

pub fn create_api_router(storage: Arc<dyn Storage>, config: Arc<Config>) -> Router {
    let aggregator =
        AnalyticsAggregator::new(Arc::clone(&storage), config.analytics.recent_visits_limit);
    let state = Arc::new(AppState {
        storage,
        links: config.links.clone(),
        aggregator,
    });

    Router::new()
        .route("/health", get(health_check))
        .route("/links", get(list_urls).post(create_url))
        .route("/links/{code}", get(get_url))
        .route("/analytics/{code}", get(get_analytics))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
