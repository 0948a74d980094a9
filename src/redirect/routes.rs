use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::analytics::recorder::VisitRecorder;
use crate::config::RedirectMode;

use super::consumption::LinkConsumer;
use super::handlers::{health_check, redirect_url, RedirectState};
use super::middleware::record_request_start;

pub fn create_redirect_router(
    consumer: LinkConsumer,
    recorder: VisitRecorder,
    mode: RedirectMode,
) -> Router {
    let state = Arc::new(RedirectState {
        consumer,
        recorder,
        mode,
    });

    Router::new()
        .route("/", get(health_check))
        .route("/redirect/{code}", get(redirect_url))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(record_request_start)),
        )
        .with_state(state)
}
