use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::analytics::AnalyticsAggregator;
use crate::config::LinkConfig;
use crate::links::{create_link, CreateLinkError};
use crate::models::{CreateLinkRequest, Link, LinkWithVisits};
use crate::storage::Storage;

pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub links: LinkConfig,
    pub aggregator: AnalyticsAggregator,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

/// Create a new short link
///
/// Bodies that are not JSON, or whose fields have the wrong type, are
/// rejected with the same 400 shape as failed validation.
pub async fn create_url(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Link>), ApiError> {
    let Json(payload) =
        payload.map_err(|rejection| api_error(StatusCode::BAD_REQUEST, rejection.body_text()))?;

    match create_link(
        state.storage.as_ref(),
        &state.links,
        payload.url.as_deref(),
        payload.max_uses,
    )
    .await
    {
        Ok(link) => Ok((StatusCode::CREATED, Json(link))),
        Err(err @ (CreateLinkError::InvalidUrl | CreateLinkError::InvalidMaxUses)) => {
            Err(api_error(StatusCode::BAD_REQUEST, err.to_string()))
        }
        Err(err) => {
            error!(error = %err, "failed to create link");
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))
        }
    }
}

/// Get a short link by code
pub async fn get_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<Link>, ApiError> {
    match state.storage.get(&code).await {
        Ok(Some(link)) => Ok(Json(link)),
        Ok(None) => Err(api_error(StatusCode::NOT_FOUND, "Link not found")),
        Err(e) => {
            error!(short_code = %code, error = %e, "failed to get link");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get link: {}", e),
            ))
        }
    }
}

/// List all links, newest first, with their visit counts
pub async fn list_urls(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LinkWithVisits>>, ApiError> {
    match state.storage.list_with_visits().await {
        Ok(links) => Ok(Json(links)),
        Err(e) => {
            error!(error = %e, "failed to list links");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to list links: {}", e),
            ))
        }
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "OK" }))
}
