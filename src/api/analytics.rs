//! Analytics API handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::error;

use super::handlers::{api_error, ApiError, AppState};
use crate::analytics::{AnalyticsError, AnalyticsSummary};

/// Aggregated analytics for a single short code
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<AnalyticsSummary>, ApiError> {
    match state.aggregator.summarize(&code).await {
        Ok(summary) => Ok(Json(summary)),
        Err(AnalyticsError::NotFound) => Err(api_error(StatusCode::NOT_FOUND, "Link not found")),
        Err(e) => {
            error!(short_code = %code, error = %e, "failed to summarize analytics");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve analytics",
            ))
        }
    }
}
