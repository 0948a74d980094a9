use axum::{
    extract::{Path, State},
    http::{
        header::{self, HeaderMap, HeaderValue},
        StatusCode,
    },
    response::{Html, IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use super::consumption::{Consumption, LinkConsumer};
use super::middleware::RequestStart;
use crate::analytics::ip_extractor::ClientContext;
use crate::analytics::recorder::VisitRecorder;
use crate::config::RedirectMode;

pub const EXPIRED_PAGE: &str = "<!DOCTYPE html>\
<html><head><meta charset=\"utf-8\"><title>Link expired</title></head>\
<body><h1>This link is expired</h1>\
<p>This tracking link has already been accessed.</p></body></html>";

pub struct RedirectState {
    pub consumer: LinkConsumer,
    pub recorder: VisitRecorder,
    pub mode: RedirectMode,
}

/// Consume one hit on `code` and redirect to its target
pub async fn redirect_url(
    State(state): State<Arc<RedirectState>>,
    Path(code): Path<String>,
    Extension(RequestStart(request_start)): Extension<RequestStart>,
    headers: HeaderMap,
) -> Response {
    let handler_start = Instant::now();

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    let outcome = match state.consumer.consume(&code, user_agent).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(short_code = %code, error = %err, "failed to consume link");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let link = match outcome {
        Consumption::NotFound => {
            return (StatusCode::NOT_FOUND, "Link Not Found").into_response();
        }
        Consumption::AlreadyExpired(_) => {
            debug!(short_code = %code, "link already expired");
            return (StatusCode::GONE, Html(EXPIRED_PAGE)).into_response();
        }
        Consumption::PassThroughBot(link) => link,
        Consumption::Counted(link) => {
            let context = ClientContext::from_headers(&headers);
            state.recorder.record(&link, &context).await;
            link
        }
    };

    let Some(location) = location_header(&link.target_url) else {
        error!(short_code = %code, target_url = %link.target_url, "target URL is not a valid header value");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
    };

    let mut response_headers = HeaderMap::new();
    response_headers.insert(header::LOCATION, location);
    response_headers.insert(
        "x-wisp-timing-total-ms",
        HeaderValue::from(request_start.elapsed().as_millis() as u64),
    );
    response_headers.insert(
        "x-wisp-timing-handler-ms",
        HeaderValue::from(handler_start.elapsed().as_millis() as u64),
    );

    (state.mode.status_code(), response_headers).into_response()
}

/// Stored targets go out verbatim; non-ASCII targets fall back to their
/// percent-encoded form.
fn location_header(target_url: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(target_url).ok().or_else(|| {
        url::Url::parse(target_url)
            .ok()
            .and_then(|u| HeaderValue::from_str(u.as_str()).ok())
    })
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    #[derive(Serialize)]
    struct HealthResponse {
        status: String,
    }

    Json(HealthResponse {
        status: "OK".to_string(),
    })
}
