//! Client context extraction from HTTP headers
//!
//! The client address is the first entry of the `X-Forwarded-For` chain,
//! kept as the raw string observed. Requests without a usable chain are
//! attributed to the loopback sentinel.

use axum::http::{header, HeaderMap};
use std::net::IpAddr;

/// Address recorded when no forwarded chain is present
pub const LOOPBACK_SENTINEL: &str = "127.0.0.1";

/// Everything the visit recorder needs from an incoming request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub client_address: String,
    /// Raw `User-Agent`, empty when absent
    pub user_agent: String,
    pub referrer: Option<String>,
}

impl ClientContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            client_address: extract_client_address(headers),
            user_agent: header_str(headers, header::USER_AGENT.as_str())
                .unwrap_or_default()
                .to_string(),
            referrer: header_str(headers, header::REFERER.as_str())
                .filter(|r| !r.trim().is_empty())
                .map(str::to_string),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// First hop of `X-Forwarded-For`, or [`LOOPBACK_SENTINEL`]
pub fn extract_client_address(headers: &HeaderMap) -> String {
    header_str(headers, "x-forwarded-for")
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .unwrap_or(LOOPBACK_SENTINEL)
        .to_string()
}

/// Whether an observed address refers to the local machine
pub fn is_loopback(address: &str) -> bool {
    let address = address.trim();
    if address.eq_ignore_ascii_case("localhost") {
        return true;
    }

    address
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}
