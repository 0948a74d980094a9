//! Data models for visit enrichment and analytics summaries

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Approximate location resolved from a client address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Country name (e.g., "Germany")
    pub country: Option<String>,

    pub city: Option<String>,

    /// Region/state/province
    pub region: Option<String>,

    /// Network operator or AS organization
    pub isp: Option<String>,

    pub lat: Option<f64>,
    pub lon: Option<f64>,

    /// IANA time zone name
    pub timezone: Option<String>,
}

impl GeoLocation {
    pub fn is_empty(&self) -> bool {
        self.country.is_none()
            && self.city.is_none()
            && self.region.is_none()
            && self.isp.is_none()
            && self.lat.is_none()
            && self.lon.is_none()
            && self.timezone.is_none()
    }
}

/// Structured facets parsed from a user agent string.
///
/// Every field is optional; "Unknown"/"Desktop" defaults are applied when
/// aggregating, never when storing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ClientSignature {
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub device_type: Option<String>,
    pub device_vendor: Option<String>,
    pub device_model: Option<String>,
    pub engine_name: Option<String>,
    pub engine_version: Option<String>,
}

/// Visits for one UTC calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: u64,
}

/// One row of a frequency table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub name: String,
    pub count: u64,
}

/// A recent visit, exposed verbatim for forensic display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentVisit {
    pub client_address: String,
    pub created_at: i64,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub referrer: Option<String>,
    pub raw_signature: String,
    pub signature: ClientSignature,
}

/// Aggregated analytics for a single link, computed on read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub code: String,
    pub target_url: String,
    pub created_at: i64,
    pub usage_count: i64,
    pub max_uses: i64,
    pub expired: bool,
    pub total_clicks: u64,
    pub unique_visitors: u64,
    pub time_series: Vec<DailyCount>,
    pub by_country: Vec<FacetCount>,
    pub by_device: Vec<FacetCount>,
    pub by_browser: Vec<FacetCount>,
    pub by_os: Vec<FacetCount>,
    pub by_referrer_host: Vec<FacetCount>,
    pub recent_visits: Vec<RecentVisit>,
}
