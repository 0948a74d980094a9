use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::analytics::models::{ClientSignature, GeoLocation};

/// A visit about to be appended to the visit store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVisit {
    pub link_id: i64,
    pub client_address: String,
    pub geo: Option<GeoLocation>,
    pub signature: ClientSignature,
    /// Unparsed user agent, preserved verbatim
    pub raw_signature: String,
    pub referrer: Option<String>,
    pub created_at: i64,
}

/// One recorded human hit on a link
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visit {
    pub id: i64,
    pub link_id: i64,
    pub client_address: String,
    pub geo: Option<GeoLocation>,
    pub signature: ClientSignature,
    pub raw_signature: String,
    pub referrer: Option<String>,
    pub created_at: i64,
}

/// Flat row shape shared by the SQL backends
#[derive(Debug, FromRow)]
pub struct VisitRow {
    pub id: i64,
    pub link_id: i64,
    pub client_address: String,
    pub geo_country: Option<String>,
    pub geo_city: Option<String>,
    pub geo_region: Option<String>,
    pub geo_isp: Option<String>,
    pub geo_lat: Option<f64>,
    pub geo_lon: Option<f64>,
    pub geo_timezone: Option<String>,
    #[sqlx(flatten)]
    pub signature: ClientSignature,
    pub raw_signature: String,
    pub referrer: Option<String>,
    pub created_at: i64,
}

impl From<VisitRow> for Visit {
    fn from(row: VisitRow) -> Self {
        let geo = GeoLocation {
            country: row.geo_country,
            city: row.geo_city,
            region: row.geo_region,
            isp: row.geo_isp,
            lat: row.geo_lat,
            lon: row.geo_lon,
            timezone: row.geo_timezone,
        };

        Visit {
            id: row.id,
            link_id: row.link_id,
            client_address: row.client_address,
            geo: if geo.is_empty() { None } else { Some(geo) },
            signature: row.signature,
            raw_signature: row.raw_signature,
            referrer: row.referrer,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> VisitRow {
        VisitRow {
            id: 7,
            link_id: 1,
            client_address: "203.0.113.9".to_string(),
            geo_country: None,
            geo_city: None,
            geo_region: None,
            geo_isp: None,
            geo_lat: None,
            geo_lon: None,
            geo_timezone: None,
            signature: ClientSignature::default(),
            raw_signature: String::new(),
            referrer: None,
            created_at: 1_700_000_000,
        }
    }

    #[test]
    fn test_row_without_geo_columns_has_no_geo() {
        let visit = Visit::from(row());
        assert!(visit.geo.is_none());
        assert_eq!(visit.id, 7);
    }

    #[test]
    fn test_row_with_any_geo_column_keeps_geo() {
        let mut with_geo = row();
        with_geo.geo_country = Some("Germany".to_string());
        let visit = Visit::from(with_geo);
        assert_eq!(
            visit.geo.and_then(|g| g.country).as_deref(),
            Some("Germany")
        );
    }
}
