//! On-read analytics aggregation
//!
//! Every summary is computed from the full visit history of a link. Nothing
//! is pre-materialized, so a summary always reflects the visit store as of
//! the read.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::analytics::models::{AnalyticsSummary, DailyCount, FacetCount, RecentVisit};
use crate::models::{Link, Visit};
use crate::storage::Storage;

const UNKNOWN: &str = "Unknown";
const DESKTOP: &str = "Desktop";
const DIRECT: &str = "Direct";

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("link not found")]
    NotFound,
    #[error("failed to read analytics: {0}")]
    Storage(#[from] anyhow::Error),
}

pub struct AnalyticsAggregator {
    storage: Arc<dyn Storage>,
    recent_limit: usize,
}

impl AnalyticsAggregator {
    pub fn new(storage: Arc<dyn Storage>, recent_limit: usize) -> Self {
        Self {
            storage,
            recent_limit,
        }
    }

    /// Summarize all recorded visits of the link behind `code`.
    ///
    /// Read failures are returned as errors, never as an empty summary.
    pub async fn summarize(&self, code: &str) -> Result<AnalyticsSummary, AnalyticsError> {
        let link = self
            .storage
            .get(code)
            .await
            .map_err(anyhow::Error::from)?
            .ok_or(AnalyticsError::NotFound)?;

        let visits = self.storage.visits_for_link(link.id).await?;

        Ok(summarize_visits(&link, &visits, self.recent_limit))
    }
}

/// Frequency table that remembers first-seen order for tie breaking
#[derive(Default)]
struct Tally {
    order: Vec<String>,
    counts: HashMap<String, u64>,
}

impl Tally {
    fn add(&mut self, key: &str) {
        match self.counts.get_mut(key) {
            Some(count) => *count += 1,
            None => {
                self.order.push(key.to_string());
                self.counts.insert(key.to_string(), 1);
            }
        }
    }

    fn into_sorted(mut self) -> Vec<FacetCount> {
        let mut rows: Vec<FacetCount> = self
            .order
            .into_iter()
            .map(|name| {
                let count = self.counts.remove(&name).unwrap_or_default();
                FacetCount { name, count }
            })
            .collect();
        // sort_by is stable, equal counts keep first-seen order
        rows.sort_by(|a, b| b.count.cmp(&a.count));
        rows
    }
}

/// Pure aggregation over an already loaded visit history
pub fn summarize_visits(link: &Link, visits: &[Visit], recent_limit: usize) -> AnalyticsSummary {
    let mut chronological: Vec<&Visit> = visits.iter().collect();
    chronological.sort_by_key(|v| (v.created_at, v.id));

    let mut unique = HashSet::new();
    let mut days: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_country = Tally::default();
    let mut by_device = Tally::default();
    let mut by_browser = Tally::default();
    let mut by_os = Tally::default();
    let mut by_referrer_host = Tally::default();

    for visit in &chronological {
        unique.insert(visit.client_address.as_str());
        *days.entry(utc_date(visit.created_at)).or_default() += 1;

        let country = visit.geo.as_ref().and_then(|g| g.country.as_deref());
        by_country.add(non_empty(country).unwrap_or(UNKNOWN));
        by_device.add(non_empty(visit.signature.device_type.as_deref()).unwrap_or(DESKTOP));
        by_browser.add(non_empty(visit.signature.browser_name.as_deref()).unwrap_or(UNKNOWN));
        by_os.add(non_empty(visit.signature.os_name.as_deref()).unwrap_or(UNKNOWN));
        by_referrer_host.add(&referrer_host(visit.referrer.as_deref()));
    }

    let recent_visits = chronological
        .iter()
        .rev()
        .take(recent_limit)
        .map(|v| recent_visit(v))
        .collect();

    AnalyticsSummary {
        code: link.code.clone(),
        target_url: link.target_url.clone(),
        created_at: link.created_at,
        usage_count: link.usage_count,
        max_uses: link.max_uses,
        expired: link.is_expired(),
        total_clicks: visits.len() as u64,
        unique_visitors: unique.len() as u64,
        time_series: days
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect(),
        by_country: by_country.into_sorted(),
        by_device: by_device.into_sorted(),
        by_browser: by_browser.into_sorted(),
        by_os: by_os.into_sorted(),
        by_referrer_host: by_referrer_host.into_sorted(),
        recent_visits,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn utc_date(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn referrer_host(referrer: Option<&str>) -> String {
    let Some(referrer) = non_empty(referrer) else {
        return DIRECT.to_string();
    };

    url::Url::parse(referrer)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn name_with_version(name: Option<&str>, version: Option<&str>) -> String {
    match (non_empty(name), non_empty(version)) {
        (Some(name), Some(version)) => format!("{name} {version}"),
        (Some(name), None) => name.to_string(),
        (None, _) => UNKNOWN.to_string(),
    }
}

fn recent_visit(visit: &Visit) -> RecentVisit {
    let geo = visit.geo.clone().unwrap_or_default();
    let signature = &visit.signature;

    RecentVisit {
        client_address: visit.client_address.clone(),
        created_at: visit.created_at,
        country: geo.country,
        city: geo.city,
        region: geo.region,
        lat: geo.lat,
        lon: geo.lon,
        device: non_empty(signature.device_type.as_deref())
            .unwrap_or(DESKTOP)
            .to_string(),
        browser: name_with_version(
            signature.browser_name.as_deref(),
            signature.browser_version.as_deref(),
        ),
        os: name_with_version(signature.os_name.as_deref(), signature.os_version.as_deref()),
        referrer: visit.referrer.clone(),
        raw_signature: visit.raw_signature.clone(),
        signature: signature.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::models::{ClientSignature, GeoLocation};
    use crate::models::{LinkWithVisits, NewVisit};
    use crate::storage::{SqliteStorage, StorageError, StorageResult};
    use async_trait::async_trait;

    const DAY: i64 = 86_400;
    // 2024-01-01T00:00:00Z
    const JAN_1: i64 = 1_704_067_200;

    fn link() -> Link {
        Link {
            id: 1,
            code: "abc123".to_string(),
            target_url: "https://example.com".to_string(),
            created_at: JAN_1,
            usage_count: 0,
            max_uses: 10,
            expired: false,
        }
    }

    fn visit(id: i64, address: &str, created_at: i64) -> Visit {
        Visit {
            id,
            link_id: 1,
            client_address: address.to_string(),
            geo: None,
            signature: ClientSignature::default(),
            raw_signature: String::new(),
            referrer: None,
            created_at,
        }
    }

    fn with_country(mut v: Visit, country: &str) -> Visit {
        v.geo = Some(GeoLocation {
            country: Some(country.to_string()),
            ..Default::default()
        });
        v
    }

    #[test]
    fn test_empty_history_gives_empty_tables() {
        let summary = summarize_visits(&link(), &[], 10);
        assert_eq!(summary.total_clicks, 0);
        assert_eq!(summary.unique_visitors, 0);
        assert!(summary.time_series.is_empty());
        assert!(summary.by_country.is_empty());
        assert!(summary.by_device.is_empty());
        assert!(summary.by_browser.is_empty());
        assert!(summary.by_os.is_empty());
        assert!(summary.by_referrer_host.is_empty());
        assert!(summary.recent_visits.is_empty());
    }

    #[test]
    fn test_unique_visitors_by_address() {
        let visits = vec![
            visit(1, "1.1.1.1", JAN_1),
            visit(2, "1.1.1.1", JAN_1 + 10),
            visit(3, "2.2.2.2", JAN_1 + 20),
        ];
        let summary = summarize_visits(&link(), &visits, 10);
        assert_eq!(summary.total_clicks, 3);
        assert_eq!(summary.unique_visitors, 2);
    }

    #[test]
    fn test_time_series_is_daily_and_ascending() {
        // Newest first, as the store returns them
        let visits = vec![
            visit(4, "a", JAN_1 + 2 * DAY + 5),
            visit(3, "a", JAN_1 + DAY + 3600),
            visit(2, "a", JAN_1 + 7200),
            visit(1, "a", JAN_1 + 60),
        ];
        let summary = summarize_visits(&link(), &visits, 10);
        assert_eq!(
            summary.time_series,
            vec![
                DailyCount { date: "2024-01-01".to_string(), count: 2 },
                DailyCount { date: "2024-01-02".to_string(), count: 1 },
                DailyCount { date: "2024-01-03".to_string(), count: 1 },
            ]
        );
    }

    #[test]
    fn test_facets_sorted_by_count_with_first_seen_ties() {
        let visits = vec![
            with_country(visit(1, "a", JAN_1), "France"),
            with_country(visit(2, "b", JAN_1 + 1), "Germany"),
            with_country(visit(3, "c", JAN_1 + 2), "Germany"),
            visit(4, "d", JAN_1 + 3),
            with_country(visit(5, "e", JAN_1 + 4), "Spain"),
        ];
        let summary = summarize_visits(&link(), &visits, 10);
        let names: Vec<_> = summary.by_country.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Germany", "France", "Unknown", "Spain"]);
        assert_eq!(summary.by_country[0].count, 2);
    }

    #[test]
    fn test_missing_facets_use_read_time_defaults() {
        let summary = summarize_visits(&link(), &[visit(1, "a", JAN_1)], 10);
        assert_eq!(summary.by_device[0].name, "Desktop");
        assert_eq!(summary.by_browser[0].name, "Unknown");
        assert_eq!(summary.by_os[0].name, "Unknown");
        assert_eq!(summary.by_country[0].name, "Unknown");
        assert_eq!(summary.recent_visits[0].browser, "Unknown");
    }

    #[test]
    fn test_referrer_buckets() {
        assert_eq!(referrer_host(None), "Direct");
        assert_eq!(referrer_host(Some("")), "Direct");
        assert_eq!(
            referrer_host(Some("https://news.ycombinator.com/item?id=1")),
            "news.ycombinator.com"
        );
        assert_eq!(referrer_host(Some("garbage")), "Unknown");
    }

    #[test]
    fn test_recent_visits_newest_first_and_truncated() {
        let mut visits: Vec<Visit> = (1..=5).map(|i| visit(i, "a", JAN_1 + i)).collect();
        visits[4].raw_signature = "Mozilla/5.0 raw".to_string();
        visits[4].signature.browser_name = Some("Chrome".to_string());
        visits[4].signature.browser_version = Some("120.0".to_string());

        let summary = summarize_visits(&link(), &visits, 2);
        assert_eq!(summary.recent_visits.len(), 2);
        assert_eq!(summary.recent_visits[0].created_at, JAN_1 + 5);
        assert_eq!(summary.recent_visits[0].raw_signature, "Mozilla/5.0 raw");
        assert_eq!(summary.recent_visits[0].browser, "Chrome 120.0");
        assert_eq!(summary.recent_visits[1].created_at, JAN_1 + 4);
        assert_eq!(summary.total_clicks, 5);
    }

    #[tokio::test]
    async fn test_summarize_unknown_code_is_not_found() {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        let aggregator = AnalyticsAggregator::new(Arc::new(storage), 10);

        let err = aggregator.summarize("missing").await.unwrap_err();
        assert!(matches!(err, AnalyticsError::NotFound));
    }

    #[tokio::test]
    async fn test_summarize_reads_store() {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        let created = storage
            .create_with_code("stats", "https://example.com", 3)
            .await
            .unwrap();
        storage
            .append_visit(&NewVisit {
                link_id: created.id,
                client_address: "198.51.100.4".to_string(),
                geo: None,
                signature: ClientSignature {
                    device_type: Some("mobile".to_string()),
                    ..Default::default()
                },
                raw_signature: "raw".to_string(),
                referrer: Some("https://t.co/xyz".to_string()),
                created_at: JAN_1,
            })
            .await
            .unwrap();

        let aggregator = AnalyticsAggregator::new(Arc::new(storage), 10);
        let summary = aggregator.summarize("stats").await.unwrap();
        assert_eq!(summary.total_clicks, 1);
        assert_eq!(summary.by_device[0].name, "mobile");
        assert_eq!(summary.by_referrer_host[0].name, "t.co");
    }

    /// Finds the link but fails every visit read
    struct BrokenVisitStore;

    #[async_trait]
    impl Storage for BrokenVisitStore {
        async fn init(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn create_with_code(&self, _: &str, _: &str, _: i64) -> StorageResult<Link> {
            Err(StorageError::Conflict)
        }

        async fn get(&self, _: &str) -> StorageResult<Option<Link>> {
            Ok(Some(link()))
        }

        async fn consume_use(&self, _: i64) -> StorageResult<Option<Link>> {
            Ok(None)
        }

        async fn list_with_visits(&self) -> anyhow::Result<Vec<LinkWithVisits>> {
            Ok(vec![])
        }

        async fn append_visit(&self, _: &NewVisit) -> anyhow::Result<()> {
            Ok(())
        }

        async fn visits_for_link(&self, _: i64) -> anyhow::Result<Vec<Visit>> {
            anyhow::bail!("disk I/O error")
        }
    }

    #[tokio::test]
    async fn test_read_failure_is_an_error_not_zero() {
        let aggregator = AnalyticsAggregator::new(Arc::new(BrokenVisitStore), 10);
        let err = aggregator.summarize("abc123").await.unwrap_err();
        assert!(matches!(err, AnalyticsError::Storage(_)));
    }
}
