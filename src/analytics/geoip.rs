//! Geolocation of client addresses
//!
//! [`GeoService`] owns the degradation policy: loopback addresses resolve
//! to a fixed local placeholder, and provider errors, empty answers and
//! timeouts all resolve to "no geo". Providers implement [`GeoLookup`]:
//! - [`IpApiLookup`] calls an ip-api.com compatible HTTP endpoint
//! - [`MaxMindLookup`] reads memory-mapped GeoLite2/GeoIP2 databases

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use moka::future::Cache;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::analytics::ip_extractor::is_loopback;
use crate::analytics::models::GeoLocation;
use crate::config::{AnalyticsConfig, GeoProvider};

const GEOIP_CACHE_MAX_CAPACITY: u64 = 10_000;

/// A geolocation backend
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Resolve an address; `Ok(None)` when the provider has no answer.
    async fn lookup(&self, address: &str) -> Result<Option<GeoLocation>>;

    /// Provider name (for logs)
    fn name(&self) -> &'static str;
}

/// Fixed location reported for loopback clients
pub fn local_placeholder() -> GeoLocation {
    GeoLocation {
        country: Some("Localhost".to_string()),
        city: Some("Local City".to_string()),
        region: Some("Local Region".to_string()),
        isp: Some("Local ISP".to_string()),
        lat: Some(0.0),
        lon: Some(0.0),
        timezone: Some("UTC".to_string()),
    }
}

/// Best-effort, time-bounded geolocation
#[derive(Clone)]
pub struct GeoService {
    provider: Option<Arc<dyn GeoLookup>>,
    timeout: Duration,
}

impl GeoService {
    pub fn new(provider: Arc<dyn GeoLookup>, timeout: Duration) -> Self {
        Self {
            provider: Some(provider),
            timeout,
        }
    }

    /// No provider; only the loopback placeholder is ever returned
    pub fn disabled() -> Self {
        Self {
            provider: None,
            timeout: Duration::ZERO,
        }
    }

    pub fn from_config(config: &AnalyticsConfig) -> Result<Self> {
        let timeout = Duration::from_millis(config.geoip_timeout_ms);

        let provider: Option<Arc<dyn GeoLookup>> = match config.geo_provider {
            GeoProvider::None => None,
            GeoProvider::IpApi => Some(Arc::new(IpApiLookup::new(
                &config.geoip_api_url,
                timeout,
                Duration::from_secs(config.geoip_cache_ttl_secs),
            )?)),
            GeoProvider::MaxMind => {
                if config.geoip_city_db_path.is_none() && config.geoip_asn_db_path.is_none() {
                    warn!("GEOIP_PROVIDER=maxmind but no database paths are set, geolocation disabled");
                    None
                } else {
                    Some(Arc::new(MaxMindLookup::new(
                        config.geoip_city_db_path.as_deref(),
                        config.geoip_asn_db_path.as_deref(),
                    )?))
                }
            }
        };

        let service = Self { provider, timeout };
        info!("GeoIP: Initialized with {} provider", service.provider_name());
        Ok(service)
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.as_ref().map(|p| p.name()).unwrap_or("disabled")
    }

    /// Resolve an address, never failing and never exceeding the timeout.
    pub async fn resolve(&self, address: &str) -> Option<GeoLocation> {
        if is_loopback(address) {
            return Some(local_placeholder());
        }

        let provider = self.provider.as_ref()?;

        match tokio::time::timeout(self.timeout, provider.lookup(address)).await {
            Ok(Ok(Some(location))) if !location.is_empty() => Some(location),
            Ok(Ok(_)) => {
                debug!(address, provider = provider.name(), "no geolocation for address");
                None
            }
            Ok(Err(err)) => {
                warn!(address, provider = provider.name(), error = %err, "geolocation lookup failed");
                None
            }
            Err(_) => {
                warn!(
                    address,
                    provider = provider.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "geolocation lookup timed out"
                );
                None
            }
        }
    }
}

/// ip-api.com response; other fields are ignored
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    country: Option<String>,
    city: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    isp: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    timezone: Option<String>,
}

impl IpApiResponse {
    fn into_location(self) -> Option<GeoLocation> {
        if self.status.as_deref() == Some("fail") {
            return None;
        }

        let location = GeoLocation {
            country: self.country,
            city: self.city,
            region: self.region_name,
            isp: self.isp,
            lat: self.lat,
            lon: self.lon,
            timezone: self.timezone,
        };

        if location.is_empty() {
            None
        } else {
            Some(location)
        }
    }
}

/// HTTP JSON provider with a per-address result cache.
///
/// Concurrent lookups of the same address share one request; failed
/// requests are not cached.
pub struct IpApiLookup {
    client: reqwest::Client,
    url_template: String,
    cache: Cache<String, Option<GeoLocation>>,
}

impl IpApiLookup {
    /// `url_template` uses `{ip}` as the address placeholder
    pub fn new(url_template: &str, timeout: Duration, cache_ttl: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build GeoIP HTTP client")?;

        let cache = Cache::builder()
            .max_capacity(GEOIP_CACHE_MAX_CAPACITY)
            .time_to_live(cache_ttl)
            .build();

        Ok(Self {
            client,
            url_template: url_template.to_string(),
            cache,
        })
    }

    fn url_for(&self, address: &str) -> String {
        self.url_template.replace("{ip}", address)
    }

    async fn fetch(&self, address: &str) -> Result<Option<GeoLocation>> {
        let url = self.url_for(address);
        trace!("GeoIP cache miss for {}, fetching {}", address, url);

        let response: IpApiResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.into_location())
    }
}

#[async_trait]
impl GeoLookup for IpApiLookup {
    async fn lookup(&self, address: &str) -> Result<Option<GeoLocation>> {
        self.cache
            .try_get_with(address.to_string(), self.fetch(address))
            .await
            .map_err(|e| anyhow!("{e}"))
    }

    fn name(&self) -> &'static str {
        "ip-api"
    }
}

/// Local MaxMind provider supporting City and ASN databases
pub struct MaxMindLookup {
    city_reader: Option<Arc<Reader<Mmap>>>,
    asn_reader: Option<Arc<Reader<Mmap>>>,
}

impl MaxMindLookup {
    /// Open memory-mapped GeoLite2-City and/or GeoLite2-ASN `.mmdb` files
    pub fn new(city_path: Option<&str>, asn_path: Option<&str>) -> Result<Self> {
        let city_reader = if let Some(path) = city_path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP City database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        let asn_reader = if let Some(path) = asn_path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP ASN database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        Ok(Self {
            city_reader,
            asn_reader,
        })
    }

    fn lookup_ip(&self, ip: IpAddr) -> GeoLocation {
        let mut geo_location = GeoLocation::default();

        if let Some(ref reader) = self.city_reader {
            if let Ok(result) = reader.lookup(ip) {
                if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                    geo_location.country = city.country.names.english.map(|s| s.to_string());
                    if let Some(subdivision) = city.subdivisions.first() {
                        geo_location.region = subdivision.names.english.map(|s| s.to_string());
                    }
                    geo_location.city = city.city.names.english.map(|s| s.to_string());
                } else if let Ok(Some(country)) = result.decode::<geoip2::Country>() {
                    geo_location.country = country.country.names.english.map(|s| s.to_string());
                }
            }
        }

        if let Some(ref reader) = self.asn_reader {
            if let Ok(result) = reader.lookup(ip) {
                if let Ok(Some(asn)) = result.decode::<geoip2::Asn>() {
                    geo_location.isp = asn.autonomous_system_organization.map(|s| s.to_string());
                }
            }
        }

        geo_location
    }
}

#[async_trait]
impl GeoLookup for MaxMindLookup {
    async fn lookup(&self, address: &str) -> Result<Option<GeoLocation>> {
        let Ok(ip) = address.parse::<IpAddr>() else {
            return Ok(None);
        };

        let location = self.lookup_ip(ip);
        Ok(if location.is_empty() { None } else { Some(location) })
    }

    fn name(&self) -> &'static str {
        "maxmind"
    }
}
