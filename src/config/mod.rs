use anyhow::Context;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::analytics::bot::DEFAULT_BOT_PATTERNS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub redirect_server: ServerConfig,
    pub links: LinkConfig,
    pub analytics: AnalyticsConfig,
    pub redirect_status: RedirectMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Quota applied when a creation request does not carry `max_uses`
    pub default_max_uses: i64,
    pub short_code_length: usize,
    /// Collision retries when drawing a fresh short code
    pub short_code_max_attempts: usize,
    /// Retries of the consumption decision when the store reports contention
    pub consume_max_attempts: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            default_max_uses: 3,
            short_code_length: 6,
            short_code_max_attempts: 10,
            consume_max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GeoProvider {
    None,
    IpApi,
    MaxMind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub geo_provider: GeoProvider,
    /// URL template for the HTTP provider, `{ip}` is replaced by the client address
    pub geoip_api_url: String,
    pub geoip_city_db_path: Option<String>,
    pub geoip_asn_db_path: Option<String>,
    pub geoip_timeout_ms: u64,
    pub geoip_cache_ttl_secs: u64,
    pub recent_visits_limit: usize,
    pub bot_patterns: Vec<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            geo_provider: GeoProvider::IpApi,
            geoip_api_url: "http://ip-api.com/json/{ip}".to_string(),
            geoip_city_db_path: None,
            geoip_asn_db_path: None,
            geoip_timeout_ms: 1500,
            geoip_cache_ttl_secs: 900,
            recent_visits_limit: 10,
            bot_patterns: DEFAULT_BOT_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Status code used for successful redirects
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum RedirectMode {
    #[default]
    Found,
    Temporary,
}

impl RedirectMode {
    pub fn status_code(self) -> StatusCode {
        match self {
            RedirectMode::Found => StatusCode::FOUND,
            RedirectMode::Temporary => StatusCode::TEMPORARY_REDIRECT,
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend = match env_or("DATABASE_BACKEND", "sqlite").to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url = env_or("DATABASE_URL", "sqlite://./wisp.db?mode=rwc");
        let max_connections = parse_env("DATABASE_MAX_CONNECTIONS", 10u32)?;

        let api_host = env_or("API_HOST", "127.0.0.1");
        let api_port = parse_env("API_PORT", 8080u16)?;

        let redirect_host = env_or("REDIRECT_HOST", "127.0.0.1");
        let redirect_port = parse_env("REDIRECT_PORT", 3000u16)?;

        let redirect_status = match env_or("REDIRECT_STATUS", "302").trim() {
            "302" => RedirectMode::Found,
            "307" => RedirectMode::Temporary,
            other => {
                tracing::warn!(
                    "Unsupported REDIRECT_STATUS '{other}', falling back to 302. Supported values: 302, 307"
                );
                RedirectMode::Found
            }
        };

        let link_defaults = LinkConfig::default();
        let links = LinkConfig {
            default_max_uses: parse_env("DEFAULT_MAX_USES", link_defaults.default_max_uses)?,
            short_code_length: parse_env("SHORT_CODE_LENGTH", link_defaults.short_code_length)?,
            short_code_max_attempts: parse_env(
                "SHORT_CODE_MAX_ATTEMPTS",
                link_defaults.short_code_max_attempts,
            )?,
            consume_max_attempts: parse_env(
                "CONSUME_MAX_ATTEMPTS",
                link_defaults.consume_max_attempts,
            )?,
        };

        if links.default_max_uses < 1 {
            anyhow::bail!("DEFAULT_MAX_USES must be at least 1");
        }
        if links.short_code_length == 0 {
            anyhow::bail!("SHORT_CODE_LENGTH must be at least 1");
        }

        let analytics_defaults = AnalyticsConfig::default();

        let geo_provider = match env_or("GEOIP_PROVIDER", "ip-api").to_lowercase().as_str() {
            "none" | "off" | "disabled" => GeoProvider::None,
            "ip-api" | "ipapi" | "http" => GeoProvider::IpApi,
            "maxmind" | "mmdb" => GeoProvider::MaxMind,
            other => {
                tracing::warn!(
                    "Unknown GEOIP_PROVIDER '{other}', falling back to 'ip-api'. Supported values: none, ip-api, maxmind"
                );
                GeoProvider::IpApi
            }
        };

        let bot_patterns = match std::env::var("BOT_PATTERNS") {
            Ok(raw) => raw
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            Err(_) => analytics_defaults.bot_patterns,
        };

        let analytics = AnalyticsConfig {
            geo_provider,
            geoip_api_url: env_or("GEOIP_API_URL", &analytics_defaults.geoip_api_url),
            geoip_city_db_path: std::env::var("GEOIP_CITY_DB_PATH").ok(),
            geoip_asn_db_path: std::env::var("GEOIP_ASN_DB_PATH").ok(),
            geoip_timeout_ms: parse_env("GEOIP_TIMEOUT_MS", analytics_defaults.geoip_timeout_ms)?,
            geoip_cache_ttl_secs: parse_env(
                "GEOIP_CACHE_TTL_SECS",
                analytics_defaults.geoip_cache_ttl_secs,
            )?,
            recent_visits_limit: parse_env(
                "ANALYTICS_RECENT_VISITS",
                analytics_defaults.recent_visits_limit,
            )?,
            bot_patterns,
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            redirect_server: ServerConfig {
                host: redirect_host,
                port: redirect_port,
            },
            links,
            analytics,
            redirect_status,
        })
    }
}
