//! Visit enrichment, recording and on-read aggregation
//!
//! Recording is best-effort and never changes a redirect outcome. Geo
//! resolution and user agent parsing sit behind traits so providers can be
//! swapped or stubbed.

pub mod aggregator;
pub mod bot;
pub mod geoip;
pub mod ip_extractor;
pub mod models;
pub mod recorder;
pub mod user_agent;

pub use aggregator::{AnalyticsAggregator, AnalyticsError};
pub use bot::BotClassifier;
pub use geoip::{GeoLookup, GeoService};
pub use ip_extractor::ClientContext;
pub use models::{AnalyticsSummary, ClientSignature, GeoLocation};
pub use recorder::VisitRecorder;
pub use user_agent::{SignatureParser, WootheeParser};
