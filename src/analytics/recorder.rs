//! Best-effort visit recording
//!
//! Enrichment failures degrade to absent facets and storage failures are
//! logged and swallowed, so recording can never change a redirect outcome.

use std::sync::Arc;
use tracing::{debug, error};

use crate::analytics::geoip::GeoService;
use crate::analytics::ip_extractor::ClientContext;
use crate::analytics::user_agent::SignatureParser;
use crate::models::{Link, NewVisit};
use crate::storage::Storage;

pub struct VisitRecorder {
    storage: Arc<dyn Storage>,
    geo: GeoService,
    parser: Arc<dyn SignatureParser>,
}

impl VisitRecorder {
    pub fn new(
        storage: Arc<dyn Storage>,
        geo: GeoService,
        parser: Arc<dyn SignatureParser>,
    ) -> Self {
        Self {
            storage,
            geo,
            parser,
        }
    }

    /// Enrich the client context and build the visit row, without persisting it.
    pub async fn enrich(&self, link: &Link, context: &ClientContext) -> NewVisit {
        let geo = self.geo.resolve(&context.client_address).await;

        let signature = self.parser.parse(&context.user_agent).unwrap_or_else(|| {
            debug!(short_code = %link.code, "user agent could not be parsed, recording empty facets");
            Default::default()
        });

        NewVisit {
            link_id: link.id,
            client_address: context.client_address.clone(),
            geo,
            signature,
            raw_signature: context.user_agent.clone(),
            referrer: context.referrer.clone(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Append one visit for `link`. Never fails.
    pub async fn record(&self, link: &Link, context: &ClientContext) {
        let visit = self.enrich(link, context).await;

        match self.storage.append_visit(&visit).await {
            Ok(()) => debug!(
                short_code = %link.code,
                client_address = %visit.client_address,
                "visit recorded"
            ),
            Err(err) => error!(
                short_code = %link.code,
                error = %err,
                "failed to record visit"
            ),
        }
    }
}
