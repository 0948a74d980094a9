use crate::models::visit::VisitRow;
use crate::models::{Link, LinkWithVisits, NewVisit, Visit};
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                target_url TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                usage_count BIGINT NOT NULL DEFAULT 0,
                max_uses BIGINT NOT NULL DEFAULT 3 CHECK (max_uses > 0),
                expired BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_links_created_at ON links(created_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS visits (
                id BIGSERIAL PRIMARY KEY,
                link_id BIGINT NOT NULL REFERENCES links(id) ON DELETE CASCADE,
                client_address TEXT NOT NULL,
                geo_country TEXT,
                geo_city TEXT,
                geo_region TEXT,
                geo_isp TEXT,
                geo_lat DOUBLE PRECISION,
                geo_lon DOUBLE PRECISION,
                geo_timezone TEXT,
                browser_name TEXT,
                browser_version TEXT,
                os_name TEXT,
                os_version TEXT,
                device_type TEXT,
                device_vendor TEXT,
                device_model TEXT,
                engine_name TEXT,
                engine_version TEXT,
                raw_signature TEXT NOT NULL DEFAULT '',
                referrer TEXT,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_visits_link_created ON visits(link_id, created_at)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_with_code(
        &self,
        code: &str,
        target_url: &str,
        max_uses: i64,
    ) -> StorageResult<Link> {
        let created_at = chrono::Utc::now().timestamp();

        let link = sqlx::query_as::<_, Link>(
            r#"
            INSERT INTO links (code, target_url, created_at, usage_count, max_uses, expired)
            VALUES ($1, $2, $3, 0, $4, FALSE)
            ON CONFLICT (code) DO NOTHING
            RETURNING id, code, target_url, created_at, usage_count, max_uses, expired
            "#,
        )
        .bind(code)
        .bind(target_url)
        .bind(created_at)
        .bind(max_uses)
        .fetch_optional(self.pool.as_ref())
        .await?;

        link.ok_or(StorageError::Conflict)
    }

    async fn get(&self, code: &str) -> StorageResult<Option<Link>> {
        let link = sqlx::query_as::<_, Link>(
            r#"
            SELECT id, code, target_url, created_at, usage_count, max_uses, expired
            FROM links
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn consume_use(&self, link_id: i64) -> StorageResult<Option<Link>> {
        // Row lock on the UPDATE serializes concurrent consumers; the
        // second one re-evaluates the WHERE clause against the new row.
        let link = sqlx::query_as::<_, Link>(
            r#"
            UPDATE links
            SET usage_count = usage_count + 1,
                expired = (usage_count + 1 >= max_uses)
            WHERE id = $1 AND expired = FALSE AND usage_count < max_uses
            RETURNING id, code, target_url, created_at, usage_count, max_uses, expired
            "#,
        )
        .bind(link_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn list_with_visits(&self) -> Result<Vec<LinkWithVisits>> {
        let links = sqlx::query_as::<_, LinkWithVisits>(
            r#"
            SELECT l.id, l.code, l.target_url, l.created_at, l.usage_count, l.max_uses, l.expired,
                   (SELECT COUNT(*) FROM visits v WHERE v.link_id = l.id) AS visits
            FROM links l
            ORDER BY l.created_at DESC, l.id DESC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(links)
    }

    async fn append_visit(&self, visit: &NewVisit) -> Result<()> {
        let geo = visit.geo.clone().unwrap_or_default();
        let signature = &visit.signature;

        sqlx::query(
            r#"
            INSERT INTO visits (
                link_id, client_address,
                geo_country, geo_city, geo_region, geo_isp, geo_lat, geo_lon, geo_timezone,
                browser_name, browser_version, os_name, os_version,
                device_type, device_vendor, device_model, engine_name, engine_version,
                raw_signature, referrer, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            "#,
        )
        .bind(visit.link_id)
        .bind(&visit.client_address)
        .bind(geo.country)
        .bind(geo.city)
        .bind(geo.region)
        .bind(geo.isp)
        .bind(geo.lat)
        .bind(geo.lon)
        .bind(geo.timezone)
        .bind(&signature.browser_name)
        .bind(&signature.browser_version)
        .bind(&signature.os_name)
        .bind(&signature.os_version)
        .bind(&signature.device_type)
        .bind(&signature.device_vendor)
        .bind(&signature.device_model)
        .bind(&signature.engine_name)
        .bind(&signature.engine_version)
        .bind(&visit.raw_signature)
        .bind(&visit.referrer)
        .bind(visit.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn visits_for_link(&self, link_id: i64) -> Result<Vec<Visit>> {
        let rows = sqlx::query_as::<_, VisitRow>(
            r#"
            SELECT id, link_id, client_address,
                   geo_country, geo_city, geo_region, geo_isp, geo_lat, geo_lon, geo_timezone,
                   browser_name, browser_version, os_name, os_version,
                   device_type, device_vendor, device_model, engine_name, engine_version,
                   raw_signature, referrer, created_at
            FROM visits
            WHERE link_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(link_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Visit::from).collect())
    }
}
