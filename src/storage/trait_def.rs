use crate::models::{Link, LinkWithVisits, NewVisit, Visit};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    /// Transient lock or serialization failure; the operation may be retried
    #[error("storage contention: {0}")]
    Contention(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Link registry and visit store.
///
/// Quota fields of a link are only ever changed through [`Storage::consume_use`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Insert a link under `code`; [`StorageError::Conflict`] when the code is taken
    async fn create_with_code(
        &self,
        code: &str,
        target_url: &str,
        max_uses: i64,
    ) -> StorageResult<Link>;

    /// Get a link by short code
    async fn get(&self, code: &str) -> StorageResult<Option<Link>>;

    /// Atomically count one use of an active link.
    ///
    /// A single conditional update: increments `usage_count` only while it is
    /// below `max_uses`, setting `expired` in the same statement when the
    /// quota is reached. Returns the updated link, or `None` if the link was
    /// already expired (or does not exist).
    async fn consume_use(&self, link_id: i64) -> StorageResult<Option<Link>>;

    /// All links, newest first, each with its recorded visit count
    async fn list_with_visits(&self) -> Result<Vec<LinkWithVisits>>;

    /// Append a visit record
    async fn append_visit(&self, visit: &NewVisit) -> Result<()>;

    /// All visits of a link, newest first
    async fn visits_for_link(&self, link_id: i64) -> Result<Vec<Visit>>;
}
