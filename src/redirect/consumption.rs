//! Per-hit quota accounting for short links
//!
//! Lookup, expiry check and bot classification happen before the store is
//! touched; the count itself is one conditional update in the backend, so
//! concurrent hits can never push `usage_count` past `max_uses`.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analytics::bot::BotClassifier;
use crate::models::Link;
use crate::storage::{Storage, StorageError};

const BACKOFF_BASE_MS: u64 = 10;
const BACKOFF_JITTER_MS: u64 = 15;

/// Outcome of one hit against a short code
#[derive(Debug, Clone)]
pub enum Consumption {
    NotFound,
    /// The quota was already used up; nothing was counted
    AlreadyExpired(Link),
    /// Automated agent; redirected without accounting
    PassThroughBot(Link),
    /// Human hit counted against the quota. The link may have expired with this hit.
    Counted(Link),
}

#[derive(Debug, Error)]
pub enum ConsumeError {
    #[error("storage failure during consumption: {0}")]
    Storage(#[source] StorageError),
    #[error("storage stayed contended after {attempts} attempts")]
    Exhausted { attempts: usize },
}

pub struct LinkConsumer {
    storage: Arc<dyn Storage>,
    classifier: BotClassifier,
    max_attempts: usize,
}

impl LinkConsumer {
    pub fn new(storage: Arc<dyn Storage>, classifier: BotClassifier, max_attempts: usize) -> Self {
        Self {
            storage,
            classifier,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Evaluate one hit on `code`, counting it when it comes from a human.
    ///
    /// Contention reported by the store restarts the whole decision with a
    /// fresh read, up to the configured number of attempts.
    pub async fn consume(
        &self,
        code: &str,
        user_agent: Option<&str>,
    ) -> Result<Consumption, ConsumeError> {
        for attempt in 1..=self.max_attempts {
            match self.try_consume(code, user_agent).await {
                Ok(outcome) => return Ok(outcome),
                Err(StorageError::Contention(reason)) => {
                    warn!(
                        short_code = %code,
                        attempt,
                        max_attempts = self.max_attempts,
                        reason = %reason,
                        "storage contention while consuming link, retrying"
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(backoff(attempt)).await;
                    }
                }
                Err(err) => return Err(ConsumeError::Storage(err)),
            }
        }

        Err(ConsumeError::Exhausted {
            attempts: self.max_attempts,
        })
    }

    async fn try_consume(
        &self,
        code: &str,
        user_agent: Option<&str>,
    ) -> Result<Consumption, StorageError> {
        let Some(link) = self.storage.get(code).await? else {
            return Ok(Consumption::NotFound);
        };

        if link.is_expired() {
            return Ok(Consumption::AlreadyExpired(link));
        }

        if self.classifier.is_bot(user_agent) {
            debug!(short_code = %code, "bot user agent, passing through");
            return Ok(Consumption::PassThroughBot(link));
        }

        match self.storage.consume_use(link.id).await? {
            Some(updated) => {
                debug!(
                    short_code = %code,
                    usage_count = updated.usage_count,
                    max_uses = updated.max_uses,
                    expired = updated.expired,
                    "hit counted"
                );
                Ok(Consumption::Counted(updated))
            }
            // Another hit took the last use between our read and the update
            None => Ok(Consumption::AlreadyExpired(link)),
        }
    }
}

fn backoff(attempt: usize) -> Duration {
    let jitter = rand::random_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(BACKOFF_BASE_MS * attempt as u64 + jitter)
}
