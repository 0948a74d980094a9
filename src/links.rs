//! Link creation shared by the HTTP API and the admin CLI

use thiserror::Error;
use tracing::{debug, info};

use crate::config::LinkConfig;
use crate::models::Link;
use crate::storage::{Storage, StorageError};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Error)]
pub enum CreateLinkError {
    #[error("url must be a well-formed absolute URL")]
    InvalidUrl,
    #[error("max_uses must be a positive integer")]
    InvalidMaxUses,
    #[error("no free short code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },
    #[error("failed to create link: {0}")]
    Storage(#[source] StorageError),
}

/// Random alphanumeric short code of `length` characters
pub fn generate_short_code(length: usize) -> String {
    (0..length)
        .map(|_| CODE_ALPHABET[rand::random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Accepts only absolute URLs with a host. The input is returned untouched.
pub fn validate_target_url(raw: Option<&str>) -> Result<&str, CreateLinkError> {
    let raw = raw.unwrap_or_default();
    if raw.is_empty() {
        return Err(CreateLinkError::InvalidUrl);
    }

    match url::Url::parse(raw) {
        Ok(parsed) if parsed.has_host() => Ok(raw),
        _ => Err(CreateLinkError::InvalidUrl),
    }
}

/// Validate the request and store a new link under a fresh short code.
///
/// The insert itself is the uniqueness check: a taken code surfaces as
/// [`StorageError::Conflict`] and a new code is drawn.
pub async fn create_link(
    storage: &dyn Storage,
    config: &LinkConfig,
    url: Option<&str>,
    max_uses: Option<i64>,
) -> Result<Link, CreateLinkError> {
    let target_url = validate_target_url(url)?;

    let max_uses = max_uses.unwrap_or(config.default_max_uses);
    if max_uses < 1 {
        return Err(CreateLinkError::InvalidMaxUses);
    }

    let attempts = config.short_code_max_attempts.max(1);
    for attempt in 1..=attempts {
        let code = generate_short_code(config.short_code_length);
        match storage.create_with_code(&code, target_url, max_uses).await {
            Ok(link) => {
                info!(short_code = %link.code, max_uses, "link created");
                return Ok(link);
            }
            Err(StorageError::Conflict) => {
                debug!(short_code = %code, attempt, "short code collision, drawing another");
            }
            Err(err) => return Err(CreateLinkError::Storage(err)),
        }
    }

    Err(CreateLinkError::CodeSpaceExhausted { attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    async fn setup() -> SqliteStorage {
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        storage
    }

    #[test]
    fn test_generated_code_is_alphanumeric_with_requested_length() {
        for length in [1, 6, 12] {
            let code = generate_short_code(length);
            assert_eq!(code.len(), length);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_validate_target_url() {
        assert!(validate_target_url(Some("https://example.com/path?q=1")).is_ok());
        assert!(validate_target_url(Some("http://localhost:8080")).is_ok());
        assert!(matches!(
            validate_target_url(None),
            Err(CreateLinkError::InvalidUrl)
        ));
        assert!(validate_target_url(Some("")).is_err());
        assert!(validate_target_url(Some("not a url")).is_err());
        assert!(validate_target_url(Some("/relative/path")).is_err());
        assert!(validate_target_url(Some("mailto:someone@example.com")).is_err());
    }

    #[tokio::test]
    async fn test_create_link_applies_default_quota() {
        let storage = setup().await;
        let config = LinkConfig::default();

        let link = create_link(&storage, &config, Some("https://example.com/x"), None)
            .await
            .unwrap();
        assert_eq!(link.max_uses, 3);
        assert_eq!(link.usage_count, 0);
        assert!(!link.expired);
        assert_eq!(link.code.len(), 6);
        assert_eq!(link.target_url, "https://example.com/x");
    }

    #[tokio::test]
    async fn test_create_link_rejects_non_positive_quota() {
        let storage = setup().await;
        let config = LinkConfig::default();

        for bad in [0, -4] {
            let err = create_link(&storage, &config, Some("https://example.com"), Some(bad))
                .await
                .unwrap_err();
            assert!(matches!(err, CreateLinkError::InvalidMaxUses));
        }
    }

    #[tokio::test]
    async fn test_exhausted_code_space_is_reported() {
        let storage = setup().await;
        // One-character codes from a single attempt collide quickly
        let config = LinkConfig {
            short_code_length: 1,
            short_code_max_attempts: 1,
            ..LinkConfig::default()
        };

        let mut exhausted = false;
        for _ in 0..500 {
            match create_link(&storage, &config, Some("https://example.com"), Some(1)).await {
                Ok(_) => {}
                Err(CreateLinkError::CodeSpaceExhausted { attempts }) => {
                    assert_eq!(attempts, 1);
                    exhausted = true;
                    break;
                }
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(exhausted);
    }
}
