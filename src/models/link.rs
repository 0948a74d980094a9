use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A short code mapped to a destination, with its use quota
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Link {
    pub id: i64,
    pub code: String,
    pub target_url: String,
    pub created_at: i64,
    pub usage_count: i64,
    pub max_uses: i64,
    pub expired: bool,
}

impl Link {
    /// A link is expired once its quota is consumed, whether or not the flag was written.
    pub fn is_expired(&self) -> bool {
        self.expired || self.usage_count >= self.max_uses
    }

    pub fn remaining_uses(&self) -> i64 {
        (self.max_uses - self.usage_count).max(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LinkWithVisits {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub link: Link,
    pub visits: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: Option<String>,
    pub max_uses: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(usage_count: i64, max_uses: i64, expired: bool) -> Link {
        Link {
            id: 1,
            code: "abc123".to_string(),
            target_url: "https://example.com".to_string(),
            created_at: 0,
            usage_count,
            max_uses,
            expired,
        }
    }

    #[test]
    fn test_expiry_follows_quota() {
        assert!(!link(0, 3, false).is_expired());
        assert!(!link(2, 3, false).is_expired());
        assert!(link(3, 3, false).is_expired());
        assert!(link(1, 3, true).is_expired());
    }

    #[test]
    fn test_remaining_uses_never_negative() {
        assert_eq!(link(1, 3, false).remaining_uses(), 2);
        assert_eq!(link(5, 3, true).remaining_uses(), 0);
    }

    #[test]
    fn test_link_with_visits_serializes_flat() {
        let entry = LinkWithVisits {
            link: link(1, 3, false),
            visits: 1,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["code"], "abc123");
        assert_eq!(json["visits"], 1);
        assert_eq!(json["expired"], false);
    }
}
