//! Partner entity and repository trait.
//!
//! Maps to the `partners` table. `name` is UNIQUE and, together with
//! `primary_hashtag`, NOT NULL; both constraints live in the database and
//! reach the domain as [`PartnerStoreError`] variants.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Maximum number of website links a partner carries.
pub const MAX_WEBSITE_LINKS: usize = 5;

/// A named link on a partner's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteLink {
    pub name: String,
    pub url: String,
}

impl WebsiteLink {
    /// Build a link only when both parts are present and non-blank.
    pub fn from_pair(name: Option<&str>, url: Option<&str>) -> Option<Self> {
        match (name.map(str::trim), url.map(str::trim)) {
            (Some(name), Some(url)) if !name.is_empty() && !url.is_empty() => Some(Self {
                name: name.to_string(),
                url: url.to_string(),
            }),
            _ => None,
        }
    }

    /// JSON-encoded list stored in the `website_links` column.
    pub fn encode_list(links: &[WebsiteLink]) -> String {
        serde_json::to_string(links).unwrap_or_else(|_| "[]".into())
    }

    /// Decode the `website_links` column; malformed content reads as empty.
    pub fn decode_list(raw: Option<&str>) -> Vec<WebsiteLink> {
        raw.and_then(|s| serde_json::from_str(s).ok()).unwrap_or_default()
    }
}

/// A sponsoring or affiliated organisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    pub primary_hashtag: String,
    pub secondary_hashtag: Option<String>,
    pub logo_url: Option<String>,
    pub link_meta: Option<String>,
    pub link_x: Option<String>,
    pub link_instagram: Option<String>,
    /// Comma-separated project ids
    pub current_projects: Option<String>,
    pub permalink: Option<String>,
    pub website_links: Vec<WebsiteLink>,
}

/// Column values for an insert or full-row update.
///
/// `name` and `primary_hashtag` stay optional so that missing values reach
/// the database and trip its NOT NULL constraint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartnerRecord {
    pub name: Option<String>,
    pub primary_hashtag: Option<String>,
    pub secondary_hashtag: Option<String>,
    pub logo_url: Option<String>,
    pub link_meta: Option<String>,
    pub link_x: Option<String>,
    pub link_instagram: Option<String>,
    pub current_projects: Option<String>,
    pub permalink: Option<String>,
    pub website_links: Vec<WebsiteLink>,
}

impl From<Partner> for PartnerRecord {
    fn from(partner: Partner) -> Self {
        Self {
            name: Some(partner.name),
            primary_hashtag: Some(partner.primary_hashtag),
            secondary_hashtag: partner.secondary_hashtag,
            logo_url: partner.logo_url,
            link_meta: partner.link_meta,
            link_x: partner.link_x,
            link_instagram: partner.link_instagram,
            current_projects: partner.current_projects,
            permalink: partner.permalink,
            website_links: partner.website_links,
        }
    }
}

/// Persistence failures surfaced by the partner store.
#[derive(Debug, thiserror::Error)]
pub enum PartnerStoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("not-null constraint violated: {0}")]
    NotNullViolation(String),

    #[error(transparent)]
    Other(#[from] AppError),
}

/// Repository trait for Partner data access operations.
#[async_trait]
pub trait PartnerRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Partner>, AppError>;

    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<Partner>, AppError>;

    /// All partners ordered by id.
    async fn find_all(&self) -> Result<Vec<Partner>, AppError>;

    async fn create(&self, record: &PartnerRecord) -> Result<Partner, PartnerStoreError>;

    /// Overwrite every column of an existing partner.
    async fn update(&self, id: i64, record: &PartnerRecord) -> Result<Partner, PartnerStoreError>;

    /// Delete a partner; returns `false` when it did not exist.
    async fn delete(&self, id: i64) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pair_requires_both_parts() {
        assert!(WebsiteLink::from_pair(Some("Blog"), Some("https://x.org")).is_some());
        assert!(WebsiteLink::from_pair(Some("Blog"), None).is_none());
        assert!(WebsiteLink::from_pair(None, Some("https://x.org")).is_none());
        assert!(WebsiteLink::from_pair(Some("  "), Some("https://x.org")).is_none());
    }

    #[test]
    fn test_encode_is_json_list() {
        let links = vec![WebsiteLink { name: "Blog".into(), url: "https://x.org".into() }];
        let encoded = WebsiteLink::encode_list(&links);
        assert_eq!(encoded, r#"[{"name":"Blog","url":"https://x.org"}]"#);
        assert_eq!(WebsiteLink::decode_list(Some(&encoded)), links);
    }

    #[test]
    fn test_decode_tolerates_garbage() {
        assert_eq!(WebsiteLink::decode_list(Some("not json")), vec![]);
        assert_eq!(WebsiteLink::decode_list(None), vec![]);
    }
}
