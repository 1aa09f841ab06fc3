//! Metadata source abstractions: the remote catalogue that tags and
//! descriptions are pulled from, plus the pure helpers around it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod description;
pub mod identifier;
pub mod pixiv;

/// Prefix marking artist tags; the store owns the grouping rules for it.
pub use storage::ARTIST_PREFIX;

/// Value returned in place of real data when the remote reports the item as
/// missing. It is a valid result, not a failure.
pub const NOT_FOUND_SENTINEL: &str = "Error:404";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("remote reported an error: {0}")]
    Remote(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Descriptive record used to build a file note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionRecord {
    pub title: String,
    pub author: String,
    pub author_id: String,
    pub popularity_count: i64,
    pub comment: String,
}

impl DescriptionRecord {
    pub fn not_found() -> Self {
        Self {
            comment: NOT_FOUND_SENTINEL.to_string(),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
pub trait MetadataSource: Send + Sync {
    /// Domain identifier for a file's display name, if it has one.
    fn extract_identifier(&self, display_name: &str) -> Option<String> {
        identifier::extract_identifier(display_name)
    }

    /// Ordered, deduplicated tag names for an identifier.
    async fn fetch_tags(&self, identifier: &str) -> Result<Vec<String>, ProviderError>;

    async fn fetch_description(&self, identifier: &str)
        -> Result<DescriptionRecord, ProviderError>;

    fn format_description(&self, record: &DescriptionRecord) -> String {
        description::format_description(record)
    }

    /// Canonical page for an identifier, recorded as a note's origin.
    fn origin_url(&self, identifier: &str) -> String;
}
