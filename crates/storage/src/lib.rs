//! Storage layer: the asset store the synchronizer writes into.
//!
//! Holds DB pool setup, the store contract and its SQLite implementation.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use thiserror::Error;

pub mod models;
pub mod sqlite;

pub use models::{
    parse_origin_marker, Association, FileRecord, NoteRecord, SchemaVariant, StoreCounts,
    TagRecord,
};
pub use sqlite::SqliteAssetStore;

/// Name of the grouping parent for artist tags in the hierarchical layout.
pub const ARTIST_PARENT_TAG: &str = "Artist";

/// Prefix carried by flat artist tags before they are grouped.
pub const ARTIST_PREFIX: &str = "Artist:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("operation not supported on the {0} schema")]
    Unsupported(SchemaVariant),
}

pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let mut url = database_url.to_string();
    if !database_url.starts_with("sqlite:") {
        let path = std::path::PathBuf::from(database_url);
        let norm = path.to_string_lossy().replace('\\', "/");
        if path.is_absolute() {
            url = format!("sqlite:///{}", norm.trim_start_matches('/'));
        } else {
            url = format!("sqlite://{}", norm);
        }
    }
    let options = SqliteConnectOptions::from_str(&url)?
        .synchronous(SqliteSynchronous::Off)
        .journal_mode(SqliteJournalMode::Memory);
    let mut opts = SqlitePoolOptions::new();
    if url.contains("memory") {
        opts = opts.max_connections(1);
    } else {
        opts = opts.max_connections(5);
    }
    let pool = opts.connect_with(options).await?;
    Ok(pool)
}

/// Asset store contract consumed by the synchronizer.
///
/// Batch writes are transactional and tolerate rows that already exist.
#[async_trait::async_trait]
pub trait AssetStore: Send + Sync {
    async fn detect_schema_variant(&self) -> Result<SchemaVariant, StoreError>;

    async fn count_files(&self) -> Result<i64, StoreError>;

    async fn list_files(&self, offset: i64, limit: i64) -> Result<Vec<FileRecord>, StoreError>;

    async fn list_tags(&self, variant: SchemaVariant) -> Result<Vec<TagRecord>, StoreError>;

    async fn list_associations(&self) -> Result<Vec<Association>, StoreError>;

    async fn list_notes(&self) -> Result<Vec<NoteRecord>, StoreError>;

    async fn insert_tags(
        &self,
        batch: &[TagRecord],
        variant: SchemaVariant,
    ) -> Result<(), StoreError>;

    async fn insert_associations(&self, batch: &[Association]) -> Result<(), StoreError>;

    async fn insert_notes(&self, batch: &[NoteRecord]) -> Result<(), StoreError>;

    async fn get_or_create_artist_parent_tag(&self) -> Result<i64, StoreError>;

    async fn list_ungrouped_artist_subtags(&self) -> Result<Vec<TagRecord>, StoreError>;

    /// Renames each tag and points it at `parent_id`. Returns updated rows.
    async fn regroup_artist_subtags(
        &self,
        batch: &[TagRecord],
        parent_id: i64,
    ) -> Result<u64, StoreError>;

    async fn counts(&self, variant: SchemaVariant) -> Result<StoreCounts, StoreError> {
        Ok(StoreCounts {
            files: self.count_files().await?,
            tags: self.list_tags(variant).await?.len(),
            associations: self.list_associations().await?.len(),
            notes: self.list_notes().await?.len(),
        })
    }
}
