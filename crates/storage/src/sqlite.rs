use crate::{
    AssetStore, Association, FileRecord, NoteRecord, SchemaVariant, StoreError, TagRecord,
    ARTIST_PARENT_TAG,
};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

/// SQLite-backed asset store.
///
/// Statements from concurrent callers never interleave: every call holds
/// the store mutex for its whole duration.
pub struct SqliteAssetStore {
    pool: SqlitePool,
    lock: Mutex<()>,
}

impl SqliteAssetStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            lock: Mutex::new(()),
        }
    }

    pub async fn open(database_url: &str) -> anyhow::Result<Self> {
        Ok(Self::new(crate::connect(database_url).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the tables of the given layout if they are missing.
    pub async fn ensure_schema(&self, variant: SchemaVariant) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let tag_table = match variant {
            SchemaVariant::Legacy => {
                "CREATE TABLE IF NOT EXISTS bf_tag (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"
            }
            SchemaVariant::Hierarchical => {
                "CREATE TABLE IF NOT EXISTS bf_tag_v2 (id INTEGER PRIMARY KEY, name TEXT NOT NULL, pid INTEGER DEFAULT 0)"
            }
        };
        let statements = [
            "CREATE TABLE IF NOT EXISTS bf_file (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            tag_table,
            "CREATE TABLE IF NOT EXISTS bf_tag_join_file (file_id INTEGER NOT NULL, tag_id INTEGER NOT NULL, PRIMARY KEY (file_id, tag_id))",
            "CREATE TABLE IF NOT EXISTS bf_material_userdata (file_id INTEGER PRIMARY KEY, note TEXT, origin TEXT)",
        ];
        let mut tx = self.pool.begin().await?;
        for sql in statements {
            sqlx::query(sql).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn variant_unlocked(&self) -> Result<SchemaVariant, StoreError> {
        let row = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND tbl_name = 'bf_tag_v2'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(if row.is_some() {
            SchemaVariant::Hierarchical
        } else {
            SchemaVariant::Legacy
        })
    }

    async fn require_hierarchical(&self) -> Result<(), StoreError> {
        match self.variant_unlocked().await? {
            SchemaVariant::Hierarchical => Ok(()),
            other => Err(StoreError::Unsupported(other)),
        }
    }
}

#[async_trait::async_trait]
impl AssetStore for SqliteAssetStore {
    async fn detect_schema_variant(&self) -> Result<SchemaVariant, StoreError> {
        let _guard = self.lock.lock().await;
        self.variant_unlocked().await
    }

    async fn count_files(&self) -> Result<i64, StoreError> {
        let _guard = self.lock.lock().await;
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM bf_file")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_files(&self, offset: i64, limit: i64) -> Result<Vec<FileRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT id, COALESCE(name, '') AS name FROM bf_file ORDER BY id LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(files)
    }

    async fn list_tags(&self, variant: SchemaVariant) -> Result<Vec<TagRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let sql = format!(
            "SELECT id, COALESCE(name, '') AS name FROM {} ORDER BY id",
            variant.tag_table()
        );
        let tags = sqlx::query_as::<_, TagRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    async fn list_associations(&self) -> Result<Vec<Association>, StoreError> {
        let _guard = self.lock.lock().await;
        let rows = sqlx::query_as::<_, Association>("SELECT file_id, tag_id FROM bf_tag_join_file")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_notes(&self) -> Result<Vec<NoteRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let rows = sqlx::query_as::<_, NoteRecord>(
            "SELECT file_id, COALESCE(note, '') AS note, origin FROM bf_material_userdata",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_tags(
        &self,
        batch: &[TagRecord],
        variant: SchemaVariant,
    ) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let sql = format!(
            "INSERT OR IGNORE INTO {} (id, name) VALUES (?1, ?2)",
            variant.tag_table()
        );
        let mut tx = self.pool.begin().await?;
        for tag in batch {
            sqlx::query(&sql)
                .bind(tag.id)
                .bind(&tag.name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(rows = batch.len(), table = variant.tag_table(), "inserted tags");
        Ok(())
    }

    async fn insert_associations(&self, batch: &[Association]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let mut tx = self.pool.begin().await?;
        for row in batch {
            sqlx::query("INSERT OR IGNORE INTO bf_tag_join_file (file_id, tag_id) VALUES (?1, ?2)")
                .bind(row.file_id)
                .bind(row.tag_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(rows = batch.len(), "inserted associations");
        Ok(())
    }

    async fn insert_notes(&self, batch: &[NoteRecord]) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let mut tx = self.pool.begin().await?;
        for note in batch {
            sqlx::query(
                "INSERT OR IGNORE INTO bf_material_userdata (file_id, note, origin) VALUES (?1, ?2, ?3)",
            )
            .bind(note.file_id)
            .bind(&note.text)
            .bind(note.resolved_origin().unwrap_or_default())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = batch.len(), "inserted notes");
        Ok(())
    }

    async fn get_or_create_artist_parent_tag(&self) -> Result<i64, StoreError> {
        let _guard = self.lock.lock().await;
        self.require_hierarchical().await?;
        let existing = sqlx::query(
            "SELECT id FROM bf_tag_v2 WHERE name = ?1 ORDER BY id LIMIT 1",
        )
        .bind(ARTIST_PARENT_TAG)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = existing {
            return Ok(row.try_get::<i64, _>("id")?);
        }
        let done = sqlx::query("INSERT INTO bf_tag_v2 (name, pid) VALUES (?1, 0)")
            .bind(ARTIST_PARENT_TAG)
            .execute(&self.pool)
            .await?;
        Ok(done.last_insert_rowid())
    }

    async fn list_ungrouped_artist_subtags(&self) -> Result<Vec<TagRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        self.require_hierarchical().await?;
        // GLOB is case-sensitive, unlike LIKE.
        let rows = sqlx::query_as::<_, TagRecord>(
            "SELECT id, name FROM bf_tag_v2 WHERE name GLOB 'Artist:*' AND (pid IS NULL OR pid = 0) ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn regroup_artist_subtags(
        &self,
        batch: &[TagRecord],
        parent_id: i64,
    ) -> Result<u64, StoreError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let _guard = self.lock.lock().await;
        self.require_hierarchical().await?;
        let mut tx = self.pool.begin().await?;
        let mut updated = 0u64;
        for tag in batch {
            let done = sqlx::query("UPDATE bf_tag_v2 SET name = ?1, pid = ?2 WHERE id = ?3")
                .bind(&tag.name)
                .bind(parent_id)
                .bind(tag.id)
                .execute(&mut *tx)
                .await?;
            updated += done.rows_affected();
        }
        tx.commit().await?;
        Ok(updated)
    }
}
