use crate::buffer::{BufferKind, WriteBuffer};
use crate::cache::{Resolution, TagCache};
use crate::config::BatchConfig;
use crate::error::SyncError;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use storage::{AssetStore, Association, NoteRecord, SchemaVariant, StoreError, TagRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Rows staged but not yet durable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub tags: usize,
    pub associations: usize,
    pub notes: usize,
}

impl PendingCounts {
    pub fn is_empty(&self) -> bool {
        self.tags == 0 && self.associations == 0 && self.notes == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagedTags {
    pub reused: usize,
    pub created: usize,
}

struct Inner {
    tags: TagCache,
    tagged_files: HashSet<i64>,
    noted_files: HashSet<i64>,
    pending_tags: WriteBuffer<TagRecord>,
    pending_links: WriteBuffer<Association>,
    pending_notes: WriteBuffer<NoteRecord>,
}

/// Caches and write buffers shared by every task of a run.
///
/// One lock guards all of it. Flushes run while holding the lock, so no
/// task can stage into a buffer that is being written.
pub struct SyncState {
    store: Arc<dyn AssetStore>,
    variant: SchemaVariant,
    inner: Mutex<Inner>,
}

impl SyncState {
    /// Loads the tag cache and existence sets from the store.
    pub async fn warm(
        store: Arc<dyn AssetStore>,
        variant: SchemaVariant,
        batch: BatchConfig,
    ) -> Result<Self, StoreError> {
        let tags = TagCache::from_records(store.list_tags(variant).await?);
        let tagged_files: HashSet<i64> = store
            .list_associations()
            .await?
            .into_iter()
            .map(|a| a.file_id)
            .collect();
        let noted_files: HashSet<i64> = store
            .list_notes()
            .await?
            .into_iter()
            .filter(|n| !n.text.is_empty())
            .map(|n| n.file_id)
            .collect();
        info!(
            %variant,
            tags = tags.len(),
            max_tag_id = tags.max_id(),
            tagged_files = tagged_files.len(),
            noted_files = noted_files.len(),
            "caches warmed"
        );

        Ok(Self {
            store,
            variant,
            inner: Mutex::new(Inner {
                tags,
                tagged_files,
                noted_files,
                pending_tags: WriteBuffer::new(batch.tags),
                pending_links: WriteBuffer::new(batch.associations),
                pending_notes: WriteBuffer::new(batch.notes),
            }),
        })
    }

    pub fn variant(&self) -> SchemaVariant {
        self.variant
    }

    pub async fn has_associations(&self, file_id: i64) -> bool {
        self.inner.lock().await.tagged_files.contains(&file_id)
    }

    pub async fn has_note(&self, file_id: i64) -> bool {
        self.inner.lock().await.noted_files.contains(&file_id)
    }

    /// Resolves every name against the cache, allocating ids for new ones,
    /// and stages the resulting rows. The whole list is handled under one
    /// acquisition of the lock.
    pub async fn stage_tags(&self, file_id: i64, names: &[String]) -> StagedTags {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let mut staged = StagedTags::default();
        for name in names {
            let tag_id = match inner.tags.resolve_or_allocate(name, self.variant) {
                Resolution::Existing(id) => {
                    staged.reused += 1;
                    id
                }
                Resolution::Created(id) => {
                    inner.pending_tags.push(TagRecord {
                        id,
                        name: name.clone(),
                    });
                    staged.created += 1;
                    id
                }
            };
            inner.pending_links.push(Association { file_id, tag_id });
        }
        staged
    }

    pub async fn stage_note(&self, note: NoteRecord) {
        self.inner.lock().await.pending_notes.push(note);
    }

    /// Writes the buffer if it reached its threshold, or if `force` is set
    /// and it holds anything. Returns the number of rows written.
    ///
    /// On failure the rows stay buffered for the next attempt.
    pub async fn flush(&self, kind: BufferKind, force: bool) -> Result<usize, SyncError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        match kind {
            BufferKind::Tags => self.write_tags(inner, force).await,
            BufferKind::Associations => self.write_links(inner, force).await,
            BufferKind::Notes => self.write_notes(inner, force).await,
        }
    }

    /// Forces every buffer in dependency order and returns the failures.
    pub async fn flush_all(&self) -> Vec<SyncError> {
        let mut failures = Vec::new();
        for kind in [BufferKind::Tags, BufferKind::Associations, BufferKind::Notes] {
            if let Err(err) = self.flush(kind, true).await {
                failures.push(err);
            }
        }
        failures
    }

    pub async fn pending(&self) -> PendingCounts {
        let inner = self.inner.lock().await;
        PendingCounts {
            tags: inner.pending_tags.len(),
            associations: inner.pending_links.len(),
            notes: inner.pending_notes.len(),
        }
    }

    async fn write_tags(&self, inner: &mut Inner, force: bool) -> Result<usize, SyncError> {
        if !inner.pending_tags.ready(force) {
            return Ok(0);
        }
        let rows = inner.pending_tags.len();
        self.store
            .insert_tags(inner.pending_tags.rows(), self.variant)
            .await
            .map_err(|source| persistence_failure(BufferKind::Tags, rows, source))?;
        inner.pending_tags.clear();
        debug!(rows, "tag buffer flushed");
        Ok(rows)
    }

    async fn write_links(&self, inner: &mut Inner, force: bool) -> Result<usize, SyncError> {
        if !inner.pending_links.ready(force) {
            return Ok(0);
        }
        // An association must never become durable before its tag.
        self.write_tags(inner, true).await?;

        let rows = inner.pending_links.len();
        self.store
            .insert_associations(inner.pending_links.rows())
            .await
            .map_err(|source| persistence_failure(BufferKind::Associations, rows, source))?;
        inner
            .tagged_files
            .extend(inner.pending_links.rows().iter().map(|a| a.file_id));
        inner.pending_links.clear();
        debug!(rows, "association buffer flushed");
        Ok(rows)
    }

    async fn write_notes(&self, inner: &mut Inner, force: bool) -> Result<usize, SyncError> {
        if !inner.pending_notes.ready(force) {
            return Ok(0);
        }
        let rows = inner.pending_notes.len();
        self.store
            .insert_notes(inner.pending_notes.rows())
            .await
            .map_err(|source| persistence_failure(BufferKind::Notes, rows, source))?;
        inner
            .noted_files
            .extend(inner.pending_notes.rows().iter().map(|n| n.file_id));
        inner.pending_notes.clear();
        debug!(rows, "note buffer flushed");
        Ok(rows)
    }
}

fn persistence_failure(buffer: BufferKind, rows: usize, source: StoreError) -> SyncError {
    warn!(%buffer, rows, error = %source, "flush failed, rows kept for retry");
    SyncError::Persistence { buffer, source }
}
