#![allow(dead_code)]

use providers::{DescriptionRecord, MetadataSource, ProviderError};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use storage::{
    AssetStore, Association, FileRecord, NoteRecord, SchemaVariant, SqliteAssetStore, StoreError,
    TagRecord, ARTIST_PARENT_TAG, ARTIST_PREFIX,
};
use tagsync_core::config::BatchConfig;
use tagsync_core::SyncSettings;
use tempfile::TempDir;

/// Metadata source answering from fixed tables and counting calls.
#[derive(Default)]
pub struct ScriptedSource {
    pub tags: HashMap<String, Vec<String>>,
    pub descriptions: HashMap<String, DescriptionRecord>,
    pub panic_on: Option<String>,
    pub delay: Option<Duration>,
    pub tag_calls: AtomicUsize,
    pub description_calls: AtomicUsize,
}

impl ScriptedSource {
    /// Tag lists are comma separated; an empty string scripts an empty answer.
    pub fn with_tags(entries: &[(&str, &str)]) -> Self {
        let tags = entries
            .iter()
            .map(|(id, names)| {
                (
                    id.to_string(),
                    names
                        .split(',')
                        .filter(|n| !n.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            })
            .collect();
        Self {
            tags,
            ..Self::default()
        }
    }

    pub fn tag_calls(&self) -> usize {
        self.tag_calls.load(Ordering::SeqCst)
    }

    pub fn description_calls(&self) -> usize {
        self.description_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MetadataSource for ScriptedSource {
    async fn fetch_tags(&self, identifier: &str) -> Result<Vec<String>, ProviderError> {
        self.tag_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panic_on.as_deref() == Some(identifier) {
            panic!("scripted panic for {identifier}");
        }
        self.tags
            .get(identifier)
            .cloned()
            .ok_or_else(|| ProviderError::Remote(format!("unknown identifier {identifier}")))
    }

    async fn fetch_description(
        &self,
        identifier: &str,
    ) -> Result<DescriptionRecord, ProviderError> {
        self.description_calls.fetch_add(1, Ordering::SeqCst);
        self.descriptions
            .get(identifier)
            .cloned()
            .ok_or_else(|| ProviderError::Remote(format!("unknown identifier {identifier}")))
    }

    fn origin_url(&self, identifier: &str) -> String {
        format!("https://art.example/works/{identifier}")
    }
}

pub fn settings() -> SyncSettings {
    SyncSettings {
        write_tags: true,
        write_notes: false,
        skip_existing: true,
        offset: 0,
        limit: 0,
        tag_workers: 4,
        note_workers: 4,
        batch: BatchConfig::default(),
    }
}

pub async fn sqlite_store(variant: SchemaVariant) -> (TempDir, SqliteAssetStore) {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("assets.db");
    std::fs::File::create(&db_path).unwrap();
    let store = SqliteAssetStore::open(&db_path.to_string_lossy())
        .await
        .unwrap();
    store.ensure_schema(variant).await.unwrap();
    (temp, store)
}

pub async fn add_files(store: &SqliteAssetStore, names: &[&str]) {
    for (i, name) in names.iter().enumerate() {
        sqlx::query("INSERT INTO bf_file (id, name) VALUES (?, ?)")
            .bind(i as i64 + 1)
            .bind(*name)
            .execute(store.pool())
            .await
            .unwrap();
    }
}

pub fn tag_id(tags: &[TagRecord], name: &str) -> i64 {
    tags.iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| panic!("tag {name} missing"))
        .id
}

#[derive(Default)]
struct Tables {
    files: Vec<FileRecord>,
    tags: BTreeMap<i64, (String, Option<i64>)>,
    links: BTreeSet<(i64, i64)>,
    notes: BTreeMap<i64, NoteRecord>,
}

/// In-memory store with switchable write failures. Records every batch
/// write in order and counts associations whose tag was not yet stored.
pub struct MemoryStore {
    variant: SchemaVariant,
    tables: Mutex<Tables>,
    pub fail_tags: AtomicBool,
    pub fail_links: AtomicBool,
    pub fail_notes: AtomicBool,
    pub orphan_links: AtomicUsize,
    pub writes: Mutex<Vec<(&'static str, usize)>>,
}

impl MemoryStore {
    pub fn new(variant: SchemaVariant) -> Self {
        Self {
            variant,
            tables: Mutex::new(Tables::default()),
            fail_tags: AtomicBool::new(false),
            fail_links: AtomicBool::new(false),
            fail_notes: AtomicBool::new(false),
            orphan_links: AtomicUsize::new(0),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_files(self, names: &[&str]) -> Self {
        {
            let mut t = self.tables.lock().unwrap();
            for (i, name) in names.iter().enumerate() {
                t.files.push(FileRecord {
                    id: i as i64 + 1,
                    display_name: name.to_string(),
                });
            }
        }
        self
    }

    pub fn with_tag(self, id: i64, name: &str) -> Self {
        self.tables
            .lock()
            .unwrap()
            .tags
            .insert(id, (name.to_string(), None));
        self
    }

    pub fn with_link(self, file_id: i64, tag_id: i64) -> Self {
        self.tables.lock().unwrap().links.insert((file_id, tag_id));
        self
    }

    pub fn tag_names(&self) -> Vec<String> {
        let t = self.tables.lock().unwrap();
        t.tags.values().map(|(name, _)| name.clone()).collect()
    }

    /// Stored tags as `(id, name)` in id order.
    pub fn tags(&self) -> Vec<(i64, String)> {
        let t = self.tables.lock().unwrap();
        t.tags
            .iter()
            .map(|(id, (name, _))| (*id, name.clone()))
            .collect()
    }

    pub fn link_count(&self) -> usize {
        self.tables.lock().unwrap().links.len()
    }

    pub fn writes(&self) -> Vec<(&'static str, usize)> {
        self.writes.lock().unwrap().clone()
    }

    fn failure() -> StoreError {
        StoreError::Database(sqlx::Error::PoolClosed)
    }
}

#[async_trait::async_trait]
impl AssetStore for MemoryStore {
    async fn detect_schema_variant(&self) -> Result<SchemaVariant, StoreError> {
        Ok(self.variant)
    }

    async fn count_files(&self) -> Result<i64, StoreError> {
        Ok(self.tables.lock().unwrap().files.len() as i64)
    }

    async fn list_files(&self, offset: i64, limit: i64) -> Result<Vec<FileRecord>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.files
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_tags(&self, _variant: SchemaVariant) -> Result<Vec<TagRecord>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.tags
            .iter()
            .map(|(id, (name, _))| TagRecord {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn list_associations(&self) -> Result<Vec<Association>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.links
            .iter()
            .map(|(file_id, tag_id)| Association {
                file_id: *file_id,
                tag_id: *tag_id,
            })
            .collect())
    }

    async fn list_notes(&self) -> Result<Vec<NoteRecord>, StoreError> {
        Ok(self.tables.lock().unwrap().notes.values().cloned().collect())
    }

    async fn insert_tags(
        &self,
        batch: &[TagRecord],
        _variant: SchemaVariant,
    ) -> Result<(), StoreError> {
        if self.fail_tags.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        let mut t = self.tables.lock().unwrap();
        for tag in batch {
            t.tags.entry(tag.id).or_insert((tag.name.clone(), None));
        }
        self.writes.lock().unwrap().push(("tags", batch.len()));
        Ok(())
    }

    async fn insert_associations(&self, batch: &[Association]) -> Result<(), StoreError> {
        if self.fail_links.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        let mut t = self.tables.lock().unwrap();
        for link in batch {
            if !t.tags.contains_key(&link.tag_id) {
                self.orphan_links.fetch_add(1, Ordering::SeqCst);
            }
            t.links.insert((link.file_id, link.tag_id));
        }
        self.writes.lock().unwrap().push(("associations", batch.len()));
        Ok(())
    }

    async fn insert_notes(&self, batch: &[NoteRecord]) -> Result<(), StoreError> {
        if self.fail_notes.load(Ordering::SeqCst) {
            return Err(Self::failure());
        }
        let mut t = self.tables.lock().unwrap();
        for note in batch {
            t.notes.entry(note.file_id).or_insert_with(|| note.clone());
        }
        self.writes.lock().unwrap().push(("notes", batch.len()));
        Ok(())
    }

    async fn get_or_create_artist_parent_tag(&self) -> Result<i64, StoreError> {
        let mut t = self.tables.lock().unwrap();
        if let Some((id, _)) = t
            .tags
            .iter()
            .find(|(_, (name, _))| name == ARTIST_PARENT_TAG)
        {
            return Ok(*id);
        }
        let id = t.tags.keys().next_back().copied().unwrap_or(0) + 1;
        t.tags.insert(id, (ARTIST_PARENT_TAG.to_string(), None));
        Ok(id)
    }

    async fn list_ungrouped_artist_subtags(&self) -> Result<Vec<TagRecord>, StoreError> {
        let t = self.tables.lock().unwrap();
        Ok(t.tags
            .iter()
            .filter(|(_, (name, pid))| name.starts_with(ARTIST_PREFIX) && pid.is_none())
            .map(|(id, (name, _))| TagRecord {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn regroup_artist_subtags(
        &self,
        batch: &[TagRecord],
        parent_id: i64,
    ) -> Result<u64, StoreError> {
        let mut t = self.tables.lock().unwrap();
        let mut updated = 0;
        for tag in batch {
            if let Some(entry) = t.tags.get_mut(&tag.id) {
                *entry = (tag.name.clone(), Some(parent_id));
                updated += 1;
            }
        }
        Ok(updated)
    }
}
