use crate::config::{AppConfig, BatchConfig};
use crate::error::SyncError;
use crate::pool::{TaskHandle, WorkerPool};
use crate::regroup::{self, RegroupReport};
use crate::state::{PendingCounts, SyncState};
use crate::stats::{FailureKind, Statistics, StatsSnapshot, TaskOutcome};
use crate::tasks::{self, Position, TaskContext};
use anyhow::Context;
use chrono::{DateTime, Utc};
use providers::pixiv::PixivClient;
use providers::MetadataSource;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use storage::{AssetStore, FileRecord, SchemaVariant, SqliteAssetStore, StoreCounts};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Initializing,
    Dispatching,
    Draining,
    Finalizing,
    Done,
    Failed,
}

/// Run options resolved from configuration.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub write_tags: bool,
    pub write_notes: bool,
    pub skip_existing: bool,
    pub offset: i64,
    pub limit: i64,
    pub tag_workers: usize,
    pub note_workers: usize,
    pub batch: BatchConfig,
}

impl From<&AppConfig> for SyncSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            write_tags: config.sync.write_tags,
            write_notes: config.sync.write_notes,
            skip_existing: config.sync.skip_existing,
            offset: config.sync.offset,
            limit: config.sync.limit,
            tag_workers: config.sync.tag_workers,
            note_workers: config.sync.note_workers,
            batch: config.batch,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub variant: SchemaVariant,
    pub files: usize,
    pub tags: Option<StatsSnapshot>,
    pub notes: Option<StatsSnapshot>,
    pub regroup: Option<RegroupReport>,
    /// Rows still buffered after the final flush; non-zero only when the
    /// store kept failing.
    pub unflushed: PendingCounts,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

struct Pipeline {
    label: &'static str,
    pool: WorkerPool,
    ctx: TaskContext,
    handles: Vec<TaskHandle<TaskOutcome>>,
}

impl Pipeline {
    fn new(
        label: &'static str,
        workers: usize,
        state: &Arc<SyncState>,
        source: &Arc<dyn MetadataSource>,
        skip_existing: bool,
    ) -> Result<Self, SyncError> {
        let pool = WorkerPool::new(label, workers)
            .map_err(SyncError::initialization("create worker pool"))?;
        Ok(Self {
            label,
            pool,
            ctx: TaskContext {
                state: state.clone(),
                source: source.clone(),
                stats: Arc::new(Statistics::new()),
                skip_existing,
            },
            handles: Vec::new(),
        })
    }

    fn fault(&self, err: &dyn std::fmt::Display) {
        warn!(pipeline = self.label, error = %err, "unit of work lost at the pool boundary");
        self.ctx.stats.record(&TaskOutcome::Failed(FailureKind::Worker));
    }

    /// Waits for every submitted unit. Faults the pool reports are counted
    /// as failures of this pipeline.
    async fn drain(&mut self) {
        for handle in std::mem::take(&mut self.handles) {
            if let Err(err) = handle.join().await {
                self.fault(&err);
            }
        }
        self.pool.await_quiescence().await;
    }
}

/// Drives one sync run: warm caches, fan files out to the tag and note
/// pools, drain, flush, then restructure artist tags.
pub struct Synchronizer {
    settings: SyncSettings,
    store: Arc<dyn AssetStore>,
    source: Arc<dyn MetadataSource>,
    phase: RunPhase,
}

impl Synchronizer {
    pub fn new(
        settings: SyncSettings,
        store: Arc<dyn AssetStore>,
        source: Arc<dyn MetadataSource>,
    ) -> Self {
        Self {
            settings,
            store,
            source,
            phase: RunPhase::Idle,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    fn enter(&mut self, phase: RunPhase) {
        info!(from = ?self.phase, to = ?phase, "run phase");
        self.phase = phase;
    }

    pub async fn run(&mut self) -> Result<RunSummary, SyncError> {
        let started_at = Utc::now();
        let clock = Instant::now();

        self.enter(RunPhase::Initializing);
        let (state, files, mut tag_pipe, mut note_pipe) = match self.initialize().await {
            Ok(parts) => parts,
            Err(err) => {
                error!(error = %err, "sync aborted before dispatch");
                self.enter(RunPhase::Failed);
                return Err(err);
            }
        };

        self.enter(RunPhase::Dispatching);
        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            let at = Position {
                index: i + 1,
                total,
            };
            if let Some(pipe) = tag_pipe.as_mut() {
                let unit = tasks::sync_tags(pipe.ctx.clone(), file.clone(), at);
                match pipe.pool.submit(unit) {
                    Ok(handle) => pipe.handles.push(handle),
                    Err(err) => pipe.fault(&err),
                }
            }
            if let Some(pipe) = note_pipe.as_mut() {
                let unit = tasks::sync_note(pipe.ctx.clone(), file.clone(), at);
                match pipe.pool.submit(unit) {
                    Ok(handle) => pipe.handles.push(handle),
                    Err(err) => pipe.fault(&err),
                }
            }
        }
        info!(files = total, "all files dispatched");

        self.enter(RunPhase::Draining);
        for pipe in [tag_pipe.as_mut(), note_pipe.as_mut()].into_iter().flatten() {
            pipe.drain().await;
        }

        self.enter(RunPhase::Finalizing);
        let failures = state.flush_all().await;
        if !failures.is_empty() {
            error!(failures = failures.len(), "final flush incomplete");
        }
        for pipe in [tag_pipe.as_ref(), note_pipe.as_ref()].into_iter().flatten() {
            pipe.pool.shutdown().await;
        }

        let regroup = if tag_pipe.is_some() && state.variant() == SchemaVariant::Hierarchical {
            match regroup::regroup_artist_tags(self.store.as_ref()).await {
                Ok(report) => Some(report),
                Err(err) => {
                    error!(error = %err, "artist tag restructuring failed");
                    None
                }
            }
        } else {
            None
        };

        let snapshot = |pipe: &Option<Pipeline>| {
            pipe.as_ref().map(|p| {
                let stats = p.ctx.stats.snapshot();
                stats.log(p.label);
                stats
            })
        };
        let summary = RunSummary {
            variant: state.variant(),
            files: total,
            tags: snapshot(&tag_pipe),
            notes: snapshot(&note_pipe),
            regroup,
            unflushed: state.pending().await,
            started_at,
            elapsed_ms: clock.elapsed().as_millis() as u64,
        };
        info!(elapsed_ms = summary.elapsed_ms, "sync finished");
        self.enter(RunPhase::Done);
        Ok(summary)
    }

    #[allow(clippy::type_complexity)]
    async fn initialize(
        &self,
    ) -> Result<
        (
            Arc<SyncState>,
            Vec<FileRecord>,
            Option<Pipeline>,
            Option<Pipeline>,
        ),
        SyncError,
    > {
        let settings = &self.settings;
        let variant = self
            .store
            .detect_schema_variant()
            .await
            .map_err(SyncError::initialization("detect schema variant"))?;
        info!(%variant, "schema variant detected");

        let state = Arc::new(
            SyncState::warm(self.store.clone(), variant, settings.batch)
                .await
                .map_err(SyncError::initialization("warm caches"))?,
        );

        let tag_pipe = if settings.write_tags {
            Some(Pipeline::new(
                "tags",
                settings.tag_workers,
                &state,
                &self.source,
                settings.skip_existing,
            )?)
        } else {
            None
        };
        let note_pipe = if settings.write_notes {
            Some(Pipeline::new(
                "notes",
                settings.note_workers,
                &state,
                &self.source,
                settings.skip_existing,
            )?)
        } else {
            None
        };

        let files = self
            .load_snapshot()
            .await
            .map_err(SyncError::initialization("load file snapshot"))?;
        Ok((state, files, tag_pipe, note_pipe))
    }

    async fn load_snapshot(&self) -> Result<Vec<FileRecord>, storage::StoreError> {
        let total = self.store.count_files().await?;
        let offset = self.settings.offset.max(0);
        let limit = if self.settings.limit > 0 {
            self.settings.limit
        } else {
            (total - offset).max(0)
        };
        let files = self.store.list_files(offset, limit).await?;
        info!(total, offset, limit, selected = files.len(), "file snapshot loaded");
        Ok(files)
    }
}

async fn open_store(config: &AppConfig) -> anyhow::Result<SqliteAssetStore> {
    SqliteAssetStore::open(&config.database.path)
        .await
        .with_context(|| format!("open asset store at {}", config.database.path))
}

/// Runs a full sync against the configured store and the Pixiv source.
pub async fn run(config: &AppConfig) -> Result<RunSummary, SyncError> {
    let store = open_store(config)
        .await
        .map_err(SyncError::initialization("open asset store"))?;
    let source = PixivClient::new(config.source.to_pixiv_config())
        .map_err(SyncError::initialization("build metadata client"))?;
    Synchronizer::new(
        SyncSettings::from(config),
        Arc::new(store),
        Arc::new(source),
    )
    .run()
    .await
}

/// Runs only the artist restructuring pass.
pub async fn run_regroup(config: &AppConfig) -> anyhow::Result<RegroupReport> {
    let store = open_store(config).await?;
    let variant = store.detect_schema_variant().await?;
    if variant != SchemaVariant::Hierarchical {
        anyhow::bail!("artist restructuring needs the hierarchical schema, found {variant}");
    }
    Ok(regroup::regroup_artist_tags(&store).await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub variant: SchemaVariant,
    pub counts: StoreCounts,
}

/// Reports the detected layout and row counts without changing anything.
pub async fn inspect(config: &AppConfig) -> anyhow::Result<Inspection> {
    let store = open_store(config).await?;
    let variant = store.detect_schema_variant().await?;
    let counts = store.counts(variant).await?;
    Ok(Inspection { variant, counts })
}
