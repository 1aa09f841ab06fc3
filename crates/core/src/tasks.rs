use crate::buffer::BufferKind;
use crate::state::SyncState;
use crate::stats::{FailureKind, Statistics, TaskOutcome};
use providers::MetadataSource;
use std::fmt;
use std::sync::Arc;
use storage::{FileRecord, NoteRecord};
use tracing::{debug, info, warn};

/// Shared handles for one pipeline's tasks.
#[derive(Clone)]
pub struct TaskContext {
    pub state: Arc<SyncState>,
    pub source: Arc<dyn MetadataSource>,
    pub stats: Arc<Statistics>,
    pub skip_existing: bool,
}

/// 1-based position of a file in the snapshot, used in progress logs.
#[derive(Debug, Clone, Copy)]
pub struct Position {
    pub index: usize,
    pub total: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}]", self.index, self.total)
    }
}

pub async fn sync_tags(ctx: TaskContext, file: FileRecord, at: Position) -> TaskOutcome {
    let outcome = tag_outcome(&ctx, &file, at).await;
    ctx.stats.record(&outcome);
    outcome
}

pub async fn sync_note(ctx: TaskContext, file: FileRecord, at: Position) -> TaskOutcome {
    let outcome = note_outcome(&ctx, &file, at).await;
    ctx.stats.record(&outcome);
    outcome
}

async fn tag_outcome(ctx: &TaskContext, file: &FileRecord, at: Position) -> TaskOutcome {
    let Some(identifier) = ctx.source.extract_identifier(&file.display_name) else {
        debug!("{at} no identifier in {:?}", file.display_name);
        return TaskOutcome::Failed(FailureKind::Identifier);
    };
    if ctx.skip_existing && ctx.state.has_associations(file.id).await {
        debug!("{at} {} already tagged, skipping", file.display_name);
        return TaskOutcome::Skipped;
    }

    let tags = match ctx.source.fetch_tags(&identifier).await {
        Ok(tags) if !tags.is_empty() => tags,
        Ok(_) => {
            warn!("{at} no tags returned for {identifier}");
            return TaskOutcome::Failed(FailureKind::Empty);
        }
        Err(err) => {
            warn!("{at} fetching tags for {identifier} failed: {err}");
            return TaskOutcome::Failed(FailureKind::Unavailable);
        }
    };

    let staged = ctx.state.stage_tags(file.id, &tags).await;
    info!(
        "{at} tags staged for {} ({} tags, {} new)",
        file.display_name,
        tags.len(),
        staged.created
    );
    for kind in [BufferKind::Tags, BufferKind::Associations] {
        if let Err(err) = ctx.state.flush(kind, false).await {
            debug!("{at} flush deferred: {err}");
        }
    }
    TaskOutcome::Synced
}

async fn note_outcome(ctx: &TaskContext, file: &FileRecord, at: Position) -> TaskOutcome {
    let Some(identifier) = ctx.source.extract_identifier(&file.display_name) else {
        debug!("{at} no identifier in {:?}", file.display_name);
        return TaskOutcome::Failed(FailureKind::Identifier);
    };
    if ctx.skip_existing && ctx.state.has_note(file.id).await {
        debug!("{at} {} already has a note, skipping", file.display_name);
        return TaskOutcome::Skipped;
    }

    let record = match ctx.source.fetch_description(&identifier).await {
        Ok(record) => record,
        Err(err) => {
            warn!("{at} fetching description for {identifier} failed: {err}");
            return TaskOutcome::Failed(FailureKind::Unavailable);
        }
    };

    let origin = ctx.source.origin_url(&identifier);
    let text = format!(
        "{}\r\nOrigin:{}",
        ctx.source.format_description(&record),
        origin
    );
    ctx.state
        .stage_note(NoteRecord {
            file_id: file.id,
            text,
            origin: Some(origin),
        })
        .await;
    info!("{at} note staged for {}", file.display_name);
    if let Err(err) = ctx.state.flush(BufferKind::Notes, false).await {
        debug!("{at} flush deferred: {err}");
    }
    TaskOutcome::Synced
}
