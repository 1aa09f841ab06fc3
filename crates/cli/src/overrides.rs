use clap::Args;
use tagsync_core::config::AppConfig;

/// Flags of the `sync` command that override configuration values.
#[derive(Debug, Default, Clone, Args)]
pub struct SyncArgs {
    /// Do not run the tag pipeline
    #[arg(long)]
    pub no_tags: bool,
    /// Do not run the note pipeline
    #[arg(long)]
    pub no_notes: bool,
    /// Refetch files that already have tags or a note
    #[arg(long)]
    pub no_skip_existing: bool,
    /// First file to process
    #[arg(long)]
    pub offset: Option<i64>,
    /// Number of files to process (0 = all remaining)
    #[arg(long)]
    pub limit: Option<i64>,
    /// Tag worker count
    #[arg(long)]
    pub tag_workers: Option<usize>,
    /// Note worker count
    #[arg(long)]
    pub note_workers: Option<usize>,
    /// Override database.path
    #[arg(long)]
    pub database: Option<String>,
}

impl SyncArgs {
    pub fn apply(&self, cfg: &mut AppConfig) {
        if self.no_tags {
            cfg.sync.write_tags = false;
        }
        if self.no_notes {
            cfg.sync.write_notes = false;
        }
        if self.no_skip_existing {
            cfg.sync.skip_existing = false;
        }
        if let Some(offset) = self.offset {
            cfg.sync.offset = offset;
        }
        if let Some(limit) = self.limit {
            cfg.sync.limit = limit;
        }
        if let Some(n) = self.tag_workers {
            cfg.sync.tag_workers = n;
        }
        if let Some(n) = self.note_workers {
            cfg.sync.note_workers = n;
        }
        if let Some(path) = &self.database {
            cfg.database.path = path.clone();
        }
    }
}
