use anyhow::Result;
use clap::{Parser, Subcommand};
use tagsync_cli::overrides::SyncArgs;
use tagsync_cli::report;
use tagsync_core::config;
use tagsync_core::pipeline;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tagsync")]
#[command(about = "Sync remote tags and descriptions into a local asset library", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch tags and notes for every file in the library
    Sync {
        #[command(flatten)]
        args: SyncArgs,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Group flat `Artist:` tags under a shared parent tag
    Regroup {
        /// Override database.path
        #[arg(long)]
        database: Option<String>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Show the detected schema and row counts
    Inspect {
        /// Override database.path
        #[arg(long)]
        database: Option<String>,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Print the default configuration as TOML
    DefaultConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::DefaultConfig = cli.command {
        print!("{}", config::default_toml()?);
        return Ok(());
    }
    let mut cfg = config::load(cli.config.as_deref())?;
    tracing::debug!(database = %cfg.database.path, "configuration loaded");

    match cli.command {
        Commands::Sync { args, json } => {
            args.apply(&mut cfg);
            let summary = pipeline::run(&cfg).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", report::render_summary(&summary));
            }
        }
        Commands::Regroup { database, json } => {
            if let Some(path) = database {
                cfg.database.path = path;
            }
            let outcome = pipeline::run_regroup(&cfg).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", report::regroup_line(&outcome));
            }
        }
        Commands::Inspect { database, json } => {
            if let Some(path) = database {
                cfg.database.path = path;
            }
            let inspection = pipeline::inspect(&cfg).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inspection)?);
            } else {
                println!("{}", report::render_inspection(&inspection));
            }
        }
        Commands::DefaultConfig => {}
    }
    Ok(())
}
