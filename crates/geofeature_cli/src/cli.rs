use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "geofeature")]
#[command(about = "Reconcile project GeoJSON features against a SQLite store")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// SQLite database file
    #[arg(long, global = true, env = "GEOFEATURE_DB", default_value = "geofeature.db")]
    pub db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "GEOFEATURE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for rolling log files; logging stays off when unset
    #[arg(long, global = true, env = "GEOFEATURE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replace a project's features with a FeatureCollection
    Update(InputArgs),
    /// Show what `update` would change without writing
    Plan(InputArgs),
    /// Print a project's stored features as a FeatureCollection
    Features(ProjectArgs),
    /// Check that the core library is linked
    Ping,
}

#[derive(clap::Args)]
pub struct ProjectArgs {
    /// Project id
    #[arg(short, long)]
    pub project: i64,
}

#[derive(clap::Args)]
pub struct InputArgs {
    /// Project id
    #[arg(short, long)]
    pub project: i64,
    /// GeoJSON FeatureCollection file, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    pub input: String,
}
