//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::sync::DEFAULT_PAGE_SIZE;

pub mod commands;

/// parsesync - keep a local SQLite database in sync with Parse
#[derive(Parser, Debug)]
#[command(name = "parsesync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.parsesync/config.json)
    #[arg(long, global = true, env = "PARSESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (default: config "database", then ~/.parsesync/data/parsesync.db)
    #[arg(long, global = true, env = "PARSESYNC_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a Parse export file ({"results": [...]})
    Import(ImportArgs),

    /// Pull objects updated on Parse since the last pull
    Pull(PullArgs),

    /// Push local records to Parse
    Push(PushArgs),

    /// Delete a record locally and on Parse
    Delete {
        /// Record kind
        kind: String,

        /// Parse object id
        object_id: String,
    },

    /// Show per-kind record counts and pull cursors
    Status,

    /// List configured record kinds and their fields
    Kinds,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Snapshot file
    pub file: PathBuf,

    /// Record kind (default: file name before the first '.')
    #[arg(short, long)]
    pub model: Option<String>,
}

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Record kind to pull
    #[arg(required_unless_present = "all")]
    pub kind: Option<String>,

    /// Pull every configured kind, pointer targets first
    #[arg(long, conflicts_with = "kind")]
    pub all: bool,

    /// Objects per request
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Record kind to push
    pub kind: String,

    /// Push a single record by Parse object id
    #[arg(long)]
    pub id: Option<String>,
}
