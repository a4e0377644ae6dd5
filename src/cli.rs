use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use refhunt::query::output::{OutputFormat, ResultView};

/// Find every path from a content project's root scopes to the objects you care about.
///
/// refhunt walks scenes, asset folders and settings the way the runtime would
/// load them and reports which objects reference your needles, and through what.
#[derive(Parser, Debug)]
#[command(
    name = "refhunt",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search for references to one or more needle objects.
    ///
    /// Needles are identities relative to the project root, e.g.
    /// `assets/brick.json` or `scenes/main.json#camera`.
    Search(SearchArgs),

    /// Print the result saved by the last `search --save-session`.
    Session {
        /// Path to the project root.
        path: PathBuf,

        #[arg(long, value_enum, default_value_t = ResultView::Paths)]
        view: ResultView,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },

    /// Manage the coarse dependency cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Path to the project root.
    pub path: PathBuf,

    /// Identities of the objects to find references to.
    #[arg(required = true)]
    pub needles: Vec<String>,

    /// Restrict the search to these root scopes (repeatable).
    #[arg(long = "scope")]
    pub scopes: Vec<String>,

    /// Maximum nesting of inline (unidentified) values.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Also read private members.
    #[arg(long)]
    pub non_public: bool,

    /// Only read members that are persisted.
    #[arg(long)]
    pub serializable_only: bool,

    /// Keep weak links even when nothing strong lies behind them.
    #[arg(long)]
    pub keep_weak: bool,

    /// Report every path, not one per anchor and final link.
    #[arg(long)]
    pub no_dedup: bool,

    /// Also root the reverse view at root-scope objects.
    #[arg(long)]
    pub indirect_roots: bool,

    /// Treat sub-objects of each needle as secondary needles.
    #[arg(long)]
    pub sub_objects: bool,

    #[arg(long, value_enum, default_value_t = ResultView::Paths)]
    pub view: ResultView,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
    pub format: OutputFormat,

    /// Print pass statistics after the result.
    #[arg(long)]
    pub stats: bool,

    /// Persist the result so `refhunt session` can show it later.
    #[arg(long)]
    pub save_session: bool,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Rehash every resource and rewrite the cache file.
    Rebuild {
        /// Path to the project root.
        path: PathBuf,
    },
    /// Show what the cache holds.
    Stats {
        /// Path to the project root.
        path: PathBuf,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Compact)]
        format: OutputFormat,
    },
}
