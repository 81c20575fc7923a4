//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Channel reconciliation for multi-provider LLM gateways.
#[derive(Parser, Debug)]
#[command(name = "chansync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    // === Global flags ===
    /// Gateway base URL (overrides config)
    #[arg(long, value_name = "URL", global = true)]
    pub gateway_url: Option<String>,

    /// Database file path (overrides config)
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage upstream providers
    #[command(subcommand)]
    Provider(ProviderCommand),

    /// Manage price groups
    #[command(subcommand)]
    Group(GroupCommand),

    /// Fetch pricing feeds and upsert model offers
    Import(ImportArgs),

    /// List stored model offers with computed prices
    Offers(OffersArgs),

    /// Probe offer availability and record results
    Probe(ProbeArgs),

    /// Consolidate offers into channels and push them to the gateway
    Sync(SyncArgs),

    /// Print the alias mapping for the gateway's current model set
    Aliases,

    /// Generate shell completions
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Provider management subcommands.
#[derive(Subcommand, Debug)]
pub enum ProviderCommand {
    /// Register an upstream provider
    Add {
        /// Unique provider name
        name: String,

        /// Provider API base URL
        #[arg(long)]
        url: String,

        /// Provider-level cost multiplier
        #[arg(long, default_value_t = 1.0)]
        ratio: f64,

        /// Pricing feed schema (flat, grouped, columns, group-price)
        #[arg(long)]
        schema: String,
    },

    /// List registered providers
    List,

    /// Remove a provider and its price groups
    Remove {
        /// Provider name
        name: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// Price group management subcommands.
#[derive(Subcommand, Debug)]
pub enum GroupCommand {
    /// Register a price group under a provider
    Add {
        /// Group name as it appears in the vendor's price tables
        name: String,

        /// Owning provider name
        #[arg(long)]
        provider: String,

        /// Group-level cost multiplier
        #[arg(long, default_value_t = 1.0)]
        ratio: f64,

        /// Access key for this tier
        #[arg(long)]
        key: String,
    },

    /// List registered groups
    List {
        /// Only groups under this provider
        #[arg(long)]
        provider: Option<String>,
    },

    /// Remove a group
    Remove {
        /// Group name
        name: String,

        /// Owning provider name
        #[arg(long)]
        provider: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

/// Arguments for the `import` command.
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Only import this provider
    #[arg(long, value_name = "NAME")]
    pub provider: Option<String>,
}

/// Arguments for the `offers` command.
#[derive(Parser, Debug)]
pub struct OffersArgs {
    /// Substring filter on model name
    #[arg(long, value_name = "FILTER")]
    pub model: Option<String>,
}

/// Arguments for the `probe` command.
#[derive(Parser, Debug)]
pub struct ProbeArgs {
    /// Substring filter on model name
    #[arg(long, value_name = "FILTER")]
    pub model: Option<String>,
}

/// Arguments for the `sync` command.
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Print the consolidation plan without touching the gateway
    #[arg(long)]
    pub dry_run: bool,

    /// Delete residual channels not covered by the consolidation
    #[arg(long)]
    pub prune: bool,

    /// Skip the confirmation prompt for --prune
    #[arg(long)]
    pub yes: bool,
}
