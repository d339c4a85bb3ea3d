//! Clap derive structures for the `buildwatch` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// buildwatch -- build status dashboard for CI servers
#[derive(Debug, Parser)]
#[command(
    name = "buildwatch",
    version,
    about = "Watch continuous integration builds from the command line",
    long_about = "Polls the configured CI services and shows which builds are broken,\n\
        running, or failing to update. Services are stored in a TOML config file\n\
        and edited with the `config` subcommands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "BUILDWATCH_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "BUILDWATCH_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "BUILDWATCH_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "BUILDWATCH_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the configured services and show build status until Ctrl-C
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// List the supported service types
    Services,

    /// Discover the projects a CI server offers
    #[command(alias = "p")]
    Projects(ProjectsArgs),

    /// Inspect and edit the stored configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Print the view once every service has started, then exit
    /// (non-zero when builds are broken)
    #[arg(long)]
    pub once: bool,

    /// Hide the event log
    #[arg(long)]
    pub no_events: bool,
}

// ── Projects ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProjectsArgs {
    /// Service type (see `buildwatch services`)
    #[arg(long = "type", short = 't', default_value = "jenkins")]
    pub service_type: String,

    /// Server URL
    #[arg(long, short = 'u')]
    pub url: String,

    /// Username for basic authentication
    #[arg(long)]
    pub username: Option<String>,

    /// Password or API token (prompted when --username is given without it)
    #[arg(long, env = "BUILDWATCH_PASSWORD", hide_env = true)]
    pub password: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the configured services and view settings
    Show,

    /// Print the config file location
    Path,

    /// Add a service, or replace the one with the same name
    Add {
        /// Service name
        name: String,

        /// Service type
        #[arg(long = "type", short = 't', default_value = "jenkins")]
        service_type: String,

        /// Server URL
        #[arg(long, short = 'u')]
        url: String,

        /// Projects to watch, in display order
        #[arg(long, short = 'p', value_delimiter = ',')]
        projects: Vec<String>,

        /// Username for basic authentication
        #[arg(long)]
        username: Option<String>,

        /// Password or API token
        #[arg(long)]
        password: Option<String>,

        /// Polling interval, seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Enable a service
    Enable { name: String },

    /// Disable a service without removing it
    Disable { name: String },

    /// Remove a service
    Remove { name: String },

    /// Rename a service
    Rename { old_name: String, new_name: String },

    /// Reorder services, or the projects of one service with --service
    Order {
        /// Names in the desired order; unnamed entries keep their place after them
        #[arg(required = true)]
        names: Vec<String>,

        /// Reorder this service's projects instead
        #[arg(long, short = 's')]
        service: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
