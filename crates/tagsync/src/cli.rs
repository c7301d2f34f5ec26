//! Clap derive structures for the `tagsync` CLI.
//!
//! Defines the command tree, global flags, and shared types. Also compiled
//! by `build.rs` for man pages, so it may only depend on clap.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// tagsync -- watch and drive PLC tags through a tag gateway
#[derive(Debug, Parser)]
#[command(
    name = "tagsync",
    version,
    about = "Watch and control PLC variables through a tag gateway",
    long_about = "Subscribes to live variable updates over the gateway's update stream,\n\
        and reads, writes, toggles or pulses variables through its\n\
        request/response endpoints.",
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
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "TAGSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway URL (overrides profile)
    #[arg(long, short = 's', env = "TAGSYNC_SERVER", global = true)]
    pub server: Option<String>,

    /// Device for variables (overrides profile, default plc_001)
    #[arg(long, short = 'd', env = "TAGSYNC_DEVICE", global = true)]
    pub device: Option<String>,

    /// Bearer token for the gateway
    #[arg(long, env = "TAGSYNC_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TAGSYNC_OUTPUT",
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

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "TAGSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "TAGSYNC_TIMEOUT", global = true)]
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
    /// Plain text, one value per line (scripting)
    Plain,
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
    /// Stream live updates for one or more variables
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Read a variable through the gateway
    #[command(alias = "r")]
    Read(ReadArgs),

    /// Write a value to a variable
    Write(WriteArgs),

    /// Flip a boolean control variable
    Toggle(ToggleArgs),

    /// Write true, hold, then write false
    Pulse(PulseArgs),

    /// Show gateway statistics
    Stats,

    /// Subscribe to variables and report which the server confirms
    #[command(alias = "subs")]
    Subscriptions(SubscriptionsArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

impl Command {
    /// Whether the command needs the live update stream.
    pub fn needs_stream(&self) -> bool {
        matches!(self, Self::Watch(_) | Self::Subscriptions(_))
    }
}

// ── Variable commands ────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Variables to watch (e.g. M0.0 DB1.speed)
    #[arg(required = true)]
    pub variables: Vec<String>,

    /// Exit after this many updates
    #[arg(long, short = 'n')]
    pub count: Option<u64>,

    /// Exit after this many seconds
    #[arg(long)]
    pub duration: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Variable to read
    pub variable: String,

    /// Ask the gateway to bypass its cache and read the PLC
    #[arg(long)]
    pub fresh: bool,
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Variable to write
    pub variable: String,

    /// Value to write (true/false, integer, real, or text)
    pub value: String,

    /// IEC type the value must parse as (BOOL, INT, REAL, STRING, ...)
    #[arg(long = "type", short = 't')]
    pub declared_type: Option<String>,
}

#[derive(Debug, Args)]
pub struct ToggleArgs {
    /// Control variable to flip
    pub variable: String,

    /// Read-only variable that reflects the real state
    #[arg(long, short = 'f')]
    pub feedback: Option<String>,
}

#[derive(Debug, Args)]
pub struct PulseArgs {
    /// Control variable to pulse
    pub variable: String,

    /// Hold time in milliseconds (default from config, 500)
    #[arg(long)]
    pub ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct SubscriptionsArgs {
    /// Variables to subscribe to
    #[arg(required = true)]
    pub variables: Vec<String>,

    /// Seconds to wait for server confirmations
    #[arg(long, default_value = "3")]
    pub wait: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile
    Init {
        /// Profile name
        #[arg(long, default_value = "default")]
        name: String,

        /// Gateway URL
        #[arg(long)]
        server: String,

        /// Default device for the profile
        #[arg(long)]
        device: Option<String>,
    },

    /// Display current configuration (tokens masked)
    Show,

    /// Print the config file path
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a token in the system keyring
    SetToken {
        /// Token value
        token: String,
    },

    /// Remove a stored token from the system keyring
    DeleteToken,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
