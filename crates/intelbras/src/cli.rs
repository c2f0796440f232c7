//! Clap derive structures for the `intelbras` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// intelbras -- door control and access log for Intelbras controllers
#[derive(Debug, Parser)]
#[command(
    name = "intelbras",
    version,
    about = "Control Intelbras access controllers from the command line",
    long_about = "Open doors, read door sensors, and pull the access record log\n\
        from Intelbras access controllers over their HTTP CGI interface.",
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
    /// Device profile to use
    #[arg(long, short = 'p', env = "INTELBRAS_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Device address or URL (overrides profile)
    #[arg(long, env = "INTELBRAS_HOST", global = true)]
    pub host: Option<String>,

    /// Device username (overrides profile)
    #[arg(long, short = 'u', env = "INTELBRAS_USERNAME", global = true)]
    pub username: Option<String>,

    /// Device password (overrides profile)
    #[arg(long, env = "INTELBRAS_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// Door channel for open/status
    #[arg(long, env = "INTELBRAS_CHANNEL", global = true)]
    pub channel: Option<u32>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "INTELBRAS_OUTPUT",
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

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "INTELBRAS_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "INTELBRAS_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Seconds between event polls (5-300)
    #[arg(long, env = "INTELBRAS_POLL_INTERVAL", global = true)]
    pub poll_interval: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Trigger the door relay
    OpenDoor,

    /// Read the door sensor state
    Status,

    /// Query the access record log for a time window
    Events(EventsArgs),

    /// Poll the device and print new access events as JSON lines
    Watch,

    /// Show device identification
    Info,

    /// Check that the device is reachable and accepts the credentials
    Check,

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Window start: epoch seconds, RFC 3339, or relative (30m, 2h, 1d)
    #[arg(long, default_value = "1h")]
    pub since: String,

    /// Window end: epoch seconds, RFC 3339, relative, or "now"
    #[arg(long, default_value = "now")]
    pub until: String,

    /// Fail on malformed records instead of skipping them
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create or update a profile (prompts for anything not given)
    Init(InitArgs),

    /// Display the current configuration (passwords redacted)
    Show,

    /// Print the config file location
    Path,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Profile name
    #[arg(long)]
    pub name: Option<String>,

    /// Environment variable that holds the password (instead of storing it)
    #[arg(long)]
    pub password_env: Option<String>,

    /// Stable identifier for published events
    #[arg(long)]
    pub device_id: Option<String>,

    /// Make this the default profile
    #[arg(long)]
    pub set_default: bool,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
