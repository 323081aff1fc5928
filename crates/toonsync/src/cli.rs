//! Clap derive structures for the `toonsync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use toonsync_config::TokenStoreKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// toonsync -- track the webtoons you read from the command line
#[derive(Debug, Parser)]
#[command(
    name = "toonsync",
    version,
    about = "Track your webtoon reading list from the command line",
    long_about = "Command-line client for the webtoon tracker.\n\n\
        Sign in once; the session is kept in the configured token store and\n\
        renewed automatically when the access token expires.",
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
    /// Server profile to use
    #[arg(long, short = 'p', env = "TOONSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, env = "TOONSYNC_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Where session tokens are kept (overrides profile)
    #[arg(long, env = "TOONSYNC_TOKEN_STORE", global = true)]
    pub token_store: Option<TokenStoreKind>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "TOONSYNC_OUTPUT",
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

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "TOONSYNC_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "TOONSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
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

#[derive(Debug, Clone, ValueEnum)]
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
    /// Sign in and keep the session
    Login(LoginArgs),

    /// Create an account and sign in
    Register(RegisterArgs),

    /// Sign out and forget stored tokens
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List your webtoons
    #[command(alias = "ls")]
    List(ListArgs),

    /// Add a webtoon
    Add(AddArgs),

    /// Change a webtoon's fields
    Edit(EditArgs),

    /// Move a webtoon's chapter forward or back
    #[command(alias = "ch")]
    Chapter(ChapterArgs),

    /// Delete a webtoon
    #[command(alias = "rm")]
    Delete(DeleteArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Session ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct LoginArgs {
    /// Username (defaults to the profile's username, then prompts)
    #[arg(long, short = 'u')]
    pub username: Option<String>,
}

#[derive(Debug, Args)]
pub struct RegisterArgs {
    /// New username
    #[arg(long, short = 'u')]
    pub username: String,

    /// Email address
    #[arg(long, short = 'e')]
    pub email: String,
}

// ── Listing ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Page to show (server page size)
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Server-side search (title, type, status, language)
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Fetch all pages automatically
    #[arg(long, short = 'a', conflicts_with = "page")]
    pub all: bool,
}

// ── Mutations ────────────────────────────────────────────────────────

/// Writable webtoon fields. On `edit`, unset flags keep the current value.
#[derive(Debug, Args)]
pub struct WebtoonFields {
    /// Format, e.g. manhwa, manga, webtoon
    #[arg(long = "type", short = 't')]
    pub kind: Option<String>,

    /// Language code
    #[arg(long, short = 'l')]
    pub language: Option<String>,

    /// Rating (0-5)
    #[arg(long, short = 'r')]
    pub rating: Option<f64>,

    /// Current chapter
    #[arg(long, short = 'c')]
    pub chapter: Option<u32>,

    /// Link to the series
    #[arg(long)]
    pub link: Option<String>,

    /// Reading status, e.g. reading, completed, dropped
    #[arg(long)]
    pub status: Option<String>,

    /// Last read date (YYYY-MM-DD)
    #[arg(long)]
    pub last_read_date: Option<String>,

    /// Free-form comment
    #[arg(long)]
    pub comment: Option<String>,

    /// Cover image URL
    #[arg(long)]
    pub image_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Title of the webtoon
    #[arg(required_unless_present = "from_file")]
    pub title: Option<String>,

    #[command(flatten)]
    pub fields: WebtoonFields,

    /// Read the full payload from a JSON file
    #[arg(long, short = 'F', conflicts_with = "title")]
    pub from_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Webtoon id
    pub id: u64,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    #[command(flatten)]
    pub fields: WebtoonFields,
}

#[derive(Debug, Args)]
pub struct ChapterArgs {
    /// Webtoon id
    pub id: u64,

    /// Chapters to move by, e.g. 1 or -1
    #[arg(allow_negative_numbers = true, default_value = "1")]
    pub delta: i32,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Webtoon id
    pub id: u64,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current resolved configuration
    Show,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },

    /// Store a login password in the system keyring
    SetPassword,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
