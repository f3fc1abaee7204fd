use std::path::PathBuf;

use checkin_core::{EventId, ParticipantId, RegformId};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "checkin")]
#[command(about = "Check in event participants, online or offline")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a registration form to the local cache and sync it
    Add {
        /// Indico server URL (defaults to the configured server)
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        /// Event id on the server
        #[arg(long, value_name = "ID")]
        event: i64,
        /// Registration form id on the server
        #[arg(long, value_name = "ID")]
        regform: i64,
        /// Only record the form locally
        #[arg(long)]
        no_sync: bool,
    },
    /// List cached events
    Events {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached registration forms of an event
    Regforms {
        /// Local event id
        event: EventId,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a registration form and its participants
    Show {
        /// Local event id
        event: EventId,
        /// Local registration form id
        regform: RegformId,
        /// Render the cached state without fetching updates
        #[arg(long)]
        no_sync: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow a registration form live, re-syncing periodically
    Watch {
        /// Local event id
        event: EventId,
        /// Local registration form id
        regform: RegformId,
        /// Seconds between syncs (defaults to the configured interval)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Check a participant in
    CheckIn {
        /// Local event id
        event: EventId,
        /// Local registration form id
        regform: RegformId,
        /// Local participant id
        participant: ParticipantId,
        /// Revert a previous check-in
        #[arg(long)]
        undo: bool,
    },
    /// Remove a registration form from the local cache
    Remove {
        /// Local event id
        event: EventId,
        /// Local registration form id
        regform: RegformId,
        /// Also remove the form's cached participants
        #[arg(long)]
        cascade: bool,
    },
    /// Refresh a registration form from the server
    Sync {
        /// Local event id
        event: EventId,
        /// Local registration form id
        regform: RegformId,
    },
    /// Manage API tokens
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Inspect or change CLI settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Store an API token for a server in the keychain
    Login {
        /// Indico server URL (defaults to the configured server)
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        /// Personal API token
        #[arg(long, value_name = "TOKEN")]
        token: String,
    },
    /// Show whether a token is available for a server
    Status {
        /// Indico server URL (defaults to the configured server)
        #[arg(long, value_name = "URL")]
        server: Option<String>,
    },
    /// Remove the stored token for a server
    Logout {
        /// Indico server URL (defaults to the configured server)
        #[arg(long, value_name = "URL")]
        server: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current configuration
    Show,
    /// Update configuration values
    Set {
        /// Default Indico server URL
        #[arg(long, value_name = "URL")]
        server: Option<String>,
        /// HTTP timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Seconds between syncs in `checkin watch`
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}
