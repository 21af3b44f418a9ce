//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use shift_core::ClockEventType;

/// Work-time tracking.
///
/// Clock in and out, take breaks, and review worked hours per week.
/// Admins can review every worker's records and export them.
#[derive(Debug, Parser)]
#[command(name = "shift", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the verified token payload (JSON) identifying the caller.
    #[arg(long, global = true)]
    pub claims: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record a clock event.
    Clock {
        /// What to record.
        #[arg(value_enum)]
        action: ClockAction,

        /// Client IP address to store with the event.
        #[arg(long)]
        ip: Option<String>,

        /// Client user agent to store with the event.
        #[arg(long)]
        user_agent: Option<String>,

        /// Extra JSON metadata to store with the event.
        #[arg(long)]
        meta: Option<String>,

        /// Output the recorded event as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the current clock status.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List your clock events as JSONL, newest first.
    Events {
        /// Only events at or after this time (ISO 8601 or "2 days ago").
        #[arg(long)]
        from: Option<String>,

        /// Only events at or before this time (ISO 8601 or "2 days ago").
        #[arg(long)]
        to: Option<String>,
    },

    /// Show worked hours per week, net of breaks.
    Summary {
        /// Only events at or after this time (ISO 8601 or "2 days ago").
        #[arg(long)]
        from: Option<String>,

        /// Only events at or before this time (ISO 8601 or "2 days ago").
        #[arg(long)]
        to: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the user resolved from the token claims.
    Whoami {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Admin-only commands.
    #[command(subcommand)]
    Admin(AdminCommand),
}

/// Admin subcommands.
#[derive(Debug, Subcommand)]
pub enum AdminCommand {
    /// List all users.
    Users {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List all clock events as JSONL, newest first.
    Events {
        /// Only events of this user.
        #[arg(long)]
        user_id: Option<i64>,

        /// Only events at or after this time.
        #[arg(long)]
        from: Option<String>,

        /// Only events at or before this time.
        #[arg(long)]
        to: Option<String>,
    },

    /// Show the current status of every user.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export clock events.
    Export {
        /// Output format.
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only events of this user.
        #[arg(long)]
        user_id: Option<i64>,

        /// Only events at or after this time.
        #[arg(long)]
        from: Option<String>,

        /// Only events at or before this time.
        #[arg(long)]
        to: Option<String>,
    },

    /// Show recent admin audit log entries.
    Audit {
        /// Maximum number of entries.
        #[arg(long, default_value_t = 100)]
        limit: usize,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Enable or disable a user.
    SetActive {
        /// The user ID.
        user_id: i64,

        /// `true` to enable, `false` to disable.
        #[arg(action = ArgAction::Set)]
        active: bool,
    },
}

/// Clock actions as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClockAction {
    In,
    Out,
    PauseStart,
    PauseEnd,
}

impl From<ClockAction> for ClockEventType {
    fn from(action: ClockAction) -> Self {
        match action {
            ClockAction::In => Self::In,
            ClockAction::Out => Self::Out,
            ClockAction::PauseStart => Self::PauseStart,
            ClockAction::PauseEnd => Self::PauseEnd,
        }
    }
}

/// Export file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}
