//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::storage::MemberFilter;

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Member management commands.
#[derive(Debug, Subcommand)]
pub enum MemberCommand {
    /// Add a member to the roster
    Add(MemberFieldsArgs),

    /// List members
    List {
        /// Which members to list
        #[arg(short, long, value_enum, default_value = "all")]
        filter: MemberFilterArg,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show one member
    Show {
        /// Member ID
        id: i64,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Change a member's name, identifier, position, or active flag
    Edit(MemberEditArgs),

    /// Delete a member and its attendance history
    Delete {
        /// Member ID
        id: i64,
    },

    /// Flip a member between active and inactive
    Toggle {
        /// Member ID
        id: i64,
    },

    /// Mark a member active
    Activate {
        /// Member ID
        id: i64,
    },

    /// Mark a member inactive
    Deactivate {
        /// Member ID
        id: i64,
    },
}

/// Fields supplied when adding or editing a member.
#[derive(Debug, Args)]
pub struct MemberFieldsArgs {
    /// First name
    #[arg(long)]
    pub first: String,

    /// Last name
    #[arg(long)]
    pub last: String,

    /// External identifier (badge or student number); stored hashed
    #[arg(long)]
    pub identity: String,

    /// Position name
    #[arg(short, long, default_value = "member")]
    pub position: String,
}

/// Fields changed by `member edit`; omitted fields keep their stored value.
#[derive(Debug, Args)]
pub struct MemberEditArgs {
    /// Member ID
    pub id: i64,

    /// New first name
    #[arg(long)]
    pub first: Option<String>,

    /// New last name
    #[arg(long)]
    pub last: Option<String>,

    /// New external identifier; stored hashed
    #[arg(long)]
    pub identity: Option<String>,

    /// New position name
    #[arg(short, long)]
    pub position: Option<String>,

    /// Mark the member active
    #[arg(long, conflicts_with = "inactive")]
    pub active: bool,

    /// Mark the member inactive
    #[arg(long)]
    pub inactive: bool,
}

impl MemberEditArgs {
    /// The requested `active` flag, if either switch was given.
    #[must_use]
    pub fn active_flag(&self) -> Option<bool> {
        match (self.active, self.inactive) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// Check-in and check-out arguments.
#[derive(Debug, Args)]
pub struct TransitionCommand {
    /// Member ID
    pub id: i64,

    /// Free-text note stored with the event
    #[arg(short, long)]
    pub note: Option<String>,
}

/// Resolve command arguments.
#[derive(Debug, Args)]
pub struct ResolveCommand {
    /// Identifier or part of a name
    pub text: String,

    /// Also match inactive members
    #[arg(long)]
    pub include_inactive: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Member ID
    pub id: i64,

    /// Maximum number of events (defaults to `attendance.history_limit`)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Position commands.
#[derive(Debug, Subcommand)]
pub enum PositionCommand {
    /// List positions with member counts
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Add a position
    Add {
        /// Position name
        name: String,

        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Member filter argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum MemberFilterArg {
    /// Every member
    #[default]
    All,
    /// Active members
    Active,
    /// Active, checked-in members
    Present,
}

impl From<MemberFilterArg> for MemberFilter {
    fn from(arg: MemberFilterArg) -> Self {
        match arg {
            MemberFilterArg::All => Self::All,
            MemberFilterArg::Active => Self::Active,
            MemberFilterArg::Present => Self::Present,
        }
    }
}
