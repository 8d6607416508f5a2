//! Command-line interface for teamlog.
//!
//! This module provides the CLI structure and command handlers for the
//! `teamlog` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, HistoryCommand, MemberCommand, MemberEditArgs, MemberFieldsArgs,
    MemberFilterArg, PositionCommand, ResolveCommand, StatusCommand, TransitionCommand,
};

/// teamlog - Track who is on the team and who is in the room
///
/// Keeps a roster of members and positions, checks members in and out by
/// ID, scanned identifier, or name, and keeps the full attendance history.
#[derive(Debug, Parser)]
#[command(name = "teamlog")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the database and default positions
    Init,

    /// Add the sample roster
    Seed,

    /// Show roster counts and who is present
    Status(StatusCommand),

    /// Manage members
    #[command(subcommand)]
    Member(MemberCommand),

    /// Check a member in
    Checkin(TransitionCommand),

    /// Check a member out
    Checkout(TransitionCommand),

    /// Check out every present member
    CheckoutAll,

    /// Check in by scanned identifier or name
    Quick {
        /// Identifier or part of a name
        text: String,
    },

    /// Find a member by identifier or name without changing anything
    Resolve(ResolveCommand),

    /// Show a member's attendance history
    History(HistoryCommand),

    /// Show today's attendance events
    Today {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Manage positions
    #[command(subcommand)]
    Position(PositionCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
