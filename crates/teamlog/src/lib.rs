//! `teamlog` - Team attendance tracking
//!
//! This library keeps a roster of members and positions, resolves scanned
//! identifiers or typed names to members, and records every check-in and
//! check-out in an append-only history.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod attendance;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod model;
pub mod resolver;
pub mod roster;
pub mod seed;
pub mod storage;

pub use attendance::QuickCheckIn;
pub use config::Config;
pub use error::{Error, Result};
pub use identity::{IdentityDigest, IdentityHash};
pub use logging::init_logging;
pub use model::{AttendanceEvent, EventKind, Member, Position, PositionSummary};
pub use resolver::Resolution;
pub use roster::{MemberInput, MemberUpdate, Roster};
pub use storage::{MemberFilter, RosterStats, Storage, Transition};
