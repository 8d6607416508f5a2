//! `SQLite` schema definitions for teamlog.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the positions table.
pub const CREATE_POSITIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS positions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT
)
";

/// SQL statement to create the members table.
pub const CREATE_MEMBERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    identity_hash TEXT NOT NULL UNIQUE,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    position_id INTEGER NOT NULL REFERENCES positions(id),
    active INTEGER NOT NULL DEFAULT 1,
    checked_in INTEGER NOT NULL DEFAULT 0,
    last_updated TEXT NOT NULL
)
";

/// SQL statement to create the attendance events table.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS attendance_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
    kind TEXT NOT NULL CHECK (kind IN ('checkin', 'checkout')),
    timestamp TEXT NOT NULL,
    note TEXT
)
";

/// SQL statement to create an index on `position_id` for member counts.
pub const CREATE_MEMBER_POSITION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_members_position ON members(position_id)
";

/// SQL statement to create an index for per-member history queries.
pub const CREATE_EVENT_MEMBER_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_member ON attendance_events(member_id, timestamp DESC)
";

/// SQL statement to create an index on timestamp for daily reports.
pub const CREATE_EVENT_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON attendance_events(timestamp DESC)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_POSITIONS_TABLE,
    CREATE_MEMBERS_TABLE,
    CREATE_EVENTS_TABLE,
    CREATE_MEMBER_POSITION_INDEX,
    CREATE_EVENT_MEMBER_INDEX,
    CREATE_EVENT_TIMESTAMP_INDEX,
    CREATE_METADATA_TABLE,
];

/// Positions installed when a database is first created: name and description.
pub const DEFAULT_POSITIONS: &[(&str, &str)] = &[
    ("member", "Team member"),
    ("lead", "Team lead"),
    ("mentor", "Mentor"),
    ("coach", "Coach"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_members_table_enforces_identity_uniqueness() {
        assert!(CREATE_MEMBERS_TABLE.contains("identity_hash TEXT NOT NULL UNIQUE"));
        assert!(CREATE_MEMBERS_TABLE.contains("REFERENCES positions(id)"));
    }

    #[test]
    fn test_events_cascade_on_member_delete() {
        assert!(CREATE_EVENTS_TABLE.contains("ON DELETE CASCADE"));
        assert!(CREATE_EVENTS_TABLE.contains("kind TEXT NOT NULL"));
    }

    #[test]
    fn test_default_positions() {
        let names: Vec<&str> = DEFAULT_POSITIONS.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["member", "lead", "mentor", "coach"]);
    }
}
