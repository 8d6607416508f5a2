//! Storage layer for teamlog.
//!
//! This module provides `SQLite`-based persistent storage for the roster:
//! positions, members, and the attendance event log. Operations that must be
//! observed together (a flag flip and its audit event, a uniqueness check and
//! the write it guards) run inside a single immediate transaction.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identity::IdentityHash;
use crate::model::{
    format_timestamp, parse_timestamp, AttendanceEvent, EventKind, Member, Position,
    PositionSummary,
};

/// Columns selected for every member query, joined with the member's position.
const MEMBER_SELECT: &str = r"
    SELECT m.id, m.identity_hash, m.first_name, m.last_name, m.active, m.checked_in,
           m.last_updated, p.id, p.name, p.description
    FROM members m JOIN positions p ON p.id = m.position_id
";

const EVENT_SELECT: &str = r"
    SELECT id, member_id, kind, timestamp, note FROM attendance_events
";

/// Which members a listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemberFilter {
    /// Every member on the roster.
    #[default]
    All,
    /// Members whose `active` flag is set.
    Active,
    /// Members that are both active and checked in.
    Present,
}

impl MemberFilter {
    fn where_clause(self) -> &'static str {
        match self {
            Self::All => "",
            Self::Active => "WHERE m.active = 1",
            Self::Present => "WHERE m.active = 1 AND m.checked_in = 1",
        }
    }
}

/// Field values written by a member insert or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFields {
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Digest of the external identifier.
    pub identity_hash: IdentityHash,
    /// Referenced position.
    pub position_id: i64,
    /// Active flag.
    pub active: bool,
}

/// Outcome of applying a check-in or check-out to a stored member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The flag was written and an event appended.
    Recorded {
        /// The member after the write.
        member: Member,
        /// The appended audit event.
        event: AttendanceEvent,
    },
    /// The member was already in the target state and nothing was written.
    Skipped(Member),
}

impl Transition {
    /// The member as it stands after the operation.
    #[must_use]
    pub fn member(&self) -> &Member {
        match self {
            Self::Recorded { member, .. } | Self::Skipped(member) => member,
        }
    }

    /// Consume the outcome, keeping the member.
    #[must_use]
    pub fn into_member(self) -> Member {
        match self {
            Self::Recorded { member, .. } | Self::Skipped(member) => member,
        }
    }
}

/// Storage engine for the roster.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    // === Metadata ===

    /// Read a metadata value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a metadata value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            (key, value),
        )?;
        Ok(())
    }

    // === Positions ===

    /// Insert a new position.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePosition` if the name is taken, or an error if the
    /// database operation fails.
    pub fn insert_position(&self, name: &str, description: Option<&str>) -> Result<Position> {
        if self.get_position_by_name(name)?.is_some() {
            return Err(Error::DuplicatePosition(name.to_string()));
        }

        self.conn.execute(
            "INSERT INTO positions (name, description) VALUES (?1, ?2)",
            params![name, description],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!("Inserted position '{}' with id {}", name, id);
        Ok(Position {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    /// Get a position by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_position(&self, id: i64) -> Result<Option<Position>> {
        Self::fetch_position(&self.conn, id)
    }

    /// Get a position by its exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_position_by_name(&self, name: &str) -> Result<Option<Position>> {
        let position = self
            .conn
            .query_row(
                "SELECT id, name, description FROM positions WHERE name = ?1",
                [name],
                Self::row_to_position,
            )
            .optional()?;
        Ok(position)
    }

    /// List all positions with their member counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_positions(&self) -> Result<Vec<PositionSummary>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT p.id, p.name, p.description, COUNT(m.id)
            FROM positions p LEFT JOIN members m ON m.position_id = p.id
            GROUP BY p.id ORDER BY p.id
            ",
        )?;

        let positions = stmt
            .query_map([], |row| {
                Ok(PositionSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    member_count: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(positions)
    }

    /// Insert any of the default positions that are missing.
    ///
    /// Returns the number of positions inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ensure_default_positions(&self) -> Result<usize> {
        migrations::install_default_positions(&self.conn)
    }

    // === Members ===

    /// Insert a new member.
    ///
    /// The identity uniqueness check, the position check, and the insert
    /// run in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if another member holds the identity hash,
    /// `UnknownPosition` if the position does not exist, or an error if the
    /// database operation fails.
    pub fn insert_member(&mut self, fields: &MemberFields, at: DateTime<Utc>) -> Result<Member> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        Self::check_member_references(&tx, fields, None)?;

        tx.execute(
            r"
            INSERT INTO members (identity_hash, first_name, last_name, position_id, active,
                                 checked_in, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
            ",
            params![
                fields.identity_hash,
                fields.first_name,
                fields.last_name,
                fields.position_id,
                fields.active,
                format_timestamp(at),
            ],
        )?;

        let id = tx.last_insert_rowid();
        let member = Self::fetch_member(&tx, id)?
            .ok_or_else(|| Error::internal(format!("member {id} missing after insert")))?;
        tx.commit()?;

        debug!("Inserted member with id {}", id);
        Ok(member)
    }

    /// Overwrite a member's editable fields. `checked_in` is left untouched.
    ///
    /// Returns `None` if no member has the given ID.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateIdentity` if a different member holds the identity
    /// hash, `UnknownPosition` if the position does not exist, or an error if
    /// the database operation fails.
    pub fn update_member(
        &mut self,
        id: i64,
        fields: &MemberFields,
        at: DateTime<Utc>,
    ) -> Result<Option<Member>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if Self::fetch_member(&tx, id)?.is_none() {
            return Ok(None);
        }
        Self::check_member_references(&tx, fields, Some(id))?;

        tx.execute(
            r"
            UPDATE members
            SET identity_hash = ?1, first_name = ?2, last_name = ?3, position_id = ?4,
                active = ?5, last_updated = ?6
            WHERE id = ?7
            ",
            params![
                fields.identity_hash,
                fields.first_name,
                fields.last_name,
                fields.position_id,
                fields.active,
                format_timestamp(at),
                id,
            ],
        )?;

        let member = Self::fetch_member(&tx, id)?;
        tx.commit()?;
        Ok(member)
    }

    /// Delete a member and, by cascade, its attendance history.
    ///
    /// Returns the deleted member, or `None` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_member(&mut self, id: i64) -> Result<Option<Member>> {
        let tx = self.conn.transaction()?;
        let Some(member) = Self::fetch_member(&tx, id)? else {
            return Ok(None);
        };
        tx.execute("DELETE FROM members WHERE id = ?1", [id])?;
        tx.commit()?;
        Ok(Some(member))
    }

    /// Get a member by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get_member(&self, id: i64) -> Result<Option<Member>> {
        Self::fetch_member(&self.conn, id)
    }

    /// Find the member holding an identity hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn find_by_identity(&self, hash: &IdentityHash) -> Result<Option<Member>> {
        Self::fetch_member_by_identity(&self.conn, hash, None)
    }

    /// List members matching a filter, in ID order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_members(&self, filter: MemberFilter) -> Result<Vec<Member>> {
        let sql = format!("{MEMBER_SELECT} {} ORDER BY m.id", filter.where_clause());
        let mut stmt = self.conn.prepare(&sql)?;
        let members = stmt
            .query_map([], Self::row_to_member)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(members)
    }

    /// Count members matching a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_members(&self, filter: MemberFilter) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM members m {}", filter.where_clause());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count)
    }

    // === Attendance ===

    /// Apply a check-in or check-out.
    ///
    /// The `checked_in` flag, `last_updated`, and the appended event all carry
    /// the same instant `at`, and are committed together or not at all. When
    /// `skip_if_unchanged` is set and the member is already in the target
    /// state, nothing is written.
    ///
    /// Returns `None` if no member has the given ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn record_transition(
        &mut self,
        member_id: i64,
        kind: EventKind,
        at: DateTime<Utc>,
        note: Option<&str>,
        skip_if_unchanged: bool,
    ) -> Result<Option<Transition>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(current) = Self::fetch_member(&tx, member_id)? else {
            return Ok(None);
        };
        let checked_in = kind.checked_in_after();
        if skip_if_unchanged && current.checked_in == checked_in {
            debug!("Member {} already {}, skipping", member_id, kind);
            return Ok(Some(Transition::Skipped(current)));
        }

        let stamp = format_timestamp(at);
        tx.execute(
            "UPDATE members SET checked_in = ?1, last_updated = ?2 WHERE id = ?3",
            params![checked_in, stamp, member_id],
        )?;
        tx.execute(
            "INSERT INTO attendance_events (member_id, kind, timestamp, note) VALUES (?1, ?2, ?3, ?4)",
            params![member_id, kind.to_string(), stamp, note],
        )?;
        let event_id = tx.last_insert_rowid();

        let member = Self::fetch_member(&tx, member_id)?
            .ok_or_else(|| Error::internal(format!("member {member_id} vanished mid-transaction")))?;
        tx.commit()?;

        Ok(Some(Transition::Recorded {
            event: AttendanceEvent {
                id: event_id,
                member_id,
                kind,
                timestamp: member.last_updated,
                note: note.map(str::to_string),
            },
            member,
        }))
    }

    /// Set the `active` flag and stamp `last_updated`.
    ///
    /// Returns `None` if no member has the given ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn set_active(&self, id: i64, active: bool, at: DateTime<Utc>) -> Result<Option<Member>> {
        let affected = self.conn.execute(
            "UPDATE members SET active = ?1, last_updated = ?2 WHERE id = ?3",
            params![active, format_timestamp(at), id],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_member(id)
    }

    /// Flip the `active` flag and stamp `last_updated` in one statement.
    ///
    /// Returns `None` if no member has the given ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn toggle_active(&self, id: i64, at: DateTime<Utc>) -> Result<Option<Member>> {
        let affected = self.conn.execute(
            "UPDATE members SET active = NOT active, last_updated = ?1 WHERE id = ?2",
            params![format_timestamp(at), id],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_member(id)
    }

    /// Attendance events for one member, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn events_for_member(
        &self,
        member_id: i64,
        limit: Option<usize>,
    ) -> Result<Vec<AttendanceEvent>> {
        let sql = format!(
            "{EVENT_SELECT} WHERE member_id = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(params![member_id, sql_limit(limit)], Self::row_to_event)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Attendance events across all members with `since <= timestamp < until`,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn events_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<AttendanceEvent>> {
        let sql = format!(
            "{EVENT_SELECT} WHERE timestamp >= ?1 AND timestamp < ?2 ORDER BY timestamp DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let events = stmt
            .query_map(
                params![format_timestamp(since), format_timestamp(until)],
                Self::row_to_event,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(events)
    }

    /// Count all attendance events.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_events(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM attendance_events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Get roster statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<RosterStats> {
        let total_members = self.count_members(MemberFilter::All)?;
        let active_members = self.count_members(MemberFilter::Active)?;
        let present_members = self.count_members(MemberFilter::Present)?;
        let total_events = self.count_events()?;

        Ok(RosterStats {
            total_members,
            active_members,
            present_members,
            inactive_members: total_members - active_members,
            total_events,
        })
    }

    /// Run raw SQL against the connection, for installing test fixtures.
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    // === Row helpers ===

    /// Reject a member write whose identity collides with a different member
    /// or whose position does not exist.
    fn check_member_references(
        conn: &Connection,
        fields: &MemberFields,
        exclude_id: Option<i64>,
    ) -> Result<()> {
        if let Some(existing) =
            Self::fetch_member_by_identity(conn, &fields.identity_hash, exclude_id)?
        {
            warn!(
                "Identity {} already assigned to member {}",
                fields.identity_hash.short(),
                existing.id
            );
            return Err(Error::DuplicateIdentity {
                existing: Box::new(existing),
            });
        }

        if Self::fetch_position(conn, fields.position_id)?.is_none() {
            return Err(Error::UnknownPosition(fields.position_id));
        }
        Ok(())
    }

    fn fetch_member(conn: &Connection, id: i64) -> Result<Option<Member>> {
        let sql = format!("{MEMBER_SELECT} WHERE m.id = ?1");
        let member = conn
            .query_row(&sql, [id], Self::row_to_member)
            .optional()?;
        Ok(member)
    }

    fn fetch_member_by_identity(
        conn: &Connection,
        hash: &IdentityHash,
        exclude_id: Option<i64>,
    ) -> Result<Option<Member>> {
        let sql = format!("{MEMBER_SELECT} WHERE m.identity_hash = ?1 AND m.id IS NOT ?2");
        let member = conn
            .query_row(&sql, params![hash, exclude_id], Self::row_to_member)
            .optional()?;
        Ok(member)
    }

    fn fetch_position(conn: &Connection, id: i64) -> Result<Option<Position>> {
        let position = conn
            .query_row(
                "SELECT id, name, description FROM positions WHERE id = ?1",
                [id],
                Self::row_to_position,
            )
            .optional()?;
        Ok(position)
    }

    fn row_to_position(row: &Row) -> rusqlite::Result<Position> {
        Ok(Position {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
        })
    }

    /// Convert a row selected with `MEMBER_SELECT` to a Member.
    fn row_to_member(row: &Row) -> rusqlite::Result<Member> {
        Ok(Member {
            id: row.get(0)?,
            identity_hash: row.get(1)?,
            first_name: row.get(2)?,
            last_name: row.get(3)?,
            active: row.get(4)?,
            checked_in: row.get(5)?,
            last_updated: timestamp_column(row, 6)?,
            position: Position {
                id: row.get(7)?,
                name: row.get(8)?,
                description: row.get(9)?,
            },
        })
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<AttendanceEvent> {
        let kind_str: String = row.get(2)?;
        let kind = EventKind::from_db_str(&kind_str).ok_or_else(|| {
            warn!("Unknown attendance event kind: {}", kind_str);
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown event kind: {kind_str}").into(),
            )
        })?;

        Ok(AttendanceEvent {
            id: row.get(0)?,
            member_id: row.get(1)?,
            kind,
            timestamp: timestamp_column(row, 3)?,
            note: row.get(4)?,
        })
    }
}

/// Read an RFC 3339 timestamp column.
fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("invalid timestamp: {raw}").into(),
        )
    })
}

/// `SQLite` treats a negative LIMIT as unbounded.
fn sql_limit(limit: Option<usize>) -> i64 {
    limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX))
}

/// Summary counts for the roster.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RosterStats {
    /// Every member on the roster.
    pub total_members: i64,
    /// Members with the active flag set.
    pub active_members: i64,
    /// Members both active and checked in.
    pub present_members: i64,
    /// Members with the active flag cleared.
    pub inactive_members: i64,
    /// Attendance events recorded.
    pub total_events: i64,
}
