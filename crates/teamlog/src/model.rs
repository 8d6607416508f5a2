//! Core roster types for teamlog.
//!
//! This module defines the records the roster persists: positions, members,
//! and the append-only attendance events produced by check-in and check-out.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::identity::IdentityHash;

/// A role category members are assigned to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Unique identifier assigned by storage.
    pub id: i64,
    /// Unique, case-sensitive name (e.g. `member`, `lead`).
    pub name: String,
    /// Optional human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// A position together with how many members currently hold it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSummary {
    /// Position identifier.
    pub id: i64,
    /// Position name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Number of members referencing this position.
    pub member_count: i64,
}

/// A trackable person on the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Unique identifier assigned by storage.
    pub id: i64,
    /// Digest of the member's external identifier.
    pub identity_hash: IdentityHash,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// The position this member holds.
    pub position: Position,
    /// Whether the member is on the active roster.
    pub active: bool,
    /// Whether the member is currently checked in.
    pub checked_in: bool,
    /// When this record last changed.
    pub last_updated: DateTime<Utc>,
}

impl Member {
    /// First and last name joined by a space.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Active and checked in: counted as present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.active && self.checked_in
    }

    /// Case-insensitive substring match against the first name, the last
    /// name, or the full name.
    #[must_use]
    pub fn name_contains(&self, fragment: &str) -> bool {
        let needle = fragment.to_lowercase();
        [&self.first_name, &self.last_name, &self.full_name()]
            .iter()
            .any(|name| name.to_lowercase().contains(&needle))
    }
}

impl std::fmt::Display for Member {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.first_name, self.last_name)
    }
}

/// Flat representation of a member for API and JSON output.
#[derive(Debug, Serialize)]
struct MemberView<'a> {
    id: i64,
    first_name: &'a str,
    last_name: &'a str,
    full_name: String,
    identity_hash: &'a IdentityHash,
    position: &'a str,
    position_id: i64,
    active: bool,
    checked_in: bool,
    last_updated: String,
}

impl Serialize for Member {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MemberView {
            id: self.id,
            first_name: &self.first_name,
            last_name: &self.last_name,
            full_name: self.full_name(),
            identity_hash: &self.identity_hash,
            position: &self.position.name,
            position_id: self.position.id,
            active: self.active,
            checked_in: self.checked_in,
            last_updated: format_timestamp(self.last_updated),
        }
        .serialize(serializer)
    }
}

/// The kind of attendance transition an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// The member checked in.
    Checkin,
    /// The member checked out.
    Checkout,
}

impl EventKind {
    /// Parse the stored representation.
    #[must_use]
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "checkin" => Some(Self::Checkin),
            "checkout" => Some(Self::Checkout),
            _ => None,
        }
    }

    /// Value of `checked_in` after a transition of this kind.
    #[must_use]
    pub fn checked_in_after(self) -> bool {
        matches!(self, Self::Checkin)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checkin => f.pad("checkin"),
            Self::Checkout => f.pad("checkout"),
        }
    }
}

/// Immutable log entry for a single check-in or check-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    /// Unique identifier assigned by storage.
    pub id: i64,
    /// The member this event belongs to.
    pub member_id: i64,
    /// Check-in or check-out.
    pub kind: EventKind,
    /// When the transition happened. Equal to the member's `last_updated`
    /// written by the same operation.
    pub timestamp: DateTime<Utc>,
    /// Optional free-text note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Current time at the precision timestamps are stored with.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Storage and wire format for timestamps: RFC 3339, UTC, microseconds.
///
/// Fixed width, so lexical order matches chronological order.
#[must_use]
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by [`format_timestamp`].
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityDigest;

    fn sample_member() -> Member {
        Member {
            id: 1,
            identity_hash: IdentityDigest::Sha256.hash("12345"),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            position: Position {
                id: 2,
                name: "lead".to_string(),
                description: Some("Team lead".to_string()),
            },
            active: true,
            checked_in: false,
            last_updated: now(),
        }
    }

    #[test]
    fn test_full_name_and_display() {
        let member = sample_member();
        assert_eq!(member.full_name(), "John Doe");
        assert_eq!(member.to_string(), "John Doe");
    }

    #[test]
    fn test_is_present_requires_both_flags() {
        let mut member = sample_member();
        assert!(!member.is_present());
        member.checked_in = true;
        assert!(member.is_present());
        member.active = false;
        assert!(!member.is_present());
    }

    #[test]
    fn test_name_contains_is_case_insensitive() {
        let member = sample_member();
        assert!(member.name_contains("joh"));
        assert!(member.name_contains("DOE"));
        assert!(member.name_contains("john doe"));
        assert!(member.name_contains("n D"));
        assert!(!member.name_contains("Doe John"));
        assert!(!member.name_contains("smith"));
    }

    #[test]
    fn test_member_serialization_fields() {
        let member = sample_member();
        let value = serde_json::to_value(&member).unwrap();

        assert_eq!(value["id"], 1);
        assert_eq!(value["first_name"], "John");
        assert_eq!(value["last_name"], "Doe");
        assert_eq!(value["full_name"], "John Doe");
        assert_eq!(value["identity_hash"], member.identity_hash.as_str());
        assert_eq!(value["position"], "lead");
        assert_eq!(value["position_id"], 2);
        assert_eq!(value["active"], true);
        assert_eq!(value["checked_in"], false);

        let stamp = value["last_updated"].as_str().unwrap();
        assert_eq!(parse_timestamp(stamp), Some(member.last_updated));
    }

    #[test]
    fn test_event_kind_display_and_parse() {
        assert_eq!(EventKind::Checkin.to_string(), "checkin");
        assert_eq!(EventKind::Checkout.to_string(), "checkout");
        assert_eq!(EventKind::from_db_str("checkin"), Some(EventKind::Checkin));
        assert_eq!(EventKind::from_db_str("checkout"), Some(EventKind::Checkout));
        assert_eq!(EventKind::from_db_str("CHECKIN"), None);
    }

    #[test]
    fn test_event_kind_checked_in_after() {
        assert!(EventKind::Checkin.checked_in_after());
        assert!(!EventKind::Checkout.checked_in_after());
    }

    #[test]
    fn test_event_serialization() {
        let event = AttendanceEvent {
            id: 4,
            member_id: 1,
            kind: EventKind::Checkout,
            timestamp: now(),
            note: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "checkout");
        assert!(value.get("note").is_none());
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let ts = now();
        let formatted = format_timestamp(ts);
        assert!(formatted.ends_with('Z'));
        assert_eq!(formatted.len(), "2024-01-01T00:00:00.000000Z".len());
        assert_eq!(parse_timestamp(&formatted), Some(ts));
    }

    #[test]
    fn test_parse_invalid_timestamp() {
        assert!(parse_timestamp("yesterday").is_none());
    }
}
