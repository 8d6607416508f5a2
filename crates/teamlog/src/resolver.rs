//! Free-text member resolution.
//!
//! A scan or a typed string is either a raw identifier, which is hashed and
//! matched exactly, or a name fragment, which is matched case-insensitively
//! against member names. Which one is decided by the configured
//! [`InputClassifier`](crate::identity::InputClassifier); an all-digit input
//! never falls back to name matching.

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::InputKind;
use crate::model::Member;
use crate::roster::Roster;
use crate::storage::MemberFilter;

/// Outcome of resolving free text to a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "members", rename_all = "snake_case")]
pub enum Resolution {
    /// Exactly one member matched.
    Found(Member),
    /// Several members matched; the caller has to pick.
    Ambiguous(Vec<Member>),
    /// Nothing matched.
    NotFound,
}

impl Resolution {
    /// The matched member, if resolution was unique.
    #[must_use]
    pub fn found(self) -> Option<Member> {
        match self {
            Self::Found(member) => Some(member),
            _ => None,
        }
    }

    fn from_candidates(mut candidates: Vec<Member>) -> Self {
        match candidates.len() {
            0 => Self::NotFound,
            1 => candidates.pop().map_or(Self::NotFound, Self::Found),
            _ => Self::Ambiguous(candidates),
        }
    }
}

impl Roster {
    /// Resolve free text to a member without changing anything.
    ///
    /// When `active_only` is set, inactive members are never returned.
    ///
    /// # Errors
    ///
    /// Returns `EmptyInput` if the input is blank, or a database error.
    pub fn resolve(&self, input: &str, active_only: bool) -> Result<Resolution> {
        let kind = self.classifier.classify(input).ok_or(Error::EmptyInput)?;

        let resolution = match kind {
            InputKind::RawIdentifier(raw) => {
                debug!("Resolving input as an identifier");
                let hash = self.digest.hash(raw);
                let member = self
                    .storage
                    .find_by_identity(&hash)?
                    .filter(|m| m.active || !active_only);
                member.map_or(Resolution::NotFound, Resolution::Found)
            }
            InputKind::NameFragment(fragment) => {
                debug!("Resolving input as a name fragment");
                let filter = if active_only {
                    MemberFilter::Active
                } else {
                    MemberFilter::All
                };
                let candidates = self
                    .storage
                    .list_members(filter)?
                    .into_iter()
                    .filter(|m| m.name_contains(fragment))
                    .collect();
                Resolution::from_candidates(candidates)
            }
        };

        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::roster::MemberInput;
    use crate::storage::Storage;

    fn roster_with(names: &[(&str, &str, &str)]) -> (Roster, Vec<Member>) {
        let mut roster = Roster::new(Storage::open_in_memory().unwrap()).unwrap();
        let pos = roster.position_by_name("member").unwrap().unwrap().id;
        let members = names
            .iter()
            .map(|&(first, last, identity)| {
                roster
                    .create_member(&MemberInput {
                        first_name: first,
                        last_name: last,
                        identity,
                        position_id: pos,
                    })
                    .unwrap()
            })
            .collect();
        (roster, members)
    }

    #[test]
    fn test_resolve_empty_input() {
        let (roster, _) = roster_with(&[]);
        assert!(matches!(roster.resolve("", true), Err(Error::EmptyInput)));
        assert!(matches!(roster.resolve(" \t\n", true), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_resolve_by_identifier() {
        let (roster, members) = roster_with(&[("Ann", "Lee", "555"), ("Bob", "Ray", "777")]);
        assert_eq!(
            roster.resolve(" 555 ", true).unwrap(),
            Resolution::Found(members[0].clone())
        );
        assert_eq!(roster.resolve("556", true).unwrap(), Resolution::NotFound);
    }

    #[test]
    fn test_digits_never_match_names() {
        let (roster, _) = roster_with(&[("Agent", "12345", "999")]);
        assert_eq!(roster.resolve("12345", true).unwrap(), Resolution::NotFound);
        assert_eq!(roster.resolve("12345", false).unwrap(), Resolution::NotFound);
    }

    #[test]
    fn test_resolve_name_ambiguity() {
        let (roster, members) =
            roster_with(&[("Jane", "Smith", "1"), ("Jane", "Doe", "2"), ("Bob", "Ray", "3")]);

        match roster.resolve("jane", true).unwrap() {
            Resolution::Ambiguous(candidates) => {
                let ids: Vec<i64> = candidates.iter().map(|m| m.id).collect();
                assert_eq!(ids, [members[0].id, members[1].id]);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert_eq!(
            roster.resolve("Jane Smith", true).unwrap(),
            Resolution::Found(members[0].clone())
        );
        assert_eq!(
            roster.resolve("RAY", true).unwrap(),
            Resolution::Found(members[2].clone())
        );
        assert_eq!(roster.resolve("zed", true).unwrap(), Resolution::NotFound);
    }

    #[test]
    fn test_member_matching_both_names_counted_once() {
        let (roster, members) = roster_with(&[("Anna", "Hanna", "1")]);
        assert_eq!(
            roster.resolve("anna", true).unwrap(),
            Resolution::Found(members[0].clone())
        );
    }

    #[test]
    fn test_active_only_excludes_inactive() {
        let (mut roster, members) = roster_with(&[("Ann", "Lee", "555")]);
        roster.set_active(members[0].id, false).unwrap();

        assert_eq!(roster.resolve("555", true).unwrap(), Resolution::NotFound);
        assert_eq!(roster.resolve("Ann", true).unwrap(), Resolution::NotFound);

        let found = roster.resolve("555", false).unwrap().found().unwrap();
        assert_eq!(found.id, members[0].id);
        assert!(!found.active);
        assert!(roster.resolve("ann", false).unwrap().found().is_some());
    }

    #[test]
    fn test_custom_identifier_pattern() {
        let mut config = Config::default();
        config.identity.numeric_pattern = Some(r"^S\d+$".to_string());
        let mut roster =
            Roster::with_config(Storage::open_in_memory().unwrap(), &config).unwrap();
        let pos = roster.position_by_name("member").unwrap().unwrap().id;
        let member = roster
            .create_member(&MemberInput {
                first_name: "Sam",
                last_name: "S100",
                identity: "S100",
                position_id: pos,
            })
            .unwrap();

        assert_eq!(
            roster.resolve("S100", true).unwrap(),
            Resolution::Found(member.clone())
        );
        assert_eq!(roster.resolve("S101", true).unwrap(), Resolution::NotFound);
        // Plain digits are a name fragment under this pattern.
        assert_eq!(roster.resolve("100", true).unwrap(), Resolution::Found(member));
    }

    #[test]
    fn test_resolution_serialization() {
        let (roster, _) = roster_with(&[("Ann", "Lee", "555")]);
        let value = serde_json::to_value(roster.resolve("555", true).unwrap()).unwrap();
        assert_eq!(value["status"], "found");
        assert_eq!(value["members"]["full_name"], "Ann Lee");

        let value = serde_json::to_value(Resolution::NotFound).unwrap();
        assert_eq!(value["status"], "not_found");
    }
}
