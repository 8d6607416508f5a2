//! Sample roster for demos and first runs.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::roster::{MemberInput, Roster};

/// A member of the sample roster.
#[derive(Debug, Clone, Copy)]
pub struct SampleMember {
    /// First name.
    pub first_name: &'static str,
    /// Last name.
    pub last_name: &'static str,
    /// Raw identifier, hashed on insert.
    pub identity: &'static str,
    /// Name of a default position.
    pub position: &'static str,
    /// Whether the member starts on the active roster.
    pub active: bool,
}

const fn sample(
    first_name: &'static str,
    last_name: &'static str,
    identity: &'static str,
    position: &'static str,
    active: bool,
) -> SampleMember {
    SampleMember {
        first_name,
        last_name,
        identity,
        position,
        active,
    }
}

/// The fixed sample roster.
pub const SAMPLE_MEMBERS: &[SampleMember] = &[
    sample("John", "Doe", "12345", "lead", true),
    sample("Sarah", "Johnson", "67890", "lead", true),
    sample("Jane", "Smith", "11111", "member", true),
    sample("Mike", "Wilson", "22222", "member", true),
    sample("Emily", "Davis", "33333", "member", true),
    sample("David", "Brown", "44444", "member", true),
    sample("Lisa", "Garcia", "55555", "mentor", true),
    sample("Tom", "Anderson", "66666", "mentor", true),
    sample("Charlie", "Brown", "77777", "coach", false),
    sample("Alex", "Taylor", "88888", "member", true),
];

/// Add every sample member whose identity is not on the roster yet.
///
/// Returns how many members were added.
///
/// # Errors
///
/// Returns an error if a default position is missing and cannot be
/// restored, or if a database operation fails.
pub fn seed_sample_members(roster: &mut Roster) -> Result<usize> {
    roster.ensure_default_positions()?;
    let mut added = 0;

    for entry in SAMPLE_MEMBERS {
        let hash = roster.hash_identity(entry.identity);
        if roster.member_by_identity(&hash)?.is_some() {
            debug!(
                "Sample member {} {} already present",
                entry.first_name, entry.last_name
            );
            continue;
        }

        let position = roster.position_by_name(entry.position)?.ok_or_else(|| {
            Error::internal(format!("default position {} missing", entry.position))
        })?;
        let member = roster.create_member(&MemberInput {
            first_name: entry.first_name,
            last_name: entry.last_name,
            identity: entry.identity,
            position_id: position.id,
        })?;
        if !entry.active {
            roster.set_active(member.id, false)?;
        }
        added += 1;
    }

    info!("Seeded {} sample members", added);
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemberFilter, Storage};

    fn roster() -> Roster {
        Roster::new(Storage::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_sample_identities_are_unique() {
        let mut identities: Vec<&str> = SAMPLE_MEMBERS.iter().map(|s| s.identity).collect();
        identities.sort_unstable();
        identities.dedup();
        assert_eq!(identities.len(), SAMPLE_MEMBERS.len());
    }

    #[test]
    fn test_seed_adds_all_samples_once() {
        let mut roster = roster();
        assert_eq!(seed_sample_members(&mut roster).unwrap(), SAMPLE_MEMBERS.len());
        assert_eq!(seed_sample_members(&mut roster).unwrap(), 0);

        let stats = roster.stats().unwrap();
        assert_eq!(stats.total_members, 10);
        assert_eq!(stats.inactive_members, 1);
        assert_eq!(stats.present_members, 0);
    }

    #[test]
    fn test_seed_skips_existing_identity() {
        let mut roster = roster();
        let pos = roster.position_by_name("member").unwrap().unwrap().id;
        roster
            .create_member(&MemberInput {
                first_name: "Already",
                last_name: "Here",
                identity: "12345",
                position_id: pos,
            })
            .unwrap();

        assert_eq!(
            seed_sample_members(&mut roster).unwrap(),
            SAMPLE_MEMBERS.len() - 1
        );
        let john_doe = roster
            .members(MemberFilter::All)
            .unwrap()
            .into_iter()
            .filter(|m| m.full_name() == "John Doe")
            .count();
        assert_eq!(john_doe, 0);
    }

    #[test]
    fn test_seeded_positions() {
        let mut roster = roster();
        seed_sample_members(&mut roster).unwrap();

        let charlie = roster.resolve("77777", false).unwrap().found().unwrap();
        assert_eq!(charlie.position.name, "coach");
        assert!(!charlie.active);
        let john = roster.resolve("12345", true).unwrap().found().unwrap();
        assert_eq!(john.position.name, "lead");
    }
}
