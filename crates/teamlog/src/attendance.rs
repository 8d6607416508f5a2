//! Attendance state transitions.
//!
//! Each member carries two independent flags, `active` and `checked_in`.
//! Only check-in and check-out append to the attendance history; every
//! transition stamps `last_updated` with the instant the event carries.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RepeatPolicy;
use crate::error::{Error, Result};
use crate::model::{now, EventKind, Member};
use crate::resolver::Resolution;
use crate::roster::Roster;
use crate::storage::{MemberFilter, Transition};

/// Outcome of a quick check-in from free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "members", rename_all = "snake_case")]
pub enum QuickCheckIn {
    /// The member was checked in.
    CheckedIn(Member),
    /// The member was already checked in; nothing was recorded.
    AlreadyCheckedIn(Member),
    /// Several active members matched.
    Ambiguous(Vec<Member>),
    /// No active member matched.
    NotFound,
}

impl Roster {
    /// Check a member in.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, or a database error.
    pub fn check_in(&mut self, member_id: i64) -> Result<Member> {
        self.transition(member_id, EventKind::Checkin, None)
            .map(Transition::into_member)
    }

    /// Check a member out.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, or a database error.
    pub fn check_out(&mut self, member_id: i64) -> Result<Member> {
        self.transition(member_id, EventKind::Checkout, None)
            .map(Transition::into_member)
    }

    /// Apply a check-in or check-out with an optional note.
    ///
    /// A transition into the state the member is already in follows the
    /// configured [`RepeatPolicy`].
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, or a database error.
    pub fn transition(
        &mut self,
        member_id: i64,
        kind: EventKind,
        note: Option<&str>,
    ) -> Result<Transition> {
        let skip_if_unchanged = self.attendance.repeat_check_in == RepeatPolicy::Ignore;
        let transition = self
            .storage
            .record_transition(member_id, kind, now(), note, skip_if_unchanged)?
            .ok_or(Error::MemberNotFound(member_id))?;

        match &transition {
            Transition::Recorded { member, event } => {
                if !member.active {
                    warn!("Recorded {} for inactive member {}", kind, member.id);
                }
                info!(
                    "{} {} ({}) at {}",
                    kind,
                    member.id,
                    member.full_name(),
                    event.timestamp
                );
            }
            Transition::Skipped(member) => {
                debug!("Member {} already in {} state", member.id, kind);
            }
        }
        Ok(transition)
    }

    /// Flip a member's `active` flag. No attendance event is written.
    ///
    /// Deactivating a checked-in member leaves them checked in unless
    /// `attendance.deactivate_checks_out` is set.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, or a database error.
    pub fn toggle_active(&mut self, member_id: i64) -> Result<Member> {
        let member = self
            .storage
            .toggle_active(member_id, now())?
            .ok_or(Error::MemberNotFound(member_id))?;
        self.after_activity_change(member)
    }

    /// Set a member's `active` flag explicitly.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, or a database error.
    pub fn set_active(&mut self, member_id: i64, active: bool) -> Result<Member> {
        let member = self
            .storage
            .set_active(member_id, active, now())?
            .ok_or(Error::MemberNotFound(member_id))?;
        self.after_activity_change(member)
    }

    pub(crate) fn after_activity_change(&mut self, member: Member) -> Result<Member> {
        info!(
            "Member {} ({}) is now {}",
            member.id,
            member.full_name(),
            if member.active { "active" } else { "inactive" }
        );

        if member.active || !member.checked_in {
            return Ok(member);
        }
        if self.attendance.deactivate_checks_out {
            return self.check_out(member.id);
        }
        warn!(
            "Member {} deactivated while checked in; not counted as present",
            member.id
        );
        Ok(member)
    }

    /// Check out every active, checked-in member.
    ///
    /// Each member is checked out in its own transaction. Members checked out
    /// concurrently are skipped rather than recorded twice.
    ///
    /// Returns how many members were checked out.
    ///
    /// # Errors
    ///
    /// Returns the first database error; members checked out before it stay
    /// checked out.
    pub fn checkout_all(&mut self) -> Result<usize> {
        let present = self.storage.list_members(MemberFilter::Present)?;
        let mut count = 0;

        for member in present {
            let at = now();
            match self
                .storage
                .record_transition(member.id, EventKind::Checkout, at, None, true)?
            {
                Some(Transition::Recorded { .. }) => count += 1,
                Some(Transition::Skipped(_)) => {}
                None => debug!("Member {} deleted before checkout", member.id),
            }
        }

        info!("Checked out {} members", count);
        Ok(count)
    }

    /// Resolve free text among active members and check the single match in.
    ///
    /// A member who is already checked in is reported, not re-stamped.
    ///
    /// # Errors
    ///
    /// Returns `EmptyInput` if the input is blank, or a database error.
    pub fn quick_check_in(&mut self, input: &str) -> Result<QuickCheckIn> {
        let member = match self.resolve(input, true)? {
            Resolution::Found(member) => member,
            Resolution::Ambiguous(candidates) => return Ok(QuickCheckIn::Ambiguous(candidates)),
            Resolution::NotFound => return Ok(QuickCheckIn::NotFound),
        };

        match self.storage.record_transition(
            member.id,
            EventKind::Checkin,
            now(),
            None,
            true,
        )? {
            Some(Transition::Recorded { member, .. }) => {
                info!("Quick check-in for {} ({})", member.id, member.full_name());
                Ok(QuickCheckIn::CheckedIn(member))
            }
            Some(Transition::Skipped(member)) => Ok(QuickCheckIn::AlreadyCheckedIn(member)),
            None => Ok(QuickCheckIn::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::roster::MemberInput;
    use crate::storage::Storage;

    fn roster_with_config(config: &Config, count: usize) -> (Roster, Vec<i64>) {
        let mut roster = Roster::with_config(Storage::open_in_memory().unwrap(), config).unwrap();
        let pos = roster.position_by_name("member").unwrap().unwrap().id;
        let ids = (0..count)
            .map(|i| {
                let identity = (1000 + i).to_string();
                let last = format!("Member{i}");
                roster
                    .create_member(&MemberInput {
                        first_name: "Test",
                        last_name: &last,
                        identity: &identity,
                        position_id: pos,
                    })
                    .unwrap()
                    .id
            })
            .collect();
        (roster, ids)
    }

    fn roster(count: usize) -> (Roster, Vec<i64>) {
        roster_with_config(&Config::default(), count)
    }

    #[test]
    fn test_checkout_all_failure_keeps_earlier_checkouts() {
        let (mut roster, ids) = roster(3);
        for &id in &ids {
            roster.check_in(id).unwrap();
        }
        let stuck_before = roster.member(ids[1]).unwrap();
        roster
            .storage
            .execute_batch(&format!(
                "CREATE TRIGGER reject_checkout BEFORE INSERT ON attendance_events
                 WHEN NEW.member_id = {} AND NEW.kind = 'checkout'
                 BEGIN SELECT RAISE(ABORT, 'checkout rejected'); END;",
                ids[1]
            ))
            .unwrap();

        assert!(roster.checkout_all().is_err());

        let first = roster.member(ids[0]).unwrap();
        assert!(!first.checked_in);
        let newest = roster.history(ids[0], Some(1)).unwrap();
        assert_eq!(newest[0].kind, EventKind::Checkout);
        assert_eq!(newest[0].timestamp, first.last_updated);

        assert_eq!(roster.member(ids[1]).unwrap(), stuck_before);
        assert_eq!(roster.history(ids[1], None).unwrap().len(), 1);
        assert!(roster.member(ids[2]).unwrap().checked_in);
        assert_eq!(roster.present_members().unwrap().len(), 2);
    }

    #[test]
    fn test_check_in_stamps_event_and_member_together() {
        let (mut roster, ids) = roster(1);
        let before = roster.member(ids[0]).unwrap().last_updated;

        let member = roster.check_in(ids[0]).unwrap();
        assert!(member.checked_in);
        assert!(member.last_updated >= before);

        let events = roster.history(ids[0], Some(1)).unwrap();
        assert_eq!(events[0].kind, EventKind::Checkin);
        assert_eq!(events[0].timestamp, member.last_updated);

        let member = roster.check_out(ids[0]).unwrap();
        assert!(!member.checked_in);
        let events = roster.history(ids[0], Some(1)).unwrap();
        assert_eq!(events[0].kind, EventKind::Checkout);
        assert_eq!(events[0].timestamp, member.last_updated);
    }

    #[test]
    fn test_double_check_in_records_twice_by_default() {
        let (mut roster, ids) = roster(1);
        assert!(roster.check_in(ids[0]).unwrap().checked_in);
        assert!(roster.check_in(ids[0]).unwrap().checked_in);

        let events = roster.history(ids[0], None).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.kind == EventKind::Checkin));
    }

    #[test]
    fn test_double_check_in_ignored_by_policy() {
        let mut config = Config::default();
        config.attendance.repeat_check_in = RepeatPolicy::Ignore;
        let (mut roster, ids) = roster_with_config(&config, 1);

        let first = roster.check_in(ids[0]).unwrap();
        let second = roster.check_in(ids[0]).unwrap();
        assert_eq!(first, second);
        assert_eq!(roster.history(ids[0], None).unwrap().len(), 1);

        let skipped = roster.transition(ids[0], EventKind::Checkin, None).unwrap();
        assert!(matches!(skipped, Transition::Skipped(_)));
    }

    #[test]
    fn test_transition_with_note() {
        let (mut roster, ids) = roster(1);
        let transition = roster
            .transition(ids[0], EventKind::Checkin, Some("late bus"))
            .unwrap();
        match transition {
            Transition::Recorded { event, member } => {
                assert_eq!(event.note.as_deref(), Some("late bus"));
                assert_eq!(event.timestamp, member.last_updated);
            }
            Transition::Skipped(_) => panic!("expected a recorded transition"),
        }
    }

    #[test]
    fn test_transitions_on_missing_member() {
        let (mut roster, _) = roster(0);
        assert!(matches!(roster.check_in(7), Err(Error::MemberNotFound(7))));
        assert!(matches!(roster.check_out(7), Err(Error::MemberNotFound(7))));
        assert!(matches!(roster.toggle_active(7), Err(Error::MemberNotFound(7))));
        assert!(matches!(
            roster.set_active(7, true),
            Err(Error::MemberNotFound(7))
        ));
        assert_eq!(roster.storage().count_events().unwrap(), 0);
    }

    #[test]
    fn test_toggle_active_does_not_check_out_by_default() {
        let (mut roster, ids) = roster(1);
        roster.check_in(ids[0]).unwrap();

        let member = roster.toggle_active(ids[0]).unwrap();
        assert!(!member.active);
        assert!(member.checked_in);
        assert!(!member.is_present());
        assert_eq!(roster.history(ids[0], None).unwrap().len(), 1);

        let member = roster.toggle_active(ids[0]).unwrap();
        assert!(member.active);
        assert!(member.is_present());
    }

    #[test]
    fn test_deactivate_checks_out_when_configured() {
        let mut config = Config::default();
        config.attendance.deactivate_checks_out = true;
        let (mut roster, ids) = roster_with_config(&config, 1);
        roster.check_in(ids[0]).unwrap();

        let member = roster.set_active(ids[0], false).unwrap();
        assert!(!member.active);
        assert!(!member.checked_in);

        let events = roster.history(ids[0], None).unwrap();
        assert_eq!(events[0].kind, EventKind::Checkout);
        assert_eq!(events[0].timestamp, member.last_updated);
    }

    #[test]
    fn test_checkout_all_counts_only_present_members() {
        let (mut roster, ids) = roster(4);
        roster.check_in(ids[0]).unwrap();
        roster.check_in(ids[1]).unwrap();

        assert_eq!(roster.checkout_all().unwrap(), 2);
        for id in &ids {
            assert!(!roster.member(*id).unwrap().checked_in);
        }
        assert_eq!(roster.checkout_all().unwrap(), 0);
    }

    #[test]
    fn test_checkout_all_skips_inactive_checked_in() {
        let (mut roster, ids) = roster(2);
        roster.check_in(ids[0]).unwrap();
        roster.check_in(ids[1]).unwrap();
        roster.set_active(ids[1], false).unwrap();

        assert_eq!(roster.checkout_all().unwrap(), 1);
        assert!(roster.member(ids[1]).unwrap().checked_in);
    }

    #[test]
    fn test_quick_check_in_outcomes() {
        let (mut roster, ids) = roster(2);

        match roster.quick_check_in("1000").unwrap() {
            QuickCheckIn::CheckedIn(member) => assert_eq!(member.id, ids[0]),
            other => panic!("expected check-in, got {other:?}"),
        }
        match roster.quick_check_in("member0").unwrap() {
            QuickCheckIn::AlreadyCheckedIn(member) => assert_eq!(member.id, ids[0]),
            other => panic!("expected already checked in, got {other:?}"),
        }
        assert_eq!(roster.history(ids[0], None).unwrap().len(), 1);

        match roster.quick_check_in("test").unwrap() {
            QuickCheckIn::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert_eq!(roster.quick_check_in("4242").unwrap(), QuickCheckIn::NotFound);
        assert!(matches!(
            roster.quick_check_in("  "),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_quick_check_in_ignores_inactive() {
        let (mut roster, ids) = roster(1);
        roster.set_active(ids[0], false).unwrap();
        assert_eq!(roster.quick_check_in("1000").unwrap(), QuickCheckIn::NotFound);
        assert!(!roster.member(ids[0]).unwrap().checked_in);
    }
}
