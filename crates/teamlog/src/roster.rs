//! The roster service.
//!
//! [`Roster`] owns the [`Storage`] handle together with the identity and
//! attendance settings from [`Config`], and is the entry point for every
//! operation that validates input before touching the database. Resolution
//! lives in [`crate::resolver`], check-in and check-out in
//! [`crate::attendance`].

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use tracing::{debug, info};

use crate::config::{AttendanceConfig, Config};
use crate::error::{Error, Result};
use crate::identity::{IdentityDigest, IdentityHash, InputClassifier};
use crate::model::{now, AttendanceEvent, Member, Position, PositionSummary};
use crate::storage::{MemberFields, MemberFilter, RosterStats, Storage};

/// Metadata key recording which digest produced the stored identity hashes.
pub const DIGEST_METADATA_KEY: &str = "identity_digest";

/// Caller-supplied member fields for create and update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberInput<'a> {
    /// First name, trimmed before storing.
    pub first_name: &'a str,
    /// Last name, trimmed before storing.
    pub last_name: &'a str,
    /// Raw external identifier, hashed before storing.
    pub identity: &'a str,
    /// Position the member holds.
    pub position_id: i64,
}

/// A partial member edit; `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemberUpdate<'a> {
    /// New first name.
    pub first_name: Option<&'a str>,
    /// New last name.
    pub last_name: Option<&'a str>,
    /// New raw external identifier.
    pub identity: Option<&'a str>,
    /// New position.
    pub position_id: Option<i64>,
    /// New `active` flag.
    pub active: Option<bool>,
}

/// Members, positions, and attendance history behind one handle.
#[derive(Debug)]
pub struct Roster {
    pub(crate) storage: Storage,
    pub(crate) digest: IdentityDigest,
    pub(crate) classifier: InputClassifier,
    pub(crate) attendance: AttendanceConfig,
}

impl Roster {
    /// Open the database named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or was populated
    /// with a different identity digest.
    pub fn open(config: &Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        Self::with_config(storage, config)
    }

    /// Wrap an open store using default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the store was populated with a different digest.
    pub fn new(storage: Storage) -> Result<Self> {
        Self::with_config(storage, &Config::default())
    }

    /// Wrap an open store using the given settings.
    ///
    /// The first roster opened on a store records its digest; later opens must
    /// use the same one, or stored identities would never match again.
    ///
    /// # Errors
    ///
    /// Returns `IdentityDigestMismatch` if the store records a different
    /// digest, a configuration error for an invalid identity pattern, or an
    /// error if the database operation fails.
    pub fn with_config(storage: Storage, config: &Config) -> Result<Self> {
        let digest = config.identity.digest;
        match storage.metadata(DIGEST_METADATA_KEY)? {
            Some(stored) if stored != digest.as_str() => {
                return Err(Error::IdentityDigestMismatch {
                    stored,
                    configured: digest.as_str().to_string(),
                });
            }
            Some(_) => {}
            None => {
                storage.set_metadata(DIGEST_METADATA_KEY, digest.as_str())?;
                debug!("Recorded identity digest {}", digest);
            }
        }

        Ok(Self {
            storage,
            digest,
            classifier: config.input_classifier()?,
            attendance: config.attendance.clone(),
        })
    }

    /// The underlying store.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The digest used for identity hashes.
    #[must_use]
    pub fn digest(&self) -> IdentityDigest {
        self.digest
    }

    /// Hash a raw identifier the same way member identities are hashed.
    #[must_use]
    pub fn hash_identity(&self, raw: &str) -> IdentityHash {
        self.digest.hash(raw)
    }

    // === Members ===

    /// Create a member, active and checked out.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty name or identifier,
    /// `DuplicateIdentity` if the identifier is taken, `UnknownPosition` if
    /// the position does not exist, or a database error.
    pub fn create_member(&mut self, input: &MemberInput<'_>) -> Result<Member> {
        let fields = self.member_fields(input, true)?;
        let member = self.storage.insert_member(&fields, now())?;
        info!(
            "Added member {} ({}) as {}",
            member.id,
            member.full_name(),
            member.position
        );
        Ok(member)
    }

    /// Overwrite a member's name, identity, position, and `active` flag.
    ///
    /// The member may keep its own identity. `checked_in` is left untouched,
    /// except that clearing `active` on a checked-in member follows the same
    /// policy as [`Roster::set_active`].
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, plus every error
    /// [`Roster::create_member`] can return.
    pub fn update_member(
        &mut self,
        id: i64,
        input: &MemberInput<'_>,
        active: bool,
    ) -> Result<Member> {
        let fields = self.member_fields(input, active)?;
        let was_active = self.member(id)?.active;
        self.store_update(id, &fields, was_active)
    }

    /// Change only the fields present in `update`, keeping the rest.
    ///
    /// An omitted identity keeps the stored hash. Deactivation follows the
    /// same policy as [`Roster::update_member`].
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, plus every error
    /// [`Roster::create_member`] can return for the fields that are present.
    pub fn edit_member(&mut self, id: i64, update: &MemberUpdate<'_>) -> Result<Member> {
        let current = self.member(id)?;
        let identity_hash = match update.identity {
            Some(raw) => self.digest.hash(required("identity", raw)?),
            None => current.identity_hash.clone(),
        };
        let position_id = update.position_id.unwrap_or(current.position.id);
        if position_id <= 0 {
            return Err(Error::validation("position_id", "a position is required"));
        }

        let fields = MemberFields {
            first_name: required("first_name", update.first_name.unwrap_or(&current.first_name))?
                .to_string(),
            last_name: required("last_name", update.last_name.unwrap_or(&current.last_name))?
                .to_string(),
            identity_hash,
            position_id,
            active: update.active.unwrap_or(current.active),
        };
        self.store_update(id, &fields, current.active)
    }

    fn store_update(&mut self, id: i64, fields: &MemberFields, was_active: bool) -> Result<Member> {
        let member = self
            .storage
            .update_member(id, fields, now())?
            .ok_or(Error::MemberNotFound(id))?;
        info!("Updated member {} ({})", member.id, member.full_name());

        if was_active && !member.active {
            return self.after_activity_change(member);
        }
        Ok(member)
    }

    /// Delete a member together with its attendance history.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, or a database error.
    pub fn delete_member(&mut self, id: i64) -> Result<Member> {
        let member = self
            .storage
            .delete_member(id)?
            .ok_or(Error::MemberNotFound(id))?;
        info!("Deleted member {} ({})", member.id, member.full_name());
        Ok(member)
    }

    /// Look up a member by ID.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, or a database error.
    pub fn member(&self, id: i64) -> Result<Member> {
        self.storage
            .get_member(id)?
            .ok_or(Error::MemberNotFound(id))
    }

    /// Look up the member holding an identity hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn member_by_identity(&self, hash: &IdentityHash) -> Result<Option<Member>> {
        self.storage.find_by_identity(hash)
    }

    /// Members matching a filter, in ID order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn members(&self, filter: MemberFilter) -> Result<Vec<Member>> {
        self.storage.list_members(filter)
    }

    /// Active members who are checked in.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn present_members(&self) -> Result<Vec<Member>> {
        self.storage.list_members(MemberFilter::Present)
    }

    fn member_fields(&self, input: &MemberInput<'_>, active: bool) -> Result<MemberFields> {
        let first_name = required("first_name", input.first_name)?;
        let last_name = required("last_name", input.last_name)?;
        let identity = required("identity", input.identity)?;
        if input.position_id <= 0 {
            return Err(Error::validation("position_id", "a position is required"));
        }

        Ok(MemberFields {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            identity_hash: self.digest.hash(identity),
            position_id: input.position_id,
            active,
        })
    }

    // === Positions ===

    /// All positions with their member counts, in ID order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn positions(&self) -> Result<Vec<PositionSummary>> {
        self.storage.list_positions()
    }

    /// Look up a position by exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn position_by_name(&self, name: &str) -> Result<Option<Position>> {
        self.storage.get_position_by_name(name)
    }

    /// Create a position.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an empty name, `DuplicatePosition` if the name
    /// is taken, or a database error.
    pub fn add_position(&self, name: &str, description: Option<&str>) -> Result<Position> {
        let name = required("name", name)?;
        let description = description.map(str::trim).filter(|d| !d.is_empty());
        let position = self.storage.insert_position(name, description)?;
        info!("Added position {} ({})", position.id, position.name);
        Ok(position)
    }

    /// Insert any missing default position, returning how many were added.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn ensure_default_positions(&self) -> Result<usize> {
        self.storage.ensure_default_positions()
    }

    // === History ===

    /// A member's attendance events, newest first.
    ///
    /// # Errors
    ///
    /// Returns `MemberNotFound` if no member has the ID, or a database error.
    pub fn history(&self, member_id: i64, limit: Option<usize>) -> Result<Vec<AttendanceEvent>> {
        self.member(member_id)?;
        self.storage.events_for_member(member_id, limit)
    }

    /// Events across all members during the current local day, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn events_today(&self) -> Result<Vec<AttendanceEvent>> {
        self.events_on(Local::now().date_naive())
    }

    /// Events across all members during a local calendar day, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn events_on(&self, date: NaiveDate) -> Result<Vec<AttendanceEvent>> {
        let since = local_midnight(date);
        let until = local_midnight(date.succ_opt().unwrap_or(NaiveDate::MAX));
        self.storage.events_between(since, until)
    }

    /// Dashboard summary counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<RosterStats> {
        self.storage.stats()
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    Ok(trimmed)
}

/// Start of a local calendar day as a UTC instant.
///
/// On a DST gap at midnight, falls back to treating midnight as UTC.
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map_or_else(|| naive.and_utc(), |dt| dt.with_timezone(&Utc))
}
