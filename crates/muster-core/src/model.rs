//! Entity types: the relational graph a crawl reconciles into.
//!
//! Records reference each other through numeric store-assigned ids rather than
//! in-memory links. Self-references (a unit's parent, a rank's grantor) always
//! point at records that were persisted earlier, so no cycle ever needs to be
//! materialised.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

// ─── Ids ─────────────────────────────────────────────────────────────────────

macro_rules! id_type {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
      Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
      }
    }
  };
}

id_type!(
  /// Store-assigned id of a [`Unit`].
  UnitId
);
id_type!(
  /// Store-assigned id of a [`Person`].
  PersonId
);
id_type!(RankId);
id_type!(PersonUnitId);
id_type!(EventId);
id_type!(PersonEventId);

// ─── Unit ────────────────────────────────────────────────────────────────────

/// A node of the source's organisational hierarchy.
///
/// Identity is the source-assigned id. Name, type and parent are overwritten
/// on every sighting; units are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
  pub unit_id:   UnitId,
  pub source_id: i64,
  pub name:      String,
  /// Free-text category as shown by the source (e.g. "Squad", "Division").
  pub kind:      String,
  pub parent_id: Option<UnitId>,
}

// ─── Person ──────────────────────────────────────────────────────────────────

/// A member of the directory, keyed by display name.
///
/// Display names are treated as unique. Renames and name collisions in the
/// source are not detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub person_id:            PersonId,
  pub name:                 String,
  pub country:              Option<String>,
  pub status:               Option<String>,
  pub biography:            Option<String>,
  pub avatar_url:           Option<String>,
  /// External numeric profile id (Steam community id).
  pub steam_id:             Option<i64>,
  pub applied_at:           Option<DateTime<Utc>>,
  pub admitted_at:          Option<DateTime<Utc>>,
  pub joined_on:            Option<NaiveDate>,
  pub profile_refreshed_at: Option<DateTime<Utc>>,
}

/// Static profile fields applied by the profile reconciler. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
  pub country:              Option<String>,
  pub status:               Option<String>,
  pub biography:            Option<String>,
  pub avatar_url:           Option<String>,
  pub steam_id:             Option<i64>,
  pub applied_at:           Option<DateTime<Utc>>,
  pub admitted_at:          Option<DateTime<Utc>>,
  pub joined_on:            Option<NaiveDate>,
  pub profile_refreshed_at: Option<DateTime<Utc>>,
}

// ─── Rank ────────────────────────────────────────────────────────────────────

/// When a rank became effective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValidFrom {
  /// Inferred from a roster line; the promotion date is not known yet.
  Unknown,
  Since(DateTime<Utc>),
}

/// One entry of a person's rank history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
  pub rank_id:    RankId,
  pub person_id:  PersonId,
  /// Abbreviation as shown on rosters (e.g. "SGT").
  pub name_short: Option<String>,
  /// Full name as shown in the movement log (e.g. "Sergeant").
  pub name_long:  Option<String>,
  /// Id of the movement-log entry that recorded the promotion.
  pub source_id:  Option<i64>,
  pub valid_from: ValidFrom,
  pub granted_by: Option<PersonId>,
}

impl Rank {
  /// Whether this is the single roster-inferred entry with no known date.
  pub fn is_placeholder(&self) -> bool {
    matches!(self.valid_from, ValidFrom::Unknown)
  }
}

/// Input to [`crate::store::StoreSession::append_rank`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRank {
  pub person_id:  PersonId,
  pub name_long:  String,
  pub source_id:  i64,
  pub valid_from: DateTime<Utc>,
  pub granted_by: Option<PersonId>,
}

// ─── PersonUnit ──────────────────────────────────────────────────────────────

/// A person's membership of a unit.
///
/// There is at most one row per (person, unit) pair. A membership that a crawl
/// no longer sees is retired by stamping `removed_at`, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonUnit {
  pub person_unit_id: PersonUnitId,
  pub person_id:      PersonId,
  pub unit_id:        UnitId,
  /// Short position code (e.g. "CO", "XO"); `None` for plain members.
  pub position_short: Option<String>,
  pub joined_at:      DateTime<Utc>,
  /// `None` while the membership is active.
  pub removed_at:     Option<DateTime<Utc>>,
}

impl PersonUnit {
  pub fn is_active(&self) -> bool { self.removed_at.is_none() }
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A scheduled event, keyed by its source id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
  pub event_id:    EventId,
  pub source_id:   i64,
  pub name:        String,
  pub description: String,
  pub kind:        String,
  pub mandatory:   bool,
  pub cancelled:   bool,
  pub starts_at:   Option<DateTime<Utc>>,
  pub ends_at:     Option<DateTime<Utc>>,
}

/// Metadata parsed from an event page, written by
/// [`crate::store::StoreSession::update_event`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventDetails {
  pub name:        String,
  pub description: String,
  pub kind:        String,
  pub mandatory:   bool,
  pub cancelled:   bool,
  pub starts_at:   Option<DateTime<Utc>>,
  pub ends_at:     Option<DateTime<Utc>>,
}

// ─── Attendance ──────────────────────────────────────────────────────────────

/// How a person's participation in an event was recorded.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Attendance {
  #[default]
  Unknown,
  Present,
  Attended,
  Absent,
  Excused,
  Awol,
  Late,
}

impl Attendance {
  /// Map the free-text category of an attendee row. `None` for blank text
  /// and anything outside the vocabulary.
  pub fn from_text(text: &str) -> Option<Self> { text.trim().parse().ok() }

  /// Stable lowercase name, also used as the stored representation.
  pub fn as_str(&self) -> &str { self.as_ref() }
}

/// A person's attendance record for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonEvent {
  pub person_event_id: PersonEventId,
  pub person_id:       PersonId,
  pub event_id:        EventId,
  pub attendance:      Attendance,
  /// `None` when the source shows the "not recorded" placeholder.
  pub recorded_at:     Option<DateTime<Utc>>,
}
