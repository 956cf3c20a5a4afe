//! The persistence gateway traits.
//!
//! [`DirectoryStore`] is implemented by storage backends (e.g.
//! `muster-store-sqlite`). The crawl engine depends on this abstraction, not on
//! any concrete backend.
//!
//! Work happens inside a [`StoreSession`]. Opening a session may wait: a store
//! bounds the number of simultaneously open sessions, and that bound (not the
//! number of crawl tasks) is what throttles a crawl. Dropping a session
//! releases its slot.
//!
//! Every session operation is committed when it returns. Find-or-create
//! operations are atomic with respect to concurrent sessions, so two tasks
//! resolving the same natural key observe the same record.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::model::{
  Attendance, Event, EventDetails, EventId, NewRank, Person, PersonEvent,
  PersonId, PersonUnit, PersonUnitId, ProfileUpdate, Rank, Unit, UnitId,
};

/// A store that hands out bounded sessions.
pub trait DirectoryStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
  type Session: StoreSession<Error = Self::Error>;

  /// Open a session, waiting for a free slot if the store is saturated.
  fn open_session(
    &self,
  ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send + '_;
}

/// Natural-key upserts and lookups over the entity graph.
///
/// All methods return `Send` futures so sessions can be used from tasks on a
/// multi-threaded tokio runtime.
pub trait StoreSession: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Units ─────────────────────────────────────────────────────────────

  /// Find the unit with `source_id`, creating it if absent, and set its name.
  fn find_or_create_unit(
    &self,
    source_id: i64,
    name: String,
  ) -> impl Future<Output = Result<Unit, Self::Error>> + Send + '_;

  /// Overwrite a unit's category and parent link.
  fn update_unit(
    &self,
    unit_id: UnitId,
    kind: String,
    parent_id: Option<UnitId>,
  ) -> impl Future<Output = Result<Unit, Self::Error>> + Send + '_;

  fn get_unit(
    &self,
    unit_id: UnitId,
  ) -> impl Future<Output = Result<Option<Unit>, Self::Error>> + Send + '_;

  fn find_unit(
    &self,
    source_id: i64,
  ) -> impl Future<Output = Result<Option<Unit>, Self::Error>> + Send + '_;

  /// All units, ordered by source id.
  fn list_units(
    &self,
  ) -> impl Future<Output = Result<Vec<Unit>, Self::Error>> + Send + '_;

  // ── People ────────────────────────────────────────────────────────────

  /// Find the person named `name`, creating an empty record if absent.
  fn find_or_create_person(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  fn find_person(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<Person>, Self::Error>> + Send + '_;

  /// All people, ordered by name.
  fn list_people(
    &self,
  ) -> impl Future<Output = Result<Vec<Person>, Self::Error>> + Send + '_;

  fn set_person_status(
    &self,
    person_id: PersonId,
    status: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Apply the `Some` fields of `update`; `None` fields keep stored values.
  fn update_profile(
    &self,
    person_id: PersonId,
    update: ProfileUpdate,
  ) -> impl Future<Output = Result<Person, Self::Error>> + Send + '_;

  // ── Ranks ─────────────────────────────────────────────────────────────

  /// A person's rank history: dated entries in ascending order, then the
  /// placeholder entry if there is one.
  fn ranks(
    &self,
    person_id: PersonId,
  ) -> impl Future<Output = Result<Vec<Rank>, Self::Error>> + Send + '_;

  /// Set the short name of the person's single unknown-valid-from entry,
  /// creating it if absent.
  fn set_placeholder_rank(
    &self,
    person_id: PersonId,
    name_short: String,
  ) -> impl Future<Output = Result<Rank, Self::Error>> + Send + '_;

  /// Remove the person's placeholder entry. Returns whether one existed.
  fn remove_placeholder_rank(
    &self,
    person_id: PersonId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Append a dated rank. Returns `None` without writing when an entry with
  /// the same source id already exists.
  fn append_rank(
    &self,
    rank: NewRank,
  ) -> impl Future<Output = Result<Option<Rank>, Self::Error>> + Send + '_;

  // ── Memberships ───────────────────────────────────────────────────────

  /// Find or create the membership of `person_id` in `unit_id` and mark it
  /// active with the given position and join time.
  fn upsert_membership(
    &self,
    person_id: PersonId,
    unit_id: UnitId,
    position_short: Option<String>,
    joined_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<PersonUnit, Self::Error>> + Send + '_;

  /// Every membership of a person, active or retired.
  fn memberships(
    &self,
    person_id: PersonId,
  ) -> impl Future<Output = Result<Vec<PersonUnit>, Self::Error>> + Send + '_;

  fn active_memberships(
    &self,
    person_id: PersonId,
  ) -> impl Future<Output = Result<Vec<PersonUnit>, Self::Error>> + Send + '_;

  /// Stamp `removed_at = at` on the given memberships that are still active.
  /// Returns how many were retired.
  fn retire_memberships(
    &self,
    ids: Vec<PersonUnitId>,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Events ────────────────────────────────────────────────────────────

  fn find_or_create_event(
    &self,
    source_id: i64,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  fn update_event(
    &self,
    event_id: EventId,
    details: EventDetails,
  ) -> impl Future<Output = Result<Event, Self::Error>> + Send + '_;

  fn get_event(
    &self,
    event_id: EventId,
  ) -> impl Future<Output = Result<Option<Event>, Self::Error>> + Send + '_;

  /// Add a unit to an event's unit set. Adding a unit twice is a no-op.
  fn attach_event_unit(
    &self,
    event_id: EventId,
    unit_id: UnitId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn event_units(
    &self,
    event_id: EventId,
  ) -> impl Future<Output = Result<Vec<Unit>, Self::Error>> + Send + '_;

  /// Find or create the attendance record of `person_id` at `event_id`.
  /// A `None` category or timestamp keeps the previously recorded value; a
  /// new record without a category is [`Attendance::Unknown`].
  fn upsert_attendance(
    &self,
    person_id: PersonId,
    event_id: EventId,
    attendance: Option<Attendance>,
    recorded_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<PersonEvent, Self::Error>> + Send + '_;

  fn attendances(
    &self,
    event_id: EventId,
  ) -> impl Future<Output = Result<Vec<PersonEvent>, Self::Error>> + Send + '_;
}
