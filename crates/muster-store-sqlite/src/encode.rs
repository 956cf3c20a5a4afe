//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings in UTC, so lexical order matches
//! chronological order. Calendar dates are stored as `YYYY-MM-DD`.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use muster_core::model::{
  Attendance, Event, EventId, Person, PersonEvent, PersonEventId, PersonId,
  PersonUnit, PersonUnitId, Rank, RankId, Unit, UnitId, ValidFrom,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Attendance ──────────────────────────────────────────────────────────────

pub fn encode_attendance(a: Attendance) -> String { a.as_str().to_owned() }

pub fn decode_attendance(s: &str) -> Result<Attendance> {
  s.parse().map_err(|_| Error::UnknownValue {
    column: "attendance",
    value:  s.to_owned(),
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const UNIT_COLUMNS: &str = "unit_id, source_id, name, kind, parent_id";

pub fn unit_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Unit> {
  Ok(Unit {
    unit_id:   UnitId(row.get(0)?),
    source_id: row.get(1)?,
    name:      row.get(2)?,
    kind:      row.get(3)?,
    parent_id: row.get::<_, Option<i64>>(4)?.map(UnitId),
  })
}

pub const PERSON_COLUMNS: &str = "person_id, name, country, status, biography, \
   avatar_url, steam_id, applied_at, admitted_at, joined_on, profile_refreshed_at";

/// Raw values read directly from a `people` row.
pub struct RawPerson {
  pub person_id:            i64,
  pub name:                 String,
  pub country:              Option<String>,
  pub status:               Option<String>,
  pub biography:            Option<String>,
  pub avatar_url:           Option<String>,
  pub steam_id:             Option<i64>,
  pub applied_at:           Option<String>,
  pub admitted_at:          Option<String>,
  pub joined_on:            Option<String>,
  pub profile_refreshed_at: Option<String>,
}

impl RawPerson {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_id:            row.get(0)?,
      name:                 row.get(1)?,
      country:              row.get(2)?,
      status:               row.get(3)?,
      biography:            row.get(4)?,
      avatar_url:           row.get(5)?,
      steam_id:             row.get(6)?,
      applied_at:           row.get(7)?,
      admitted_at:          row.get(8)?,
      joined_on:            row.get(9)?,
      profile_refreshed_at: row.get(10)?,
    })
  }

  pub fn into_person(self) -> Result<Person> {
    Ok(Person {
      person_id:            PersonId(self.person_id),
      name:                 self.name,
      country:              self.country,
      status:               self.status,
      biography:            self.biography,
      avatar_url:           self.avatar_url,
      steam_id:             self.steam_id,
      applied_at:           decode_opt_dt(self.applied_at)?,
      admitted_at:          decode_opt_dt(self.admitted_at)?,
      joined_on:            self.joined_on.as_deref().map(decode_date).transpose()?,
      profile_refreshed_at: decode_opt_dt(self.profile_refreshed_at)?,
    })
  }
}

pub const RANK_COLUMNS: &str =
  "rank_id, person_id, name_short, name_long, source_id, valid_from, granted_by";

/// Raw values read directly from a `ranks` row.
pub struct RawRank {
  pub rank_id:    i64,
  pub person_id:  i64,
  pub name_short: Option<String>,
  pub name_long:  Option<String>,
  pub source_id:  Option<i64>,
  pub valid_from: Option<String>,
  pub granted_by: Option<i64>,
}

impl RawRank {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      rank_id:    row.get(0)?,
      person_id:  row.get(1)?,
      name_short: row.get(2)?,
      name_long:  row.get(3)?,
      source_id:  row.get(4)?,
      valid_from: row.get(5)?,
      granted_by: row.get(6)?,
    })
  }

  pub fn into_rank(self) -> Result<Rank> {
    let valid_from = match self.valid_from.as_deref() {
      Some(s) => ValidFrom::Since(decode_dt(s)?),
      None => ValidFrom::Unknown,
    };
    Ok(Rank {
      rank_id: RankId(self.rank_id),
      person_id: PersonId(self.person_id),
      name_short: self.name_short,
      name_long: self.name_long,
      source_id: self.source_id,
      valid_from,
      granted_by: self.granted_by.map(PersonId),
    })
  }
}

pub const MEMBERSHIP_COLUMNS: &str =
  "person_unit_id, person_id, unit_id, position_short, joined_at, removed_at";

/// Raw values read directly from a `person_units` row.
pub struct RawMembership {
  pub person_unit_id: i64,
  pub person_id:      i64,
  pub unit_id:        i64,
  pub position_short: Option<String>,
  pub joined_at:      String,
  pub removed_at:     Option<String>,
}

impl RawMembership {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_unit_id: row.get(0)?,
      person_id:      row.get(1)?,
      unit_id:        row.get(2)?,
      position_short: row.get(3)?,
      joined_at:      row.get(4)?,
      removed_at:     row.get(5)?,
    })
  }

  pub fn into_membership(self) -> Result<PersonUnit> {
    Ok(PersonUnit {
      person_unit_id: PersonUnitId(self.person_unit_id),
      person_id:      PersonId(self.person_id),
      unit_id:        UnitId(self.unit_id),
      position_short: self.position_short,
      joined_at:      decode_dt(&self.joined_at)?,
      removed_at:     decode_opt_dt(self.removed_at)?,
    })
  }
}

pub const EVENT_COLUMNS: &str = "event_id, source_id, name, description, kind, \
   mandatory, cancelled, starts_at, ends_at";

/// Raw values read directly from an `events` row.
pub struct RawEvent {
  pub event_id:    i64,
  pub source_id:   i64,
  pub name:        String,
  pub description: String,
  pub kind:        String,
  pub mandatory:   bool,
  pub cancelled:   bool,
  pub starts_at:   Option<String>,
  pub ends_at:     Option<String>,
}

impl RawEvent {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      event_id:    row.get(0)?,
      source_id:   row.get(1)?,
      name:        row.get(2)?,
      description: row.get(3)?,
      kind:        row.get(4)?,
      mandatory:   row.get(5)?,
      cancelled:   row.get(6)?,
      starts_at:   row.get(7)?,
      ends_at:     row.get(8)?,
    })
  }

  pub fn into_event(self) -> Result<Event> {
    Ok(Event {
      event_id:    EventId(self.event_id),
      source_id:   self.source_id,
      name:        self.name,
      description: self.description,
      kind:        self.kind,
      mandatory:   self.mandatory,
      cancelled:   self.cancelled,
      starts_at:   decode_opt_dt(self.starts_at)?,
      ends_at:     decode_opt_dt(self.ends_at)?,
    })
  }
}

pub const ATTENDANCE_COLUMNS: &str =
  "person_event_id, person_id, event_id, attendance, recorded_at";

/// Raw values read directly from a `person_events` row.
pub struct RawAttendance {
  pub person_event_id: i64,
  pub person_id:       i64,
  pub event_id:        i64,
  pub attendance:      String,
  pub recorded_at:     Option<String>,
}

impl RawAttendance {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      person_event_id: row.get(0)?,
      person_id:       row.get(1)?,
      event_id:        row.get(2)?,
      attendance:      row.get(3)?,
      recorded_at:     row.get(4)?,
    })
  }

  pub fn into_person_event(self) -> Result<PersonEvent> {
    Ok(PersonEvent {
      person_event_id: PersonEventId(self.person_event_id),
      person_id:       PersonId(self.person_id),
      event_id:        EventId(self.event_id),
      attendance:      decode_attendance(&self.attendance)?,
      recorded_at:     decode_opt_dt(self.recorded_at)?,
    })
  }
}
