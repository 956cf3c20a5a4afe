//! [`SqliteStore`], the SQLite implementation of [`DirectoryStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use muster_core::{
  model::{
    Attendance, Event, EventDetails, EventId, NewRank, Person, PersonEvent,
    PersonId, PersonUnit, PersonUnitId, ProfileUpdate, Rank, Unit, UnitId,
  },
  store::{DirectoryStore, StoreSession},
};

use crate::{
  encode::{
    ATTENDANCE_COLUMNS, EVENT_COLUMNS, MEMBERSHIP_COLUMNS, PERSON_COLUMNS,
    RANK_COLUMNS, RawAttendance, RawEvent, RawMembership, RawPerson, RawRank,
    UNIT_COLUMNS, encode_attendance, encode_date, encode_dt, unit_from_row,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Number of sessions that may be open at once unless configured otherwise.
pub const DEFAULT_MAX_SESSIONS: usize = 10;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Muster directory store backed by a single SQLite file.
///
/// Cloning is cheap: the connection handle and the session gate are
/// reference-counted and shared between clones.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  gate: Arc<Semaphore>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store. Used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  /// Replace the session gate with one that admits `max_sessions` sessions.
  pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
    self.gate = Arc::new(Semaphore::new(max_sessions.max(1)));
    self
  }

  /// Sessions that could be opened right now without waiting.
  pub fn available_sessions(&self) -> usize { self.gate.available_permits() }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, gate: Arc::new(Semaphore::new(DEFAULT_MAX_SESSIONS)) })
  }
}

impl DirectoryStore for SqliteStore {
  type Error = Error;
  type Session = SqliteSession;

  async fn open_session(&self) -> Result<SqliteSession> {
    let permit = self
      .gate
      .clone()
      .acquire_owned()
      .await
      .map_err(|_| Error::GateClosed)?;
    Ok(SqliteSession { conn: self.conn.clone(), _permit: permit })
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// An open slot on a [`SqliteStore`]. The slot is released on drop.
pub struct SqliteSession {
  conn:    tokio_rusqlite::Connection,
  _permit: OwnedSemaphorePermit,
}

// ── Row helpers (run inside `Connection::call`) ──────────────────────────────

fn select_unit(
  conn: &rusqlite::Connection,
  filter: &str,
  key: i64,
) -> rusqlite::Result<Option<Unit>> {
  conn
    .query_row(
      &format!("SELECT {} FROM units WHERE {} = ?1", UNIT_COLUMNS, filter),
      rusqlite::params![key],
      unit_from_row,
    )
    .optional()
}

fn select_person_by_id(
  conn: &rusqlite::Connection,
  person_id: i64,
) -> rusqlite::Result<Option<RawPerson>> {
  conn
    .query_row(
      &format!("SELECT {} FROM people WHERE person_id = ?1", PERSON_COLUMNS),
      rusqlite::params![person_id],
      RawPerson::from_row,
    )
    .optional()
}

fn select_person_by_name(
  conn: &rusqlite::Connection,
  name: &str,
) -> rusqlite::Result<Option<RawPerson>> {
  conn
    .query_row(
      &format!("SELECT {} FROM people WHERE name = ?1", PERSON_COLUMNS),
      rusqlite::params![name],
      RawPerson::from_row,
    )
    .optional()
}

fn select_rank(
  conn: &rusqlite::Connection,
  rank_id: i64,
) -> rusqlite::Result<RawRank> {
  conn.query_row(
    &format!("SELECT {} FROM ranks WHERE rank_id = ?1", RANK_COLUMNS),
    rusqlite::params![rank_id],
    RawRank::from_row,
  )
}

fn select_memberships(
  conn: &rusqlite::Connection,
  person_id: i64,
  active_only: bool,
) -> rusqlite::Result<Vec<RawMembership>> {
  let filter = if active_only { "AND removed_at IS NULL" } else { "" };
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM person_units WHERE person_id = ?1 {} ORDER BY person_unit_id",
    MEMBERSHIP_COLUMNS, filter
  ))?;
  stmt
    .query_map(rusqlite::params![person_id], RawMembership::from_row)?
    .collect()
}

fn select_event(
  conn: &rusqlite::Connection,
  filter: &str,
  key: i64,
) -> rusqlite::Result<Option<RawEvent>> {
  conn
    .query_row(
      &format!("SELECT {} FROM events WHERE {} = ?1", EVENT_COLUMNS, filter),
      rusqlite::params![key],
      RawEvent::from_row,
    )
    .optional()
}

// ─── StoreSession impl ───────────────────────────────────────────────────────

impl StoreSession for SqliteSession {
  type Error = Error;

  // ── Units ─────────────────────────────────────────────────────────────────

  async fn find_or_create_unit(&self, source_id: i64, name: String) -> Result<Unit> {
    let unit = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO units (source_id, name) VALUES (?1, ?2)
           ON CONFLICT (source_id) DO UPDATE SET name = excluded.name",
          rusqlite::params![source_id, name],
        )?;
        Ok(select_unit(conn, "source_id", source_id)?)
      })
      .await?;

    unit.ok_or(Error::RowNotFound { table: "units", id: source_id })
  }

  async fn update_unit(
    &self,
    unit_id:   UnitId,
    kind:      String,
    parent_id: Option<UnitId>,
  ) -> Result<Unit> {
    let id = unit_id.0;
    let parent = parent_id.map(|p| p.0);

    let unit = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE units SET kind = ?2, parent_id = ?3 WHERE unit_id = ?1",
          rusqlite::params![id, kind, parent],
        )?;
        Ok(select_unit(conn, "unit_id", id)?)
      })
      .await?;

    unit.ok_or(Error::RowNotFound { table: "units", id })
  }

  async fn get_unit(&self, unit_id: UnitId) -> Result<Option<Unit>> {
    let id = unit_id.0;
    Ok(
      self
        .conn
        .call(move |conn| Ok(select_unit(conn, "unit_id", id)?))
        .await?,
    )
  }

  async fn find_unit(&self, source_id: i64) -> Result<Option<Unit>> {
    Ok(
      self
        .conn
        .call(move |conn| Ok(select_unit(conn, "source_id", source_id)?))
        .await?,
    )
  }

  async fn list_units(&self) -> Result<Vec<Unit>> {
    Ok(
      self
        .conn
        .call(|conn| {
          let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM units ORDER BY source_id",
            UNIT_COLUMNS
          ))?;
          let rows = stmt
            .query_map([], unit_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  // ── People ────────────────────────────────────────────────────────────────

  async fn find_or_create_person(&self, name: String) -> Result<Person> {
    // Insert and read back inside one call: the connection thread serialises
    // calls, so concurrent first sightings of a name converge on one row.
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO people (name) VALUES (?1) ON CONFLICT (name) DO NOTHING",
          rusqlite::params![name],
        )?;
        Ok(select_person_by_name(conn, &name)?)
      })
      .await?;

    match raw {
      Some(raw) => raw.into_person(),
      None => Err(Error::RowNotFound { table: "people", id: -1 }),
    }
  }

  async fn find_person(&self, name: String) -> Result<Option<Person>> {
    let raw = self
      .conn
      .call(move |conn| Ok(select_person_by_name(conn, &name)?))
      .await?;
    raw.map(RawPerson::into_person).transpose()
  }

  async fn list_people(&self) -> Result<Vec<Person>> {
    let raws: Vec<RawPerson> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM people ORDER BY name",
          PERSON_COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawPerson::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPerson::into_person).collect()
  }

  async fn set_person_status(&self, person_id: PersonId, status: String) -> Result<()> {
    let id = person_id.0;
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE people SET status = ?2 WHERE person_id = ?1",
          rusqlite::params![id, status],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::RowNotFound { table: "people", id });
    }
    Ok(())
  }

  async fn update_profile(
    &self,
    person_id: PersonId,
    update:    ProfileUpdate,
  ) -> Result<Person> {
    let id           = person_id.0;
    let applied_at   = update.applied_at.map(encode_dt);
    let admitted_at  = update.admitted_at.map(encode_dt);
    let joined_on    = update.joined_on.map(encode_date);
    let refreshed_at = update.profile_refreshed_at.map(encode_dt);
    let ProfileUpdate { country, status, biography, avatar_url, steam_id, .. } =
      update;

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE people SET
             country              = COALESCE(?2,  country),
             status               = COALESCE(?3,  status),
             biography            = COALESCE(?4,  biography),
             avatar_url           = COALESCE(?5,  avatar_url),
             steam_id             = COALESCE(?6,  steam_id),
             applied_at           = COALESCE(?7,  applied_at),
             admitted_at          = COALESCE(?8,  admitted_at),
             joined_on            = COALESCE(?9,  joined_on),
             profile_refreshed_at = COALESCE(?10, profile_refreshed_at)
           WHERE person_id = ?1",
          rusqlite::params![
            id,
            country,
            status,
            biography,
            avatar_url,
            steam_id,
            applied_at,
            admitted_at,
            joined_on,
            refreshed_at,
          ],
        )?;
        Ok(select_person_by_id(conn, id)?)
      })
      .await?;

    raw
      .ok_or(Error::RowNotFound { table: "people", id })?
      .into_person()
  }

  // ── Ranks ─────────────────────────────────────────────────────────────────

  async fn ranks(&self, person_id: PersonId) -> Result<Vec<Rank>> {
    let id = person_id.0;
    let raws: Vec<RawRank> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM ranks WHERE person_id = ?1
           ORDER BY valid_from IS NULL, valid_from, rank_id",
          RANK_COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawRank::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRank::into_rank).collect()
  }

  async fn set_placeholder_rank(
    &self,
    person_id:  PersonId,
    name_short: String,
  ) -> Result<Rank> {
    let id = person_id.0;
    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE ranks SET name_short = ?2, name_long = NULL
           WHERE person_id = ?1 AND valid_from IS NULL",
          rusqlite::params![id, name_short],
        )?;
        if updated == 0 {
          tx.execute(
            "INSERT INTO ranks (person_id, name_short) VALUES (?1, ?2)",
            rusqlite::params![id, name_short],
          )?;
        }
        let raw = tx.query_row(
          &format!(
            "SELECT {} FROM ranks WHERE person_id = ?1 AND valid_from IS NULL",
            RANK_COLUMNS
          ),
          rusqlite::params![id],
          RawRank::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_rank()
  }

  async fn remove_placeholder_rank(&self, person_id: PersonId) -> Result<bool> {
    let id = person_id.0;
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM ranks WHERE person_id = ?1 AND valid_from IS NULL",
          rusqlite::params![id],
        )?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn append_rank(&self, rank: NewRank) -> Result<Option<Rank>> {
    let person_id  = rank.person_id.0;
    let valid_from = encode_dt(rank.valid_from);
    let granted_by = rank.granted_by.map(|p| p.0);
    let NewRank { name_long, source_id, .. } = rank;

    let raw = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT OR IGNORE INTO ranks
             (person_id, name_long, source_id, valid_from, granted_by)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![person_id, name_long, source_id, valid_from, granted_by],
        )?;
        if inserted == 0 {
          return Ok(None);
        }
        Ok(Some(select_rank(conn, conn.last_insert_rowid())?))
      })
      .await?;

    raw.map(RawRank::into_rank).transpose()
  }

  // ── Memberships ───────────────────────────────────────────────────────────

  async fn upsert_membership(
    &self,
    person_id:      PersonId,
    unit_id:        UnitId,
    position_short: Option<String>,
    joined_at:      DateTime<Utc>,
  ) -> Result<PersonUnit> {
    let person = person_id.0;
    let unit   = unit_id.0;
    let joined = encode_dt(joined_at);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO person_units (person_id, unit_id, position_short, joined_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (person_id, unit_id) DO UPDATE SET
             position_short = excluded.position_short,
             joined_at      = excluded.joined_at,
             removed_at     = NULL",
          rusqlite::params![person, unit, position_short, joined],
        )?;
        let raw = conn.query_row(
          &format!(
            "SELECT {} FROM person_units WHERE person_id = ?1 AND unit_id = ?2",
            MEMBERSHIP_COLUMNS
          ),
          rusqlite::params![person, unit],
          RawMembership::from_row,
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_membership()
  }

  async fn memberships(&self, person_id: PersonId) -> Result<Vec<PersonUnit>> {
    let id = person_id.0;
    let raws = self
      .conn
      .call(move |conn| Ok(select_memberships(conn, id, false)?))
      .await?;
    raws.into_iter().map(RawMembership::into_membership).collect()
  }

  async fn active_memberships(&self, person_id: PersonId) -> Result<Vec<PersonUnit>> {
    let id = person_id.0;
    let raws = self
      .conn
      .call(move |conn| Ok(select_memberships(conn, id, true)?))
      .await?;
    raws.into_iter().map(RawMembership::into_membership).collect()
  }

  async fn retire_memberships(
    &self,
    ids: Vec<PersonUnitId>,
    at:  DateTime<Utc>,
  ) -> Result<usize> {
    if ids.is_empty() {
      return Ok(0);
    }
    let at_str = encode_dt(at);

    let retired = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut retired = 0;
        {
          let mut stmt = tx.prepare(
            "UPDATE person_units SET removed_at = ?2
             WHERE person_unit_id = ?1 AND removed_at IS NULL",
          )?;
          for id in &ids {
            retired += stmt.execute(rusqlite::params![id.0, at_str])?;
          }
        }
        tx.commit()?;
        Ok(retired)
      })
      .await?;

    tracing::trace!(retired, "retired memberships");
    Ok(retired)
  }

  // ── Events ────────────────────────────────────────────────────────────────

  async fn find_or_create_event(&self, source_id: i64) -> Result<Event> {
    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO events (source_id) VALUES (?1)
           ON CONFLICT (source_id) DO NOTHING",
          rusqlite::params![source_id],
        )?;
        Ok(select_event(conn, "source_id", source_id)?)
      })
      .await?;

    raw
      .ok_or(Error::RowNotFound { table: "events", id: source_id })?
      .into_event()
  }

  async fn update_event(&self, event_id: EventId, details: EventDetails) -> Result<Event> {
    let id        = event_id.0;
    let starts_at = details.starts_at.map(encode_dt);
    let ends_at   = details.ends_at.map(encode_dt);
    let EventDetails { name, description, kind, mandatory, cancelled, .. } = details;

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE events SET
             name = ?2, description = ?3, kind = ?4,
             mandatory = ?5, cancelled = ?6, starts_at = ?7, ends_at = ?8
           WHERE event_id = ?1",
          rusqlite::params![
            id,
            name,
            description,
            kind,
            mandatory,
            cancelled,
            starts_at,
            ends_at,
          ],
        )?;
        Ok(select_event(conn, "event_id", id)?)
      })
      .await?;

    raw.ok_or(Error::RowNotFound { table: "events", id })?.into_event()
  }

  async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
    let id = event_id.0;
    let raw = self
      .conn
      .call(move |conn| Ok(select_event(conn, "event_id", id)?))
      .await?;
    raw.map(RawEvent::into_event).transpose()
  }

  async fn attach_event_unit(&self, event_id: EventId, unit_id: UnitId) -> Result<()> {
    let (event, unit) = (event_id.0, unit_id.0);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO event_units (event_id, unit_id) VALUES (?1, ?2)",
          rusqlite::params![event, unit],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn event_units(&self, event_id: EventId) -> Result<Vec<Unit>> {
    let id = event_id.0;
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(
            "SELECT u.unit_id, u.source_id, u.name, u.kind, u.parent_id
             FROM units u
             JOIN event_units eu ON eu.unit_id = u.unit_id
             WHERE eu.event_id = ?1
             ORDER BY u.source_id",
          )?;
          let rows = stmt
            .query_map(rusqlite::params![id], unit_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn upsert_attendance(
    &self,
    person_id:   PersonId,
    event_id:    EventId,
    attendance:  Option<Attendance>,
    recorded_at: Option<DateTime<Utc>>,
  ) -> Result<PersonEvent> {
    let (person, event) = (person_id.0, event_id.0);
    let attendance_str  = attendance.map(encode_attendance);
    let recorded_str    = recorded_at.map(encode_dt);

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO person_events (person_id, event_id, attendance, recorded_at)
           VALUES (?1, ?2, COALESCE(?3, 'unknown'), ?4)
           ON CONFLICT (person_id, event_id) DO UPDATE SET
             attendance  = COALESCE(?3, person_events.attendance),
             recorded_at = COALESCE(excluded.recorded_at, person_events.recorded_at)",
          rusqlite::params![person, event, attendance_str, recorded_str],
        )?;
        let raw = conn.query_row(
          &format!(
            "SELECT {} FROM person_events WHERE person_id = ?1 AND event_id = ?2",
            ATTENDANCE_COLUMNS
          ),
          rusqlite::params![person, event],
          RawAttendance::from_row,
        )?;
        Ok(raw)
      })
      .await?;

    raw.into_person_event()
  }

  async fn attendances(&self, event_id: EventId) -> Result<Vec<PersonEvent>> {
    let id = event_id.0;
    let raws: Vec<RawAttendance> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM person_events WHERE event_id = ?1 ORDER BY person_event_id",
          ATTENDANCE_COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id], RawAttendance::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawAttendance::into_person_event).collect()
  }
}
