//! Roster lines and per-person membership reconciliation.

use chrono::{DateTime, Utc};
use muster_core::{
  model::{PersonUnitId, UnitId},
  position,
  source::{PageGrammar, SessionProvider},
  store::{DirectoryStore, StoreSession},
};

use crate::{Crawler, Error, Result, resolver};

const ON_LEAVE: &str = "on leave";

/// One roster sighting of a person in a unit.
///
/// Text forms:
///
/// ```text
/// Commanding Officer - Constance, CPT     position, name, rank
/// BetaHook, PFC - On Leave                name, rank, on leave
/// Juvenis, COL                            name, rank
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterLine {
  pub unit_id:        UnitId,
  pub name:           String,
  pub rank:           Option<String>,
  pub position_long:  Option<String>,
  pub position_short: Option<&'static str>,
  pub on_leave:       bool,
}

impl RosterLine {
  pub fn parse(text: &str, unit_id: UnitId) -> muster_core::Result<Self> {
    let text = text.trim();

    // A dash inside a name or title ("Commander-in-Chief") is not a separator;
    // only a spaced one is.
    let (position_long, person, on_leave) = match text.rsplit_once(" - ") {
      Some((left, right)) if right.to_lowercase().contains(ON_LEAVE) => {
        (None, left, true)
      }
      Some((left, right)) => (Some(left.trim()), right, false),
      None => (None, text, false),
    };

    let (name, rank) = match person.split_once(',') {
      Some((name, rank)) => (name.trim(), Some(rank.trim())),
      None => (person.trim(), None),
    };
    if name.is_empty() {
      return Err(muster_core::Error::RosterLine(text.to_string()));
    }

    let position_long = position_long.filter(|p| !p.is_empty());
    let position_short = position_long.and_then(position::short_code);
    if let Some(title) = position_long
      && position_short.is_none()
    {
      tracing::warn!(person = %name, position = title, "unknown position title");
    }

    Ok(Self {
      unit_id,
      name: name.to_string(),
      rank: rank.filter(|r| !r.is_empty()).map(str::to_string),
      position_long: position_long.map(str::to_string),
      position_short,
      on_leave,
    })
  }
}

/// What reconciling one person's lines did.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PersonOutcome {
  pub lines:   usize,
  pub retired: usize,
}

impl<S, P, G> Crawler<S, P, G>
where
  S: DirectoryStore + 'static,
  P: SessionProvider + 'static,
  G: PageGrammar + 'static,
{
  /// Upsert one membership per line, then retire every other active
  /// membership of the person.
  pub(crate) async fn reconcile_person(
    &self,
    name: String,
    lines: Vec<RosterLine>,
    now: DateTime<Utc>,
  ) -> Result<PersonOutcome> {
    let session = self.store.open_session().await.map_err(Error::store)?;

    let mut touched: Vec<PersonUnitId> = Vec::with_capacity(lines.len());
    let mut person_id = None;

    for line in &lines {
      let person =
        resolver::person_with_rank(&session, &line.name, line.rank.as_deref()).await?;
      if line.on_leave {
        session
          .set_person_status(person.person_id, ON_LEAVE.to_string())
          .await
          .map_err(Error::store)?;
      }

      let membership = session
        .upsert_membership(
          person.person_id,
          line.unit_id,
          line.position_short.map(str::to_string),
          now,
        )
        .await
        .map_err(Error::store)?;
      touched.push(membership.person_unit_id);
      person_id = Some(person.person_id);
    }

    let Some(person_id) = person_id else {
      return Ok(PersonOutcome::default());
    };

    let stale: Vec<PersonUnitId> = session
      .active_memberships(person_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|m| m.person_unit_id)
      .filter(|id| !touched.contains(id))
      .collect();
    let retired = session
      .retire_memberships(stale, now)
      .await
      .map_err(Error::store)?;

    tracing::debug!(person = %name, lines = lines.len(), retired, "roster reconciled");
    Ok(PersonOutcome { lines: lines.len(), retired })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const UNIT: UnitId = UnitId(7);

  #[test]
  fn position_name_rank() {
    let line = RosterLine::parse("Commanding Officer - Constance, CPT", UNIT).unwrap();
    assert_eq!(line.name, "Constance");
    assert_eq!(line.rank.as_deref(), Some("CPT"));
    assert_eq!(line.position_long.as_deref(), Some("Commanding Officer"));
    assert_eq!(line.position_short, Some("CO"));
    assert!(!line.on_leave);
  }

  #[test]
  fn hyphenated_title_keeps_its_hyphens() {
    let line = RosterLine::parse("Commander-in-Chief - DOC, GEN5", UNIT).unwrap();
    assert_eq!(line.name, "DOC");
    assert_eq!(line.position_short, Some("CiC"));
  }

  #[test]
  fn on_leave_line() {
    let line = RosterLine::parse("BetaHook, PFC - On Leave", UNIT).unwrap();
    assert_eq!(line.name, "BetaHook");
    assert_eq!(line.rank.as_deref(), Some("PFC"));
    assert_eq!(line.position_long, None);
    assert!(line.on_leave);
  }

  #[test]
  fn bare_name_and_rank() {
    let line = RosterLine::parse("  Juvenis, COL ", UNIT).unwrap();
    assert_eq!((line.name.as_str(), line.rank.as_deref()), ("Juvenis", Some("COL")));
    assert_eq!(line.unit_id, UNIT);

    let line = RosterLine::parse("Recruit", UNIT).unwrap();
    assert_eq!(line.rank, None);
  }

  #[test]
  fn unknown_position_is_dropped() {
    let line = RosterLine::parse("Morale Officer - Samuel, SGT", UNIT).unwrap();
    assert_eq!(line.position_long.as_deref(), Some("Morale Officer"));
    assert_eq!(line.position_short, None);
  }

  #[test]
  fn empty_name_is_rejected() {
    assert!(matches!(
      RosterLine::parse(" , PFC", UNIT),
      Err(muster_core::Error::RosterLine(_))
    ));
  }
}
