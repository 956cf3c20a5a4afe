//! Event and attendance reconciliation, and the sequential event sweep.

use muster_core::{
  model::{Attendance, EventDetails, EventId},
  source::{AttendeeRow, EventPage, FieldTable, Page, PageGrammar, SessionProvider},
  store::{DirectoryStore, StoreSession},
  timestamp,
};

use crate::{Crawler, Error, Result, resolver};

/// How one event page was classified and handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
  ValidEvent,
  /// Fetching, parsing or storing the event failed. Already-made writes stay.
  ErroneousEvent,
  /// The source's "base event" placeholder.
  BaseEventSkipped,
  /// The source redirected away from the event pages: the id is past the last
  /// event.
  TerminalMarker,
}

/// Per-outcome counts of an event sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
  pub visited:      usize,
  pub valid:        usize,
  pub erroneous:    usize,
  pub base_skipped: usize,
  /// Whether the sweep stopped at the terminal marker rather than the limit.
  pub reached_end:  bool,
  /// Whether the sweep stopped after too many erroneous events in a row.
  pub gave_up:      bool,
}

impl SweepSummary {
  fn record(&mut self, outcome: EventOutcome) {
    self.visited += 1;
    match outcome {
      EventOutcome::ValidEvent => self.valid += 1,
      EventOutcome::ErroneousEvent => self.erroneous += 1,
      EventOutcome::BaseEventSkipped => self.base_skipped += 1,
      EventOutcome::TerminalMarker => self.reached_end = true,
    }
  }
}

impl<S, P, G> Crawler<S, P, G>
where
  S: DirectoryStore + 'static,
  P: SessionProvider + 'static,
  G: PageGrammar + 'static,
{
  /// Fetch and reconcile the event with source id `source_id`. Never fails:
  /// errors are logged and reported as [`EventOutcome::ErroneousEvent`].
  pub async fn reconcile_event(&self, source_id: i64) -> EventOutcome {
    let result = match self.fetch(self.sites.event(source_id)).await {
      Ok(page) => self.apply_event_page(&page).await,
      Err(e) => Err(e),
    };
    match result {
      Ok(outcome) => outcome,
      Err(e) => {
        tracing::error!(event = source_id, error = %e, "erroneous event");
        EventOutcome::ErroneousEvent
      }
    }
  }

  /// Reconcile an already-fetched event page. The event id is taken from the
  /// page's final URI.
  pub async fn apply_event_page(&self, page: &Page) -> Result<EventOutcome> {
    let path = page.path();
    if !path.contains("event") {
      tracing::debug!(uri = %page.uri, "left the event pages");
      return Ok(EventOutcome::TerminalMarker);
    }
    let source_id = id_from_link(path).ok_or_else(|| {
      muster_core::Error::grammar("event", format!("no event id in {path:?}"))
    })?;

    let (fields, attendees) = match self.grammar.event_page(page)? {
      EventPage::Base => {
        tracing::debug!(event = source_id, "base event, skipping");
        return Ok(EventOutcome::BaseEventSkipped);
      }
      EventPage::Listing { fields, attendees } => (fields, attendees),
    };
    let details = event_details(&fields)?;

    let session = self.store.open_session().await.map_err(Error::store)?;
    let event = session
      .find_or_create_event(source_id)
      .await
      .map_err(Error::store)?;
    session
      .update_event(event.event_id, details)
      .await
      .map_err(Error::store)?;

    let rows = attendees.len();
    for row in attendees {
      apply_attendee(&session, event.event_id, source_id, row).await?;
    }

    tracing::debug!(event = source_id, rows, "event reconciled");
    Ok(EventOutcome::ValidEvent)
  }

  /// Reconcile events `first_id`, `first_id + 1`, … one at a time until the
  /// terminal marker, until `limit` events have been visited, or until
  /// `max_consecutive_errors` erroneous events follow each other.
  pub async fn sweep_events(&self, first_id: i64, limit: Option<usize>) -> SweepSummary {
    tracing::info!(first = first_id, ?limit, "sweeping events");
    let mut summary = SweepSummary::default();
    let mut source_id = first_id;
    let mut consecutive_errors = 0;

    while limit.is_none_or(|limit| summary.visited < limit) {
      let outcome = self.reconcile_event(source_id).await;
      summary.record(outcome);
      match outcome {
        EventOutcome::TerminalMarker => break,
        EventOutcome::ErroneousEvent => consecutive_errors += 1,
        _ => consecutive_errors = 0,
      }
      if consecutive_errors >= self.max_consecutive_errors {
        tracing::error!(
          last = source_id,
          errors = consecutive_errors,
          "too many erroneous events in a row, giving up"
        );
        summary.gave_up = true;
        break;
      }
      source_id += 1;
    }

    tracing::info!(
      visited = summary.visited,
      valid = summary.valid,
      erroneous = summary.erroneous,
      base_skipped = summary.base_skipped,
      reached_end = summary.reached_end,
      gave_up = summary.gave_up,
      "event sweep finished"
    );
    summary
  }
}

/// The details table's fields. A `When` value that is present but malformed
/// is an error.
fn event_details(fields: &FieldTable) -> Result<EventDetails> {
  let text = |label: &str| fields.get(label).unwrap_or_default().to_string();
  let flag = |label: &str| fields.get(label).is_some_and(|v| v.eq_ignore_ascii_case("yes"));

  let (starts_at, ends_at) = match fields.get("When") {
    Some(when) => {
      let (from, to) = timestamp::split_when(when);
      (
        from.map(timestamp::parse_us_time).transpose()?,
        to.map(timestamp::parse_us_time).transpose()?,
      )
    }
    None => (None, None),
  };

  Ok(EventDetails {
    name: text("Name"),
    description: text("Description"),
    kind: text("Type"),
    mandatory: flag("Mandatory"),
    cancelled: flag("Cancelled"),
    starts_at,
    ends_at,
  })
}

async fn apply_attendee<T: StoreSession>(
  session: &T,
  event_id: EventId,
  event: i64,
  row: AttendeeRow,
) -> Result<()> {
  let Some(link) = row.link.as_deref() else {
    // Rows such as a unit name without a link carry nothing to record.
    tracing::warn!(event, name = %row.name, "attendee row without link, skipping");
    return Ok(());
  };

  if link.starts_with("/member") {
    let person = resolver::person(session, &row.name).await?;
    let attendance = Attendance::from_text(&row.attendance);
    if attendance.is_none() && !row.attendance.trim().is_empty() {
      tracing::debug!(
        event,
        category = %row.attendance,
        "unmapped attendance category, keeping stored one"
      );
    }
    let recorded_at = attendance_time(event, &row.timestamp);
    session
      .upsert_attendance(person.person_id, event_id, attendance, recorded_at)
      .await
      .map_err(Error::store)?;
  } else if link.starts_with("/unit") {
    let unit_source = id_from_link(link).ok_or_else(|| {
      muster_core::Error::grammar("event", format!("no unit id in {link:?}"))
    })?;
    let unit = resolver::unit(session, unit_source, row.name.clone()).await?;
    session
      .attach_event_unit(event_id, unit.unit_id)
      .await
      .map_err(Error::store)?;
  } else {
    return Err(Error::UnexpectedAttendeeRow {
      name: row.name.clone(),
      link: link.to_string(),
    });
  }
  Ok(())
}

/// `None` for the `--` placeholder, blanks and unparseable values.
fn attendance_time(event: i64, value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
  if value.contains("--") || value.trim().is_empty() {
    return None;
  }
  match timestamp::parse_attendance_time(value) {
    Ok(at) => Some(at),
    Err(e) => {
      tracing::warn!(event, error = %e, "unparseable attendance time");
      None
    }
  }
}

/// `/event/65132.aspx` → `65132`.
fn id_from_link(link: &str) -> Option<i64> {
  let last = link.rsplit(['/', '\\']).next()?;
  last.strip_suffix(".aspx").unwrap_or(last).parse().ok()
}
