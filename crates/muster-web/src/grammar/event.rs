//! Event page.
//!
//! The page body is invalid HTML as a whole, so the two tables of interest
//! are sliced out of the raw text before parsing: the details table
//! (`<table cellpadding="20" cellspacing="5">`) and the attendee table
//! (`<table width=100%>`).

use muster_core::{
  Error, Result,
  source::{AttendeeRow, EventPage, FieldTable, Page},
};

use super::html::{self, Element};

const PAGE: &str = "event";
const PANEL_MARKER: &str = "ctl00_ctl00_bcr_bcr_UpdatePanel\">";
const BASE_EVENT_MARKER: &str = "This is a Base Event and should never be seen";
const DETAILS_TABLE: &str = "<table cellpadding=\"20\" cellspacing=\"5\">";
const ATTENDEE_TABLE: &str = "<table width=100%>";

pub fn parse(page: &Page) -> Result<EventPage> {
  let body = page
    .text
    .split_once(PANEL_MARKER)
    .map_or(page.text.as_str(), |(_, rest)| rest);

  if body.contains(BASE_EVENT_MARKER) {
    return Ok(EventPage::Base);
  }

  let details = between(body, DETAILS_TABLE, "</table>")
    .ok_or_else(|| Error::grammar(PAGE, "details table not found"))?;
  let fields = field_table(&html::parse(details));

  let attendees = match between(body, ATTENDEE_TABLE, "</table>") {
    Some(table) => attendee_rows(&html::parse(table)),
    None => Vec::new(),
  };

  Ok(EventPage::Listing { fields, attendees })
}

/// The text strictly between the first `start` and the next `end` after it.
pub(crate) fn between<'a>(text: &'a str, start: &str, end: &str) -> Option<&'a str> {
  let (_, rest) = text.split_once(start)?;
  let (inner, _) = rest.split_once(end)?;
  Some(inner)
}

/// Rows of `label | value` cells, in order. Rows with fewer than two cells
/// are skipped.
pub(crate) fn field_table(root: &Element) -> FieldTable {
  let mut table = FieldTable::default();
  for row in root.find_all("tr") {
    let cells = cells(row);
    if let [label, value, ..] = cells.as_slice() {
      table.insert(label.inner_text(), value.inner_text());
    }
  }
  table
}

fn cells(row: &Element) -> Vec<&Element> {
  row.elements().filter(|e| e.name == "td").collect()
}

fn attendee_rows(root: &Element) -> Vec<AttendeeRow> {
  root
    .find_all("tr")
    .into_iter()
    .filter_map(|row| {
      let cells = cells(row);
      let name_cell = cells.first()?;
      let text = |i: usize| cells.get(i).map(|c| c.inner_text()).unwrap_or_default();
      Some(AttendeeRow {
        name:       name_cell.inner_text(),
        link:       name_cell
          .child("a")
          .map(|a| a.attr("href").unwrap_or_default().to_string()),
        attendance: text(1),
        timestamp:  text(2),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn page(text: &str) -> Page {
    Page { uri: "http://taw.net/event/66327.aspx".into(), text: text.into() }
  }

  const EVENT: &str = r#"<html><div id="ctl00_ctl00_bcr_bcr_UpdatePanel">
    <table cellpadding="20" cellspacing="5">
      <tr><td>Name</td><td>GRAW Practice -- Saber Squad</td></tr>
      <tr><td>Type</td><td>Practice</td></tr>
      <tr><td>When</td><td>From: 6/3/2016 04:00:00 +02:00 to: 6/3/2016 05:00:00 +02:00</td></tr>
      <tr><td>Mandatory</td><td>Yes</td></tr>
    </table>
    <p>Attendees<div>
    <table width=100%>
      <tr><th>Name</th><th>Status</th><th>Time</th></tr>
      <tr><td><a href="/member/Jonas.aspx">Jonas</a></td><td>Present</td><td>6-1-2016 10:00</td>
      <tr><td><a href="/unit/10.aspx">Alpha Squad</a></td><td></td><td></td>
      <tr><td>Ghost Recon</td><td></td><td></td>
    </table>"#;

  #[test]
  fn listing_fields_and_attendees() {
    let EventPage::Listing { fields, attendees } = parse(&page(EVENT)).unwrap() else {
      panic!("expected a listing");
    };
    assert_eq!(fields.get("Name"), Some("GRAW Practice -- Saber Squad"));
    assert_eq!(fields.get("Mandatory"), Some("Yes"));
    assert_eq!(fields.get("Cancelled"), None);

    assert_eq!(attendees.len(), 3);
    assert_eq!(attendees[0], AttendeeRow {
      name:       "Jonas".into(),
      link:       Some("/member/Jonas.aspx".into()),
      attendance: "Present".into(),
      timestamp:  "6-1-2016 10:00".into(),
    });
    assert_eq!(attendees[1].link.as_deref(), Some("/unit/10.aspx"));
    assert_eq!(attendees[2].link, None);
  }

  #[test]
  fn base_event_marker() {
    let text = r#"<div id="ctl00_ctl00_bcr_bcr_UpdatePanel"><h2>This is a Base Event and should never be seen</h2>"#;
    assert_eq!(parse(&page(text)).unwrap(), EventPage::Base);
  }

  #[test]
  fn missing_details_table_is_a_grammar_error() {
    assert!(matches!(
      parse(&page("<html>nothing here</html>")),
      Err(Error::Grammar { page: PAGE, .. })
    ));
  }
}
