//! Collaborator contracts for reading the remote directory.
//!
//! Two seams live here:
//!
//! - [`SessionProvider`] / [`Session`]: the page-fetch layer. Sessions are
//!   scoped; dropping one releases it back to the provider.
//! - [`PageGrammar`]: the field-extraction grammar. A pure function from raw
//!   page content to the structured records below. Its failures surface as
//!   [`crate::Error::Grammar`].

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{Result, movement::Movement};

// ─── Fetch layer ─────────────────────────────────────────────────────────────

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
  /// Final URI after redirects. The source redirects requests for event ids
  /// past the last one to a non-event page.
  pub uri:  String,
  pub text: String,
}

impl Page {
  /// Path component of [`Page::uri`], without scheme, host or query.
  pub fn path(&self) -> &str {
    let rest = self
      .uri
      .split_once("://")
      .map(|(_, rest)| rest)
      .unwrap_or(&self.uri);
    let path = match rest.find('/') {
      Some(i) if self.uri.contains("://") => &rest[i..],
      Some(_) => rest,
      None => "/",
    };
    path.split(['?', '#']).next().unwrap_or(path)
  }
}

/// An open session against the source. Retry and backoff are the
/// implementation's concern.
pub trait Session: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `GET url`.
  fn get(
    &self,
    url: String,
  ) -> impl Future<Output = Result<Page, Self::Error>> + Send + '_;

  /// `POST url` with a JSON body; returns the raw response text.
  fn post_json(
    &self,
    url: String,
    payload: serde_json::Value,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}

/// Hands out scoped sessions.
pub trait SessionProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
  type Session: Session<Error = Self::Error>;

  fn acquire(
    &self,
  ) -> impl Future<Output = Result<Self::Session, Self::Error>> + Send + '_;
}

// ─── Extracted records ───────────────────────────────────────────────────────

/// A two-column label → value table, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTable(pub Vec<(String, String)>);

impl FieldTable {
  /// Value of the first row whose label matches, compared case-insensitively
  /// and ignoring a trailing `:`.
  pub fn get(&self, label: &str) -> Option<&str> {
    let want = label.trim().trim_end_matches(':');
    self
      .0
      .iter()
      .find(|(l, _)| l.trim().trim_end_matches(':').eq_ignore_ascii_case(want))
      .map(|(_, v)| v.as_str())
  }

  pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) {
    self.0.push((label.into(), value.into()));
  }
}

/// One node of a unit roster tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitNode {
  pub source_id: i64,
  pub name:      String,
  pub kind:      String,
  pub children:  Vec<UnitChild>,
}

/// A direct child of a roster node: either a raw roster line or a sub-unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitChild {
  /// Raw text such as `Commanding Officer - Constance, CPT`.
  Person(String),
  Unit(UnitNode),
}

/// One row of an event's attendee table, uninterpreted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendeeRow {
  pub name:       String,
  /// `href` of the anchor in the name cell, if any.
  pub link:       Option<String>,
  pub attendance: String,
  pub timestamp:  String,
}

/// What the grammar found on an event page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPage {
  /// The source's "base event" placeholder; carries no data.
  Base,
  Listing { fields: FieldTable, attendees: Vec<AttendeeRow> },
}

/// Raw profile page fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
  /// Href of the Steam profile link.
  pub steam_link: Option<String>,
  /// `src` of the avatar image, usually site-relative.
  pub avatar_src: Option<String>,
  pub biography:  Option<String>,
  pub table:      FieldTable,
}

/// Field-extraction grammar for the source's pages.
pub trait PageGrammar: Send + Sync {
  /// Parse the unit roster page into its root node.
  fn unit_roster(&self, page: &Page) -> Result<UnitNode>;

  fn event_page(&self, page: &Page) -> Result<EventPage>;

  fn profile(&self, page: &Page) -> Result<ProfileFields>;

  /// Decode the movement feed response.
  fn movements(&self, raw: &str) -> Result<Vec<Movement>>;
}
