//! Field-extraction grammar for the source's pages.

pub mod html;

mod event;
mod movements;
mod profile;
mod roster;

use muster_core::{
  Result,
  movement::Movement,
  source::{EventPage, Page, PageGrammar, ProfileFields, UnitNode},
};

/// The page grammar of the TAW member directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct TawGrammar;

impl PageGrammar for TawGrammar {
  fn unit_roster(&self, page: &Page) -> Result<UnitNode> { roster::parse(page) }

  fn event_page(&self, page: &Page) -> Result<EventPage> { event::parse(page) }

  fn profile(&self, page: &Page) -> Result<ProfileFields> { profile::parse(page) }

  fn movements(&self, raw: &str) -> Result<Vec<Movement>> { movements::parse(raw) }
}
