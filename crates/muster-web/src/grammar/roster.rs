//! Unit roster page.
//!
//! The roster is a nested list under the update panel:
//!
//! ```text
//! div#ctl00_bcr_UpdatePanel1 > div > ul
//!   li|span  > a(type) a(href=/unit/{id}.aspx, name)
//!   ul
//!     li > ... a(href=/member/...) ...      person line
//!     li|ul  > (li|span header) ul           sub-unit, same shape
//! ```

use muster_core::{
  Error, Result,
  source::{Page, UnitChild, UnitNode},
};

use super::html::{self, Element};

const PAGE: &str = "unit roster";
const PANEL_ID: &str = "ctl00_bcr_UpdatePanel1";

pub fn parse(page: &Page) -> Result<UnitNode> {
  let doc = html::parse(&page.text);
  let root = doc
    .find_by_id(PANEL_ID)
    .and_then(|panel| panel.child("div"))
    .and_then(|div| div.child("ul"))
    .ok_or_else(|| Error::grammar(PAGE, "roster list not found"))?;
  parse_unit(root)
}

fn parse_unit(node: &Element) -> Result<UnitNode> {
  let header = node
    .elements()
    .find(|e| e.name == "li" || e.name == "span")
    .ok_or_else(|| Error::grammar(PAGE, "unit header not found"))?;

  let anchors = header.find_all("a");
  let (kind_a, name_a) = match anchors.as_slice() {
    [kind, name, ..] => (*kind, *name),
    _ => return Err(Error::grammar(PAGE, "unit header lacks type and name links")),
  };

  let href = name_a.attr("href").unwrap_or_default();
  let source_id = id_from_href(href).ok_or_else(|| {
    Error::grammar(PAGE, format!("unit link {href:?} has no numeric id"))
  })?;

  let mut children = Vec::new();
  if let Some(list) = node.child("ul") {
    for child in list.elements() {
      if child.child("a").is_some() {
        children.push(UnitChild::Person(child.inner_text()));
      } else {
        children.push(UnitChild::Unit(parse_unit(child)?));
      }
    }
  }

  Ok(UnitNode {
    source_id,
    name: name_a.inner_text(),
    kind: kind_a.inner_text(),
    children,
  })
}

/// `/unit/1505.aspx` → `1505`.
pub(crate) fn id_from_href(href: &str) -> Option<i64> {
  let last = href.rsplit(['/', '\\']).next()?;
  let stem = last.split(['?', '#']).next()?;
  stem.strip_suffix(".aspx").unwrap_or(stem).parse().ok()
}
