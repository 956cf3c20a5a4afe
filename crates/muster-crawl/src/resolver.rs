//! Identity resolution: natural key → stored record.
//!
//! Find-or-create is atomic in the store, so concurrent first sightings of a
//! name or unit id converge on one record.

use muster_core::{
  model::{Person, Rank, Unit},
  store::StoreSession,
};

use crate::{Error, Result};

pub(crate) async fn unit<T: StoreSession>(
  session: &T,
  source_id: i64,
  name: String,
) -> Result<Unit> {
  session
    .find_or_create_unit(source_id, name)
    .await
    .map_err(Error::store)
}

pub(crate) async fn person<T: StoreSession>(session: &T, name: &str) -> Result<Person> {
  session
    .find_or_create_person(name.to_string())
    .await
    .map_err(Error::store)
}

/// Resolve `name` and, when a rank token is given that differs from the
/// person's current rank, record it as the placeholder rank.
pub(crate) async fn person_with_rank<T: StoreSession>(
  session: &T,
  name: &str,
  rank: Option<&str>,
) -> Result<Person> {
  let person = person(session, name).await?;

  if let Some(token) = rank.filter(|r| !r.is_empty()) {
    let ranks = session.ranks(person.person_id).await.map_err(Error::store)?;
    let current = current_rank(&ranks).and_then(|r| r.name_short.as_deref());
    if current != Some(token) {
      tracing::trace!(person = %name, rank = token, "recording roster rank");
      session
        .set_placeholder_rank(person.person_id, token.to_string())
        .await
        .map_err(Error::store)?;
    }
  }

  Ok(person)
}

/// The placeholder entry if there is one, otherwise the latest dated entry.
/// `ranks` is in store order: dated ascending, placeholder last.
pub(crate) fn current_rank(ranks: &[Rank]) -> Option<&Rank> {
  ranks
    .iter()
    .find(|r| r.is_placeholder())
    .or_else(|| ranks.last())
}
