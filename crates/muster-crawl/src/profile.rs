//! Profile timeline reconciliation.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use muster_core::{
  model::{NewRank, Person, ProfileUpdate},
  movement::{Movement, MovementKind},
  source::{PageGrammar, ProfileFields, SessionProvider},
  store::{DirectoryStore, StoreSession},
  timestamp,
};

use crate::{Crawler, Error, Result, SiteMap, resolver};

const STEAM_PROFILES: &str = "/profiles/";

/// What a profile reconciliation changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileSummary {
  /// Dated rank entries appended.
  pub new_ranks:    usize,
  /// Movements recognized but not applied to stored state.
  pub unapplied:    usize,
  /// Movements outside the vocabulary.
  pub unrecognized: usize,
}

impl<S, P, G> Crawler<S, P, G>
where
  S: DirectoryStore + 'static,
  P: SessionProvider + 'static,
  G: PageGrammar + 'static,
{
  /// Refresh a known person's profile fields and replay their movement log.
  pub async fn reconcile_profile(&self, name: &str) -> Result<ProfileSummary> {
    let person = {
      let session = self.store.open_session().await.map_err(Error::store)?;
      session
        .find_person(name.to_string())
        .await
        .map_err(Error::store)?
    };
    let Some(person) = person else {
      tracing::error!(person = %name, "person not found");
      return Err(Error::PersonNotFound(name.to_string()));
    };

    let page = self.fetch(self.sites.profile(name)).await?;
    let fields = self.grammar.profile(&page)?;
    let feed = self
      .post_json(
        self.sites.movement_feed(),
        serde_json::json!({ "callsign": name }),
      )
      .await?;
    let movements = self.grammar.movements(&feed)?;

    self.apply_profile(&person, fields, movements).await
  }

  /// Apply extracted profile fields and a movement log to `person`.
  ///
  /// Only applications, admissions and promotions change stored state.
  /// Promotions already stored under the same movement id are skipped. When
  /// at least one new promotion is found, the roster placeholder rank is
  /// removed before the dated entries are appended.
  pub async fn apply_profile(
    &self,
    person: &Person,
    fields: ProfileFields,
    movements: Vec<Movement>,
  ) -> Result<ProfileSummary> {
    let mut update = profile_update(&self.sites, &person.name, fields, Utc::now())?;
    let mut summary = ProfileSummary::default();

    let session = self.store.open_session().await.map_err(Error::store)?;
    let known: HashSet<i64> = session
      .ranks(person.person_id)
      .await
      .map_err(Error::store)?
      .iter()
      .filter_map(|r| r.source_id)
      .collect();

    let mut promotions = Vec::new();
    for movement in movements {
      match MovementKind::classify(&movement.description) {
        MovementKind::Applied => {
          update.applied_at =
            Some(timestamp::parse_month_day_year_utc(&movement.timestamp)?);
        }
        MovementKind::Admitted => {
          update.admitted_at =
            Some(timestamp::parse_month_day_year_utc(&movement.timestamp)?);
        }
        MovementKind::Promoted { rank, by } => {
          if !known.contains(&movement.source_id) {
            let at = timestamp::parse_month_day_year_utc(&movement.timestamp)?;
            promotions.push((movement.source_id, rank, by, at));
          }
        }
        MovementKind::Unrecognized => {
          tracing::warn!(
            person = %person.name,
            description = %movement.description,
            "unrecognized movement"
          );
          summary.unrecognized += 1;
        }
        other => {
          tracing::trace!(person = %person.name, kind = other.label(), "movement not applied");
          summary.unapplied += 1;
        }
      }
    }

    session
      .update_profile(person.person_id, update)
      .await
      .map_err(Error::store)?;

    if !promotions.is_empty() {
      session
        .remove_placeholder_rank(person.person_id)
        .await
        .map_err(Error::store)?;
    }
    for (source_id, rank, by, valid_from) in promotions {
      let grantor = resolver::person(&session, &by).await?;
      let appended = session
        .append_rank(NewRank {
          person_id: person.person_id,
          name_long: rank,
          source_id,
          valid_from,
          granted_by: Some(grantor.person_id),
        })
        .await
        .map_err(Error::store)?;
      if appended.is_some() {
        summary.new_ranks += 1;
      }
    }

    tracing::debug!(
      person = %person.name,
      new_ranks = summary.new_ranks,
      unapplied = summary.unapplied,
      unrecognized = summary.unrecognized,
      "profile reconciled"
    );
    Ok(summary)
  }
}

/// Static profile fields as a store update. Blank values leave stored ones
/// untouched.
fn profile_update(
  sites: &SiteMap,
  name: &str,
  fields: ProfileFields,
  now: DateTime<Utc>,
) -> Result<ProfileUpdate> {
  let non_blank = |v: &str| Some(v.trim().to_string()).filter(|v| !v.is_empty());

  let steam_id = fields.steam_link.as_deref().and_then(|link| {
    let id = link
      .split_once(STEAM_PROFILES)
      .and_then(|(_, rest)| rest.trim_end_matches('/').parse::<i64>().ok());
    if id.is_none() {
      tracing::warn!(person = %name, link, "unreadable steam profile link");
    }
    id
  });

  let joined_on = fields
    .table
    .get("Joined")
    .and_then(non_blank)
    .map(|v| timestamp::parse_month_day_year(&v))
    .transpose()?;

  Ok(ProfileUpdate {
    country: fields.table.get("Location").and_then(non_blank),
    status: fields
      .table
      .get("Status")
      .and_then(non_blank)
      .map(|s| s.to_lowercase()),
    biography: fields.biography,
    avatar_url: fields
      .avatar_src
      .as_deref()
      .and_then(non_blank)
      .map(|src| sites.absolutise(&src)),
    steam_id,
    joined_on,
    profile_refreshed_at: Some(now),
    ..Default::default()
  })
}
