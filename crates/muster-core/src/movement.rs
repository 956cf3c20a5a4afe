//! Movement log vocabulary.
//!
//! A member's profile timeline is a list of free-text descriptions such as
//! `aeroson was promoted to Sergeant by <a href="/member/Samblues.aspx">Samblues</a>.`
//! Each description is classified by substring against a closed vocabulary.
//! Text outside the vocabulary is [`MovementKind::Unrecognized`]; it is never
//! an error.

use serde::{Deserialize, Serialize};

/// One raw entry of a member's movement log, as delivered by the timeline feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
  pub source_id:   i64,
  /// Date in `M-d-yyyy` form.
  pub timestamp:   String,
  pub description: String,
}

/// The classified meaning of a movement description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementKind {
  Applied,
  Admitted,
  Promoted { rank: String, by: String },
  JoinedUnit,
  RemovedFromUnit,
  AssignedPosition,
  RemovedFromPosition,
  ReturnedToDuty,
  PutOnLeave,
  Discharged,
  DischargedHonorable,
  DischargedDishonorable,
  Reinstated,
  /// A removal whose unit no longer exists in the source.
  RemovedFromDeletedUnit,
  Unrecognized,
}

const PROMOTED: &str = "was promoted to";

impl MovementKind {
  /// Classify a movement description. Matching is by substring and the order
  /// of the checks matters: the generic discharge phrase is tested before its
  /// honorable/dishonorable variants, which do not contain it.
  pub fn classify(description: &str) -> Self {
    let d = description;
    if d.contains("applied for TAW.") {
      Self::Applied
    } else if d.contains("was admitted to TAW") {
      Self::Admitted
    } else if d.contains(PROMOTED) {
      parse_promotion(d).unwrap_or(Self::Unrecognized)
    } else if d.contains("was joined to units") {
      Self::JoinedUnit
    } else if d.contains("was removed from units") {
      Self::RemovedFromUnit
    } else if d.contains("was assigned to position") {
      Self::AssignedPosition
    } else if d.contains("was removed from position") {
      Self::RemovedFromPosition
    } else if d.contains("was returned to active duty by") {
      Self::ReturnedToDuty
    } else if d.contains("was put on leave by") {
      Self::PutOnLeave
    } else if d.contains("was discharged by") {
      Self::Discharged
    } else if d.contains("was discharged honorable by") {
      Self::DischargedHonorable
    } else if d.contains("was discharged dishonorable by") {
      Self::DischargedDishonorable
    } else if d.contains("was reinstated by") {
      Self::Reinstated
    } else if d.contains("Unknown was removed from unit Unknown by") {
      Self::RemovedFromDeletedUnit
    } else {
      Self::Unrecognized
    }
  }

  /// Short label used in log output.
  pub fn label(&self) -> &'static str {
    match self {
      Self::Applied => "applied",
      Self::Admitted => "admitted",
      Self::Promoted { .. } => "promoted",
      Self::JoinedUnit => "joined_unit",
      Self::RemovedFromUnit => "removed_from_unit",
      Self::AssignedPosition => "assigned_position",
      Self::RemovedFromPosition => "removed_from_position",
      Self::ReturnedToDuty => "returned_to_duty",
      Self::PutOnLeave => "put_on_leave",
      Self::Discharged => "discharged",
      Self::DischargedHonorable => "discharged_honorable",
      Self::DischargedDishonorable => "discharged_dishonorable",
      Self::Reinstated => "reinstated",
      Self::RemovedFromDeletedUnit => "removed_from_deleted_unit",
      Self::Unrecognized => "unrecognized",
    }
  }
}

/// `X was promoted to <rank> by <promoter>.` where the promoter may be wrapped
/// in an anchor.
fn parse_promotion(description: &str) -> Option<MovementKind> {
  let (_, after) = description.split_once(PROMOTED)?;
  let (rank, by) = after.split_once(" by ")?;

  let by = by.split("</a>").next().unwrap_or(by);
  let by = by.rsplit('>').next().unwrap_or(by);
  let by = by.trim().trim_end_matches('.').trim();
  let rank = rank.trim();

  if rank.is_empty() || by.is_empty() {
    return None;
  }
  Some(MovementKind::Promoted { rank: rank.to_string(), by: by.to_string() })
}
