//! Movement feed response.
//!
//! The feed wraps its payload twice: `{"d": "<json>"}` where the string holds
//! `{"Movements": [{"id": "...", "timestamp": "...", "description": "..."}]}`.

use muster_core::{Error, Result, movement::Movement};
use serde::Deserialize;

#[derive(Deserialize)]
struct Envelope {
  d: String,
}

#[derive(Deserialize)]
struct Feed {
  #[serde(rename = "Movements", default)]
  movements: Vec<RawMovement>,
}

#[derive(Deserialize)]
struct RawMovement {
  id:          String,
  timestamp:   String,
  description: String,
}

pub fn parse(raw: &str) -> Result<Vec<Movement>> {
  let envelope: Envelope = serde_json::from_str(raw)?;
  let feed: Feed = serde_json::from_str(&envelope.d)?;

  feed
    .movements
    .into_iter()
    .map(|m| {
      let source_id = m.id.trim().parse().map_err(|_| {
        Error::grammar("movement feed", format!("non-numeric movement id {:?}", m.id))
      })?;
      Ok(Movement { source_id, timestamp: m.timestamp, description: m.description })
    })
    .collect()
}
