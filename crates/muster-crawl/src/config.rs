//! Crawler configuration and source URL layout.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: usize = 20;

/// Runtime configuration, deserialised from `muster.toml` and `MUSTER_*`
/// environment variables. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
  /// Root of the member directory site.
  pub base_url:               String,
  pub store_path:             PathBuf,
  /// Store sessions that may be open at once.
  pub max_connections:        usize,
  /// Source sessions that may be open at once.
  pub max_sessions:           usize,
  pub user_agent:             String,
  pub request_timeout_secs:   u64,
  /// Erroneous events in a row after which an event sweep gives up.
  pub max_consecutive_errors: usize,
}

impl Default for CrawlerConfig {
  fn default() -> Self {
    Self {
      base_url:               "http://taw.net".into(),
      store_path:             PathBuf::from("muster.db"),
      max_connections:        10,
      max_sessions:           4,
      user_agent:             concat!("muster/", env!("CARGO_PKG_VERSION")).into(),
      request_timeout_secs:   30,
      max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
    }
  }
}

impl CrawlerConfig {
  pub fn site_map(&self) -> SiteMap { SiteMap::new(&self.base_url) }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

/// Builds the source's URLs from its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteMap {
  base_url: String,
}

impl SiteMap {
  pub fn new(base_url: impl AsRef<str>) -> Self {
    Self { base_url: base_url.as_ref().trim_end_matches('/').to_string() }
  }

  pub fn unit_roster(&self, unit_id: i64) -> String {
    format!("{}/unit/{unit_id}/roster.aspx", self.base_url)
  }

  pub fn event(&self, event_id: i64) -> String {
    format!("{}/event/{event_id}.aspx", self.base_url)
  }

  pub fn profile(&self, name: &str) -> String {
    format!("{}/member/{name}.aspx", self.base_url)
  }

  /// Endpoint of the movement feed. Takes `POST {"callsign": name}`.
  pub fn movement_feed(&self) -> String {
    format!("{}/services/JSONFactory.asmx/GetMovement", self.base_url)
  }

  /// Resolve a site-relative path. Absolute URLs pass through.
  pub fn absolutise(&self, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
      return path.to_string();
    }
    if path.starts_with('/') {
      format!("{}{path}", self.base_url)
    } else {
      format!("{}/{path}", self.base_url)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn urls_follow_site_layout() {
    let sites = SiteMap::new("http://taw.net/");
    assert_eq!(sites.unit_roster(1), "http://taw.net/unit/1/roster.aspx");
    assert_eq!(sites.event(65132), "http://taw.net/event/65132.aspx");
    assert_eq!(sites.profile("aeroson"), "http://taw.net/member/aeroson.aspx");
    assert_eq!(
      sites.movement_feed(),
      "http://taw.net/services/JSONFactory.asmx/GetMovement"
    );
  }

  #[test]
  fn absolutise_keeps_absolute_urls() {
    let sites = SiteMap::new("http://taw.net");
    assert_eq!(sites.absolutise("/img/a.png"), "http://taw.net/img/a.png");
    assert_eq!(sites.absolutise("img/a.png"), "http://taw.net/img/a.png");
    assert_eq!(sites.absolutise("https://cdn.example/a.png"), "https://cdn.example/a.png");
  }

  #[test]
  fn defaults_fill_missing_fields() {
    let cfg: CrawlerConfig =
      serde_json::from_str(r#"{ "max_sessions": 2 }"#).unwrap();
    assert_eq!(cfg.max_sessions, 2);
    assert_eq!(cfg.max_connections, 10);
    assert_eq!(cfg.base_url, "http://taw.net");
    assert_eq!(cfg.max_consecutive_errors, DEFAULT_MAX_CONSECUTIVE_ERRORS);
  }
}
