//! Crawl scenarios against an in-memory store, the real page grammar and a
//! fake site serving canned pages.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use muster_core::{
  model::{Attendance, PersonId, Rank},
  source::{Page, Session, SessionProvider},
  store::{DirectoryStore, StoreSession},
};
use muster_store_sqlite::{SqliteSession, SqliteStore};
use muster_web::TawGrammar;

use crate::{Crawler, Error, EventOutcome, SiteMap};

// ─── Fake site ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("no page at {0}")]
struct NotFound(String);

/// Serves pages by request URL and movement feeds by callsign.
#[derive(Clone, Default)]
struct FakeSite {
  pages: Arc<Mutex<HashMap<String, Page>>>,
  feeds: Arc<Mutex<HashMap<String, String>>>,
}

impl FakeSite {
  fn serve(&self, url: &str, text: impl Into<String>) {
    self.redirect(url, url, text);
  }

  /// Serve `text` for `url` as if the request had ended up at `uri`.
  fn redirect(&self, url: &str, uri: &str, text: impl Into<String>) {
    let page = Page { uri: uri.to_string(), text: text.into() };
    self.pages.lock().unwrap().insert(url.to_string(), page);
  }

  fn feed(&self, callsign: &str, movements: serde_json::Value) {
    let inner = serde_json::json!({ "Movements": movements }).to_string();
    let raw = serde_json::json!({ "d": inner }).to_string();
    self.feeds.lock().unwrap().insert(callsign.to_string(), raw);
  }
}

impl SessionProvider for FakeSite {
  type Error = NotFound;
  type Session = FakeSite;

  async fn acquire(&self) -> Result<FakeSite, NotFound> { Ok(self.clone()) }
}

impl Session for FakeSite {
  type Error = NotFound;

  async fn get(&self, url: String) -> Result<Page, NotFound> {
    self.pages.lock().unwrap().get(&url).cloned().ok_or(NotFound(url))
  }

  async fn post_json(
    &self,
    url: String,
    payload: serde_json::Value,
  ) -> Result<String, NotFound> {
    let callsign = payload["callsign"].as_str().unwrap_or_default();
    self.feeds.lock().unwrap().get(callsign).cloned().ok_or(NotFound(url))
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

const BASE: &str = "http://taw.net";

type TestCrawler = Crawler<SqliteStore, FakeSite, TawGrammar>;

fn crawler_with(store: SqliteStore) -> (TestCrawler, FakeSite) {
  let site = FakeSite::default();
  let crawler = Crawler::new(store, site.clone(), TawGrammar, SiteMap::new(BASE));
  (crawler, site)
}

async fn crawler() -> (TestCrawler, FakeSite) {
  crawler_with(SqliteStore::open_in_memory().await.unwrap())
}

async fn session(crawler: &TestCrawler) -> SqliteSession {
  crawler.store().open_session().await.unwrap()
}

fn person(text_before: &str, name: &str, text_after: &str) -> String {
  format!(r#"<li>{text_before}<a href="/member/{name}.aspx">{name}</a>{text_after}</li>"#)
}

fn unit(kind: &str, id: i64, name: &str, children: &[String]) -> String {
  format!(
    r##"<li><span><a href="#">{kind}</a> <a href="/unit/{id}.aspx">{name}</a></span><ul>{}</ul></li>"##,
    children.concat()
  )
}

fn roster(kind: &str, id: i64, name: &str, children: &[String]) -> String {
  format!(
    r##"<html><body><div id="ctl00_bcr_UpdatePanel1"><div><ul>
      <span><a href="#">{kind}</a> <a href="/unit/{id}.aspx">{name}</a></span>
      <ul>{}</ul>
    </ul></div></div></body></html>"##,
    children.concat()
  )
}

fn roster_url(id: i64) -> String { format!("{BASE}/unit/{id}/roster.aspx") }

fn event_url(id: i64) -> String { format!("{BASE}/event/{id}.aspx") }

fn event_page(details: &[(&str, &str)], attendees: &[String]) -> String {
  let details: String = details
    .iter()
    .map(|(l, v)| format!("<tr><td>{l}</td><td>{v}</td></tr>"))
    .collect();
  format!(
    r#"<html><div id="ctl00_ctl00_bcr_bcr_UpdatePanel">
      <table cellpadding="20" cellspacing="5">{details}</table>
      <table width=100%><tr><th>Name</th><th>Status</th><th>Time</th></tr>{}</table>
    </div></html>"#,
    attendees.concat()
  )
}

fn attendee(name_cell: &str, status: &str, time: &str) -> String {
  format!("<tr><td>{name_cell}</td><td>{status}</td><td>{time}</td></tr>")
}

async fn person_id(s: &SqliteSession, name: &str) -> PersonId {
  s.find_person(name.into()).await.unwrap().expect(name).person_id
}

async fn active_units(s: &SqliteSession, name: &str) -> Vec<i64> {
  let mut ids = Vec::new();
  for m in s.active_memberships(person_id(s, name).await).await.unwrap() {
    ids.push(s.get_unit(m.unit_id).await.unwrap().unwrap().source_id);
  }
  ids.sort();
  ids
}

/// `A{B, C}` where B and C both list Smith.
fn two_squads() -> String {
  roster("Platoon", 1, "A", &[
    person("Commanding Officer - ", "Constance", ", CPT"),
    unit("Squad", 2, "B", &[person("", "Smith", ", SGT")]),
    unit("Squad", 3, "C", &[
      person("Squad Leader - ", "Smith", ", SGT"),
      person("", "BetaHook", ", PFC - On Leave"),
    ]),
  ])
}

// ─── Unit tree walk ──────────────────────────────────────────────────────────

#[tokio::test]
async fn same_person_in_two_units_gets_two_memberships() {
  let (crawler, site) = crawler().await;
  site.serve(&roster_url(1), two_squads());

  let summary = crawler.crawl_unit_subtree(1).await.unwrap();
  assert_eq!(summary.units, 3);
  assert_eq!(summary.people, 3);
  assert_eq!(summary.lines, 4);
  assert_eq!(summary.retired, 0);

  let s = session(&crawler).await;
  assert_eq!(s.list_people().await.unwrap().len(), 3);
  assert_eq!(active_units(&s, "Smith").await, vec![2, 3]);

  let a = s.find_unit(1).await.unwrap().unwrap();
  let c = s.find_unit(3).await.unwrap().unwrap();
  assert_eq!(a.parent_id, None);
  assert_eq!(c.parent_id, Some(a.unit_id));
  assert_eq!(c.kind, "Squad");

  let smith = person_id(&s, "Smith").await;
  let positions: Vec<_> = s
    .memberships(smith)
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.position_short)
    .collect();
  assert!(positions.contains(&Some("SL".to_string())));
  assert!(positions.contains(&None));
}

#[tokio::test]
async fn recrawl_is_idempotent() {
  let (crawler, site) = crawler().await;
  site.serve(&roster_url(1), two_squads());

  crawler.crawl_unit_subtree(1).await.unwrap();
  let s = session(&crawler).await;
  let smith = person_id(&s, "Smith").await;
  let before = s.memberships(smith).await.unwrap();
  let ranks_before = s.ranks(smith).await.unwrap();
  drop(s);

  let summary = crawler.crawl_unit_subtree(1).await.unwrap();
  assert_eq!(summary.retired, 0);

  let s = session(&crawler).await;
  let after = s.memberships(smith).await.unwrap();
  assert_eq!(after.len(), before.len());
  for (b, a) in before.iter().zip(&after) {
    assert_eq!(a.person_unit_id, b.person_unit_id);
    assert_eq!(a.unit_id, b.unit_id);
    assert_eq!(a.position_short, b.position_short);
    assert_eq!(a.removed_at, None);
  }
  assert_eq!(s.ranks(smith).await.unwrap(), ranks_before);
  assert_eq!(s.list_people().await.unwrap().len(), 3);
  assert_eq!(s.list_units().await.unwrap().len(), 3);
}

#[tokio::test]
async fn moving_to_another_unit_retires_the_old_membership() {
  let (crawler, site) = crawler().await;
  site.serve(
    &roster_url(1),
    roster("Platoon", 1, "A", &[
      unit("Squad", 2, "B", &[person("", "Smith", ", SGT")]),
      unit("Squad", 3, "C", &[]),
    ]),
  );
  crawler.crawl_unit_subtree(1).await.unwrap();

  site.serve(
    &roster_url(1),
    roster("Platoon", 1, "A", &[
      unit("Squad", 2, "B", &[]),
      unit("Squad", 3, "C", &[person("", "Smith", ", SGT")]),
    ]),
  );
  let summary = crawler.crawl_unit_subtree(1).await.unwrap();
  assert_eq!(summary.retired, 1);

  let s = session(&crawler).await;
  assert_eq!(active_units(&s, "Smith").await, vec![3]);

  let b = s.find_unit(2).await.unwrap().unwrap();
  let all = s.memberships(person_id(&s, "Smith").await).await.unwrap();
  let old = all.iter().find(|m| m.unit_id == b.unit_id).unwrap();
  assert!(old.removed_at.is_some());
}

#[tokio::test]
async fn roster_rank_replaces_placeholder() {
  let (crawler, site) = crawler().await;
  {
    let s = session(&crawler).await;
    let p = s.find_or_create_person("Smith".into()).await.unwrap();
    s.set_placeholder_rank(p.person_id, "PVT".into()).await.unwrap();
  }
  site.serve(
    &roster_url(1),
    roster("Squad", 1, "A", &[person("", "Smith", ", SGT")]),
  );
  crawler.crawl_unit_subtree(1).await.unwrap();

  let s = session(&crawler).await;
  let ranks: Vec<Rank> = s.ranks(person_id(&s, "Smith").await).await.unwrap();
  assert_eq!(ranks.len(), 1);
  assert!(ranks[0].is_placeholder());
  assert_eq!(ranks[0].name_short.as_deref(), Some("SGT"));
}

#[tokio::test]
async fn on_leave_line_sets_status() {
  let (crawler, site) = crawler().await;
  site.serve(&roster_url(1), two_squads());
  crawler.crawl_unit_subtree(1).await.unwrap();

  let s = session(&crawler).await;
  let beta = s.find_person("BetaHook".into()).await.unwrap().unwrap();
  assert_eq!(beta.status.as_deref(), Some("on leave"));
  let smith = s.find_person("Smith".into()).await.unwrap().unwrap();
  assert_eq!(smith.status, None);
}

#[tokio::test]
async fn deep_tree_completes_with_one_store_session() {
  let store = SqliteStore::open_in_memory().await.unwrap().with_max_sessions(1);
  let (crawler, site) = crawler_with(store);

  let mut leaf = unit("Team", 5, "E", &[person("", "Juvenis", ", COL")]);
  for (id, name) in [(4, "D"), (3, "C"), (2, "B")] {
    leaf = unit("Unit", id, name, &[leaf, person("", &format!("M{id}"), ", PVT")]);
  }
  site.serve(&roster_url(1), roster("Division", 1, "A", &[leaf]));

  let summary = tokio::time::timeout(
    std::time::Duration::from_secs(10),
    crawler.crawl_unit_subtree(1),
  )
  .await
  .expect("crawl finished")
  .unwrap();
  assert_eq!(summary.units, 5);
  assert_eq!(summary.people, 4);
}

#[tokio::test]
async fn bad_roster_line_fails_the_crawl_but_keeps_units() {
  let (crawler, site) = crawler().await;
  site.serve(
    &roster_url(1),
    roster("Squad", 1, "A", &[
      r#"<li><a href="/member/x.aspx"></a>, PFC</li>"#.to_string(),
      unit("Team", 2, "B", &[person("", "Smith", ", SGT")]),
    ]),
  );

  let err = crawler.crawl_unit_subtree(1).await.unwrap_err();
  assert!(matches!(err, Error::Core(muster_core::Error::RosterLine(_))));

  let s = session(&crawler).await;
  assert_eq!(s.list_units().await.unwrap().len(), 2);
  assert!(s.list_people().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_roster_page_is_a_source_error() {
  let (crawler, _site) = crawler().await;
  assert!(matches!(
    crawler.crawl_unit_subtree(99).await,
    Err(Error::Source(_))
  ));
}

// ─── Events ──────────────────────────────────────────────────────────────────

fn practice(attendees: &[String]) -> String {
  event_page(
    &[
      ("Name", "GRAW Practice"),
      ("Description", "Saber Squad Thursday"),
      ("Type", "Practice"),
      ("When", "From: 6/3/2016 04:00:00 +02:00 to: 6/3/2016 05:00:00 +02:00"),
      ("Mandatory", "Yes"),
      ("Cancelled", "No"),
    ],
    attendees,
  )
}

#[tokio::test]
async fn event_attendees_and_units() {
  let (crawler, site) = crawler().await;
  site.serve(
    &event_url(100),
    practice(&[
      attendee(r#"<a href="/member/Jonas.aspx">Jonas</a>"#, "Present", "6-1-2016 10:00"),
      attendee(r#"<a href="/unit/10.aspx">Alpha Squad</a>"#, "", ""),
      attendee("Ghost Recon", "", ""),
    ]),
  );

  assert_eq!(crawler.reconcile_event(100).await, EventOutcome::ValidEvent);

  let s = session(&crawler).await;
  let event_id = s.find_or_create_event(100).await.unwrap().event_id;
  let event = s.get_event(event_id).await.unwrap().unwrap();
  assert_eq!(event.name, "GRAW Practice");
  assert!(event.mandatory);
  assert!(event.starts_at.is_some());

  let attendances = s.attendances(event_id).await.unwrap();
  assert_eq!(attendances.len(), 1);
  assert_eq!(attendances[0].person_id, person_id(&s, "Jonas").await);
  assert_eq!(attendances[0].attendance, Attendance::Present);
  assert_eq!(
    attendances[0].recorded_at.map(|t| t.to_rfc3339()),
    Some("2016-06-01T10:00:00+00:00".to_string())
  );

  let units = s.event_units(event_id).await.unwrap();
  assert_eq!(units.len(), 1);
  assert_eq!((units[0].source_id, units[0].name.as_str()), (10, "Alpha Squad"));
}

#[tokio::test]
async fn placeholder_timestamp_keeps_recorded_one() {
  let (crawler, site) = crawler().await;
  let jonas = r#"<a href="/member/Jonas.aspx">Jonas</a>"#;
  site.serve(&event_url(100), practice(&[attendee(jonas, "Present", "6-1-2016 10:00")]));
  crawler.reconcile_event(100).await;

  site.serve(&event_url(100), practice(&[attendee(jonas, "Excused", "--")]));
  assert_eq!(crawler.reconcile_event(100).await, EventOutcome::ValidEvent);

  let s = session(&crawler).await;
  let event_id = s.find_or_create_event(100).await.unwrap().event_id;
  let record = &s.attendances(event_id).await.unwrap()[0];
  assert_eq!(record.attendance, Attendance::Excused);
  assert!(record.recorded_at.is_some());
}

#[tokio::test]
async fn unmapped_category_keeps_recorded_one() {
  let (crawler, site) = crawler().await;
  let jonas = r#"<a href="/member/Jonas.aspx">Jonas</a>"#;
  site.serve(&event_url(100), practice(&[attendee(jonas, "Present", "6-1-2016 10:00")]));
  crawler.reconcile_event(100).await;

  for category in ["", "Attended (late)"] {
    site.serve(&event_url(100), practice(&[attendee(jonas, category, "--")]));
    assert_eq!(crawler.reconcile_event(100).await, EventOutcome::ValidEvent);

    let s = session(&crawler).await;
    let event_id = s.find_or_create_event(100).await.unwrap().event_id;
    let record = &s.attendances(event_id).await.unwrap()[0];
    assert_eq!(record.attendance, Attendance::Present, "after {category:?}");
  }
}

#[tokio::test]
async fn unexpected_attendee_link_makes_event_erroneous() {
  let (crawler, site) = crawler().await;
  site.serve(
    &event_url(100),
    practice(&[attendee(r#"<a href="/forum/1.aspx">Thread</a>"#, "", "")]),
  );
  assert_eq!(crawler.reconcile_event(100).await, EventOutcome::ErroneousEvent);
  assert_eq!(crawler.reconcile_event(101).await, EventOutcome::ErroneousEvent);
}

#[tokio::test]
async fn sweep_stops_at_terminal_marker() {
  let (crawler, site) = crawler().await;
  site.serve(&event_url(100), practice(&[]));
  site.serve(
    &event_url(101),
    r#"<div id="ctl00_ctl00_bcr_bcr_UpdatePanel">This is a Base Event and should never be seen</div>"#,
  );
  site.redirect(&event_url(103), &format!("{BASE}/default.aspx"), "<html></html>");
  site.serve(&event_url(104), practice(&[]));

  let summary = crawler.sweep_events(100, None).await;
  assert_eq!(summary.visited, 4);
  assert_eq!(summary.valid, 1);
  assert_eq!(summary.base_skipped, 1);
  assert_eq!(summary.erroneous, 1);
  assert!(summary.reached_end);

  let limited = crawler.sweep_events(100, Some(2)).await;
  assert_eq!(limited.visited, 2);
  assert!(!limited.reached_end);
}

#[tokio::test]
async fn sweep_gives_up_on_an_unreachable_site() {
  let (crawler, _site) = crawler().await;
  let crawler = crawler.with_max_consecutive_errors(3);

  let summary = tokio::time::timeout(
    std::time::Duration::from_secs(10),
    crawler.sweep_events(1, None),
  )
  .await
  .expect("sweep finished");
  assert_eq!(summary.visited, 3);
  assert_eq!(summary.erroneous, 3);
  assert!(summary.gave_up);
  assert!(!summary.reached_end);
}

#[tokio::test]
async fn valid_event_resets_the_error_run() {
  let (crawler, site) = crawler().await;
  let crawler = crawler.with_max_consecutive_errors(3);
  site.serve(&event_url(2), practice(&[]));

  let summary = crawler.sweep_events(1, None).await;
  assert_eq!(summary.visited, 5);
  assert_eq!((summary.valid, summary.erroneous), (1, 4));
  assert!(summary.gave_up);
}

// ─── Profiles ────────────────────────────────────────────────────────────────

fn profile_page() -> String {
  r#"<html><body>
    <a id="hfSteam" href="http://steamcommunity.com/profiles/76561198012345678">Steam</a>
    <div class="dossieravatar"><img src="/images/avatars/aeroson.png"></div>
    <div class="dossiernexttopicture"><table>
      <tr><td>Location:</td><td>Czech Republic</td></tr>
      <tr><td>Status:</td><td>Active</td></tr>
      <tr><td>Joined:</td><td>10-03-2014</td></tr>
    </table></div>
    <div id="dossierbio">Bio: Flies helicopters.</div>
  </body></html>"#
    .to_string()
}

#[tokio::test]
async fn profile_replay_is_deduplicated_by_movement_id() {
  let (crawler, site) = crawler().await;
  {
    let s = session(&crawler).await;
    let p = s.find_or_create_person("aeroson".into()).await.unwrap();
    s.set_placeholder_rank(p.person_id, "PFC".into()).await.unwrap();
  }
  site.serve(&format!("{BASE}/member/aeroson.aspx"), profile_page());
  site.feed(
    "aeroson",
    serde_json::json!([
      { "id": "12", "timestamp": "1-2-2014", "description": "aeroson applied for TAW." },
      { "id": "555", "timestamp": "3-14-2015",
        "description": "aeroson was promoted to Sergeant by Samblues." },
      { "id": "600", "timestamp": "4-1-2015",
        "description": "aeroson was joined to units AM2 Charlie FT by Samblues." },
      { "id": "601", "timestamp": "4-2-2015", "description": "aeroson did a barrel roll" },
    ]),
  );

  let first = crawler.reconcile_profile("aeroson").await.unwrap();
  assert_eq!(first.new_ranks, 1);
  assert_eq!(first.unapplied, 1);
  assert_eq!(first.unrecognized, 1);

  let second = crawler.reconcile_profile("aeroson").await.unwrap();
  assert_eq!(second.new_ranks, 0);

  let s = session(&crawler).await;
  let aeroson = s.find_person("aeroson".into()).await.unwrap().unwrap();
  let ranks = s.ranks(aeroson.person_id).await.unwrap();
  assert_eq!(ranks.len(), 1, "placeholder replaced, promotion stored once");
  assert_eq!(ranks[0].source_id, Some(555));
  assert_eq!(ranks[0].name_long.as_deref(), Some("Sergeant"));
  assert_eq!(ranks[0].granted_by, Some(person_id(&s, "Samblues").await));

  assert_eq!(aeroson.country.as_deref(), Some("Czech Republic"));
  assert_eq!(aeroson.status.as_deref(), Some("active"));
  assert_eq!(aeroson.steam_id, Some(76561198012345678));
  assert_eq!(
    aeroson.avatar_url.as_deref(),
    Some("http://taw.net/images/avatars/aeroson.png")
  );
  assert_eq!(aeroson.biography.as_deref(), Some("Flies helicopters."));
  assert!(aeroson.applied_at.is_some());
  assert!(aeroson.profile_refreshed_at.is_some());
}

#[tokio::test]
async fn unknown_person_profile_fails() {
  let (crawler, _site) = crawler().await;
  assert!(matches!(
    crawler.reconcile_profile("nobody").await,
    Err(Error::PersonNotFound(name)) if name == "nobody"
  ));
}
