//! Member profile ("dossier") page.

use muster_core::{
  Result,
  source::{Page, ProfileFields},
};

use super::{event::field_table, html};

pub fn parse(page: &Page) -> Result<ProfileFields> {
  let doc = html::parse(&page.text);

  let steam_link = doc
    .find_by_id("hfSteam")
    .and_then(|a| a.attr("href"))
    .map(str::to_string);

  let avatar_src = doc
    .find_by_class("dossieravatar")
    .and_then(|d| d.child("img"))
    .and_then(|img| img.attr("src"))
    .map(str::to_string);

  let biography = doc.find_by_id("dossierbio").map(|bio| {
    let text = bio.inner_text();
    match text.strip_prefix("Bio:") {
      Some(rest) => rest.trim().to_string(),
      None => text,
    }
  });

  let table = doc
    .find_by_class("dossiernexttopicture")
    .and_then(|d| d.child("table").or_else(|| d.find_all("table").into_iter().next()))
    .map(field_table)
    .unwrap_or_default();

  Ok(ProfileFields { steam_link, avatar_src, biography, table })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dossier_fields() {
    let text = r#"<html><body>
      <a id="hfSteam" href="http://steamcommunity.com/profiles/76561198012345678">Steam</a>
      <div class="dossieravatar"><img src="/images/avatars/aeroson.png"></div>
      <div class="dossiernexttopicture"><table>
        <tr><td>Location:</td><td>Czech Republic</td></tr>
        <tr><td>Status:</td><td>Active</td></tr>
        <tr><td>Joined:</td><td>10-03-2014</td></tr>
      </table></div>
      <div id="dossierbio">Bio: Flies helicopters &amp; writes tools.</div>
    </body></html>"#;
    let page = Page { uri: "http://taw.net/member/aeroson.aspx".into(), text: text.into() };

    let fields = parse(&page).unwrap();
    assert_eq!(
      fields.steam_link.as_deref(),
      Some("http://steamcommunity.com/profiles/76561198012345678")
    );
    assert_eq!(fields.avatar_src.as_deref(), Some("/images/avatars/aeroson.png"));
    assert_eq!(fields.biography.as_deref(), Some("Flies helicopters & writes tools."));
    assert_eq!(fields.table.get("Location:"), Some("Czech Republic"));
    assert_eq!(fields.table.get("Joined"), Some("10-03-2014"));
  }

  #[test]
  fn sparse_profile_yields_empty_fields() {
    let page = Page { uri: "http://taw.net/member/x.aspx".into(), text: "<html></html>".into() };
    assert_eq!(parse(&page).unwrap(), ProfileFields::default());
  }
}
