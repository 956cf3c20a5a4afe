//! `reqwest` implementation of the session provider.

use std::{sync::Arc, time::Duration};

use muster_core::source::{Page, Session, SessionProvider};
use reqwest::Client;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::{Error, Result};

/// Connection settings for [`HttpSessionProvider`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
  /// Sessions that may be open at once.
  pub max_sessions: usize,
  pub user_agent:   String,
  pub timeout:      Duration,
}

impl Default for SessionSettings {
  fn default() -> Self {
    Self {
      max_sessions: 4,
      user_agent:   concat!("muster/", env!("CARGO_PKG_VERSION")).to_string(),
      timeout:      Duration::from_secs(30),
    }
  }
}

/// Hands out [`HttpSession`]s over one shared [`reqwest::Client`].
///
/// Cheap to clone: the client and the session gate are `Arc`-based.
#[derive(Clone)]
pub struct HttpSessionProvider {
  client: Client,
  gate:   Arc<Semaphore>,
}

impl HttpSessionProvider {
  pub fn new(settings: SessionSettings) -> Result<Self> {
    let client = Client::builder()
      .user_agent(settings.user_agent)
      .timeout(settings.timeout)
      .build()?;
    Ok(Self {
      client,
      gate: Arc::new(Semaphore::new(settings.max_sessions.max(1))),
    })
  }
}

impl SessionProvider for HttpSessionProvider {
  type Error = Error;
  type Session = HttpSession;

  async fn acquire(&self) -> Result<HttpSession> {
    let permit = self
      .gate
      .clone()
      .acquire_owned()
      .await
      .map_err(|_| Error::GateClosed)?;
    Ok(HttpSession { client: self.client.clone(), _permit: permit })
  }
}

/// One open session. Dropping it frees a slot on the provider.
pub struct HttpSession {
  client:  Client,
  _permit: OwnedSemaphorePermit,
}

impl Session for HttpSession {
  type Error = Error;

  async fn get(&self, url: String) -> Result<Page> {
    tracing::trace!(%url, "GET");
    let resp = self.client.get(&url).send().await?.error_for_status()?;
    // Redirects are followed; the final location is what callers classify.
    let uri = resp.url().to_string();
    let text = resp.text().await?;
    Ok(Page { uri, text })
  }

  async fn post_json(&self, url: String, payload: serde_json::Value) -> Result<String> {
    tracing::trace!(%url, "POST");
    let resp = self
      .client
      .post(&url)
      .json(&payload)
      .send()
      .await?
      .error_for_status()?;
    Ok(resp.text().await?)
  }
}
