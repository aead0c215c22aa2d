//! The opaque request primitive consumed by the cache.
//!
//! The cache only requires that a URL eventually resolves to a parsed JSON
//! body or a transport error; auth and TLS policy live behind this seam.
//! All requests issued through it are idempotent GETs.

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use crate::config::Config;
use crate::error::{Error, Result};

#[async_trait]
pub trait Transport: Send + Sync {
  /// Perform a GET against `url` and parse the body as JSON.
  async fn request(&self, url: &str) -> Result<Value>;
}

/// Production transport backed by reqwest, with HTTP Basic credentials
/// taken from the configuration and environment.
pub struct ReqwestTransport {
  client: reqwest::Client,
  credentials: Option<(String, String)>,
}

impl ReqwestTransport {
  pub fn new(config: &Config) -> Result<Self> {
    let credentials = match &config.jira.email {
      Some(email) => Some((email.clone(), Config::get_api_token()?)),
      None => None,
    };

    Ok(Self {
      client: reqwest::Client::new(),
      credentials,
    })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn request(&self, url: &str) -> Result<Value> {
    trace!(url, "GET");

    let mut request = self.client.get(url).header("Accept", "application/json");
    if let Some((user, token)) = &self.credentials {
      request = request.basic_auth(user, Some(token));
    }

    let response = request.send().await.map_err(|e| Error::transport(url, e))?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::transport(url, format!("server returned {}", status)));
    }

    let body = response.bytes().await.map_err(|e| Error::transport(url, e))?;
    serde_json::from_slice(&body).map_err(|e| Error::schema(url, e))
  }
}

#[cfg(test)]
pub(crate) mod testing {
  //! Canned transport for exercising the assembler and cache without a
  //! server. Clones share state so tests keep a handle after handing the
  //! transport to the cache.

  use super::*;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};
  use std::time::Duration;

  #[derive(Clone, Default)]
  pub(crate) struct MockTransport {
    inner: Arc<Inner>,
  }

  #[derive(Default)]
  struct Inner {
    responses: Mutex<HashMap<String, Value>>,
    delays: Mutex<HashMap<String, Duration>>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
  }

  impl MockTransport {
    pub fn new() -> Self {
      Self::default()
    }

    /// Serve `body` for every request to `url`.
    pub fn respond(&self, url: impl Into<String>, body: Value) {
      self.inner.responses.lock().unwrap().insert(url.into(), body);
    }

    /// Suspend requests to `url` for `delay` before responding.
    pub fn delay(&self, url: impl Into<String>, delay: Duration) {
      self.inner.delays.lock().unwrap().insert(url.into(), delay);
    }

    pub fn requests(&self) -> Vec<String> {
      self.inner.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
      self.inner.requests.lock().unwrap().len()
    }

    /// High-water mark of concurrently outstanding requests.
    pub fn max_in_flight(&self) -> usize {
      self.inner.max_in_flight.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Transport for MockTransport {
    async fn request(&self, url: &str) -> Result<Value> {
      self.inner.requests.lock().unwrap().push(url.to_string());

      let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
      self.inner.max_in_flight.fetch_max(now, Ordering::SeqCst);

      let delay = self.inner.delays.lock().unwrap().get(url).copied();
      if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
      }

      self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

      let response = self.inner.responses.lock().unwrap().get(url).cloned();
      response.ok_or_else(|| Error::transport(url, "no canned response"))
    }
  }
}
