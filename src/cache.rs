//! The admission-controlled, cache-checked Jira client facade.
//!
//! For a single issue the cache consults the store, applies the freshness
//! rules, and only on a miss touches the network: one request for the base
//! entity, plus the page assembler for the changelog expansion when it is
//! required. Bulk searches delegate straight to the page assembler and are
//! never persisted; only individually resolved issues are.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::admission::Gate;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::freshness;
use crate::pages::{self, ProgressSink};
use crate::store::Store;
use crate::transport::Transport;
use crate::types::{Expansion, Issue, IssueRef};

const ISSUES_PARTITION: &str = "issues";

pub struct JiraCache<S, T> {
  store: Arc<S>,
  transport: Arc<T>,
  base_url: String,
  page_size: u64,
  gate: Gate,
  opened: Arc<AtomicBool>,
}

impl<S: Store, T: Transport> JiraCache<S, T> {
  pub fn new(config: &Config, store: S, transport: T) -> Self {
    Self {
      store: Arc::new(store),
      transport: Arc::new(transport),
      base_url: config.jira.url.trim_end_matches('/').to_string(),
      page_size: config.cache.page_size,
      gate: Gate::new(config.cache.max_in_flight),
      opened: Arc::new(AtomicBool::new(false)),
    }
  }

  /// Prepare the store partitions. Must complete before any other call.
  pub async fn open(&self) -> Result<()> {
    self.store.open(&[ISSUES_PARTITION]).await?;
    self.opened.store(true, Ordering::SeqCst);
    Ok(())
  }

  /// Resolve one issue, serving it from the cache when the stored record is
  /// at least as fresh as the caller's view and already carries every
  /// required expansion.
  ///
  /// At most `max_in_flight` calls are past admission at once; callers
  /// beyond the ceiling suspend until a slot frees up. A stale or
  /// incomplete record is discarded wholesale and refetched; the merged
  /// result supersedes it in the store unconditionally.
  pub async fn issue(&self, issue_ref: &IssueRef, expand: &[Expansion]) -> Result<Issue> {
    self.ensure_opened()?;

    // Deregisters on drop, so the gate is released on every exit path.
    let _slot = self.gate.admit().await;

    let cached = match self.store.get(&issue_ref.self_link, ISSUES_PARTITION).await? {
      Some(stored) => Some(
        serde_json::from_value::<Issue>(stored.record)
          .map_err(|e| Error::schema(&issue_ref.self_link, e))?,
      ),
      None => None,
    };

    if let Some(record) = cached {
      if freshness::is_valid(Some(&record), &issue_ref.updated, expand) {
        debug!(key = %issue_ref.self_link, "cache hit");
        return Ok(record);
      }
      debug!(key = %issue_ref.self_link, "discarding stale or incomplete record");
    }

    let url = self.issue_url(&issue_ref.id)?;
    let body = self.transport.request(&url).await?;
    let mut issue: Issue =
      serde_json::from_value(body).map_err(|e| Error::schema(&url, e))?;
    issue.expanded = Some(Vec::new());

    if expand.contains(&Expansion::Changelog) {
      let changelog_url = self.changelog_url(&issue_ref.id)?;
      let changelog = pages::fetch_all_pages(
        self.transport.as_ref(),
        &changelog_url,
        "values",
        self.page_size,
        None,
        &issue_ref.id,
      )
      .await?;
      issue.changelog = Some(changelog);
      if let Some(expanded) = issue.expanded.as_mut() {
        expanded.push(Expansion::Changelog.as_str().to_string());
      }
    }

    let record =
      serde_json::to_value(&issue).map_err(|e| Error::schema(&issue_ref.self_link, e))?;
    self
      .store
      .put(&issue_ref.self_link, &record, ISSUES_PARTITION)
      .await?;

    Ok(issue)
  }

  /// Run a JQL search, assembling all result pages into one envelope.
  ///
  /// Search results are not persisted; only individually resolved issues
  /// are. The call counts toward `await_idle` but is not admission-gated.
  pub async fn search(
    &self,
    jql: &str,
    progress: Option<ProgressSink<'_>>,
    result_field: Option<&str>,
  ) -> Result<Value> {
    self.ensure_opened()?;
    let _slot = self.gate.enter();

    let url = self.search_url(jql)?;
    pages::fetch_all_pages(
      self.transport.as_ref(),
      &url,
      result_field.unwrap_or("issues"),
      self.page_size,
      progress,
      jql,
    )
    .await
  }

  /// Suspend until every issued fetch has completed, success or failure.
  /// A synchronization barrier for callers about to read aggregate state
  /// derived from many fetches.
  pub async fn await_idle(&self) {
    self.gate.idle().await;
  }

  /// Fetch an issue's changelog. Shorthand for requesting the changelog
  /// expansion and extracting it; kept for interface compatibility, not a
  /// distinct code path.
  pub async fn changelog_of(&self, issue_ref: &IssueRef) -> Result<Value> {
    let issue = self.issue(issue_ref, &[Expansion::Changelog]).await?;
    issue
      .changelog
      .ok_or_else(|| Error::schema(&issue_ref.self_link, "expanded issue has no changelog"))
  }

  fn ensure_opened(&self) -> Result<()> {
    if self.opened.load(Ordering::SeqCst) {
      Ok(())
    } else {
      Err(Error::NotOpened)
    }
  }

  fn issue_url(&self, id: &str) -> Result<String> {
    self.endpoint(&format!("rest/api/latest/issue/{}", id)).map(String::from)
  }

  fn changelog_url(&self, id: &str) -> Result<String> {
    self
      .endpoint(&format!("rest/api/latest/issue/{}/changelog", id))
      .map(String::from)
  }

  fn search_url(&self, jql: &str) -> Result<String> {
    let mut url = self.endpoint("rest/api/latest/search")?;
    url
      .query_pairs_mut()
      .append_pair("fields", "id,updated")
      .append_pair("jql", jql);
    Ok(url.into())
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    Url::parse(&format!("{}/{}", self.base_url, path))
      .map_err(|e| Error::config(format!("invalid Jira base url: {}", e)))
  }
}

impl<S, T> Clone for JiraCache<S, T> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      transport: Arc::clone(&self.transport),
      base_url: self.base_url.clone(),
      page_size: self.page_size,
      gate: self.gate.clone(),
      opened: Arc::clone(&self.opened),
    }
  }
}
