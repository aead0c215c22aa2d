//! Domain and wire types for Jira entities.
//!
//! Fields the caching logic depends on (`self`, `id`, `fields.updated`,
//! pagination counters) are declared as required, so a malformed body
//! becomes a typed `Schema` error at parse time instead of a silently
//! defaulted value propagating into the cache.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A caller's handle on an issue, as it appears in a search result row
/// fetched with `fields=id,updated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRef {
  /// Canonical resource locator; the stable cache key.
  pub self_link: String,
  /// Short identifier used to build fetch URLs.
  pub id: String,
  /// Server-side last-modified marker from the caller's list view. Acts as
  /// a lower bound on how fresh a cached copy must be.
  pub updated: String,
}

impl IssueRef {
  /// Build a ref from one hit of an assembled search result.
  pub fn from_search_hit(hit: &Value) -> Option<Self> {
    Some(Self {
      self_link: hit.get("self")?.as_str()?.to_string(),
      id: hit.get("id")?.as_str()?.to_string(),
      updated: hit.get("fields")?.get("updated")?.as_str()?.to_string(),
    })
  }
}

/// A full issue record as fetched from the issue endpoint and as persisted
/// in the cache store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  #[serde(rename = "self")]
  pub self_link: String,
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub key: Option<String>,
  pub fields: IssueFields,
  /// Assembled changelog envelope, present once that expansion has been
  /// fetched and merged.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub changelog: Option<Value>,
  /// Names of expansions embedded in this record. `None` means the record
  /// was never expanded, which is distinct from `Some(vec![])`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub expanded: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
  /// Freshness token; strictly increasing on the server for every edit.
  pub updated: String,
  #[serde(flatten)]
  pub rest: Map<String, Value>,
}

/// Optional sub-resources of an issue that can be embedded alongside it.
///
/// String forms match Jira's `expand` parameter values. Only `Changelog`
/// has a dedicated paginated endpoint; the others participate in cache
/// validity checks but are fetched together with the base entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
  Changelog,
  Names,
  RenderedFields,
  Transitions,
}

impl Expansion {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Changelog => "changelog",
      Self::Names => "names",
      Self::RenderedFields => "renderedFields",
      Self::Transitions => "transitions",
    }
  }
}

impl std::fmt::Display for Expansion {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// One page of a paginated Jira response. Pages are addressable by
/// `start_at / page_size`, giving a zero-based page index.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPage {
  #[serde(rename = "startAt")]
  pub start_at: u64,
  pub total: u64,
  /// Remainder of the page envelope, including the named results array.
  #[serde(flatten)]
  pub envelope: Map<String, Value>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn issue_roundtrips_with_expansion_metadata() {
    let issue: Issue = serde_json::from_value(json!({
      "self": "https://jira.example.com/rest/api/latest/issue/10001",
      "id": "10001",
      "key": "PROJ-1",
      "fields": {"updated": "2024-03-01T10:00:00.000+0000", "summary": "A bug"},
      "expanded": []
    }))
    .unwrap();

    assert_eq!(issue.expanded, Some(vec![]));
    assert_eq!(issue.fields.updated, "2024-03-01T10:00:00.000+0000");
    assert_eq!(issue.fields.rest.get("summary"), Some(&json!("A bug")));

    let value = serde_json::to_value(&issue).unwrap();
    assert_eq!(value["self"], "https://jira.example.com/rest/api/latest/issue/10001");
    // Absent sub-resources must stay absent, not become nulls.
    assert!(value.get("changelog").is_none());
  }

  #[test]
  fn issue_without_expanded_field_deserializes_to_none() {
    let issue: Issue = serde_json::from_value(json!({
      "self": "https://jira.example.com/rest/api/latest/issue/10001",
      "id": "10001",
      "fields": {"updated": "2024-03-01T10:00:00.000+0000"}
    }))
    .unwrap();

    assert_eq!(issue.expanded, None);
  }

  #[test]
  fn issue_missing_updated_is_rejected() {
    let result: serde_json::Result<Issue> = serde_json::from_value(json!({
      "self": "https://jira.example.com/rest/api/latest/issue/10001",
      "id": "10001",
      "fields": {"summary": "no updated field"}
    }));

    assert!(result.is_err());
  }

  #[test]
  fn page_requires_pagination_counters() {
    let result: serde_json::Result<ApiPage> = serde_json::from_value(json!({
      "issues": []
    }));
    assert!(result.is_err());

    let page: ApiPage = serde_json::from_value(json!({
      "startAt": 100,
      "total": 250,
      "issues": [1, 2, 3]
    }))
    .unwrap();
    assert_eq!(page.start_at, 100);
    assert_eq!(page.total, 250);
    assert_eq!(page.envelope.get("issues"), Some(&json!([1, 2, 3])));
  }

  #[test]
  fn issue_ref_from_search_hit() {
    let hit = json!({
      "self": "https://jira.example.com/rest/api/latest/issue/10001",
      "id": "10001",
      "fields": {"updated": "2024-03-01T10:00:00.000+0000"}
    });

    let issue_ref = IssueRef::from_search_hit(&hit).unwrap();
    assert_eq!(issue_ref.id, "10001");
    assert_eq!(issue_ref.updated, "2024-03-01T10:00:00.000+0000");

    assert!(IssueRef::from_search_hit(&json!({"id": "10001"})).is_none());
  }
}
