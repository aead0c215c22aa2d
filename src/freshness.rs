//! Staleness decision for cached issue records.

use crate::types::{Expansion, Issue};

/// Decide whether a cached record may be returned as-is for a caller that
/// saw `candidate_updated` on its list view and needs `required` expansions
/// embedded.
///
/// Rules, applied in order; the first failing rule invalidates:
/// 1. No cached record.
/// 2. The cached freshness token is strictly older than the candidate.
///    Equal or newer tokens pass: the candidate is a lower bound, not an
///    authoritative refresh signal.
/// 3. Expansions are required but the record was never expanded.
/// 4. A required expansion is missing from the record's expansion set.
///
/// A partial expansion mismatch discards the whole record; the missing
/// expansion is not fetched and merged separately.
pub fn is_valid(cached: Option<&Issue>, candidate_updated: &str, required: &[Expansion]) -> bool {
  let record = match cached {
    Some(record) => record,
    None => return false,
  };

  // Jira timestamps are fixed-format ISO-8601, so string order is time order.
  if record.fields.updated.as_str() < candidate_updated {
    return false;
  }

  if required.is_empty() {
    return true;
  }

  let expanded = match &record.expanded {
    Some(expanded) => expanded,
    // Never expanded at all; distinct from expanded with zero sub-resources.
    None => return false,
  };

  required
    .iter()
    .all(|needed| expanded.iter().any(|have| have == needed.as_str()))
}
