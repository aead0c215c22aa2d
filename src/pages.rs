//! Page assembly for paginated Jira endpoints.
//!
//! Page 0 is fetched first to learn the total item count; the remaining
//! pages are dispatched concurrently and may complete in any order. Each
//! response is slotted by its page index (`startAt / page_size`) and the
//! named results array is concatenated strictly in index order, so arrival
//! order never leaks into the assembled result.

use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::ApiPage;

/// Callback invoked once per downloaded page with
/// `(pages_downloaded, total_pages, label)`.
pub type ProgressSink<'a> = &'a (dyn Fn(u64, u64, &str) + Send + Sync);

/// Fetch every page of `base_url` and return page 0's envelope with
/// `result_field` replaced by the concatenation of that field across all
/// pages in ascending page-index order.
///
/// Fails with `Transport` if any page request fails; there is no partial
/// result.
pub async fn fetch_all_pages<T>(
  transport: &T,
  base_url: &str,
  result_field: &str,
  page_size: u64,
  progress: Option<ProgressSink<'_>>,
  label: &str,
) -> Result<Value>
where
  T: Transport + ?Sized,
{
  let first_url = page_url(base_url, page_size, 0)?;
  let first = fetch_page(transport, &first_url).await?;

  // Page 0 always exists, even for an empty result set.
  let total_pages = first.total.div_ceil(page_size).max(1);
  let mut downloaded: u64 = 1;
  debug!(total = first.total, total_pages, label, "first page received");

  if let Some(sink) = progress {
    sink(downloaded, total_pages, label);
  }

  // Slots for pages 1..total_pages, indexed by page index minus one.
  let mut tail: Vec<Option<ApiPage>> = (1..total_pages).map(|_| None).collect();

  if total_pages > 1 {
    let mut pending: FuturesUnordered<_> = (1..total_pages)
      .map(|index| {
        let url = page_url(base_url, page_size, index * page_size);
        async move {
          match url {
            Ok(url) => fetch_page(transport, &url).await,
            Err(e) => Err(e),
          }
        }
      })
      .collect();

    while let Some(page) = pending.next().await {
      let page = page?;
      let index = (page.start_at / page_size) as usize;
      trace!(index, start_at = page.start_at, "page received");

      let slot = match index.checked_sub(1).and_then(|i| tail.get_mut(i)) {
        Some(slot) if slot.is_none() => slot,
        _ => {
          return Err(Error::schema(
            base_url,
            format!("unexpected page offset {}", page.start_at),
          ))
        }
      };
      *slot = Some(page);

      downloaded += 1;
      if let Some(sink) = progress {
        sink(downloaded, total_pages, label);
      }
    }
  }

  assemble(first, tail, result_field, base_url)
}

fn assemble(
  first: ApiPage,
  tail: Vec<Option<ApiPage>>,
  result_field: &str,
  base_url: &str,
) -> Result<Value> {
  let mut envelope = first.envelope;
  envelope.insert("startAt".to_string(), Value::from(first.start_at));
  envelope.insert("total".to_string(), Value::from(first.total));

  // Page 0 legitimately omits the field when the result set is empty.
  let mut items = match envelope.remove(result_field) {
    Some(Value::Array(items)) => items,
    None => Vec::new(),
    Some(_) => {
      return Err(Error::schema(
        base_url,
        format!("field `{}` is not an array", result_field),
      ))
    }
  };

  for (offset, slot) in tail.into_iter().enumerate() {
    let mut page = slot.ok_or_else(|| {
      Error::schema(base_url, format!("page {} never arrived", offset + 1))
    })?;
    match page.envelope.remove(result_field) {
      Some(Value::Array(more)) => items.extend(more),
      _ => {
        return Err(Error::schema(
          base_url,
          format!("page {} is missing array field `{}`", offset + 1, result_field),
        ))
      }
    }
  }

  envelope.insert(result_field.to_string(), Value::Array(items));
  Ok(Value::Object(envelope))
}

async fn fetch_page<T>(transport: &T, url: &str) -> Result<ApiPage>
where
  T: Transport + ?Sized,
{
  let body = transport.request(url).await?;
  serde_json::from_value(body).map_err(|e| Error::schema(url, e))
}

pub(crate) fn page_url(base: &str, page_size: u64, start_at: u64) -> Result<String> {
  let mut url =
    Url::parse(base).map_err(|e| Error::config(format!("invalid url {}: {}", base, e)))?;
  url
    .query_pairs_mut()
    .append_pair("maxResults", &page_size.to_string())
    .append_pair("startAt", &start_at.to_string());
  Ok(url.into())
}
