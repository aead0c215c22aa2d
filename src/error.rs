//! Error taxonomy for the caching layer.
//!
//! A single failed page or entity fetch fails the enclosing call; there are
//! no partial-success results and no retries at this level.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  /// A request to the Jira API failed (connection error or non-success
  /// status). Surfaced as-is, never retried here.
  #[error("transport error for {url}: {message}")]
  Transport { url: String, message: String },

  /// The server body did not match the expected shape.
  #[error("malformed response from {url}: {message}")]
  Schema { url: String, message: String },

  /// The underlying cache store failed.
  #[error("cache store error: {0}")]
  Store(String),

  /// Invalid or missing configuration.
  #[error("configuration error: {0}")]
  Config(String),

  /// A cache operation was issued before `open()` completed.
  #[error("cache used before open()")]
  NotOpened,
}

impl Error {
  pub(crate) fn transport(url: &str, message: impl ToString) -> Self {
    Self::Transport {
      url: url.to_string(),
      message: message.to_string(),
    }
  }

  pub(crate) fn schema(url: &str, message: impl ToString) -> Self {
    Self::Schema {
      url: url.to_string(),
      message: message.to_string(),
    }
  }

  pub(crate) fn store(message: impl ToString) -> Self {
    Self::Store(message.to_string())
  }

  pub(crate) fn config(message: impl ToString) -> Self {
    Self::Config(message.to_string())
  }
}
