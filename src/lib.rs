//! Client-side caching layer for the Jira REST API.
//!
//! Sits between an application and a paginated, rate-limited Jira instance:
//! persists fetched issues, detects staleness via the server's `updated`
//! timestamp, reassembles paged responses into one ordered result, and
//! bounds the number of fetches in flight.
//!
//! ```no_run
//! use jira_cache::{Config, JiraCache, MemoryStore, ReqwestTransport};
//!
//! # async fn run() -> jira_cache::Result<()> {
//! let config = Config::new("https://myinstance.atlassian.net");
//! let transport = ReqwestTransport::new(&config)?;
//! let cache = JiraCache::new(&config, MemoryStore::new(), transport);
//! cache.open().await?;
//!
//! let result = cache.search("project = PROJ", None, None).await?;
//! # Ok(())
//! # }
//! ```

mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod freshness;
pub mod pages;
pub mod store;
pub mod transport;
pub mod types;

pub use cache::JiraCache;
pub use config::Config;
pub use error::{Error, Result};
pub use pages::fetch_all_pages;
pub use store::{MemoryStore, SqliteStore, Store, StoredRecord};
pub use transport::{ReqwestTransport, Transport};
pub use types::{Expansion, Issue, IssueFields, IssueRef};
