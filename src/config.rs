//! Configuration loading (YAML file plus environment credentials).

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub jira: JiraConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
  /// Base URL of the Jira instance, e.g. https://myinstance.atlassian.net
  pub url: String,
  /// Account email for HTTP Basic auth. Anonymous access when unset.
  pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Maximum number of issue fetches allowed in flight at once.
  #[serde(default = "default_max_in_flight")]
  pub max_in_flight: usize,
  /// Page size for paginated endpoints.
  #[serde(default = "default_page_size")]
  pub page_size: u64,
  /// Cache database location (defaults under the platform data directory).
  pub db_path: Option<PathBuf>,
}

fn default_max_in_flight() -> usize {
  100
}

fn default_page_size() -> u64 {
  100
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_in_flight: default_max_in_flight(),
      page_size: default_page_size(),
      db_path: None,
    }
  }
}

impl Config {
  /// Programmatic configuration with defaults, for embedding and tests.
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      jira: JiraConfig {
        url: url.into(),
        email: None,
      },
      cache: CacheConfig::default(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./jira-cache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/jira-cache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(Error::config(format!("config file not found: {}", p.display())));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(Error::config(
        "no configuration file found; create one at ~/.config/jira-cache/config.yaml",
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("jira-cache.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("jira-cache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;

    serde_yaml::from_str(&contents)
      .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))
  }

  /// Get the Jira API token from environment variables.
  ///
  /// Checks JIRA_CACHE_TOKEN first, then JIRA_API_TOKEN as fallback.
  pub fn get_api_token() -> Result<String> {
    std::env::var("JIRA_CACHE_TOKEN")
      .or_else(|_| std::env::var("JIRA_API_TOKEN"))
      .map_err(|_| {
        Error::config("Jira API token not found; set JIRA_CACHE_TOKEN or JIRA_API_TOKEN")
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_match_the_api_limits() {
    let config = Config::new("https://jira.example.com");
    assert_eq!(config.cache.max_in_flight, 100);
    assert_eq!(config.cache.page_size, 100);
    assert!(config.jira.email.is_none());
  }

  #[test]
  fn parses_yaml_with_partial_cache_section() {
    let config: Config = serde_yaml::from_str(
      "jira:\n  url: https://jira.example.com\n  email: dev@example.com\ncache:\n  max_in_flight: 8\n",
    )
    .unwrap();

    assert_eq!(config.jira.email.as_deref(), Some("dev@example.com"));
    assert_eq!(config.cache.max_in_flight, 8);
    // Unset fields fall back to defaults.
    assert_eq!(config.cache.page_size, 100);
  }
}
