use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::FetchPolicy;
use crate::error::ClientError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Custom title printed in CLI output (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub notifications: NotificationConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the admin backend (e.g. "https://api.example.com")
  pub url: String,
  /// Email used by `ffadmin login` when not given on the command line
  pub email: Option<String>,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long fetched data is considered fresh
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
  /// Retries for a failed read before the error is stored
  #[serde(default = "default_retry")]
  pub retry: u32,
}

fn default_stale_secs() -> u64 {
  300
}

fn default_retry() -> u32 {
  1
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
      retry: default_retry(),
    }
  }
}

impl CacheConfig {
  /// Base fetch policy for queries that don't override it.
  pub fn policy(&self) -> FetchPolicy {
    FetchPolicy::default()
      .with_stale_after(Duration::from_secs(self.stale_secs))
      .with_retry(self.retry)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
  /// Lifetime of non-error notifications
  #[serde(default = "default_duration_ms")]
  pub duration_ms: u64,
}

fn default_duration_ms() -> u64 {
  5000
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      duration_ms: default_duration_ms(),
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Path of the state database (default: $XDG_DATA_HOME/ffadmin/state.db)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ffadmin.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ffadmin/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/ffadmin/config.yaml\n\
                 See ffadmin.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("ffadmin.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ffadmin").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.api.timeout_secs)
  }

  pub fn notification_duration(&self) -> Duration {
    Duration::from_millis(self.notifications.duration_ms)
  }

  /// Header title, falling back to the API host.
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    url::Url::parse(&self.api.url)
      .ok()
      .and_then(|u| u.host_str().map(String::from))
      .unwrap_or_else(|| self.api.url.clone())
  }

  /// Get the admin password from the environment.
  ///
  /// Checks FFADMIN_PASSWORD.
  pub fn get_password() -> Result<String> {
    std::env::var("FFADMIN_PASSWORD")
      .map_err(|_| eyre!("Admin password not found. Set FFADMIN_PASSWORD environment variable."))
  }
}

/// Directory for the state database and log files.
pub fn data_dir() -> std::result::Result<PathBuf, ClientError> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| ClientError::Storage("Could not determine data directory".into()))?;

  Ok(data_dir.join("ffadmin"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_defaults() {
    let config = Config::from_yaml("api:\n  url: https://api.example.com\n").unwrap();
    assert_eq!(config.api.timeout_secs, 30);
    assert_eq!(config.cache.stale_secs, 300);
    assert_eq!(config.cache.retry, 1);
    assert_eq!(config.notifications.duration_ms, 5000);
    assert!(config.storage.path.is_none());
    assert_eq!(config.display_title(), "api.example.com");
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
title: League Admin
api:
  url: http://localhost:4000
  email: admin@example.com
  timeout_secs: 5
cache:
  stale_secs: 60
  retry: 0
notifications:
  duration_ms: 2000
storage:
  path: /tmp/ffadmin.db
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.display_title(), "League Admin");
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
    assert_eq!(config.notification_duration(), Duration::from_millis(2000));

    let policy = config.cache.policy();
    assert_eq!(policy.stale_after, Duration::from_secs(60));
    assert_eq!(policy.retry, 0);
  }

  #[test]
  fn test_missing_api_section_is_an_error() {
    assert!(Config::from_yaml("title: x\n").is_err());
  }
}
