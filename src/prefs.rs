//! Persisted UI preferences.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::error::{ClientError, Result};
use crate::storage::KeyValueStore;

/// Storage namespace for UI preferences, separate from the session.
pub const PREFERENCES_NAMESPACE: &str = "ui-preferences";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
  #[default]
  Light,
  Dark,
}

impl std::str::FromStr for Theme {
  type Err = ClientError;

  fn from_str(s: &str) -> Result<Self> {
    match s.to_lowercase().as_str() {
      "light" => Ok(Theme::Light),
      "dark" => Ok(Theme::Dark),
      other => Err(ClientError::validation(format!(
        "unknown theme '{}', expected light or dark",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiPreferences {
  pub sidebar_open: bool,
  pub theme: Theme,
}

impl Default for UiPreferences {
  fn default() -> Self {
    Self {
      sidebar_open: true,
      theme: Theme::default(),
    }
  }
}

/// Reads and writes [`UiPreferences`] through the durable store.
#[derive(Clone)]
pub struct PreferencesStore {
  store: Arc<dyn KeyValueStore>,
}

impl PreferencesStore {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store }
  }

  /// Saved preferences, or defaults when none are stored or they can't be read.
  pub fn load(&self) -> Result<UiPreferences> {
    let Some(bytes) = self.store.load(PREFERENCES_NAMESPACE)? else {
      return Ok(UiPreferences::default());
    };
    Ok(serde_json::from_slice(&bytes).unwrap_or_else(|e| {
      warn!(error = %e, "ignoring unreadable UI preferences");
      UiPreferences::default()
    }))
  }

  pub fn save(&self, prefs: &UiPreferences) -> Result<()> {
    let bytes = serde_json::to_vec(prefs)
      .map_err(|e| ClientError::Storage(format!("Failed to serialize preferences: {}", e)))?;
    self.store.save(PREFERENCES_NAMESPACE, &bytes)
  }

  /// Load, apply `change`, save. Returns the updated preferences.
  pub fn update(&self, change: impl FnOnce(&mut UiPreferences)) -> Result<UiPreferences> {
    let mut prefs = self.load()?;
    change(&mut prefs);
    self.save(&prefs)?;
    Ok(prefs)
  }
}
