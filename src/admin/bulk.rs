//! Bulk editing of many entities in one request.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::api::types::BulkUpdateResult;
use crate::error::{ClientError, Result};

/// How many per-item errors a [`BatchReport`] lists before summarising.
pub const MAX_LISTED_ERRORS: usize = 3;

/// Selection plus the fields the operator switched on.
///
/// Only active fields are sent; everything else on the entities is left as
/// the backend has it.
#[derive(Debug, Clone, Default)]
pub struct BulkEdit {
  selected: Vec<String>,
  fields: BTreeMap<String, Value>,
}

impl BulkEdit {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add an entity to the selection. Selecting twice is a no-op.
  pub fn select(&mut self, id: impl Into<String>) -> &mut Self {
    let id = id.into();
    if !self.selected.contains(&id) {
      self.selected.push(id);
    }
    self
  }

  pub fn deselect(&mut self, id: &str) -> &mut Self {
    self.selected.retain(|s| s != id);
    self
  }

  /// Activate `field` with the value to apply to every selected entity.
  pub fn set_field(&mut self, field: impl Into<String>, value: Value) -> &mut Self {
    self.fields.insert(field.into(), value);
    self
  }

  pub fn clear_field(&mut self, field: &str) -> &mut Self {
    self.fields.remove(field);
    self
  }

  pub fn selected(&self) -> &[String] {
    &self.selected
  }

  pub fn active_fields(&self) -> impl Iterator<Item = &str> {
    self.fields.keys().map(String::as_str)
  }

  /// One record per selected entity: its `_id` plus every active field.
  pub fn to_request(&self) -> Result<BulkUpdateRequest> {
    if self.selected.is_empty() {
      return Err(ClientError::validation("Select at least one entry to update"));
    }
    if self.fields.is_empty() {
      return Err(ClientError::validation("Enable at least one field to update"));
    }
    if self.fields.contains_key("_id") {
      return Err(ClientError::validation("The identifier cannot be bulk edited"));
    }

    let updates = self
      .selected
      .iter()
      .map(|id| {
        let mut record = Map::new();
        record.insert("_id".to_string(), Value::String(id.clone()));
        for (field, value) in &self.fields {
          record.insert(field.clone(), value.clone());
        }
        record
      })
      .collect();

    Ok(BulkUpdateRequest { updates })
  }
}

/// Body of a bulk update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkUpdateRequest {
  pub updates: Vec<Map<String, Value>>,
}

/// Aggregate outcome of a bulk operation for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
  pub succeeded: usize,
  pub failed: usize,
  pub errors: Vec<String>,
}

impl BatchReport {
  pub fn has_failures(&self) -> bool {
    self.failed > 0
  }

  /// "N updated, M failed" followed by at most `max_listed` error lines and
  /// a count of the rest.
  pub fn summary(&self, max_listed: usize) -> String {
    let mut lines = vec![format!("{} updated, {} failed", self.succeeded, self.failed)];
    lines.extend(self.errors.iter().take(max_listed).cloned());
    if self.errors.len() > max_listed {
      lines.push(format!("...and {} more", self.errors.len() - max_listed));
    }
    lines.join("\n")
  }
}

impl From<BulkUpdateResult> for BatchReport {
  fn from(result: BulkUpdateResult) -> Self {
    Self {
      succeeded: result.updated as usize,
      failed: result.failed.len(),
      errors: result
        .failed
        .into_iter()
        .map(|f| format!("{}: {}", f.id, f.message))
        .collect(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::BulkFailure;
  use serde_json::json;

  #[test]
  fn test_records_carry_only_active_fields() {
    let mut edit = BulkEdit::new();
    for id in ["u1", "u2", "u3", "u4", "u5"] {
      edit.select(id);
    }
    edit
      .set_field("status", json!("Inactive"))
      .set_field("role", json!("user"))
      .set_field("teamName", json!("ignored"))
      .clear_field("teamName");

    let request = edit.to_request().unwrap();
    assert_eq!(request.updates.len(), 5);
    for (record, id) in request.updates.iter().zip(["u1", "u2", "u3", "u4", "u5"]) {
      assert_eq!(record.len(), 3);
      assert_eq!(record["_id"], json!(id));
      assert_eq!(record["status"], json!("Inactive"));
      assert_eq!(record["role"], json!("user"));
    }
  }

  #[test]
  fn test_empty_selection_or_fields_rejected() {
    let mut edit = BulkEdit::new();
    edit.set_field("status", json!("Active"));
    assert!(matches!(edit.to_request(), Err(ClientError::Validation(_))));

    let mut edit = BulkEdit::new();
    edit.select("u1").select("u1");
    assert_eq!(edit.selected().len(), 1);
    assert!(matches!(edit.to_request(), Err(ClientError::Validation(_))));
  }

  #[test]
  fn test_summary_truncates_errors() {
    let report = BatchReport::from(BulkUpdateResult {
      updated: 2,
      failed: (1..=5)
        .map(|i| BulkFailure {
          id: format!("u{}", i),
          message: "email taken".into(),
        })
        .collect(),
    });

    assert!(report.has_failures());
    assert_eq!(
      report.summary(MAX_LISTED_ERRORS),
      "2 updated, 5 failed\nu1: email taken\nu2: email taken\nu3: email taken\n...and 2 more"
    );
  }

  #[test]
  fn test_summary_without_failures() {
    let report = BatchReport {
      succeeded: 4,
      failed: 0,
      errors: vec![],
    };
    assert_eq!(report.summary(MAX_LISTED_ERRORS), "4 updated, 0 failed");
  }
}
