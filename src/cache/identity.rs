//! Query identities and invalidation patterns.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// A primitive query parameter value.
///
/// Floats compare by bit pattern, so a `NaN` parameter still equals itself.
#[derive(Debug, Clone)]
pub enum ParamValue {
  Str(String),
  Int(i64),
  Float(f64),
  Bool(bool),
  Null,
}

impl PartialEq for ParamValue {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (ParamValue::Str(a), ParamValue::Str(b)) => a == b,
      (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
      (ParamValue::Float(a), ParamValue::Float(b)) => a.to_bits() == b.to_bits(),
      (ParamValue::Bool(a), ParamValue::Bool(b)) => a == b,
      (ParamValue::Null, ParamValue::Null) => true,
      _ => false,
    }
  }
}

impl Eq for ParamValue {}

impl fmt::Display for ParamValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParamValue::Str(s) => write!(f, "{:?}", s),
      ParamValue::Int(i) => write!(f, "{}", i),
      ParamValue::Float(x) => write!(f, "{}", x),
      ParamValue::Bool(b) => write!(f, "{}", b),
      ParamValue::Null => f.write_str("null"),
    }
  }
}

impl From<&str> for ParamValue {
  fn from(s: &str) -> Self {
    ParamValue::Str(s.to_string())
  }
}

impl From<String> for ParamValue {
  fn from(s: String) -> Self {
    ParamValue::Str(s)
  }
}

impl From<i64> for ParamValue {
  fn from(i: i64) -> Self {
    ParamValue::Int(i)
  }
}

impl From<u32> for ParamValue {
  fn from(i: u32) -> Self {
    ParamValue::Int(i64::from(i))
  }
}

impl From<f64> for ParamValue {
  fn from(x: f64) -> Self {
    ParamValue::Float(x)
  }
}

impl From<bool> for ParamValue {
  fn from(b: bool) -> Self {
    ParamValue::Bool(b)
  }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
  fn from(v: Option<T>) -> Self {
    v.map(Into::into).unwrap_or(ParamValue::Null)
  }
}

/// Identifies a cacheable remote read: a resource name plus parameters.
///
/// Parameters live in a sorted map, so two identities built with the same
/// pairs in a different order are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryIdentity {
  resource: String,
  params: BTreeMap<String, ParamValue>,
}

impl QueryIdentity {
  pub fn new(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      params: BTreeMap::new(),
    }
  }

  pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
    self.params.insert(key.into(), value.into());
    self
  }

  pub fn resource(&self) -> &str {
    &self.resource
  }

  pub fn params(&self) -> &BTreeMap<String, ParamValue> {
    &self.params
  }

  /// Canonical `resource?k=v&k=v` form.
  pub fn canonical(&self) -> String {
    if self.params.is_empty() {
      return self.resource.clone();
    }
    let params: Vec<String> = self
      .params
      .iter()
      .map(|(k, v)| format!("{}={}", k, v))
      .collect();
    format!("{}?{}", self.resource, params.join("&"))
  }

  /// Stable fixed-length key used to index the cache.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.canonical().as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl fmt::Display for QueryIdentity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.canonical())
  }
}

/// Selects cache entries for invalidation.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPattern {
  /// Exactly one identity
  Exact(QueryIdentity),
  /// Every identity whose resource name starts with the prefix
  Prefix(String),
  /// Every entry in the cache
  All,
}

impl QueryPattern {
  pub fn prefix(prefix: impl Into<String>) -> Self {
    QueryPattern::Prefix(prefix.into())
  }

  pub fn matches(&self, identity: &QueryIdentity) -> bool {
    match self {
      QueryPattern::Exact(exact) => exact == identity,
      QueryPattern::Prefix(prefix) => identity.resource.starts_with(prefix.as_str()),
      QueryPattern::All => true,
    }
  }
}

impl From<QueryIdentity> for QueryPattern {
  fn from(identity: QueryIdentity) -> Self {
    QueryPattern::Exact(identity)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_param_order_does_not_matter() {
    let a = QueryIdentity::new("users")
      .with_param("page", 2i64)
      .with_param("role", "admin");
    let b = QueryIdentity::new("users")
      .with_param("role", "admin")
      .with_param("page", 2i64);

    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.canonical(), "users?page=2&role=\"admin\"");
  }

  #[test]
  fn test_param_values_distinguish_identities() {
    let a = QueryIdentity::new("gameweek").with_param("id", "7");
    let b = QueryIdentity::new("gameweek").with_param("id", 7i64);
    assert_ne!(a, b);
    assert_ne!(a.fingerprint(), b.fingerprint());
  }

  #[test]
  fn test_pattern_matching() {
    let detail = QueryIdentity::new("feedbacktitle.detail").with_param("id", "abc");
    let list = QueryIdentity::new("feedbacktitle.all");
    let users = QueryIdentity::new("users.all");

    let prefix = QueryPattern::prefix("feedbacktitle");
    assert!(prefix.matches(&detail));
    assert!(prefix.matches(&list));
    assert!(!prefix.matches(&users));

    let exact = QueryPattern::from(list.clone());
    assert!(exact.matches(&list));
    assert!(!exact.matches(&detail));

    assert!(QueryPattern::All.matches(&users));
  }

  #[test]
  fn test_nan_param_matches_itself() {
    let id = QueryIdentity::new("players.search").with_param("minPrice", f64::NAN);
    assert_eq!(id, id.clone());
    assert!(QueryPattern::from(id.clone()).matches(&id));
    assert_ne!(
      id,
      QueryIdentity::new("players.search").with_param("minPrice", 4.5)
    );
  }
}
