//! Cache entry snapshots and fetch policies.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::identity::QueryIdentity;
use crate::error::ErrorInfo;

/// Fetch state of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
  /// Never fetched
  Idle,
  /// A request is in flight
  Loading,
  /// Last request succeeded
  Success,
  /// Last request failed
  Error,
}

/// Per-query caching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
  /// How long data stays fresh after a successful fetch
  pub stale_after: Duration,
  /// Proactive revalidation period, also caps the freshness window
  pub refetch_interval: Option<Duration>,
  /// Retries after a failed load, without backoff
  pub retry: u32,
}

impl Default for FetchPolicy {
  fn default() -> Self {
    Self {
      stale_after: Duration::from_secs(5 * 60),
      refetch_interval: None,
      retry: 1,
    }
  }
}

impl FetchPolicy {
  pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
    self.stale_after = stale_after;
    self
  }

  pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
    self.refetch_interval = Some(interval);
    self
  }

  pub fn with_retry(mut self, retry: u32) -> Self {
    self.retry = retry;
    self
  }

  /// Age after which data must be refetched on access.
  pub fn freshness_window(&self) -> Duration {
    match self.refetch_interval {
      Some(interval) => interval.min(self.stale_after),
      None => self.stale_after,
    }
  }
}

/// Read-only view of a cache entry handed to consumers.
///
/// Snapshots never change after they are taken; call the cache again
/// to observe newer state.
#[derive(Debug)]
pub struct CacheEntry<T> {
  pub identity: QueryIdentity,
  /// Last known good value, kept across invalidation and failed refetches
  pub data: Option<Arc<T>>,
  pub fetch_status: FetchStatus,
  pub error: Option<ErrorInfo>,
  pub fetched_at: Option<Instant>,
  pub stale_after: Duration,
  pub refetch_interval: Option<Duration>,
  /// Explicitly marked stale by an invalidation
  pub is_invalidated: bool,
}

impl<T> Clone for CacheEntry<T> {
  fn clone(&self) -> Self {
    Self {
      identity: self.identity.clone(),
      data: self.data.clone(),
      fetch_status: self.fetch_status,
      error: self.error.clone(),
      fetched_at: self.fetched_at,
      stale_after: self.stale_after,
      refetch_interval: self.refetch_interval,
      is_invalidated: self.is_invalidated,
    }
  }
}

impl<T> CacheEntry<T> {
  pub fn idle(identity: QueryIdentity, policy: &FetchPolicy) -> Self {
    Self {
      identity,
      data: None,
      fetch_status: FetchStatus::Idle,
      error: None,
      fetched_at: None,
      stale_after: policy.stale_after,
      refetch_interval: policy.refetch_interval,
      is_invalidated: false,
    }
  }

  pub fn data(&self) -> Option<&T> {
    self.data.as_deref()
  }

  pub fn is_loading(&self) -> bool {
    self.fetch_status == FetchStatus::Loading
  }

  pub fn is_success(&self) -> bool {
    self.fetch_status == FetchStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.fetch_status == FetchStatus::Error
  }

  /// Whether the data needs refetching on next access.
  pub fn is_stale(&self) -> bool {
    if self.is_invalidated {
      return true;
    }
    let window = match self.refetch_interval {
      Some(interval) => interval.min(self.stale_after),
      None => self.stale_after,
    };
    self
      .fetched_at
      .map(|t| t.elapsed() > window)
      .unwrap_or(true)
  }
}
