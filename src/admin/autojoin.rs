//! Auto-join job monitor helpers.

use crate::api::types::{AutoJoinState, AutoJoinStatus};
use crate::cache::CacheEntry;

/// A trigger is refused while the backend is already working on the week.
pub fn can_trigger(status: &AutoJoinStatus) -> bool {
  !matches!(status.state, AutoJoinState::Scheduled | AutoJoinState::Running)
}

/// One-line description of the job for the monitor.
pub fn describe(status: &AutoJoinStatus) -> String {
  let mut line = match status.state {
    AutoJoinState::Idle => "Not scheduled".to_string(),
    AutoJoinState::Scheduled => match &status.scheduled_at {
      Some(at) => format!("Scheduled for {}", at),
      None => "Scheduled".to_string(),
    },
    AutoJoinState::Running => format!("Running ({} processed)", status.processed),
    AutoJoinState::Completed => format!(
      "Completed: {} joined, {} failed",
      status.processed, status.failed
    ),
    AutoJoinState::Failed => "Failed".to_string(),
  };
  if let Some(message) = &status.message {
    line.push_str(" - ");
    line.push_str(message);
  }
  line
}

/// Monitor line for a cache entry, keeping the last known status on screen
/// while a refetch is running or after it failed.
pub fn monitor_line(entry: &CacheEntry<AutoJoinStatus>) -> String {
  match (entry.data(), &entry.error) {
    (Some(status), Some(error)) => format!("{} (refresh failed: {})", describe(status), error),
    (Some(status), None) if entry.is_loading() => format!("{} (refreshing)", describe(status)),
    (Some(status), None) => describe(status),
    (None, Some(error)) => format!("Status unavailable: {}", error),
    (None, None) => "Loading status...".to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::queries;
  use crate::cache::{FetchPolicy, ResourceCache};
  use crate::error::ClientError;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  fn status(state: AutoJoinState) -> AutoJoinStatus {
    AutoJoinStatus {
      gameweek: "gw3".into(),
      state,
      scheduled_at: Some("2024-09-14T10:00:00Z".into()),
      completed_at: None,
      processed: 120,
      failed: 2,
      message: None,
    }
  }

  #[test]
  fn test_trigger_refused_while_busy() {
    assert!(can_trigger(&status(AutoJoinState::Idle)));
    assert!(can_trigger(&status(AutoJoinState::Completed)));
    assert!(!can_trigger(&status(AutoJoinState::Scheduled)));
    assert!(!can_trigger(&status(AutoJoinState::Running)));
  }

  #[test]
  fn test_describe() {
    assert_eq!(
      describe(&status(AutoJoinState::Scheduled)),
      "Scheduled for 2024-09-14T10:00:00Z"
    );
    let mut failed = status(AutoJoinState::Failed);
    failed.message = Some("deadline passed".into());
    assert_eq!(describe(&failed), "Failed - deadline passed");
    assert_eq!(
      describe(&status(AutoJoinState::Completed)),
      "Completed: 120 joined, 2 failed"
    );
  }

  #[tokio::test(start_paused = true)]
  async fn test_status_polling_window() {
    let cache = ResourceCache::default();
    let calls = Arc::new(AtomicUsize::new(0));
    let identity = queries::auto_join_status("gw3");
    let policy = queries::auto_join_policy(FetchPolicy::default());

    let counter = Arc::clone(&calls);
    let loader = move || {
      let counter = Arc::clone(&counter);
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok::<_, ClientError>(status(AutoJoinState::Scheduled))
      }
    };

    let first = cache.ensure_fresh(&identity, loader.clone(), policy).await;
    assert!(first.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::advance(Duration::from_secs(40)).await;
    cache.ensure_fresh(&identity, loader.clone(), policy).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    tokio::time::advance(Duration::from_secs(2)).await;
    let third = cache.ensure_fresh(&identity, loader, policy).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(monitor_line(&third), "Scheduled for 2024-09-14T10:00:00Z");
  }
}
