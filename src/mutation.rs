//! Remote writes and the cache invalidation that follows them.
//!
//! Writes are pessimistic: nothing in the cache changes until the backend
//! confirms the write, and then only by invalidation.

use std::future::Future;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{QueryPattern, ResourceCache};
use crate::error::{ClientError, ErrorInfo, ErrorKind};

/// Lifecycle of a single mutation invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
  Idle,
  Pending,
  Success,
  Error,
}

/// One invocation of a write. Never reused: every run creates a new task.
#[derive(Debug, Clone)]
pub struct MutationTask<R> {
  pub id: Uuid,
  pub status: MutationStatus,
  /// Entries marked stale once the write succeeds
  pub invalidates: Vec<QueryPattern>,
  pub result: Option<R>,
  pub error: Option<ErrorInfo>,
}

impl<R> MutationTask<R> {
  fn new(invalidates: Vec<QueryPattern>) -> Self {
    Self {
      id: Uuid::new_v4(),
      status: MutationStatus::Idle,
      invalidates,
      result: None,
      error: None,
    }
  }

  pub fn is_success(&self) -> bool {
    self.status == MutationStatus::Success
  }

  pub fn is_error(&self) -> bool {
    self.status == MutationStatus::Error
  }

  pub fn into_result(self) -> Result<R, ErrorInfo> {
    match (self.result, self.error) {
      (Some(result), None) => Ok(result),
      (_, Some(error)) => Err(error),
      (None, None) => Err(ErrorInfo::new(ErrorKind::Transport, "mutation did not complete")),
    }
  }
}

/// Runs writes and invalidates the cache after each success.
///
/// Unlike reads, writes are never deduplicated: two concurrent calls are two
/// independent requests.
#[derive(Clone)]
pub struct MutationCoordinator {
  cache: ResourceCache,
}

impl MutationCoordinator {
  pub fn new(cache: ResourceCache) -> Self {
    Self { cache }
  }

  pub fn cache(&self) -> &ResourceCache {
    &self.cache
  }

  /// Execute `task` now. On success every pattern in `invalidates` is
  /// invalidated before this returns; on failure the cache is untouched.
  ///
  /// Notifying the operator is left to the caller.
  pub async fn run<R, F, Fut>(&self, task: F, invalidates: Vec<QueryPattern>) -> MutationTask<R>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, ClientError>>,
  {
    let mut mutation = MutationTask::new(invalidates);
    mutation.status = MutationStatus::Pending;
    info!(id = %mutation.id, "mutation started");

    match task().await {
      Ok(result) => {
        let invalidated: usize = mutation
          .invalidates
          .iter()
          .map(|pattern| self.cache.invalidate(pattern))
          .sum();
        info!(id = %mutation.id, invalidated, "mutation succeeded");
        mutation.status = MutationStatus::Success;
        mutation.result = Some(result);
      }
      Err(e) => {
        warn!(id = %mutation.id, error = %e, "mutation failed");
        mutation.status = MutationStatus::Error;
        mutation.error = Some(ErrorInfo::from(&e));
      }
    }

    mutation
  }
}

/// Screen-side handle tracking the latest invocation of a write.
///
/// `mutate()` returns immediately with the handle in `Pending`; `poll()`
/// picks up the terminal task.
pub struct Mutation<R> {
  coordinator: MutationCoordinator,
  status: MutationStatus,
  last: Option<MutationTask<R>>,
  receiver: Option<mpsc::UnboundedReceiver<MutationTask<R>>>,
}

impl<R: Send + 'static> Mutation<R> {
  pub fn new(coordinator: MutationCoordinator) -> Self {
    Self {
      coordinator,
      status: MutationStatus::Idle,
      last: None,
      receiver: None,
    }
  }

  pub fn status(&self) -> MutationStatus {
    self.status
  }

  pub fn is_pending(&self) -> bool {
    self.status == MutationStatus::Pending
  }

  /// The most recent finished invocation.
  pub fn last(&self) -> Option<&MutationTask<R>> {
    self.last.as_ref()
  }

  /// Start a new invocation. A still-pending earlier invocation keeps
  /// running, but this handle only reports the newest one.
  pub fn mutate<F, Fut>(&mut self, task: F, invalidates: Vec<QueryPattern>)
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<R, ClientError>> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.status = MutationStatus::Pending;

    let coordinator = self.coordinator.clone();
    tokio::spawn(async move {
      let finished = coordinator.run(task, invalidates).await;
      let _ = tx.send(finished);
    });
  }

  /// Returns `true` once the pending invocation has finished.
  pub fn poll(&mut self) -> bool {
    let Some(rx) = &mut self.receiver else {
      return false;
    };
    match rx.try_recv() {
      Ok(task) => {
        self.finish(task);
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.receiver = None;
        self.status = MutationStatus::Error;
        true
      }
    }
  }

  /// Wait for the pending invocation, if any.
  pub async fn settled(&mut self) -> Option<&MutationTask<R>> {
    if let Some(rx) = &mut self.receiver {
      match rx.recv().await {
        Some(task) => self.finish(task),
        None => {
          self.receiver = None;
          self.status = MutationStatus::Error;
        }
      }
    }
    self.last.as_ref()
  }

  fn finish(&mut self, task: MutationTask<R>) {
    self.status = task.status;
    self.last = Some(task);
    self.receiver = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{FetchPolicy, QueryIdentity};
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  async fn warm(cache: &ResourceCache, id: &QueryIdentity, calls: &Arc<AtomicU32>) {
    let calls = Arc::clone(calls);
    cache
      .ensure_fresh(
        id,
        move || {
          let calls = Arc::clone(&calls);
          async move { Ok::<_, ClientError>(calls.fetch_add(1, Ordering::SeqCst)) }
        },
        FetchPolicy::default(),
      )
      .await;
  }

  #[tokio::test]
  async fn test_success_invalidates_declared_patterns() {
    let cache = ResourceCache::default();
    let titles = QueryIdentity::new("feedbacktitle.all");
    let users = QueryIdentity::new("users.all");
    let calls = Arc::new(AtomicU32::new(0));
    warm(&cache, &titles, &calls).await;
    warm(&cache, &users, &calls).await;

    let coordinator = MutationCoordinator::new(cache.clone());
    let task = coordinator
      .run(
        || async { Ok::<_, ClientError>("created") },
        vec![QueryPattern::prefix("feedbacktitle")],
      )
      .await;

    assert!(task.is_success());
    assert_eq!(task.result, Some("created"));
    assert!(cache.get::<u32>(&titles).is_invalidated);
    assert!(!cache.get::<u32>(&users).is_invalidated);

    // The next read refetches even though the data is recent
    warm(&cache, &titles, &calls).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_failure_leaves_cache_untouched() {
    let cache = ResourceCache::default();
    let titles = QueryIdentity::new("feedbacktitle.all");
    let calls = Arc::new(AtomicU32::new(0));
    warm(&cache, &titles, &calls).await;

    let coordinator = MutationCoordinator::new(cache.clone());
    let task: MutationTask<()> = coordinator
      .run(
        || async { Err(ClientError::transport(Some(409), "Title already exists")) },
        vec![QueryPattern::prefix("feedbacktitle")],
      )
      .await;

    assert!(task.is_error());
    assert_eq!(task.error.as_ref().and_then(|e| e.status), Some(409));
    assert!(!cache.get::<u32>(&titles).is_invalidated);
  }

  #[tokio::test(start_paused = true)]
  async fn test_concurrent_mutations_run_independently() {
    let coordinator = MutationCoordinator::new(ResourceCache::default());
    let executed = Arc::new(AtomicU32::new(0));

    let e1 = Arc::clone(&executed);
    let e2 = Arc::clone(&executed);
    let (m1, m2) = tokio::join!(
      coordinator.run(
        move || async move {
          e1.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(10)).await;
          Err::<u32, _>(ClientError::transport(Some(500), "gameweek 3 locked"))
        },
        vec![QueryPattern::prefix("autojoin")],
      ),
      coordinator.run(
        move || async move {
          e2.fetch_add(1, Ordering::SeqCst);
          tokio::time::sleep(Duration::from_millis(20)).await;
          Ok::<u32, ClientError>(4)
        },
        vec![QueryPattern::prefix("autojoin")],
      ),
    );

    assert_eq!(executed.load(Ordering::SeqCst), 2);
    assert!(m1.is_error());
    assert!(m2.is_success());
    assert_ne!(m1.id, m2.id);
  }

  #[tokio::test]
  async fn test_handle_reports_pending_then_result() {
    let coordinator = MutationCoordinator::new(ResourceCache::default());
    let mut mutation: Mutation<u32> = Mutation::new(coordinator);
    assert_eq!(mutation.status(), MutationStatus::Idle);

    mutation.mutate(|| async { Ok(7) }, vec![]);
    assert!(mutation.is_pending());
    let first_id = mutation.settled().await.map(|t| t.id);
    assert_eq!(mutation.status(), MutationStatus::Success);

    mutation.mutate(|| async { Err(ClientError::validation("bad")) }, vec![]);
    let second = mutation.settled().await.cloned().unwrap();
    assert!(second.is_error());
    assert_ne!(Some(second.id), first_id);
    assert!(!mutation.poll());
  }

  #[test]
  fn test_into_result() {
    let mut task: MutationTask<u32> = MutationTask::new(vec![]);
    task.result = Some(3);
    assert_eq!(task.into_result(), Ok(3));

    let mut task: MutationTask<u32> = MutationTask::new(vec![]);
    task.error = Some(ErrorInfo::new(ErrorKind::Validation, "no"));
    assert!(task.into_result().is_err());
  }
}
