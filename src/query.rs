//! Screen-side query handle over the resource cache.
//!
//! Inspired by TanStack Query, a `Query<T>` binds a cache identity to the
//! loader that produces it. Screens call `fetch()` when they want data and
//! `poll()` on every tick; many queries over the same identity share one
//! cache entry and one in-flight request.
//!
//! # Example
//!
//! ```ignore
//! let api = client.clone();
//! let mut query = Query::new(cache.clone(), queries::feedback_titles(), move || {
//!     let api = api.clone();
//!     async move { api.list_feedback_titles().await }
//! }, FetchPolicy::default());
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.status() {
//!     FetchStatus::Loading => render_spinner(query.data()),
//!     FetchStatus::Success => render_data(query.data()),
//!     FetchStatus::Error => render_error(query.error()),
//!     FetchStatus::Idle => {}
//! }
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cache::{CacheEntry, FetchPolicy, FetchStatus, ObserverGuard, QueryIdentity, ResourceCache};
use crate::error::{ClientError, ErrorInfo, ErrorKind};

/// A shared factory for the futures that fetch a query's data
type LoaderFn<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ClientError>> + Send + Sync>;

/// Observer of one cache identity.
///
/// Dropping the query (leaving the screen) stops it reacting to pending
/// results without aborting the request, and releases its hold on the
/// identity's refetch interval.
pub struct Query<T> {
  cache: ResourceCache,
  identity: QueryIdentity,
  loader: LoaderFn<T>,
  policy: FetchPolicy,
  entry: CacheEntry<T>,
  receiver: Option<mpsc::UnboundedReceiver<CacheEntry<T>>>,
  observer: ObserverGuard,
}

impl<T: Send + Sync + 'static> Query<T> {
  /// Create a query. Whatever the cache already holds for `identity` is
  /// visible immediately.
  pub fn new<F, Fut>(cache: ResourceCache, identity: QueryIdentity, loader: F, policy: FetchPolicy) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
  {
    let entry = cache.get(&identity);
    let observer = cache.observe(&identity);
    Self {
      cache,
      identity,
      loader: Arc::new(move || loader().boxed()),
      policy,
      entry,
      receiver: None,
      observer,
    }
  }

  /// Revalidate this identity every `interval` for as long as the query lives.
  pub fn with_refetch_interval(mut self, interval: Duration) -> Self {
    self.policy = self.policy.with_refetch_interval(interval);
    let loader = Arc::clone(&self.loader);
    self.observer =
      self
        .cache
        .set_refetch_interval(&self.identity, interval, move || loader(), self.policy);
    self
  }

  pub fn identity(&self) -> &QueryIdentity {
    &self.identity
  }

  /// Latest snapshot seen by this query.
  pub fn entry(&self) -> &CacheEntry<T> {
    &self.entry
  }

  pub fn status(&self) -> FetchStatus {
    self.entry.fetch_status
  }

  /// Last known good data, also available while refetching.
  pub fn data(&self) -> Option<&T> {
    self.entry.data()
  }

  pub fn is_loading(&self) -> bool {
    self.entry.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.entry.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.entry.is_error()
  }

  pub fn error(&self) -> Option<&ErrorInfo> {
    self.entry.error.as_ref()
  }

  pub fn is_stale(&self) -> bool {
    self.entry.is_stale()
  }

  /// Start fetching unless already loading or the cached data is fresh.
  pub fn fetch(&mut self) {
    if self.receiver.is_some() {
      return;
    }
    let current = self.cache.get::<T>(&self.identity);
    if current.is_success() && !current.is_stale() {
      self.entry = current;
      return;
    }
    self.start(false);
  }

  /// Force a refetch, even if already loading or data is fresh.
  pub fn refetch(&mut self) {
    // Stop listening to the previous fetch; the cache fences its result
    self.receiver = None;
    self.start(true);
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(entry) => {
        self.entry = entry;
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.entry.fetch_status = FetchStatus::Error;
        self.entry.error = Some(ErrorInfo::new(ErrorKind::Transport, "query was cancelled"));
        self.receiver = None;
        true
      }
    }
  }

  /// Pick up changes made to the shared entry by other consumers, background
  /// revalidation or refetch intervals. Returns `true` if the view changed.
  pub fn sync(&mut self) -> bool {
    if self.receiver.is_some() {
      return false;
    }
    let latest = self.cache.get::<T>(&self.identity);
    let changed = latest.fetch_status != self.entry.fetch_status
      || latest.fetched_at != self.entry.fetched_at
      || latest.is_invalidated != self.entry.is_invalidated;
    self.entry = latest;
    changed
  }

  /// Wait for the pending fetch, if any, and apply it.
  pub async fn settled(&mut self) -> &CacheEntry<T> {
    if let Some(rx) = &mut self.receiver {
      match rx.recv().await {
        Some(entry) => self.entry = entry,
        None => {
          self.entry.fetch_status = FetchStatus::Error;
          self.entry.error = Some(ErrorInfo::new(ErrorKind::Transport, "query was cancelled"));
        }
      }
      self.receiver = None;
    }
    &self.entry
  }

  fn start(&mut self, force: bool) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.entry.fetch_status = FetchStatus::Loading;

    let cache = self.cache.clone();
    let identity = self.identity.clone();
    let loader = Arc::clone(&self.loader);
    let policy = self.policy;
    tokio::spawn(async move {
      let fetch = move || loader();
      let entry = if force {
        cache.refetch(&identity, fetch, policy).await
      } else {
        cache.ensure_fresh(&identity, fetch, policy).await
      };
      // Ignore send errors - the query may have been dropped
      let _ = tx.send(entry);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("identity", &self.identity)
      .field("entry", &self.entry)
      .field("policy", &self.policy)
      .finish_non_exhaustive()
  }
}
