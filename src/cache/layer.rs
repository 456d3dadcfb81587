//! Resource cache that coordinates fetches of remote entities.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::entry::{CacheEntry, FetchPolicy, FetchStatus};
use super::identity::{QueryIdentity, QueryPattern};
use crate::error::{ClientError, ErrorInfo, ErrorKind};

type AnyData = Arc<dyn Any + Send + Sync>;
type ErasedLoader = Arc<dyn Fn() -> BoxFuture<'static, Result<AnyData, ClientError>> + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, ()>>;

/// Internal, exclusively owned state of one identity.
struct Slot {
  identity: QueryIdentity,
  data: Option<AnyData>,
  status: FetchStatus,
  error: Option<ErrorInfo>,
  fetched_at: Option<Instant>,
  policy: FetchPolicy,
  invalidated: bool,
  /// Generation of the most recently started request, unique across slots
  generation: u64,
  in_flight: Option<InFlight>,
  /// An invalidation arrived while a request was in flight
  invalidated_in_flight: bool,
  /// Last loader used, kept for background revalidation
  loader: Option<ErasedLoader>,
  observers: usize,
  interval_task: Option<JoinHandle<()>>,
}

impl Slot {
  fn new(identity: QueryIdentity, policy: FetchPolicy) -> Self {
    Self {
      identity,
      data: None,
      status: FetchStatus::Idle,
      error: None,
      fetched_at: None,
      policy,
      invalidated: false,
      generation: 0,
      in_flight: None,
      invalidated_in_flight: false,
      loader: None,
      observers: 0,
      interval_task: None,
    }
  }

  fn is_fresh(&self) -> bool {
    if self.status != FetchStatus::Success || self.invalidated {
      return false;
    }
    self
      .fetched_at
      .map(|t| t.elapsed() <= self.policy.freshness_window())
      .unwrap_or(false)
  }

  fn snapshot<T: Send + Sync + 'static>(&self) -> CacheEntry<T> {
    let mut entry = CacheEntry::idle(self.identity.clone(), &self.policy);
    entry.fetch_status = self.status;
    entry.error = self.error.clone();
    entry.fetched_at = self.fetched_at;
    entry.is_invalidated = self.invalidated || self.invalidated_in_flight;

    if let Some(data) = &self.data {
      match Arc::clone(data).downcast::<T>() {
        Ok(typed) => entry.data = Some(typed),
        Err(_) => {
          entry.fetch_status = FetchStatus::Error;
          entry.error = Some(ErrorInfo::new(
            ErrorKind::Validation,
            format!("cached value for {} has a different type", self.identity),
          ));
        }
      }
    }
    entry
  }

  /// Forget data, error and any in-flight request, keeping observers.
  fn reset(&mut self, generation: u64) {
    self.data = None;
    self.status = FetchStatus::Idle;
    self.error = None;
    self.fetched_at = None;
    self.invalidated = false;
    self.invalidated_in_flight = false;
    self.in_flight = None;
    self.generation = generation;
  }
}

/// Process-wide cache of remote reads.
///
/// Constructed once at startup and cloned into whatever needs it; clones
/// share the same entries. Consumers only ever receive [`CacheEntry`]
/// snapshots, so every write goes through fetch completion or invalidation.
#[derive(Clone)]
pub struct ResourceCache {
  slots: Arc<Mutex<HashMap<String, Slot>>>,
  generations: Arc<AtomicU64>,
  default_policy: FetchPolicy,
}

impl Default for ResourceCache {
  fn default() -> Self {
    Self::new(FetchPolicy::default())
  }
}

impl ResourceCache {
  /// Create an empty cache. `default_policy` applies to entries created by
  /// [`ResourceCache::get`] before any fetch declares its own policy.
  pub fn new(default_policy: FetchPolicy) -> Self {
    Self {
      slots: Arc::new(Mutex::new(HashMap::new())),
      generations: Arc::new(AtomicU64::new(0)),
      default_policy,
    }
  }

  pub fn default_policy(&self) -> FetchPolicy {
    self.default_policy
  }

  fn next_generation(&self) -> u64 {
    self.generations.fetch_add(1, Ordering::Relaxed) + 1
  }

  fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
    // Slot updates never panic midway, so a poisoned map is still consistent.
    self.slots.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Current entry for `identity`, creating an idle entry if unseen.
  pub fn get<T: Send + Sync + 'static>(&self, identity: &QueryIdentity) -> CacheEntry<T> {
    let mut slots = self.slots();
    slots
      .entry(identity.fingerprint())
      .or_insert_with(|| Slot::new(identity.clone(), self.default_policy))
      .snapshot()
  }

  /// Number of identities the cache knows about.
  pub fn len(&self) -> usize {
    self.slots().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Return fresh data for `identity`, fetching only when needed.
  ///
  /// 1. Fresh success: returned immediately, loader not invoked
  /// 2. Request in flight: attach to it instead of issuing another, unless
  ///    it started before an invalidation
  /// 3. Otherwise start the loader and wait for it
  ///
  /// Loader failures are recorded in the entry, never returned as `Err`.
  pub async fn ensure_fresh<T, F, Fut>(
    &self,
    identity: &QueryIdentity,
    loader: F,
    policy: FetchPolicy,
  ) -> CacheEntry<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
  {
    self
      .ensure_fresh_erased(identity, erase(loader), policy, false)
      .await
  }

  /// Start a new request even when data is fresh or a request is in flight.
  ///
  /// The new request supersedes any older one; a slower superseded response
  /// is discarded when it arrives.
  pub async fn refetch<T, F, Fut>(
    &self,
    identity: &QueryIdentity,
    loader: F,
    policy: FetchPolicy,
  ) -> CacheEntry<T>
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
  {
    self
      .ensure_fresh_erased(identity, erase(loader), policy, true)
      .await
  }

  async fn ensure_fresh_erased<T: Send + Sync + 'static>(
    &self,
    identity: &QueryIdentity,
    loader: ErasedLoader,
    policy: FetchPolicy,
    force: bool,
  ) -> CacheEntry<T> {
    let key = identity.fingerprint();
    let waiting = {
      let mut slots = self.slots();
      let slot = slots
        .entry(key.clone())
        .or_insert_with(|| Slot::new(identity.clone(), policy));
      slot.policy = policy;
      slot.loader = Some(Arc::clone(&loader));

      let attached = if force || slot.invalidated_in_flight {
        None
      } else {
        slot.in_flight.clone()
      };
      match attached {
        Some(in_flight) => {
          debug!(identity = %identity, "attaching to in-flight request");
          in_flight
        }
        None => {
          if !force && slot.is_fresh() {
            debug!(identity = %identity, "cache hit");
            return slot.snapshot();
          }
          debug!(identity = %identity, force, "fetching");
          self.start_locked(&key, slot, loader)
        }
      }
    };

    self.settle(identity, &key, waiting).await
  }

  /// Wait for `waiting`, then for any newer request that superseded it.
  async fn settle<T: Send + Sync + 'static>(
    &self,
    identity: &QueryIdentity,
    key: &str,
    mut waiting: InFlight,
  ) -> CacheEntry<T> {
    loop {
      waiting.await;
      let next = {
        let slots = self.slots();
        match slots.get(key) {
          Some(slot) => match &slot.in_flight {
            Some(newer) => newer.clone(),
            None => return slot.snapshot(),
          },
          None => return CacheEntry::idle(identity.clone(), &self.default_policy),
        }
      };
      waiting = next;
    }
  }

  /// Begin a request for `slot`. Must be called with the map locked.
  fn start_locked(&self, key: &str, slot: &mut Slot, loader: ErasedLoader) -> InFlight {
    let generation = self.next_generation();
    slot.generation = generation;
    slot.status = FetchStatus::Loading;
    slot.invalidated_in_flight = false;

    let retry = slot.policy.retry;
    let identity = slot.identity.clone();
    let cache = self.clone();
    let key = key.to_string();

    // Spawned so a caller that goes away never aborts the request.
    let handle = tokio::spawn(async move {
      let result = AssertUnwindSafe(load_with_retry(&identity, &loader, retry))
        .catch_unwind()
        .await
        .unwrap_or_else(|_| {
          Err(ErrorInfo::new(
            ErrorKind::Transport,
            format!("loader for {} panicked", identity),
          ))
        });
      cache.complete(&key, generation, result);
    });

    let in_flight = async move {
      let _ = handle.await;
    }
    .boxed()
    .shared();
    slot.in_flight = Some(in_flight.clone());
    in_flight
  }

  /// Apply a finished request, unless a newer one has started since.
  fn complete(&self, key: &str, generation: u64, result: Result<AnyData, ErrorInfo>) {
    let mut slots = self.slots();
    let Some(slot) = slots.get_mut(key) else {
      return;
    };

    if slot.generation != generation {
      warn!(
        identity = %slot.identity,
        generation,
        latest = slot.generation,
        "discarding response from superseded request"
      );
      return;
    }

    slot.in_flight = None;
    slot.fetched_at = Some(Instant::now());
    match result {
      Ok(data) => {
        slot.data = Some(data);
        slot.status = FetchStatus::Success;
        slot.error = None;
      }
      Err(error) => {
        debug!(identity = %slot.identity, error = %error, "fetch failed");
        slot.status = FetchStatus::Error;
        slot.error = Some(error);
      }
    }

    slot.invalidated = std::mem::take(&mut slot.invalidated_in_flight);
    if slot.invalidated && slot.observers > 0 {
      if let Some(loader) = slot.loader.clone() {
        // The response predates an invalidation; refetch for observers.
        self.start_locked(key, slot, loader);
      }
    }
  }

  /// Mark every entry matching `pattern` stale, keeping its data.
  ///
  /// Entries that are currently observed are revalidated in the background.
  /// Returns how many entries matched.
  pub fn invalidate(&self, pattern: &QueryPattern) -> usize {
    let mut slots = self.slots();
    let mut matched = 0;

    for (key, slot) in slots.iter_mut() {
      if !pattern.matches(&slot.identity) {
        continue;
      }
      matched += 1;

      if slot.in_flight.is_some() {
        slot.invalidated_in_flight = true;
        continue;
      }

      slot.invalidated = true;
      if slot.observers > 0 {
        if let Some(loader) = slot.loader.clone() {
          debug!(identity = %slot.identity, "background revalidation");
          self.start_locked(key, slot, loader);
        }
      }
    }

    debug!(?pattern, matched, "invalidated");
    matched
  }

  /// Drop the data of every entry matching `pattern`.
  ///
  /// Unobserved entries are removed and their refetch intervals cancelled.
  /// Observed entries are reset to idle so their observers stay registered.
  /// Responses still in flight for cleared entries are discarded. Returns how
  /// many entries matched.
  pub fn clear(&self, pattern: &QueryPattern) -> usize {
    let mut slots = self.slots();
    let mut cleared = 0;

    slots.retain(|_, slot| {
      if !pattern.matches(&slot.identity) {
        return true;
      }
      cleared += 1;
      if slot.observers == 0 {
        if let Some(task) = slot.interval_task.take() {
          task.abort();
        }
        return false;
      }
      slot.reset(self.next_generation());
      true
    });

    debug!(?pattern, cleared, "cleared");
    cleared
  }

  /// Register interest in `identity` for as long as the guard is held.
  pub fn observe(&self, identity: &QueryIdentity) -> ObserverGuard {
    let key = identity.fingerprint();
    let mut slots = self.slots();
    let slot = slots
      .entry(key.clone())
      .or_insert_with(|| Slot::new(identity.clone(), self.default_policy));
    slot.observers += 1;
    ObserverGuard {
      cache: self.clone(),
      key,
    }
  }

  /// Revalidate `identity` every `interval` while the returned guard (or any
  /// other observer of the identity) is alive.
  pub fn set_refetch_interval<T, F, Fut>(
    &self,
    identity: &QueryIdentity,
    interval: Duration,
    loader: F,
    policy: FetchPolicy,
  ) -> ObserverGuard
  where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
  {
    let guard = self.observe(identity);
    let key = guard.key.clone();

    let mut slots = self.slots();
    if let Some(slot) = slots.get_mut(&key) {
      slot.policy = policy.with_refetch_interval(interval);
      slot.loader = Some(erase(loader));
      if let Some(previous) = slot.interval_task.take() {
        previous.abort();
      }

      let cache = self.clone();
      let task_key = key.clone();
      slot.interval_task = Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
          ticker.tick().await;
          if !cache.revalidate(&task_key) {
            break;
          }
        }
      }));
    }

    guard
  }

  /// Timer-driven revalidation. Returns false once nobody observes the entry.
  fn revalidate(&self, key: &str) -> bool {
    let mut slots = self.slots();
    let Some(slot) = slots.get_mut(key) else {
      return false;
    };
    if slot.observers == 0 {
      return false;
    }
    if slot.in_flight.is_none() {
      if let Some(loader) = slot.loader.clone() {
        debug!(identity = %slot.identity, "refetch interval elapsed");
        self.start_locked(key, slot, loader);
      }
    }
    true
  }

  fn release(&self, key: &str) {
    let mut slots = self.slots();
    if let Some(slot) = slots.get_mut(key) {
      slot.observers = slot.observers.saturating_sub(1);
      if slot.observers == 0 {
        if let Some(task) = slot.interval_task.take() {
          debug!(identity = %slot.identity, "refetch interval cancelled");
          task.abort();
        }
      }
    }
  }
}

/// Keeps an identity observed; dropping the last guard cancels its refetch
/// interval.
pub struct ObserverGuard {
  cache: ResourceCache,
  key: String,
}

impl Drop for ObserverGuard {
  fn drop(&mut self) {
    self.cache.release(&self.key);
  }
}

fn erase<T, F, Fut>(loader: F) -> ErasedLoader
where
  T: Send + Sync + 'static,
  F: Fn() -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
{
  Arc::new(move || {
    let fut = loader();
    async move { fut.await.map(|data| Arc::new(data) as AnyData) }.boxed()
  })
}

async fn load_with_retry(
  identity: &QueryIdentity,
  loader: &ErasedLoader,
  retry: u32,
) -> Result<AnyData, ErrorInfo> {
  let mut attempt = 0;
  loop {
    match loader().await {
      Ok(data) => return Ok(data),
      Err(e) if attempt < retry && e.is_retryable() => {
        attempt += 1;
        debug!(identity = %identity, attempt, error = %e, "retrying failed fetch");
      }
      Err(e) => return Err(ErrorInfo::from(e)),
    }
  }
}
