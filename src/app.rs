//! Composition root: builds every component once at startup and wires them
//! together.

use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::{AdminApi, AdminClient};
use crate::cache::{QueryPattern, ResourceCache};
use crate::config::Config;
use crate::event::{SessionEvent, SessionEvents};
use crate::mutation::MutationCoordinator;
use crate::notify::NotificationSink;
use crate::prefs::PreferencesStore;
use crate::session::SessionManager;
use crate::storage::{KeyValueStore, SqliteStore};
use crate::transport::Transport;

/// Hook for sending the operator back to the login entry point.
pub trait Navigator: Send + Sync {
  fn redirect_to_login(&self, reason: &str);
}

/// Reacts to credential rejection for the whole process.
///
/// On a [`SessionEvent::CredentialRejected`] the cached data is dropped and
/// the navigator is asked to redirect. The transport has already cleared the
/// rejected session; if a newer login is in place by the time the event is
/// handled, it is left untouched. The listener stops when the guard is
/// dropped.
pub struct AuthGuard {
  task: JoinHandle<()>,
}

impl AuthGuard {
  pub fn spawn(
    events: &SessionEvents,
    session: SessionManager,
    cache: ResourceCache,
    navigator: Arc<dyn Navigator>,
  ) -> Self {
    let mut rx = events.subscribe();
    let task = tokio::spawn(async move {
      loop {
        match rx.recv().await {
          Ok(SessionEvent::CredentialRejected { reason }) => {
            if session.is_authenticated() {
              info!(%reason, "rejection predates the current login, ignoring");
              continue;
            }
            warn!(%reason, "credential rejected, redirecting to login");
            cache.clear(&QueryPattern::All);
            navigator.redirect_to_login(&reason);
          }
          Ok(_) => {}
          Err(RecvError::Lagged(skipped)) => {
            warn!(skipped, "auth guard lagged behind session events");
          }
          Err(RecvError::Closed) => break,
        }
      }
    });
    Self { task }
  }
}

impl Drop for AuthGuard {
  fn drop(&mut self) {
    self.task.abort();
  }
}

/// Every long-lived component, constructed once.
pub struct App {
  config: Config,
  events: SessionEvents,
  session: SessionManager,
  client: AdminClient,
  notifications: NotificationSink,
  preferences: PreferencesStore,
  _auth_guard: AuthGuard,
}

impl App {
  /// Build the app on the SQLite store named by the configuration.
  pub fn new(config: Config, navigator: Arc<dyn Navigator>) -> Result<Self> {
    let store = SqliteStore::open(config.storage.path.as_deref())?;
    Self::with_store(config, Arc::new(store), navigator)
  }

  /// Build the app on an explicit durable store.
  pub fn with_store(
    config: Config,
    store: Arc<dyn KeyValueStore>,
    navigator: Arc<dyn Navigator>,
  ) -> Result<Self> {
    let events = SessionEvents::new();
    let session = SessionManager::hydrate(Arc::clone(&store), events.clone())?;
    let transport = Transport::new(
      config.api.url.clone(),
      config.request_timeout(),
      session.clone(),
      events.clone(),
    )?;

    let cache = ResourceCache::new(config.cache.policy());
    let mutations = MutationCoordinator::new(cache.clone());
    let client = AdminClient::new(AdminApi::new(transport), cache.clone(), mutations);

    let auth_guard = AuthGuard::spawn(&events, session.clone(), cache, navigator);
    let notifications = NotificationSink::new(config.notification_duration());
    let preferences = PreferencesStore::new(store);

    info!(
      api = %config.api.url,
      authenticated = session.is_authenticated(),
      "app initialized"
    );

    Ok(Self {
      config,
      events,
      session,
      client,
      notifications,
      preferences,
      _auth_guard: auth_guard,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn events(&self) -> &SessionEvents {
    &self.events
  }

  pub fn session(&self) -> &SessionManager {
    &self.session
  }

  pub fn client(&self) -> &AdminClient {
    &self.client
  }

  pub fn notifications(&self) -> &NotificationSink {
    &self.notifications
  }

  pub fn preferences(&self) -> &PreferencesStore {
    &self.preferences
  }
}
