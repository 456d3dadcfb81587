//! Credential lifecycle: the current admin session and its persistence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use crate::api::types::AdminUser;
use crate::error::{ClientError, Result};
use crate::event::{SessionEvent, SessionEvents};
use crate::storage::KeyValueStore;

/// Storage namespace for the persisted session.
pub const SESSION_NAMESPACE: &str = "session";

/// Current authentication state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
  pub token: Option<String>,
  pub identity: Option<AdminUser>,
}

impl Session {
  pub fn is_authenticated(&self) -> bool {
    self.token.is_some() && self.identity.is_some()
  }
}

#[derive(Serialize, Deserialize)]
struct PersistedSession {
  token: String,
  identity: AdminUser,
  saved_at: DateTime<Utc>,
}

/// Owns the process-wide [`Session`].
///
/// Cloning shares the same session. Every change is written through to the
/// durable store so a restart resumes where it left off.
#[derive(Clone)]
pub struct SessionManager {
  session: Arc<RwLock<Session>>,
  store: Arc<dyn KeyValueStore>,
  events: SessionEvents,
}

impl SessionManager {
  /// Create a manager with an empty session.
  pub fn new(store: Arc<dyn KeyValueStore>, events: SessionEvents) -> Self {
    Self {
      session: Arc::new(RwLock::new(Session::default())),
      store,
      events,
    }
  }

  /// Create a manager and restore any session saved by a previous run.
  ///
  /// A record that cannot be decoded is discarded.
  pub fn hydrate(store: Arc<dyn KeyValueStore>, events: SessionEvents) -> Result<Self> {
    let manager = Self::new(store, events);

    if let Some(bytes) = manager.store.load(SESSION_NAMESPACE)? {
      match serde_json::from_slice::<PersistedSession>(&bytes) {
        Ok(saved) => {
          info!(email = %saved.identity.email, saved_at = %saved.saved_at, "restored session");
          *manager.write() = Session {
            token: Some(saved.token),
            identity: Some(saved.identity),
          };
        }
        Err(e) => {
          warn!(error = %e, "discarding unreadable session record");
          manager.store.remove(SESSION_NAMESPACE)?;
        }
      }
    }

    Ok(manager)
  }

  fn read(&self) -> RwLockReadGuard<'_, Session> {
    self.session.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write(&self) -> RwLockWriteGuard<'_, Session> {
    self.session.write().unwrap_or_else(|e| e.into_inner())
  }

  /// Snapshot of the current session.
  pub fn session(&self) -> Session {
    self.read().clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.read().is_authenticated()
  }

  pub fn identity(&self) -> Option<AdminUser> {
    self.read().identity.clone()
  }

  /// Establish and persist a session.
  pub fn login(&self, identity: AdminUser, token: String) -> Result<()> {
    let record = PersistedSession {
      token: token.clone(),
      identity: identity.clone(),
      saved_at: Utc::now(),
    };
    let bytes = serde_json::to_vec(&record)
      .map_err(|e| ClientError::Storage(format!("Failed to serialize session: {}", e)))?;
    self.store.save(SESSION_NAMESPACE, &bytes)?;

    info!(email = %identity.email, "logged in");
    let email = identity.email.clone();
    *self.write() = Session {
      token: Some(token),
      identity: Some(identity),
    };
    self.events.emit(SessionEvent::LoggedIn { email });
    Ok(())
  }

  /// Clear the session in memory and in durable storage.
  ///
  /// Navigation is left to the caller.
  pub fn logout(&self) -> Result<()> {
    *self.write() = Session::default();
    self.store.remove(SESSION_NAMESPACE)?;
    info!("logged out");
    self.events.emit(SessionEvent::LoggedOut);
    Ok(())
  }

  /// Token for an authenticated request.
  pub fn current_token(&self) -> Result<String> {
    self.read().token.clone().ok_or(ClientError::Unauthenticated)
  }

  /// Drop the session because the backend rejected `token`.
  ///
  /// Only clears state if `token` is still the active one, so a rejection
  /// that arrives after a fresh login leaves the new session alone. Returns
  /// whether the session was cleared.
  pub fn reject(&self, token: &str) -> Result<bool> {
    {
      let mut session = self.write();
      if session.token.as_deref() != Some(token) {
        return Ok(false);
      }
      *session = Session::default();
    }
    warn!("session token rejected, clearing session");
    self.store.remove(SESSION_NAMESPACE)?;
    Ok(true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStore;

  fn admin() -> AdminUser {
    AdminUser {
      id: "u1".into(),
      name: "Ada".into(),
      email: "ada@example.com".into(),
      role: Some("superadmin".into()),
    }
  }

  #[test]
  fn test_login_persists_across_restart() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let manager = SessionManager::new(Arc::clone(&store), SessionEvents::new());
    assert!(!manager.is_authenticated());
    manager.login(admin(), "tok-1".into()).unwrap();
    assert!(manager.is_authenticated());

    let restored = SessionManager::hydrate(store, SessionEvents::new()).unwrap();
    assert!(restored.is_authenticated());
    assert_eq!(restored.current_token().unwrap(), "tok-1");
    assert_eq!(restored.identity(), Some(admin()));
  }

  #[test]
  fn test_logout_clears_storage() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(Arc::clone(&store), SessionEvents::new());
    manager.login(admin(), "tok-1".into()).unwrap();

    manager.logout().unwrap();
    assert_eq!(manager.current_token(), Err(ClientError::Unauthenticated));
    assert_eq!(store.load(SESSION_NAMESPACE).unwrap(), None);
  }

  #[test]
  fn test_reject_ignores_stale_token() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let manager = SessionManager::new(store, SessionEvents::new());
    manager.login(admin(), "tok-2".into()).unwrap();

    assert!(!manager.reject("tok-1").unwrap());
    assert!(manager.is_authenticated());

    assert!(manager.reject("tok-2").unwrap());
    assert!(!manager.is_authenticated());
  }

  #[test]
  fn test_corrupt_record_is_discarded() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store.save(SESSION_NAMESPACE, b"not json").unwrap();

    let manager = SessionManager::hydrate(Arc::clone(&store), SessionEvents::new()).unwrap();
    assert!(!manager.is_authenticated());
    assert_eq!(store.load(SESSION_NAMESPACE).unwrap(), None);
  }

  #[test]
  fn test_token_without_identity_is_not_authenticated() {
    let session = Session {
      token: Some("t".into()),
      identity: None,
    };
    assert!(!session.is_authenticated());
  }
}
