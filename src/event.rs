//! Session events published by the transport layer.
//!
//! The transport never navigates or tears down UI state itself; it publishes
//! a [`SessionEvent`] and a single top-level subscriber reacts to it.

use tokio::sync::broadcast;

/// Session lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
  /// A session was established
  LoggedIn { email: String },
  /// The session was cleared on request
  LoggedOut,
  /// The backend rejected the session token
  CredentialRejected { reason: String },
}

/// Broadcast bus for [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct SessionEvents {
  tx: broadcast::Sender<SessionEvent>,
}

impl Default for SessionEvents {
  fn default() -> Self {
    Self::new()
  }
}

impl SessionEvents {
  pub fn new() -> Self {
    let (tx, _rx) = broadcast::channel(16);
    Self { tx }
  }

  /// Publish an event. Having no subscribers is not an error.
  pub fn emit(&self, event: SessionEvent) {
    let _ = self.tx.send(event);
  }

  pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
    self.tx.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_subscribers_receive_events_in_order() {
    let events = SessionEvents::new();
    let mut rx = events.subscribe();

    events.emit(SessionEvent::LoggedOut);
    events.emit(SessionEvent::CredentialRejected {
      reason: "jwt expired".into(),
    });

    assert_eq!(rx.recv().await.unwrap(), SessionEvent::LoggedOut);
    assert!(matches!(
      rx.recv().await.unwrap(),
      SessionEvent::CredentialRejected { .. }
    ));
  }

  #[test]
  fn test_emit_without_subscribers() {
    SessionEvents::new().emit(SessionEvent::LoggedOut);
  }
}
