//! Operator notifications.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::error::ErrorInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
  Success,
  Error,
  Warning,
  Info,
}

impl NotificationKind {
  pub fn label(&self) -> &'static str {
    match self {
      NotificationKind::Success => "success",
      NotificationKind::Error => "error",
      NotificationKind::Warning => "warning",
      NotificationKind::Info => "info",
    }
  }
}

#[derive(Debug, Clone)]
pub struct Notification {
  pub id: NotificationId,
  pub kind: NotificationKind,
  pub title: String,
  pub message: String,
  /// None for errors, which stay until dismissed
  pub expires_after: Option<Duration>,
  pub created_at: DateTime<Utc>,
}

/// Ordered list of active notifications.
///
/// Success, warning and info entries remove themselves after their duration.
/// Errors stay until the operator dismisses them.
#[derive(Clone)]
pub struct NotificationSink {
  active: Arc<Mutex<Vec<Notification>>>,
  next_id: Arc<AtomicU64>,
  default_duration: Duration,
}

impl Default for NotificationSink {
  fn default() -> Self {
    Self::new(Duration::from_millis(5000))
  }
}

impl NotificationSink {
  pub fn new(default_duration: Duration) -> Self {
    Self {
      active: Arc::new(Mutex::new(Vec::new())),
      next_id: Arc::new(AtomicU64::new(1)),
      default_duration,
    }
  }

  fn active_mut(&self) -> MutexGuard<'_, Vec<Notification>> {
    self.active.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Add a notification. Must be called from within a tokio runtime when the
  /// kind expires.
  pub fn notify(
    &self,
    kind: NotificationKind,
    title: impl Into<String>,
    message: impl Into<String>,
    duration: Option<Duration>,
  ) -> NotificationId {
    let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
    let expires_after = match kind {
      NotificationKind::Error => None,
      _ => Some(duration.unwrap_or(self.default_duration)),
    };

    let notification = Notification {
      id,
      kind,
      title: title.into(),
      message: message.into(),
      expires_after,
      created_at: Utc::now(),
    };
    debug!(kind = kind.label(), title = %notification.title, "notification");
    self.active_mut().push(notification);

    if let Some(after) = expires_after {
      let sink = self.clone();
      tokio::spawn(async move {
        tokio::time::sleep(after).await;
        sink.dismiss(id);
      });
    }

    id
  }

  pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> NotificationId {
    self.notify(NotificationKind::Success, title, message, None)
  }

  pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> NotificationId {
    self.notify(NotificationKind::Error, title, message, None)
  }

  pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) -> NotificationId {
    self.notify(NotificationKind::Warning, title, message, None)
  }

  pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> NotificationId {
    self.notify(NotificationKind::Info, title, message, None)
  }

  /// Surface a failed request. Authentication failures are skipped, they
  /// are handled by forcing re-authentication instead.
  pub fn report_error(
    &self,
    title: impl Into<String>,
    error: impl Into<ErrorInfo>,
  ) -> Option<NotificationId> {
    let error = error.into();
    if error.is_auth() {
      return None;
    }
    Some(self.error(title, error.message))
  }

  /// Remove one notification. Returns whether it was still active.
  pub fn dismiss(&self, id: NotificationId) -> bool {
    let mut active = self.active_mut();
    let before = active.len();
    active.retain(|n| n.id != id);
    active.len() != before
  }

  /// Active notifications, oldest first.
  pub fn active(&self) -> Vec<Notification> {
    self.active_mut().clone()
  }

  /// Remove and return everything currently active.
  pub fn drain(&self) -> Vec<Notification> {
    std::mem::take(&mut *self.active_mut())
  }
}
