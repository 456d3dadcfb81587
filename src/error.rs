//! Error types shared by the transport, cache and mutation layers.

use thiserror::Error;

/// Errors produced while talking to the admin backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
  /// No session token is available for an authenticated call.
  #[error("not signed in")]
  Unauthenticated,

  /// The backend rejected the session token (401 or a jwt error payload).
  #[error("session expired or invalid: {0}")]
  CredentialRejected(String),

  /// Any other non-2xx response or a network-level failure.
  #[error("{}", match status {
    Some(code) => format!("request failed ({}): {}", code, message),
    None => message.clone(),
  })]
  Transport {
    status: Option<u16>,
    message: String,
  },

  /// Client-side precondition failure or a response that did not match
  /// the expected schema.
  #[error("{0}")]
  Validation(String),

  /// Durable storage could not be read or written.
  #[error("storage error: {0}")]
  Storage(String),
}

impl ClientError {
  pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
    Self::Transport {
      status,
      message: message.into(),
    }
  }

  pub fn validation(message: impl Into<String>) -> Self {
    Self::Validation(message.into())
  }

  /// Errors handled globally by forcing re-authentication.
  pub fn is_auth(&self) -> bool {
    matches!(self, Self::Unauthenticated | Self::CredentialRejected(_))
  }

  /// Whether a read may be retried by the cache.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Transport { .. } | Self::Storage(_))
  }
}

impl From<rusqlite::Error> for ClientError {
  fn from(e: rusqlite::Error) -> Self {
    Self::Storage(e.to_string())
  }
}

/// Classification carried by [`ErrorInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Auth,
  Transport,
  Validation,
  Storage,
}

/// Renderable snapshot of a failure, stored in cache entries and mutation tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
  pub kind: ErrorKind,
  pub status: Option<u16>,
  pub message: String,
}

impl ErrorInfo {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      status: None,
      message: message.into(),
    }
  }

  pub fn is_auth(&self) -> bool {
    self.kind == ErrorKind::Auth
  }
}

impl From<&ClientError> for ErrorInfo {
  fn from(e: &ClientError) -> Self {
    let (kind, status) = match e {
      ClientError::Unauthenticated => (ErrorKind::Auth, None),
      ClientError::CredentialRejected(_) => (ErrorKind::Auth, Some(401)),
      ClientError::Transport { status, .. } => (ErrorKind::Transport, *status),
      ClientError::Validation(_) => (ErrorKind::Validation, None),
      ClientError::Storage(_) => (ErrorKind::Storage, None),
    };
    Self {
      kind,
      status,
      message: e.to_string(),
    }
  }
}

impl From<ClientError> for ErrorInfo {
  fn from(e: ClientError) -> Self {
    Self::from(&e)
  }
}

impl std::fmt::Display for ErrorInfo {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.message)
  }
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_transport_error_display() {
    let e = ClientError::transport(Some(500), "boom");
    assert_eq!(e.to_string(), "request failed (500): boom");

    let e = ClientError::transport(None, "network error");
    assert_eq!(e.to_string(), "network error");
  }

  #[test]
  fn test_error_info_classification() {
    let info = ErrorInfo::from(ClientError::CredentialRejected("jwt expired".into()));
    assert!(info.is_auth());
    assert_eq!(info.status, Some(401));

    let info = ErrorInfo::from(ClientError::validation("too short"));
    assert_eq!(info.kind, ErrorKind::Validation);
    assert_eq!(info.message, "too short");
  }

  #[test]
  fn test_retryable() {
    assert!(ClientError::transport(Some(503), "unavailable").is_retryable());
    assert!(!ClientError::Unauthenticated.is_retryable());
    assert!(!ClientError::validation("bad").is_retryable());
  }
}
