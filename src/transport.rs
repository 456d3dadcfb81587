//! Authenticated HTTP+JSON transport to the admin backend.

use reqwest::{multipart, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::event::{SessionEvent, SessionEvents};
use crate::session::SessionManager;

/// Issues requests to the backend and classifies the responses.
///
/// No retries happen here: reads are retried by the cache, writes are never
/// retried automatically.
#[derive(Clone)]
pub struct Transport {
  http: Client,
  base_url: String,
  session: SessionManager,
  events: SessionEvents,
}

impl Transport {
  pub fn new(
    base_url: impl Into<String>,
    timeout: Duration,
    session: SessionManager,
    events: SessionEvents,
  ) -> Result<Self> {
    let http = Client::builder()
      .connect_timeout(timeout.min(Duration::from_secs(10)))
      .timeout(timeout)
      .build()
      .map_err(|e| ClientError::transport(None, format!("failed to build HTTP client: {}", e)))?;

    Ok(Self {
      http,
      base_url: base_url.into().trim_end_matches('/').to_string(),
      session,
      events,
    })
  }

  pub fn session(&self) -> &SessionManager {
    &self.session
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  /// Send a JSON request and return the decoded body.
  ///
  /// With `auth`, the session token is attached as a bearer credential; a
  /// missing token fails with [`ClientError::Unauthenticated`] before any
  /// network call.
  pub async fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
    auth: bool,
  ) -> Result<Value> {
    let token = if auth {
      Some(self.session.current_token()?)
    } else {
      None
    };

    let mut request = self.http.request(method.clone(), self.url(path));
    if let Some(token) = &token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = body {
      request = request.json(body);
    }

    debug!(%method, path, auth, "sending request");
    let response = request.send().await.map_err(send_error)?;
    self.handle_response(path, token.as_deref(), response).await
  }

  /// Like [`Transport::request`], decoding the body into `T`.
  ///
  /// A body that doesn't match `T` is a validation error rather than being
  /// passed on half-understood.
  pub async fn request_typed<T: DeserializeOwned>(
    &self,
    method: Method,
    path: &str,
    body: Option<&Value>,
    auth: bool,
  ) -> Result<T> {
    let value = self.request(method, path, body, auth).await?;
    decode(path, value)
  }

  /// Send a multipart form (file uploads).
  pub async fn request_multipart<T: DeserializeOwned>(
    &self,
    path: &str,
    form: multipart::Form,
    auth: bool,
  ) -> Result<T> {
    let token = if auth {
      Some(self.session.current_token()?)
    } else {
      None
    };

    let mut request = self.http.post(self.url(path)).multipart(form);
    if let Some(token) = &token {
      request = request.bearer_auth(token);
    }

    debug!(path, auth, "sending multipart request");
    let response = request.send().await.map_err(send_error)?;
    let value = self.handle_response(path, token.as_deref(), response).await?;
    decode(path, value)
  }

  async fn handle_response(&self, path: &str, token: Option<&str>, response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text().await.map_err(send_error)?;
    let body: Option<Value> = if text.trim().is_empty() {
      Some(Value::Null)
    } else {
      serde_json::from_str(&text).ok()
    };

    if status.is_success() {
      return body.ok_or_else(|| {
        ClientError::validation(format!("response from {} was not valid JSON", path))
      });
    }

    let message = body
      .as_ref()
      .and_then(error_message)
      .unwrap_or_else(|| format!("request failed with status {}", status.as_u16()));

    // Only a request that carried a token can have that token rejected.
    if let Some(token) = token {
      if is_credential_rejection(status.as_u16(), &message) {
        warn!(path, status = status.as_u16(), %message, "credential rejected");
        // A token that was already replaced by a newer login publishes nothing.
        let cleared = match self.session.reject(token) {
          Ok(cleared) => cleared,
          Err(e) => {
            warn!(error = %e, "failed to clear rejected session");
            true
          }
        };
        if cleared {
          self.events.emit(SessionEvent::CredentialRejected {
            reason: message.clone(),
          });
        } else {
          debug!(path, "rejection for a superseded token ignored");
        }
        return Err(ClientError::CredentialRejected(message));
      }
    }

    debug!(path, status = status.as_u16(), %message, "request failed");
    Err(ClientError::transport(Some(status.as_u16()), message))
  }
}

fn decode<T: DeserializeOwned>(path: &str, value: Value) -> Result<T> {
  serde_json::from_value(value)
    .map_err(|e| ClientError::validation(format!("unexpected response from {}: {}", path, e)))
}

fn send_error(e: reqwest::Error) -> ClientError {
  debug!(error = %e, "transport failure");
  if e.is_timeout() {
    ClientError::transport(None, "request timed out")
  } else {
    ClientError::transport(None, "network error")
  }
}

/// Structured error message from a failure body: `message`, or `error` with
/// optional `details`.
fn error_message(body: &Value) -> Option<String> {
  if let Some(message) = body.get("message").and_then(Value::as_str) {
    return Some(message.to_string());
  }
  let error = body.get("error").and_then(Value::as_str)?;
  Some(error_with_details(error, body.get("details")))
}

/// `error`, followed by `details` when present.
pub(crate) fn error_with_details(error: &str, details: Option<&Value>) -> String {
  match details {
    Some(Value::String(details)) => format!("{}: {}", error, details),
    Some(details) if !details.is_null() => format!("{}: {}", error, details),
    _ => error.to_string(),
  }
}

fn is_credential_rejection(status: u16, message: &str) -> bool {
  status == 401 || message.to_lowercase().contains("jwt")
}
