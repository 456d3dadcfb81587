use reqwest::{multipart, Method};
use serde_json::json;

use crate::admin::bulk::BulkUpdateRequest;
use crate::api::api_types::{
  ApiEnvelope, AutoJoinData, BulkUpdateData, FeedbackTitleData, FeedbackTitlesData,
  GameWeeksData, InjuryBanData, LoginResponse, PlayersData, UploadResponse, UsersData,
};
use crate::api::types::{
  ActiveStatus, AdminUser, AutoJoinStatus, BulkUpdateResult, FeedbackTitle, GameWeek, InjuryBan,
  NewFeedbackTitle, NewInjuryBan, Player, UploadedImage, User,
};
use crate::error::{ClientError, Result};
use crate::transport::{error_with_details, Transport};

/// Admin backend API without caching.
#[derive(Clone)]
pub struct AdminApi {
  transport: Transport,
}

impl AdminApi {
  pub fn new(transport: Transport) -> Self {
    Self { transport }
  }

  pub fn transport(&self) -> &Transport {
    &self.transport
  }

  /// Exchange credentials for a session token
  pub async fn login(&self, email: &str, password: &str) -> Result<(AdminUser, String)> {
    let body = json!({ "email": email, "password": password });
    let response: LoginResponse = self
      .transport
      .request_typed(Method::POST, "/api/v1/admin/login", Some(&body), false)
      .await?;
    Ok((response.data.user, response.token))
  }

  /// Get all feedback titles
  pub async fn list_feedback_titles(&self) -> Result<Vec<FeedbackTitle>> {
    let response: ApiEnvelope<FeedbackTitlesData> = self
      .transport
      .request_typed(Method::GET, "/api/v1/feedbacktitle/all", None, true)
      .await?;
    Ok(response.data.feedback_titles)
  }

  pub async fn create_feedback_title(&self, new: &NewFeedbackTitle) -> Result<FeedbackTitle> {
    let body = to_body(new)?;
    let response: ApiEnvelope<FeedbackTitleData> = self
      .transport
      .request_typed(Method::POST, "/api/v1/feedbacktitle", Some(&body), true)
      .await?;
    Ok(response.data.feedback_title)
  }

  pub async fn set_feedback_title_status(&self, id: &str, status: ActiveStatus) -> Result<()> {
    let endpoint = format!("/api/v1/feedbacktitle/{}/status", id);
    let body = json!({ "status": status.as_str() });
    self
      .transport
      .request(Method::PATCH, &endpoint, Some(&body), true)
      .await?;
    Ok(())
  }

  pub async fn delete_feedback_title(&self, id: &str) -> Result<()> {
    let endpoint = format!("/api/v1/feedbacktitle/{}", id);
    self
      .transport
      .request(Method::DELETE, &endpoint, None, true)
      .await?;
    Ok(())
  }

  /// Get all platform users
  pub async fn list_users(&self) -> Result<Vec<User>> {
    let response: ApiEnvelope<UsersData> = self
      .transport
      .request_typed(Method::GET, "/api/v1/users/all", None, true)
      .await?;
    Ok(response.data.users)
  }

  /// Apply many user updates in one request
  pub async fn bulk_update_users(&self, request: &BulkUpdateRequest) -> Result<BulkUpdateResult> {
    let body = to_body(request)?;
    let response: ApiEnvelope<BulkUpdateData> = self
      .transport
      .request_typed(Method::PATCH, "/api/v1/users/bulk", Some(&body), true)
      .await?;
    Ok(response.data.result)
  }

  /// Get players on the active roster
  pub async fn list_roster_players(&self) -> Result<Vec<Player>> {
    let response: ApiEnvelope<PlayersData> = self
      .transport
      .request_typed(Method::GET, "/api/v1/players/roster", None, true)
      .await?;
    Ok(response.data.players)
  }

  pub async fn create_injury_ban(&self, new: &NewInjuryBan) -> Result<InjuryBan> {
    let body = to_body(new)?;
    let response: ApiEnvelope<InjuryBanData> = self
      .transport
      .request_typed(Method::POST, "/api/v1/injuryban", Some(&body), true)
      .await?;
    Ok(response.data.injury_ban)
  }

  pub async fn list_game_weeks(&self) -> Result<Vec<GameWeek>> {
    let response: ApiEnvelope<GameWeeksData> = self
      .transport
      .request_typed(Method::GET, "/api/v1/gameweek/all", None, true)
      .await?;
    Ok(response.data.game_weeks)
  }

  /// Status of the auto-join job for a game week
  pub async fn auto_join_status(&self, gameweek_id: &str) -> Result<AutoJoinStatus> {
    let endpoint = format!("/api/v1/gameweek/{}/autojoin/status", gameweek_id);
    let response: ApiEnvelope<AutoJoinData> = self
      .transport
      .request_typed(Method::GET, &endpoint, None, true)
      .await?;
    Ok(response.data.auto_join)
  }

  /// Ask the backend to run auto-join for a game week now
  pub async fn trigger_auto_join(&self, gameweek_id: &str) -> Result<AutoJoinStatus> {
    let endpoint = format!("/api/v1/gameweek/{}/autojoin", gameweek_id);
    let response: ApiEnvelope<AutoJoinData> = self
      .transport
      .request_typed(Method::POST, &endpoint, None, true)
      .await?;
    Ok(response.data.auto_join)
  }

  /// Upload an image through the upload proxy
  pub async fn upload_image(
    &self,
    folder: &str,
    file_name: &str,
    bytes: Vec<u8>,
  ) -> Result<UploadedImage> {
    let form = multipart::Form::new()
      .text("folder", folder.to_string())
      .part(
        "file",
        multipart::Part::bytes(bytes).file_name(file_name.to_string()),
      );

    let response: UploadResponse = self
      .transport
      .request_multipart("/api/upload", form, false)
      .await?;

    match response.data {
      Some(image) if response.success => Ok(image),
      _ => {
        let message = match &response.error {
          Some(error) => error_with_details(error, response.details.as_ref()),
          None => "upload failed without an error message".to_string(),
        };
        Err(ClientError::transport(None, message))
      }
    }
  }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
  serde_json::to_value(value)
    .map_err(|e| ClientError::validation(format!("Failed to serialize request: {}", e)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::SessionEvents;
  use crate::session::SessionManager;
  use crate::storage::MemoryStore;
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;
  use wiremock::matchers::{body_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn api(base_url: &str) -> AdminApi {
    let events = SessionEvents::new();
    let session = SessionManager::new(Arc::new(MemoryStore::new()), events.clone());
    session
      .login(
        AdminUser {
          id: "a1".into(),
          name: "Ada".into(),
          email: "ada@example.com".into(),
          role: None,
        },
        "tok".into(),
      )
      .unwrap();
    AdminApi::new(Transport::new(base_url, Duration::from_secs(5), session, events).unwrap())
  }

  #[tokio::test]
  async fn test_login() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v1/admin/login"))
      .and(body_json(json!({"email": "ada@example.com", "password": "pw"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "token": "jwt-token",
        "data": {"user": {"_id": "a1", "name": "Ada", "email": "ada@example.com", "role": "admin"}}
      })))
      .mount(&mock_server)
      .await;

    let (user, token) = api(&mock_server.uri())
      .login("ada@example.com", "pw")
      .await
      .unwrap();
    assert_eq!(token, "jwt-token");
    assert_eq!(user.role.as_deref(), Some("admin"));
  }

  #[tokio::test]
  async fn test_set_feedback_title_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PATCH"))
      .and(path("/api/v1/feedbacktitle/f1/status"))
      .and(body_json(json!({"status": "Inactive"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
      .expect(1)
      .mount(&mock_server)
      .await;

    api(&mock_server.uri())
      .set_feedback_title_status("f1", ActiveStatus::Inactive)
      .await
      .unwrap();
  }

  #[tokio::test]
  async fn test_upload_image() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/upload"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": {
          "secure_url": "https://img.example.com/players/1700000000000-ab12cd.png",
          "public_id": "players/1700000000000-ab12cd",
          "width": 800,
          "height": 600,
          "format": "png",
          "bytes": 12345
        }
      })))
      .mount(&mock_server)
      .await;

    let image = api(&mock_server.uri())
      .upload_image("players", "kit.png", vec![0u8; 16])
      .await
      .unwrap();
    assert_eq!(image.width, 800);
    assert_eq!(image.public_id, "players/1700000000000-ab12cd");
  }

  #[tokio::test]
  async fn test_upload_failure_surfaces_details() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/upload"))
      .respond_with(
        ResponseTemplate::new(500)
          .set_body_json(json!({"error": "Upload failed", "details": "Invalid image file"})),
      )
      .mount(&mock_server)
      .await;

    let err = api(&mock_server.uri())
      .upload_image("players", "kit.txt", b"nope".to_vec())
      .await
      .unwrap_err();
    assert_eq!(
      err,
      ClientError::transport(Some(500), "Upload failed: Invalid image file")
    );
  }

  #[tokio::test]
  async fn test_unsuccessful_upload_keeps_details() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/upload"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "success": false,
        "error": "Upload failed",
        "details": "Invalid image file"
      })))
      .mount(&mock_server)
      .await;

    let err = api(&mock_server.uri())
      .upload_image("players", "kit.txt", b"nope".to_vec())
      .await
      .unwrap_err();
    assert_eq!(
      err,
      ClientError::transport(None, "Upload failed: Invalid image file")
    );
  }
}
