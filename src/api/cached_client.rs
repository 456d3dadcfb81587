//! Admin client that routes reads through the resource cache and writes
//! through the mutation coordinator.

use std::future::Future;
use tracing::info;

use crate::admin::bulk::{BatchReport, BulkEdit};
use crate::admin::feedback::new_feedback_title;
use crate::admin::injury_ban::{create_availability, new_injury_ban, CreateAvailability};
use crate::cache::{CacheEntry, FetchPolicy, QueryIdentity, QueryPattern, ResourceCache};
use crate::error::{ClientError, Result};
use crate::mutation::{MutationCoordinator, MutationTask};
use crate::query::Query;
use crate::session::SessionManager;

use super::client::AdminApi;
use super::queries;
use super::types::{
  ActiveStatus, AdminUser, AutoJoinStatus, FeedbackTitle, GameWeek, InjuryBan, InjuryBanKind,
  Player, UploadedImage, User,
};

/// Admin API with caching.
///
/// Same surface as [`AdminApi`], but reads are deduplicated and cached and
/// every write invalidates the reads it affects.
#[derive(Clone)]
pub struct AdminClient {
  api: AdminApi,
  cache: ResourceCache,
  mutations: MutationCoordinator,
  policy: FetchPolicy,
}

impl AdminClient {
  pub fn new(api: AdminApi, cache: ResourceCache, mutations: MutationCoordinator) -> Self {
    let policy = cache.default_policy();
    Self {
      api,
      cache,
      mutations,
      policy,
    }
  }

  pub fn api(&self) -> &AdminApi {
    &self.api
  }

  pub fn cache(&self) -> &ResourceCache {
    &self.cache
  }

  pub fn session(&self) -> &SessionManager {
    self.api.transport().session()
  }

  /// Build a cache loader that calls `f` with a fresh handle to the API
  fn loader<T, F, Fut>(&self, f: F) -> impl Fn() -> Fut + Send + Sync + 'static
  where
    F: Fn(AdminApi) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    let api = self.api.clone();
    move || f(api.clone())
  }

  // --------------------------------------------------------------------------
  // Session
  // --------------------------------------------------------------------------

  /// Log in and establish the session. Anything cached for a previous
  /// administrator is dropped.
  pub async fn login(&self, email: &str, password: &str) -> Result<AdminUser> {
    let (identity, token) = self.api.login(email, password).await?;
    self.session().login(identity.clone(), token)?;
    self.cache.clear(&QueryPattern::All);
    Ok(identity)
  }

  pub fn logout(&self) -> Result<()> {
    self.session().logout()?;
    let cleared = self.cache.clear(&QueryPattern::All);
    info!(cleared, "cache cleared on logout");
    Ok(())
  }

  // --------------------------------------------------------------------------
  // Feedback titles
  // --------------------------------------------------------------------------

  pub async fn feedback_titles(&self) -> CacheEntry<Vec<FeedbackTitle>> {
    let loader = self.loader(|api| async move { api.list_feedback_titles().await });
    self
      .cache
      .ensure_fresh(&queries::feedback_titles(), loader, self.policy)
      .await
  }

  pub fn feedback_titles_query(&self) -> Query<Vec<FeedbackTitle>> {
    let loader = self.loader(|api| async move { api.list_feedback_titles().await });
    Query::new(
      self.cache.clone(),
      queries::feedback_titles(),
      loader,
      self.policy,
    )
  }

  /// Create a feedback title. A title that fails validation is returned as
  /// `Err` and nothing is sent.
  pub async fn create_feedback_title(
    &self,
    title: &str,
    major: Option<bool>,
  ) -> Result<MutationTask<FeedbackTitle>> {
    let new = new_feedback_title(title, major)?;
    let api = self.api.clone();
    Ok(
      self
        .mutations
        .run(
          move || async move { api.create_feedback_title(&new).await },
          queries::after_feedback_title_write(),
        )
        .await,
    )
  }

  pub async fn set_feedback_title_status(
    &self,
    id: &str,
    status: ActiveStatus,
  ) -> MutationTask<()> {
    let api = self.api.clone();
    let id = id.to_string();
    self
      .mutations
      .run(
        move || async move { api.set_feedback_title_status(&id, status).await },
        queries::after_feedback_title_write(),
      )
      .await
  }

  pub async fn delete_feedback_title(&self, id: &str) -> MutationTask<()> {
    let api = self.api.clone();
    let id = id.to_string();
    self
      .mutations
      .run(
        move || async move { api.delete_feedback_title(&id).await },
        queries::after_feedback_title_write(),
      )
      .await
  }

  // --------------------------------------------------------------------------
  // Users
  // --------------------------------------------------------------------------

  pub async fn users(&self) -> CacheEntry<Vec<User>> {
    let loader = self.loader(|api| async move { api.list_users().await });
    self
      .cache
      .ensure_fresh(&queries::users(), loader, self.policy)
      .await
  }

  /// Send a bulk edit as one request. An empty selection or no active field
  /// is returned as `Err` and nothing is sent.
  pub async fn bulk_update_users(&self, edit: &BulkEdit) -> Result<MutationTask<BatchReport>> {
    let request = edit.to_request()?;
    let api = self.api.clone();
    Ok(
      self
        .mutations
        .run(
          move || async move {
            api
              .bulk_update_users(&request)
              .await
              .map(BatchReport::from)
          },
          queries::after_user_write(),
        )
        .await,
    )
  }

  // --------------------------------------------------------------------------
  // Players and injuries/bans
  // --------------------------------------------------------------------------

  pub async fn roster_players(&self) -> CacheEntry<Vec<Player>> {
    let loader = self.loader(|api| async move { api.list_roster_players().await });
    self
      .cache
      .ensure_fresh(&queries::roster_players(), loader, self.policy)
      .await
  }

  pub fn roster_query(&self) -> Query<Vec<Player>> {
    let loader = self.loader(|api| async move { api.list_roster_players().await });
    Query::new(
      self.cache.clone(),
      queries::roster_players(),
      loader,
      self.policy,
    )
  }

  /// Record an injury or ban. Refused with a validation error while the
  /// roster is unavailable or when the player is not on it.
  pub async fn create_injury_ban(
    &self,
    player_id: &str,
    kind: InjuryBanKind,
    description: &str,
    expected_return: Option<String>,
  ) -> Result<MutationTask<InjuryBan>> {
    let roster = self.roster_players().await;
    if let CreateAvailability::Disabled { reason } = create_availability(&roster) {
      return Err(ClientError::Validation(reason));
    }
    let players = roster.data().map(Vec::as_slice).unwrap_or_default();
    let new = new_injury_ban(players, player_id, kind, description, expected_return)?;

    let api = self.api.clone();
    Ok(
      self
        .mutations
        .run(
          move || async move { api.create_injury_ban(&new).await },
          queries::after_injury_ban_write(),
        )
        .await,
    )
  }

  // --------------------------------------------------------------------------
  // Game weeks and auto-join
  // --------------------------------------------------------------------------

  pub async fn game_weeks(&self) -> CacheEntry<Vec<GameWeek>> {
    let loader = self.loader(|api| async move { api.list_game_weeks().await });
    self
      .cache
      .ensure_fresh(&queries::game_weeks(), loader, self.policy)
      .await
  }

  pub async fn auto_join_status(&self, gameweek_id: &str) -> CacheEntry<AutoJoinStatus> {
    let identity = queries::auto_join_status(gameweek_id);
    self
      .cache
      .ensure_fresh(
        &identity,
        self.auto_join_loader(gameweek_id),
        queries::auto_join_policy(self.policy),
      )
      .await
  }

  /// Monitor query that revalidates every 30 seconds while it is alive.
  pub fn auto_join_query(&self, gameweek_id: &str) -> Query<AutoJoinStatus> {
    Query::new(
      self.cache.clone(),
      queries::auto_join_status(gameweek_id),
      self.auto_join_loader(gameweek_id),
      self.policy,
    )
    .with_refetch_interval(queries::AUTO_JOIN_REFETCH_INTERVAL)
  }

  fn auto_join_loader(
    &self,
    gameweek_id: &str,
  ) -> impl Fn() -> futures::future::BoxFuture<'static, Result<AutoJoinStatus>> + Send + Sync + 'static
  {
    use futures::FutureExt;
    let gameweek_id = gameweek_id.to_string();
    self.loader(move |api| {
      let gameweek_id = gameweek_id.clone();
      async move { api.auto_join_status(&gameweek_id).await }.boxed()
    })
  }

  /// Trigger auto-join for one game week. Concurrent triggers for different
  /// weeks are independent requests.
  pub async fn trigger_auto_join(&self, gameweek_id: &str) -> MutationTask<AutoJoinStatus> {
    let api = self.api.clone();
    let gameweek_id = gameweek_id.to_string();
    self
      .mutations
      .run(
        move || async move { api.trigger_auto_join(&gameweek_id).await },
        queries::after_auto_join_trigger(),
      )
      .await
  }

  // --------------------------------------------------------------------------
  // Uploads
  // --------------------------------------------------------------------------

  /// Upload an image (not cached, nothing to invalidate).
  pub async fn upload_image(
    &self,
    folder: &str,
    file_name: &str,
    bytes: Vec<u8>,
  ) -> MutationTask<UploadedImage> {
    let api = self.api.clone();
    let folder = folder.to_string();
    let file_name = file_name.to_string();
    self
      .mutations
      .run(
        move || async move { api.upload_image(&folder, &file_name, bytes).await },
        Vec::new(),
      )
      .await
  }

  /// Mark everything matching `pattern` stale.
  pub fn invalidate(&self, pattern: &QueryPattern) -> usize {
    self.cache.invalidate(pattern)
  }

  /// Current cached entry for `identity` without fetching.
  pub fn peek<T: Send + Sync + 'static>(&self, identity: &QueryIdentity) -> CacheEntry<T> {
    self.cache.get(identity)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::SessionEvents;
  use crate::storage::MemoryStore;
  use crate::transport::Transport;
  use serde_json::json;
  use std::sync::Arc;
  use std::time::Duration;
  use wiremock::matchers::{body_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn admin() -> AdminUser {
    AdminUser {
      id: "a1".into(),
      name: "Ada".into(),
      email: "ada@example.com".into(),
      role: Some("admin".into()),
    }
  }

  fn client(base_url: &str) -> AdminClient {
    let events = SessionEvents::new();
    let session = SessionManager::new(Arc::new(MemoryStore::new()), events.clone());
    session.login(admin(), "tok".into()).unwrap();
    let transport = Transport::new(base_url, Duration::from_secs(5), session, events).unwrap();
    let cache = ResourceCache::default();
    AdminClient::new(
      AdminApi::new(transport),
      cache.clone(),
      MutationCoordinator::new(cache),
    )
  }

  fn titles_body(titles: &[&str]) -> serde_json::Value {
    let titles: Vec<_> = titles
      .iter()
      .enumerate()
      .map(|(i, t)| json!({"_id": format!("f{}", i), "title": t, "major": false, "status": "Active"}))
      .collect();
    json!({"status": "success", "results": titles.len(), "data": {"feedbackTitles": titles}})
  }

  #[tokio::test]
  async fn test_short_title_sends_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/api/v1/feedbacktitle"))
      .respond_with(ResponseTemplate::new(201))
      .expect(0)
      .mount(&mock_server)
      .await;

    let err = client(&mock_server.uri())
      .create_feedback_title("123456789", None)
      .await
      .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
  }

  #[tokio::test]
  async fn test_create_invalidates_and_refetches_list() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/feedbacktitle/all"))
      .respond_with(ResponseTemplate::new(200).set_body_json(titles_body(&["Bug report here"])))
      .expect(2)
      .mount(&mock_server)
      .await;
    Mock::given(method("POST"))
      .and(path("/api/v1/feedbacktitle"))
      .and(body_json(json!({"title": "1234567890"})))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({
        "status": "success",
        "message": "created",
        "data": {"feedbackTitle": {"_id": "f9", "title": "1234567890", "status": "Active"}}
      })))
      .expect(1)
      .mount(&mock_server)
      .await;

    let client = client(&mock_server.uri());
    assert!(client.feedback_titles().await.is_success());
    // Fresh: served from cache.
    client.feedback_titles().await;

    let task = client
      .create_feedback_title("  1234567890  ", None)
      .await
      .unwrap();
    assert!(task.is_success());
    assert_eq!(task.result.as_ref().map(|t| t.id.as_str()), Some("f9"));
    assert!(client
      .peek::<Vec<FeedbackTitle>>(&queries::feedback_titles())
      .is_invalidated);

    let refreshed = client.feedback_titles().await;
    assert!(refreshed.is_success());
    assert!(!refreshed.is_invalidated);
  }

  #[tokio::test]
  async fn test_failed_write_leaves_cache_alone() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/feedbacktitle/all"))
      .respond_with(ResponseTemplate::new(200).set_body_json(titles_body(&["Bug report here"])))
      .mount(&mock_server)
      .await;
    Mock::given(method("DELETE"))
      .and(path("/api/v1/feedbacktitle/f0"))
      .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not found"})))
      .mount(&mock_server)
      .await;

    let client = client(&mock_server.uri());
    client.feedback_titles().await;

    let task = client.delete_feedback_title("f0").await;
    assert!(task.is_error());
    assert_eq!(task.error.as_ref().map(|e| e.message.as_str()), Some("request failed (404): Not found"));
    assert!(!client
      .peek::<Vec<FeedbackTitle>>(&queries::feedback_titles())
      .is_invalidated);
  }

  #[tokio::test]
  async fn test_bulk_update_is_one_request() {
    let mock_server = MockServer::start().await;
    let updates: Vec<_> = (1..=5)
      .map(|i| json!({"_id": format!("u{}", i), "role": "user", "status": "Inactive"}))
      .collect();
    Mock::given(method("PATCH"))
      .and(path("/api/v1/users/bulk"))
      .and(body_json(json!({ "updates": updates })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": {"updated": 4, "failed": [{"id": "u5", "message": "Cannot deactivate an admin"}]}
      })))
      .expect(1)
      .mount(&mock_server)
      .await;

    let mut edit = BulkEdit::new();
    for i in 1..=5 {
      edit.select(format!("u{}", i));
    }
    edit
      .set_field("status", json!("Inactive"))
      .set_field("role", json!("user"));

    let task = client(&mock_server.uri())
      .bulk_update_users(&edit)
      .await
      .unwrap();
    let report = task.into_result().unwrap();
    assert_eq!(report.succeeded, 4);
    assert_eq!(report.errors, vec!["u5: Cannot deactivate an admin".to_string()]);
  }

  #[tokio::test]
  async fn test_injury_ban_refused_with_empty_roster() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/players/roster"))
      .respond_with(
        ResponseTemplate::new(200)
          .set_body_json(json!({"status": "success", "data": {"players": []}})),
      )
      .mount(&mock_server)
      .await;
    Mock::given(method("POST"))
      .and(path("/api/v1/injuryban"))
      .respond_with(ResponseTemplate::new(201))
      .expect(0)
      .mount(&mock_server)
      .await;

    let err = client(&mock_server.uri())
      .create_injury_ban("p1", InjuryBanKind::Injury, "Hamstring", None)
      .await
      .unwrap_err();
    assert!(matches!(err, ClientError::Validation(ref m) if m.starts_with("No roster players available")));
  }

  #[tokio::test]
  async fn test_trigger_auto_join_invalidates_status() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/gameweek/gw3/autojoin/status"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": {"autoJoin": {"gameweek": "gw3", "state": "idle"}}
      })))
      .mount(&mock_server)
      .await;
    Mock::given(method("POST"))
      .and(path("/api/v1/gameweek/gw3/autojoin"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": {"autoJoin": {"gameweek": "gw3", "state": "running", "processed": 10}}
      })))
      .expect(1)
      .mount(&mock_server)
      .await;

    let client = client(&mock_server.uri());
    assert!(client.auto_join_status("gw3").await.is_success());

    let task = client.trigger_auto_join("gw3").await;
    assert!(task.is_success());
    assert!(client
      .peek::<AutoJoinStatus>(&queries::auto_join_status("gw3"))
      .is_invalidated);
  }

  #[tokio::test]
  async fn test_logout_drops_previous_admin_data() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
      .and(path("/api/v1/gameweek/all"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": {"gameWeeks": [{"_id": "gw3", "number": 3}]}
      })))
      .mount(&mock_server)
      .await;

    let client = client(&mock_server.uri());
    let weeks = client.game_weeks().await;
    assert_eq!(weeks.data().map(Vec::len), Some(1));

    client.logout().unwrap();
    assert!(!client.session().is_authenticated());
    assert!(client
      .peek::<Vec<GameWeek>>(&queries::game_weeks())
      .data
      .is_none());

    let after = client.game_weeks().await;
    assert!(after.is_error());
    assert!(after.error.as_ref().is_some_and(|e| e.is_auth()));
    assert!(after.data.is_none());
  }
}
