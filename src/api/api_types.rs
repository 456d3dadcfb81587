//! Serde-deserializable types matching backend response envelopes.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;
use serde_json::Value;

use super::types::{
  AdminUser, AutoJoinStatus, BulkUpdateResult, FeedbackTitle, GameWeek, InjuryBan, Player,
  UploadedImage, User,
};

// ============================================================================
// Common envelope: {status, message?, results?, data}
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<D> {
  #[serde(default)]
  pub status: Option<String>,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub results: Option<usize>,
  pub data: D,
}

// ============================================================================
// data payloads
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct FeedbackTitlesData {
  #[serde(rename = "feedbackTitles")]
  pub feedback_titles: Vec<FeedbackTitle>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackTitleData {
  #[serde(rename = "feedbackTitle")]
  pub feedback_title: FeedbackTitle,
}

#[derive(Debug, Deserialize)]
pub struct UsersData {
  pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateData {
  #[serde(flatten)]
  pub result: BulkUpdateResult,
}

#[derive(Debug, Deserialize)]
pub struct PlayersData {
  pub players: Vec<Player>,
}

#[derive(Debug, Deserialize)]
pub struct InjuryBanData {
  #[serde(rename = "injuryBan")]
  pub injury_ban: InjuryBan,
}

#[derive(Debug, Deserialize)]
pub struct GameWeeksData {
  #[serde(rename = "gameWeeks")]
  pub game_weeks: Vec<GameWeek>,
}

#[derive(Debug, Deserialize)]
pub struct AutoJoinData {
  #[serde(rename = "autoJoin")]
  pub auto_join: AutoJoinStatus,
}

// ============================================================================
// Login: {status, token, data: {user}}
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
  pub token: String,
  pub data: LoginData,
}

#[derive(Debug, Deserialize)]
pub struct LoginData {
  pub user: AdminUser,
}

// ============================================================================
// Upload proxy: {success, data} or {error, details}
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UploadResponse {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub data: Option<UploadedImage>,
  #[serde(default)]
  pub error: Option<String>,
  #[serde(default)]
  pub details: Option<Value>,
}
