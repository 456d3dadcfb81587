use serde::{Deserialize, Serialize};

/// Signed-in administrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
  #[serde(rename = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub role: Option<String>,
}

/// Active/Inactive toggle used by several admin resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveStatus {
  Active,
  Inactive,
}

impl ActiveStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      ActiveStatus::Active => "Active",
      ActiveStatus::Inactive => "Inactive",
    }
  }
}

impl std::str::FromStr for ActiveStatus {
  type Err = crate::error::ClientError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "active" => Ok(ActiveStatus::Active),
      "inactive" => Ok(ActiveStatus::Inactive),
      other => Err(crate::error::ClientError::validation(format!(
        "unknown status '{}', expected Active or Inactive",
        other
      ))),
    }
  }
}

/// Category offered to players when they send feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackTitle {
  #[serde(rename = "_id")]
  pub id: String,
  pub title: String,
  #[serde(default)]
  pub major: bool,
  pub status: ActiveStatus,
  #[serde(rename = "createdAt", default)]
  pub created_at: Option<String>,
}

/// Body of a feedback title create. Construct through
/// [`crate::admin::feedback::new_feedback_title`] so the title is validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFeedbackTitle {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub major: Option<bool>,
}

/// Platform user (team manager)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  #[serde(rename = "_id")]
  pub id: String,
  pub name: String,
  pub email: String,
  #[serde(default)]
  pub role: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
  #[serde(rename = "teamName", default)]
  pub team_name: Option<String>,
}

/// Player on the active roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
  #[serde(rename = "_id")]
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub team: Option<String>,
  #[serde(default)]
  pub position: Option<String>,
  #[serde(default)]
  pub price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InjuryBanKind {
  Injury,
  Ban,
}

impl std::str::FromStr for InjuryBanKind {
  type Err = crate::error::ClientError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "injury" => Ok(InjuryBanKind::Injury),
      "ban" => Ok(InjuryBanKind::Ban),
      other => Err(crate::error::ClientError::validation(format!(
        "unknown kind '{}', expected injury or ban",
        other
      ))),
    }
  }
}

/// Injury or suspension recorded against a player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryBan {
  #[serde(rename = "_id")]
  pub id: String,
  pub player: String,
  #[serde(rename = "type")]
  pub kind: InjuryBanKind,
  pub description: String,
  #[serde(rename = "expectedReturn", default)]
  pub expected_return: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInjuryBan {
  pub player: String,
  #[serde(rename = "type")]
  pub kind: InjuryBanKind,
  pub description: String,
  #[serde(rename = "expectedReturn", skip_serializing_if = "Option::is_none")]
  pub expected_return: Option<String>,
}

/// Game week summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameWeek {
  #[serde(rename = "_id")]
  pub id: String,
  pub number: u32,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub deadline: Option<String>,
  #[serde(default)]
  pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutoJoinState {
  Idle,
  Scheduled,
  Running,
  Completed,
  Failed,
}

/// Progress of the backend's auto-join job for one game week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoJoinStatus {
  pub gameweek: String,
  pub state: AutoJoinState,
  #[serde(rename = "scheduledAt", default)]
  pub scheduled_at: Option<String>,
  #[serde(rename = "completedAt", default)]
  pub completed_at: Option<String>,
  #[serde(default)]
  pub processed: u32,
  #[serde(default)]
  pub failed: u32,
  #[serde(default)]
  pub message: Option<String>,
}

/// Image stored by the upload proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
  pub secure_url: String,
  pub public_id: String,
  pub width: u32,
  pub height: u32,
  pub format: String,
  pub bytes: u64,
}

/// Per-item failure in a bulk update
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulkFailure {
  pub id: String,
  pub message: String,
}

/// Outcome of a bulk update as reported by the backend
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BulkUpdateResult {
  #[serde(default)]
  pub updated: u32,
  #[serde(default)]
  pub failed: Vec<BulkFailure>,
}
