//! Query identities and invalidation sets for backend resources.

use std::time::Duration;

use crate::cache::{FetchPolicy, QueryIdentity, QueryPattern};

// ============================================================================
// Resource names
// ============================================================================

pub const FEEDBACK_TITLE: &str = "feedbacktitle";
pub const USERS: &str = "users";
pub const PLAYERS: &str = "players";
pub const INJURY_BAN: &str = "injuryban";
pub const GAME_WEEK: &str = "gameweek";
pub const AUTO_JOIN: &str = "autojoin";

/// The auto-join monitor polls its status on this period.
pub const AUTO_JOIN_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

// ============================================================================
// Identities
// ============================================================================

pub fn feedback_titles() -> QueryIdentity {
  QueryIdentity::new(format!("{}.all", FEEDBACK_TITLE))
}

pub fn users() -> QueryIdentity {
  QueryIdentity::new(format!("{}.all", USERS))
}

pub fn roster_players() -> QueryIdentity {
  QueryIdentity::new(format!("{}.roster", PLAYERS))
}

pub fn game_weeks() -> QueryIdentity {
  QueryIdentity::new(format!("{}.all", GAME_WEEK))
}

pub fn auto_join_status(gameweek_id: &str) -> QueryIdentity {
  QueryIdentity::new(format!("{}.status", AUTO_JOIN)).with_param("gameweek", gameweek_id)
}

/// Policy for the auto-join monitor: the base policy plus a 30s refetch.
pub fn auto_join_policy(base: FetchPolicy) -> FetchPolicy {
  base.with_refetch_interval(AUTO_JOIN_REFETCH_INTERVAL)
}

// ============================================================================
// Invalidation sets declared by writes
// ============================================================================

pub fn after_feedback_title_write() -> Vec<QueryPattern> {
  vec![QueryPattern::prefix(FEEDBACK_TITLE)]
}

pub fn after_user_write() -> Vec<QueryPattern> {
  vec![QueryPattern::prefix(USERS)]
}

pub fn after_injury_ban_write() -> Vec<QueryPattern> {
  vec![QueryPattern::prefix(INJURY_BAN), QueryPattern::prefix(PLAYERS)]
}

pub fn after_auto_join_trigger() -> Vec<QueryPattern> {
  vec![QueryPattern::prefix(AUTO_JOIN), QueryPattern::prefix(GAME_WEEK)]
}
