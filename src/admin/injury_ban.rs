//! Rules for the injury/ban creation form.

use crate::api::types::{InjuryBanKind, NewInjuryBan, Player};
use crate::cache::{CacheEntry, FetchStatus};
use crate::error::{ClientError, Result};

/// Whether the "Add Injury/Ban" action can be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateAvailability {
  Enabled,
  Disabled { reason: String },
}

impl CreateAvailability {
  pub fn is_enabled(&self) -> bool {
    matches!(self, CreateAvailability::Enabled)
  }

  fn disabled(reason: impl Into<String>) -> Self {
    CreateAvailability::Disabled {
      reason: reason.into(),
    }
  }
}

/// An injury or ban can only be created against a loaded roster player.
pub fn create_availability(roster: &CacheEntry<Vec<Player>>) -> CreateAvailability {
  match (roster.fetch_status, roster.data()) {
    (FetchStatus::Error, _) => {
      let reason = roster
        .error
        .as_ref()
        .map(|e| e.message.as_str())
        .unwrap_or("unknown error");
      CreateAvailability::disabled(format!("Could not load roster players: {}", reason))
    }
    (_, Some(players)) if !players.is_empty() => CreateAvailability::Enabled,
    (FetchStatus::Idle | FetchStatus::Loading, _) => {
      CreateAvailability::disabled("Loading roster players...")
    }
    (FetchStatus::Success, _) => CreateAvailability::disabled(
      "No roster players available. Add players to the roster before recording an injury or ban.",
    ),
  }
}

/// Validate a new injury/ban against the roster.
pub fn new_injury_ban(
  roster: &[Player],
  player_id: &str,
  kind: InjuryBanKind,
  description: &str,
  expected_return: Option<String>,
) -> Result<NewInjuryBan> {
  if !roster.iter().any(|p| p.id == player_id) {
    return Err(ClientError::validation(format!(
      "Player {} is not on the active roster",
      player_id
    )));
  }
  let description = description.trim();
  if description.is_empty() {
    return Err(ClientError::validation("Description is required"));
  }
  Ok(NewInjuryBan {
    player: player_id.to_string(),
    kind,
    description: description.to_string(),
    expected_return,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{FetchPolicy, QueryIdentity};
  use crate::error::{ErrorInfo, ErrorKind};
  use std::sync::Arc;

  fn roster_entry(status: FetchStatus, players: Option<Vec<Player>>) -> CacheEntry<Vec<Player>> {
    let mut entry = CacheEntry::idle(QueryIdentity::new("players.roster"), &FetchPolicy::default());
    entry.fetch_status = status;
    entry.data = players.map(Arc::new);
    entry
  }

  fn player(id: &str) -> Player {
    Player {
      id: id.into(),
      name: "Bukayo".into(),
      team: Some("ARS".into()),
      position: Some("MID".into()),
      price: Some(9.5),
    }
  }

  #[test]
  fn test_disabled_without_roster() {
    assert!(!create_availability(&roster_entry(FetchStatus::Idle, None)).is_enabled());
    assert!(!create_availability(&roster_entry(FetchStatus::Loading, None)).is_enabled());

    let empty = create_availability(&roster_entry(FetchStatus::Success, Some(vec![])));
    assert!(matches!(
      empty,
      CreateAvailability::Disabled { ref reason } if reason.starts_with("No roster players available")
    ));
  }

  #[test]
  fn test_enabled_with_roster_even_while_refetching() {
    let loaded = roster_entry(FetchStatus::Success, Some(vec![player("p1")]));
    assert!(create_availability(&loaded).is_enabled());

    let refreshing = roster_entry(FetchStatus::Loading, Some(vec![player("p1")]));
    assert!(create_availability(&refreshing).is_enabled());
  }

  #[test]
  fn test_load_failure_has_specific_message() {
    let mut entry = roster_entry(FetchStatus::Error, None);
    entry.error = Some(ErrorInfo::new(ErrorKind::Transport, "network error"));

    assert_eq!(
      create_availability(&entry),
      CreateAvailability::Disabled {
        reason: "Could not load roster players: network error".into()
      }
    );
  }

  #[test]
  fn test_new_injury_ban_requires_roster_player() {
    let roster = vec![player("p1")];
    assert!(new_injury_ban(&roster, "p2", InjuryBanKind::Ban, "Red card", None).is_err());
    assert!(new_injury_ban(&roster, "p1", InjuryBanKind::Injury, "  ", None).is_err());

    let ok = new_injury_ban(
      &roster,
      "p1",
      InjuryBanKind::Injury,
      " Hamstring ",
      Some("2024-10-01".into()),
    )
    .unwrap();
    assert_eq!(ok.description, "Hamstring");
  }
}
