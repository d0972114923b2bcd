//! Rooms: registry, orchestrator actor, and timers.

pub mod actor;
pub mod messages;
pub mod registry;
pub mod timers;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::player::UserId;
use crate::game::rules::{CustomRules, Stakes};
use crate::game::variant::Variant;

pub use actor::RoomActor;
pub use messages::RoomCommand;
pub use registry::{RoomHandle, RoomRegistry};

pub type RoomId = Uuid;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Closed,
}

/// Parameters for creating a room.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomOptions {
    pub name: String,
    pub variant: Variant,
    #[serde(default)]
    pub stakes: Stakes,
    #[serde(default = "default_max_players")]
    pub max_players: usize,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub custom_rules: CustomRules,
}

fn default_max_players() -> usize {
    9
}

impl RoomOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("room name must not be empty".to_string());
        }
        if !(2..=crate::game::constants::MAX_PLAYERS).contains(&self.max_players) {
            return Err(format!(
                "max players must be between 2 and {}",
                crate::game::constants::MAX_PLAYERS
            ));
        }
        self.stakes.validate()?;
        if self.is_private && self.password.as_deref().is_some_and(str::is_empty) {
            return Err("private room password must not be empty".to_string());
        }
        Ok(())
    }
}

/// Public room snapshot.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: RoomId,
    pub code: String,
    pub name: String,
    pub variant: Variant,
    pub stakes: Stakes,
    pub max_players: usize,
    pub is_private: bool,
    pub host_id: UserId,
    pub status: RoomStatus,
    pub custom_rules: CustomRules,
    pub player_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> RoomOptions {
        RoomOptions {
            name: "friday night".to_string(),
            variant: Variant::TexasHoldem,
            stakes: Stakes::default(),
            max_players: 9,
            is_private: false,
            password: None,
            custom_rules: CustomRules::default(),
        }
    }

    #[test]
    fn default_options_validate() {
        assert!(options().validate().is_ok());
    }

    #[test]
    fn empty_name_rejected() {
        let mut opts = options();
        opts.name = "  ".to_string();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn max_players_bounds() {
        let mut opts = options();
        opts.max_players = 1;
        assert!(opts.validate().is_err());
        opts.max_players = 11;
        assert!(opts.validate().is_err());
        opts.max_players = 2;
        assert!(opts.validate().is_ok());
    }
}
