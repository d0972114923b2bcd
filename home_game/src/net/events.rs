//! Client and server events.
//!
//! Every message is an internally tagged JSON object whose `type` field is
//! the event name (`room:join`, `game:action`, ...). The enums here are the
//! single source of truth for the protocol; the server crate only
//! serializes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::game::engine::{AppliedAction, PlayerAction};
use crate::game::errors::EngineError;
use crate::game::player::{SeatIndex, UserId};
use crate::game::rules::{Chips, CustomRules, RulesUpdate, Stakes};
use crate::game::variant::Variant;
use crate::game::view::{
    GameStateView, PlayerView, RunItPrompt, SevenDeuceBonus, Winner,
};
use crate::game::cards::Card;
use crate::room::RoomInfo;

/// Events a client may send.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    #[serde(rename = "room:join")]
    RoomJoin {
        code: String,
        #[serde(default)]
        password: Option<String>,
    },
    #[serde(rename = "room:leave")]
    RoomLeave,
    #[serde(rename = "room:sit")]
    RoomSit { seat: SeatIndex, buy_in: Chips },
    #[serde(rename = "room:stand")]
    RoomStand,
    #[serde(rename = "room:sit-out")]
    RoomSitOut { sitting_out: bool },
    #[serde(rename = "room:rebuy")]
    RoomRebuy { amount: Chips },
    #[serde(rename = "room:decline-rebuy")]
    RoomDeclineRebuy,
    #[serde(rename = "room:chat")]
    RoomChat { text: String },
    #[serde(rename = "room:update-rules")]
    RoomUpdateRules { rules: RulesUpdate },
    #[serde(rename = "room:update-settings")]
    RoomUpdateSettings {
        #[serde(default)]
        stakes: Option<Stakes>,
        #[serde(default)]
        max_players: Option<usize>,
        #[serde(default)]
        custom_rules: Option<RulesUpdate>,
    },
    #[serde(rename = "room:switch-variant")]
    RoomSwitchVariant { variant: Variant },
    #[serde(rename = "game:start")]
    GameStart,
    #[serde(rename = "game:action")]
    GameAction {
        action: PlayerAction,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    #[serde(rename = "game:straddle")]
    GameStraddle { accept: bool },
    #[serde(rename = "game:show-hand")]
    GameShowHand,
    #[serde(rename = "game:run-it-select")]
    GameRunItSelect { choice: u8 },
    #[serde(rename = "game:run-it-confirm")]
    GameRunItConfirm,
    #[serde(rename = "game:choose-variant")]
    GameChooseVariant { variant: Variant },
    #[serde(rename = "player:set-bomb-pot-preference")]
    SetBombPotPreference { enabled: bool },
    #[serde(rename = "player:set-straddle-preference")]
    SetStraddlePreference { enabled: bool },
}

/// A relayed chat line.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user_id: UserId,
    pub username: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// One listed seat's standing in the rebuy barrier.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebuyDecision {
    Pending,
    Rebuy,
    Decline,
}

/// The rebuy barrier shown between hands when `wait_for_all_rebuys` is on.
/// `timeout_at` is wall-clock so clients can render a countdown.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuyPrompt {
    pub player_ids: Vec<UserId>,
    pub decisions: HashMap<UserId, RebuyDecision>,
    pub timeout_at: DateTime<Utc>,
}

/// Events the server publishes.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "room:joined")]
    RoomJoined {
        room: RoomInfo,
        user_id: UserId,
        username: String,
    },
    #[serde(rename = "room:player-joined")]
    RoomPlayerJoined { player: PlayerView },
    #[serde(rename = "room:player-left")]
    RoomPlayerLeft { player_id: UserId },
    #[serde(rename = "room:player-rebuy")]
    RoomPlayerRebuy { player_id: UserId, amount: Chips },
    #[serde(rename = "room:rebuy-prompt")]
    RoomRebuyPrompt { prompt: Option<RebuyPrompt> },
    #[serde(rename = "room:settings-updated")]
    RoomSettingsUpdated { room: RoomInfo },
    #[serde(rename = "room:rules-updated")]
    RoomRulesUpdated { rules: CustomRules },
    #[serde(rename = "room:chat")]
    RoomChat { message: ChatMessage },
    #[serde(rename = "game:state")]
    GameState { state: GameStateView },
    #[serde(rename = "game:action")]
    GameAction { action: AppliedAction },
    #[serde(rename = "game:winner")]
    GameWinner { winners: Vec<Winner> },
    #[serde(rename = "game:timer")]
    GameTimer {
        time_remaining: u64,
        #[serde(default)]
        player_id: Option<UserId>,
    },
    #[serde(rename = "game:timer-warning")]
    GameTimerWarning { player_id: UserId, extra_time: u64 },
    #[serde(rename = "game:auto-fold")]
    GameAutoFold { player_id: UserId },
    #[serde(rename = "game:hand-shown")]
    GameHandShown { player_id: UserId, cards: Vec<Card> },
    #[serde(rename = "game:seven-deuce-bonus")]
    GameSevenDeuceBonus { bonus: SevenDeuceBonus },
    #[serde(rename = "game:run-it-prompt")]
    GameRunItPrompt { prompt: RunItPrompt },
    #[serde(rename = "game:run-it-decision")]
    GameRunItDecision {
        player_id: UserId,
        choice: Option<u8>,
        confirmed: bool,
    },
    #[serde(rename = "game:run-it-result")]
    GameRunItResult {
        boards: Vec<Vec<Card>>,
        final_choice: u8,
    },
    #[serde(rename = "game:straddle-placed")]
    GameStraddlePlaced {
        player_id: UserId,
        amount: Chips,
        seat: SeatIndex,
    },
    #[serde(rename = "game:straddle-declined")]
    GameStraddleDeclined { seat: SeatIndex },
    #[serde(rename = "game:variant-changed")]
    GameVariantChanged { variant: Variant },
    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

impl ServerEvent {
    #[must_use]
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

/// Wire error codes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotInRoom,
    RoomNotFound,
    NotSeated,
    AlreadySeated,
    JoinFailed,
    InvalidAction,
    InvalidAmount,
    HasChips,
    NoRebuyPrompt,
    NotInPrompt,
    Unauthorized,
    StraddleFailed,
    InvalidChoice,
    CannotConfirm,
    NoCards,
    NotDealer,
    NotEnoughPlayers,
    SwitchFailed,
}

impl From<&EngineError> for ErrorCode {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::OutOfTurn | EngineError::InvalidAction => Self::InvalidAction,
            EngineError::InvalidAmount | EngineError::InvalidStakes(_) => Self::InvalidAmount,
            EngineError::NotEnoughPlayers => Self::NotEnoughPlayers,
            EngineError::SeatTaken(_) | EngineError::NoSuchSeat(_) | EngineError::HandInProgress => {
                Self::JoinFailed
            }
            EngineError::AlreadySeated => Self::AlreadySeated,
            EngineError::NotSeated => Self::NotSeated,
            EngineError::HasChips => Self::HasChips,
            EngineError::NoStraddlePending | EngineError::StraddleFailed => Self::StraddleFailed,
            EngineError::NoRunItPrompt | EngineError::NotInPrompt => Self::NotInPrompt,
            EngineError::InvalidChoice => Self::InvalidChoice,
            EngineError::CannotConfirm => Self::CannotConfirm,
            EngineError::NoCards => Self::NoCards,
            EngineError::SwitchFailed => Self::SwitchFailed,
            EngineError::DeckExhausted | EngineError::ChipConservation => Self::InvalidAction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_use_wire_names() {
        let event = ClientEvent::RoomSit {
            seat: 3,
            buy_in: 500,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "room:sit");
        assert_eq!(json["seat"], 3);
        assert_eq!(json["buyIn"], 500);
    }

    #[test]
    fn game_action_nests_the_action_object() {
        let json = serde_json::json!({
            "type": "game:action",
            "action": { "type": "raise", "amount": 60 },
            "timestamp": 1_700_000_000
        });
        let event: ClientEvent = serde_json::from_value(json).unwrap();
        match event {
            ClientEvent::GameAction { action, timestamp } => {
                assert_eq!(action, PlayerAction::Raise { amount: 60 });
                assert_eq!(timestamp, Some(1_700_000_000));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn all_in_action_is_kebab_cased() {
        let json = serde_json::to_value(PlayerAction::AllIn).unwrap();
        assert_eq!(json["type"], "all-in");
    }

    #[test]
    fn error_codes_are_screaming_snake() {
        let json = serde_json::to_value(ErrorCode::NotEnoughPlayers).unwrap();
        assert_eq!(json, "NOT_ENOUGH_PLAYERS");
        let json = serde_json::to_value(ErrorCode::NoRebuyPrompt).unwrap();
        assert_eq!(json, "NO_REBUY_PROMPT");
    }

    #[test]
    fn server_timer_event_shape() {
        let event = ServerEvent::GameTimer {
            time_remaining: 10,
            player_id: Some("anon_abcdefgh".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "game:timer");
        assert_eq!(json["timeRemaining"], 10);
        assert_eq!(json["playerId"], "anon_abcdefgh");
    }

    #[test]
    fn engine_errors_map_to_wire_codes() {
        assert_eq!(
            ErrorCode::from(&EngineError::NotEnoughPlayers),
            ErrorCode::NotEnoughPlayers
        );
        assert_eq!(ErrorCode::from(&EngineError::HasChips), ErrorCode::HasChips);
        assert_eq!(
            ErrorCode::from(&EngineError::SwitchFailed),
            ErrorCode::SwitchFailed
        );
    }
}
