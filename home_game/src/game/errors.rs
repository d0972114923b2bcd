//! Engine error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::player::SeatIndex;

/// Typed rejections from the hand engine. Every variant maps onto one of
/// the wire error codes; none of them mutate state.
#[derive(Clone, Debug, Deserialize, Eq, Error, PartialEq, Serialize)]
pub enum EngineError {
    #[error("not your turn")]
    OutOfTurn,
    #[error("invalid action")]
    InvalidAction,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("need 2+ players with chips")]
    NotEnoughPlayers,
    #[error("seat {0} is taken")]
    SeatTaken(SeatIndex),
    #[error("seat {0} does not exist")]
    NoSuchSeat(SeatIndex),
    #[error("already seated")]
    AlreadySeated,
    #[error("not seated")]
    NotSeated,
    #[error("hand in progress")]
    HandInProgress,
    #[error("player still has chips")]
    HasChips,
    #[error("no straddle is pending")]
    NoStraddlePending,
    #[error("straddle failed")]
    StraddleFailed,
    #[error("no run-it prompt is open")]
    NoRunItPrompt,
    #[error("not part of this prompt")]
    NotInPrompt,
    #[error("invalid run-it choice")]
    InvalidChoice,
    #[error("cannot confirm without selecting")]
    CannotConfirm,
    #[error("no cards to show")]
    NoCards,
    #[error("variant switch failed")]
    SwitchFailed,
    #[error("invalid stakes: {0}")]
    InvalidStakes(String),
    #[error("deck exhausted mid-hand")]
    DeckExhausted,
    #[error("chip conservation violated")]
    ChipConservation,
}
