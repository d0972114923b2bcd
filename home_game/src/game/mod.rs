//! The deterministic poker core: cards, evaluation, variants, and the
//! per-room hand state machine.

pub mod cards;
pub mod constants;
pub mod engine;
pub mod errors;
pub mod eval;
pub mod player;
pub mod pots;
pub mod rules;
mod showdown;
pub mod variant;
pub mod view;

pub use cards::{Card, Deck, Suit, Value};
pub use engine::{ActionOutcome, AppliedAction, HandEngine, PlayerAction, StraddleOutcome};
pub use errors::EngineError;
pub use eval::{HandRank, HandResult, evaluate, evaluate_omaha};
pub use player::{PlayerStatus, RoomPlayer, SeatIndex, UserId};
pub use pots::SidePot;
pub use rules::{Chips, CustomRules, RulesUpdate, Stakes};
pub use variant::{GameVariant, HandPhase, Variant, VariantRules};
pub use view::{
    GameStateView, PlayerView, RunItDecision, RunItPrompt, SevenDeuceBonus, StraddleEntry,
    StraddlePrompt, ValidActions, Winner,
};
