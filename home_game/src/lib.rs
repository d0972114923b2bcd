//! # Home Game
//!
//! A real-time, multi-room hold'em engine and orchestrator.
//!
//! Each room is an independent actor owning one hand lifecycle: shuffling,
//! dealing, betting-round progression, side-pot construction, showdown
//! payout, and the house-rule extras a home game runs on (straddle chains,
//! bomb pots, run-it-twice, the 7-2 bounty). The engine itself is a pure,
//! synchronous state machine; the room actor drives it with timers and
//! fans personalized state out to connected clients.
//!
//! ## Architecture
//!
//! - [`game`]: the deterministic core. `HandEngine` owns one room's hand
//!   state and exposes pure transition methods; `Deck` commits to its
//!   shuffle seed; the evaluator ranks 5-7 card hands behind the variant
//!   strategy.
//! - [`room`]: `RoomRegistry` maps room ids, invite codes, and users to
//!   room actors; `RoomActor` serializes all work on one room and owns its
//!   turn, straddle, run-it, rebuy, and next-hand timers.
//! - [`net`]: the JSON wire protocol, the session directory mapping user
//!   ids to live transports, and the personalized fan-out.
//!
//! ## Example
//!
//! ```
//! use home_game::game::{HandEngine, PlayerAction};
//! use home_game::game::rules::{CustomRules, Stakes};
//! use home_game::game::variant::Variant;
//!
//! let mut engine = HandEngine::new(
//!     Variant::TexasHoldem,
//!     Stakes::default(),
//!     CustomRules::default(),
//!     9,
//! )
//! .unwrap();
//! engine.add_player("anon_alice123".into(), "alice".into(), 0, 1000).unwrap();
//! engine.add_player("anon_bob45678".into(), "bob".into(), 1, 1000).unwrap();
//! engine.start_hand(None, false).unwrap();
//! let actor = engine.current_actor().unwrap().user_id.clone();
//! engine.process_action(&actor, PlayerAction::Fold).unwrap();
//! ```

pub mod game;
pub mod net;
pub mod room;

pub use game::{
    Chips, CustomRules, EngineError, HandEngine, HandPhase, PlayerAction, Stakes, UserId, Variant,
};
pub use net::{Broadcaster, ClientEvent, ErrorCode, ServerEvent, SessionDirectory};
pub use room::{RoomActor, RoomId, RoomInfo, RoomOptions, RoomRegistry, RoomStatus};
