//! Game-wide constants.

/// Maximum number of seats at a single table.
pub const MAX_PLAYERS: usize = 10;

/// Minimum number of active seats required to start a hand.
pub const MIN_PLAYERS: usize = 2;

/// Cards in one standard deck.
pub const DECK_SIZE: usize = 52;

/// Alphabet for room invite codes. Excludes I, O, 0, and 1 since they are
/// easy to confuse when read aloud or typed from a phone screen.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a room invite code.
pub const CODE_LENGTH: usize = 6;

/// Seconds a player has to answer a straddle prompt.
pub const STRADDLE_TIMEOUT_SECS: u64 = 5;

/// Seconds the run-it-twice prompt stays open.
pub const RUN_IT_TIMEOUT_SECS: u64 = 5;

/// Seconds busted players have to answer a rebuy prompt.
pub const REBUY_TIMEOUT_SECS: u64 = 60;

/// Base delay between the end of one hand and the start of the next.
pub const NEXT_HAND_BASE_DELAY_MS: u64 = 5_000;

/// Extra next-hand delay when the final street was a runout, keyed by the
/// phase the runout began at. The client animates the remaining board
/// card-by-card and the server must not start dealing over it.
pub const RUNOUT_DELAY_PREFLOP_MS: u64 = 9_000;
pub const RUNOUT_DELAY_FLOP_MS: u64 = 8_500;
pub const RUNOUT_DELAY_TURN_MS: u64 = 6_500;
