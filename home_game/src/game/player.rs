//! Seated players.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::rules::Chips;

/// Persistent user id. Anonymous users present a stable client-generated
/// id with an `anon_` prefix that survives reconnects.
pub type UserId = String;

/// Seat position at the table.
pub type SeatIndex = usize;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlayerStatus {
    Active,
    SittingOut,
    Away,
    Disconnected,
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Active => "active",
            Self::SittingOut => "sitting-out",
            Self::Away => "away",
            Self::Disconnected => "disconnected",
        };
        write!(f, "{repr}")
    }
}

/// A player occupying a seat. The betting fields are per-street scratch
/// state the engine resets between streets and hands; the preference flags
/// persist until the owner toggles them.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayer {
    pub user_id: UserId,
    pub display_name: String,
    pub seat: SeatIndex,
    pub chips: Chips,
    pub status: PlayerStatus,

    /// Amount added by this player's most recent wager on this street.
    pub bet: Chips,
    /// Total contribution this street; the engine compares this against
    /// the current bet to find the amount to call.
    pub total_bet_this_street: Chips,
    pub has_acted: bool,
    pub is_all_in: bool,
    pub is_folded: bool,

    /// Request the next hand this player deals be a bomb pot.
    pub bomb_pot_when_dealer: bool,
    /// Auto-accept the first straddle when under the gun.
    pub straddle_next_hand: bool,

    /// Stood up mid-hand; removed once the hand completes.
    #[serde(skip)]
    pub pending_removal: bool,
    /// Dealt into the current hand (used for the 7-2 bonus collection).
    #[serde(skip)]
    pub dealt_in: bool,
}

impl RoomPlayer {
    #[must_use]
    pub fn new(user_id: UserId, display_name: String, seat: SeatIndex, buy_in: Chips) -> Self {
        Self {
            user_id,
            display_name,
            seat,
            chips: buy_in,
            status: PlayerStatus::Active,
            bet: 0,
            total_bet_this_street: 0,
            has_acted: false,
            is_all_in: false,
            is_folded: false,
            bomb_pot_when_dealer: false,
            straddle_next_hand: false,
            pending_removal: false,
            dealt_in: false,
        }
    }

    /// Clear per-hand scratch state. Preference flags survive.
    pub fn reset_for_hand(&mut self) {
        self.bet = 0;
        self.total_bet_this_street = 0;
        self.has_acted = false;
        self.is_all_in = false;
        self.is_folded = false;
        self.dealt_in = false;
    }

    pub fn reset_for_street(&mut self) {
        self.bet = 0;
        self.total_bet_this_street = 0;
        if !self.is_all_in && !self.is_folded {
            self.has_acted = false;
        }
    }

    /// Eligible to be dealt into a new hand.
    #[must_use]
    pub fn can_play(&self) -> bool {
        self.status == PlayerStatus::Active && self.chips > 0 && !self.pending_removal
    }

    /// Still contesting the current hand and able to act.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.dealt_in && !self.is_folded && !self.is_all_in
    }

    /// Still contesting the current hand (possibly all-in).
    #[must_use]
    pub fn in_hand(&self) -> bool {
        self.dealt_in && !self.is_folded
    }

    /// Move chips from the stack into the current street's bet, capped at
    /// the stack. Marks the player all-in when the stack empties.
    pub fn commit(&mut self, amount: Chips) -> Chips {
        let paid = amount.min(self.chips);
        self.chips -= paid;
        self.bet = paid;
        self.total_bet_this_street += paid;
        if self.chips == 0 && paid > 0 {
            self.is_all_in = true;
        }
        paid
    }
}
