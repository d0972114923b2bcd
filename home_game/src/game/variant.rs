//! Game variants and the hand phase ladder.
//!
//! The engine is generic over a hold'em-family dealing strategy: how many
//! hole cards each seat gets, how many cards each street puts on the board,
//! and how a player's best hand is computed at showdown. Draw, stud, and
//! blackjack variants exist on the wire so clients can offer them, but only
//! the hold'em family is playable.

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::cards::Card;
use super::eval::{self, HandResult};

/// Phases of a single hand, forward-only.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandPhase {
    Waiting,
    Starting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Complete,
}

impl HandPhase {
    /// The phase that follows `self` within a hand.
    #[must_use]
    pub fn next(self) -> Self {
        match self {
            Self::Waiting => Self::Starting,
            Self::Starting => Self::Preflop,
            Self::Preflop => Self::Flop,
            Self::Flop => Self::Turn,
            Self::Turn => Self::River,
            Self::River => Self::Showdown,
            Self::Showdown | Self::Complete => Self::Complete,
        }
    }

    /// Number of cards this phase puts on each board.
    #[must_use]
    pub fn street_cards(self) -> usize {
        match self {
            Self::Flop => 3,
            Self::Turn | Self::River => 1,
            _ => 0,
        }
    }

    #[must_use]
    pub fn is_betting_street(self) -> bool {
        matches!(self, Self::Preflop | Self::Flop | Self::Turn | Self::River)
    }
}

impl fmt::Display for HandPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Starting => "starting",
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
            Self::Complete => "complete",
        };
        write!(f, "{repr}")
    }
}

/// Wire-visible variant names. Only the hold'em family has an engine
/// strategy behind it; the rest fail `room:switch-variant`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    TexasHoldem,
    Omaha,
    FiveCardDraw,
    SevenCardStud,
    Blackjack,
}

impl Variant {
    /// The dealing strategy for this variant, if it is playable.
    #[must_use]
    pub fn strategy(self) -> Option<GameVariant> {
        match self {
            Self::TexasHoldem => Some(TexasHoldem.into()),
            Self::Omaha => Some(Omaha.into()),
            Self::FiveCardDraw | Self::SevenCardStud | Self::Blackjack => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::TexasHoldem => "texas-holdem",
            Self::Omaha => "omaha",
            Self::FiveCardDraw => "five-card-draw",
            Self::SevenCardStud => "seven-card-stud",
            Self::Blackjack => "blackjack",
        };
        write!(f, "{repr}")
    }
}

/// Behavior that differs between playable variants.
#[enum_dispatch]
pub trait VariantRules {
    /// Hole cards dealt to every seat.
    fn hole_card_count(&self) -> usize;

    /// Best hand for `hole` against `board` at showdown.
    fn evaluate_hand(&self, hole: &[Card], board: &[Card]) -> HandResult;

    fn variant(&self) -> Variant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TexasHoldem;

impl VariantRules for TexasHoldem {
    fn hole_card_count(&self) -> usize {
        2
    }

    fn evaluate_hand(&self, hole: &[Card], board: &[Card]) -> HandResult {
        let mut cards = Vec::with_capacity(hole.len() + board.len());
        cards.extend_from_slice(hole);
        cards.extend_from_slice(board);
        eval::evaluate(&cards)
    }

    fn variant(&self) -> Variant {
        Variant::TexasHoldem
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Omaha;

impl VariantRules for Omaha {
    fn hole_card_count(&self) -> usize {
        4
    }

    fn evaluate_hand(&self, hole: &[Card], board: &[Card]) -> HandResult {
        eval::evaluate_omaha(hole, board)
    }

    fn variant(&self) -> Variant {
        Variant::Omaha
    }
}

/// Polymorphic dealing strategy, dispatched without boxing.
#[enum_dispatch(VariantRules)]
#[derive(Clone, Copy, Debug)]
pub enum GameVariant {
    TexasHoldem,
    Omaha,
}

impl Default for GameVariant {
    fn default() -> Self {
        TexasHoldem.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::Suit;

    #[test]
    fn phase_ladder_is_forward_only() {
        let mut phase = HandPhase::Waiting;
        let expected = [
            HandPhase::Starting,
            HandPhase::Preflop,
            HandPhase::Flop,
            HandPhase::Turn,
            HandPhase::River,
            HandPhase::Showdown,
            HandPhase::Complete,
            HandPhase::Complete,
        ];
        for want in expected {
            phase = phase.next();
            assert_eq!(phase, want);
        }
    }

    #[test]
    fn street_card_counts() {
        assert_eq!(HandPhase::Flop.street_cards(), 3);
        assert_eq!(HandPhase::Turn.street_cards(), 1);
        assert_eq!(HandPhase::River.street_cards(), 1);
        assert_eq!(HandPhase::Preflop.street_cards(), 0);
    }

    #[test]
    fn holdem_deals_two_omaha_four() {
        assert_eq!(GameVariant::from(TexasHoldem).hole_card_count(), 2);
        assert_eq!(GameVariant::from(Omaha).hole_card_count(), 4);
    }

    #[test]
    fn unplayable_variants_have_no_strategy() {
        assert!(Variant::TexasHoldem.strategy().is_some());
        assert!(Variant::Omaha.strategy().is_some());
        assert!(Variant::Blackjack.strategy().is_none());
        assert!(Variant::FiveCardDraw.strategy().is_none());
        assert!(Variant::SevenCardStud.strategy().is_none());
    }

    #[test]
    fn holdem_can_play_the_board() {
        let strategy = GameVariant::from(TexasHoldem);
        let hole = [Card(2, Suit::Club), Card(3, Suit::Diamond)];
        let board = [
            Card(14, Suit::Spade),
            Card(14, Suit::Heart),
            Card(14, Suit::Club),
            Card(14, Suit::Diamond),
            Card(13, Suit::Spade),
        ];
        let result = strategy.evaluate_hand(&hole, &board);
        assert_eq!(result.rank, crate::game::eval::HandRank::FourOfAKind);
    }
}
