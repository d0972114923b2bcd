//! Snapshots, prompts, and hand outcomes.
//!
//! A `GameStateView` is the personalized state published to one recipient:
//! hole cards appear only for the viewer, except at a non-fold showdown
//! where every surviving hand is revealed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::cards::Card;
use super::eval::HandResult;
use super::player::{PlayerStatus, SeatIndex, UserId};
use super::pots::SidePot;
use super::rules::{Chips, CustomRules, Stakes};
use super::variant::{HandPhase, Variant};

/// One seat as seen by a recipient. `cards` is `None` for hidden hands and
/// `Some` for the viewer's own hand or a revealed one.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub user_id: UserId,
    pub display_name: String,
    pub seat: SeatIndex,
    pub chips: Chips,
    pub status: PlayerStatus,
    pub bet: Chips,
    pub total_bet_this_street: Chips,
    pub has_acted: bool,
    pub is_all_in: bool,
    pub is_folded: bool,
    pub bomb_pot_when_dealer: bool,
    pub straddle_next_hand: bool,
    pub cards: Option<Vec<Card>>,
}

/// A posted straddle.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StraddleEntry {
    pub player_id: UserId,
    pub amount: Chips,
    pub seat: SeatIndex,
}

/// The straddle decision currently waiting on a player.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StraddlePrompt {
    pub player_id: UserId,
    pub seat: SeatIndex,
    pub amount: Chips,
    pub timeout_secs: u64,
}

/// One eligible player's run-it selection.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunItDecision {
    pub choice: Option<u8>,
    pub confirmed: bool,
}

/// The run-it-multiple prompt: every all-in, non-folded seat picks how many
/// boards to run.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunItPrompt {
    pub eligible: Vec<UserId>,
    pub decisions: HashMap<UserId, RunItDecision>,
}

impl RunItPrompt {
    #[must_use]
    pub fn all_confirmed(&self) -> bool {
        self.eligible
            .iter()
            .all(|id| self.decisions.get(id).is_some_and(|d| d.confirmed))
    }

    /// True when at least one player confirmed and every confirmed player
    /// picked the same value.
    #[must_use]
    pub fn confirmed_unanimous(&self) -> bool {
        let mut confirmed = self
            .decisions
            .values()
            .filter(|d| d.confirmed)
            .filter_map(|d| d.choice);
        match confirmed.next() {
            None => false,
            Some(first) => confirmed.all(|c| c == first),
        }
    }

    /// The number of boards to run: the minimum across eligible players,
    /// where a player who never selected counts as one board.
    #[must_use]
    pub fn final_choice(&self) -> u8 {
        self.eligible
            .iter()
            .map(|id| {
                self.decisions
                    .get(id)
                    .and_then(|d| d.choice)
                    .unwrap_or(1)
            })
            .min()
            .unwrap_or(1)
    }
}

/// Which pot tier a payout came from.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PotKind {
    Main,
    Side,
}

/// One payout from the last completed hand.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub player_id: UserId,
    pub amount: Chips,
    pub hand_result: Option<HandResult>,
    pub pot_type: PotKind,
    /// Which side pot, counting from 1; `None` for the main pot.
    pub pot_index: Option<usize>,
    pub won_by_fold: bool,
    /// Which board won it during run-it-multiple or dual-board hands.
    pub board_index: Option<usize>,
}

/// One seat's 7-2 bonus payment.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusPayment {
    pub player_id: UserId,
    pub amount: Chips,
}

/// The 7-2 side bet result: every other dealt-in seat pays the winner.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SevenDeuceBonus {
    pub winner_id: UserId,
    pub total: Chips,
    pub payments: Vec<BonusPayment>,
}

/// The actions currently legal for the acting seat, with the amounts that
/// make them legal.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidActions {
    pub fold: bool,
    pub check: bool,
    /// Amount to call, when calling is legal.
    pub call: Option<Chips>,
    /// Minimum opening bet, when betting is legal.
    pub bet: Option<Chips>,
    /// Minimum raise-to total, when raising is legal.
    pub raise: Option<Chips>,
    /// Total the player would have in if they shoved.
    pub all_in: Chips,
}

/// Personalized snapshot of a room's hand state.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub phase: HandPhase,
    pub hand_number: u64,
    pub hand_id: String,
    pub seed_commitment: String,
    /// Revealed only once the hand completes.
    pub revealed_seed: Option<String>,
    pub variant: Variant,
    pub stakes: Stakes,
    pub rules: CustomRules,
    pub players: Vec<PlayerView>,
    pub community_cards: Vec<Card>,
    /// Boards beyond the first during dual-board or run-it hands.
    pub extra_boards: Vec<Vec<Card>>,
    pub ghost_cards: Vec<Card>,
    /// Collected pot plus all live street bets.
    pub pot: Chips,
    pub side_pots: Vec<SidePot>,
    pub current_bet: Chips,
    pub min_raise: Chips,
    pub dealer_seat: SeatIndex,
    pub current_player_seat: Option<SeatIndex>,
    pub is_bomb_pot: bool,
    pub is_dual_board: bool,
    pub straddles: Vec<StraddleEntry>,
    pub pending_straddle: Option<StraddlePrompt>,
    pub run_it_prompt: Option<RunItPrompt>,
    pub winners: Vec<Winner>,
    pub seven_deuce_bonus: Option<SevenDeuceBonus>,
}

impl super::engine::HandEngine {
    /// Build the snapshot published to one recipient. Hole cards are
    /// included for the viewer, for anyone who chose to show, and for every
    /// surviving hand once a non-fold showdown revealed them. Pass `None`
    /// for the spectator view.
    #[must_use]
    pub fn state(&self, viewer: Option<&UserId>) -> GameStateView {
        let players = self
            .players
            .iter()
            .map(|p| {
                let visible = viewer == Some(&p.user_id)
                    || self.revealed.contains(&p.user_id)
                    || (self.showdown_reveal && p.in_hand());
                PlayerView {
                    user_id: p.user_id.clone(),
                    display_name: p.display_name.clone(),
                    seat: p.seat,
                    chips: p.chips,
                    status: p.status,
                    bet: p.bet,
                    total_bet_this_street: p.total_bet_this_street,
                    has_acted: p.has_acted,
                    is_all_in: p.is_all_in,
                    is_folded: p.is_folded,
                    bomb_pot_when_dealer: p.bomb_pot_when_dealer,
                    straddle_next_hand: p.straddle_next_hand,
                    cards: if visible {
                        self.hole_cards.get(&p.user_id).cloned()
                    } else {
                        None
                    },
                }
            })
            .collect();

        GameStateView {
            phase: self.phase,
            hand_number: self.hand_number,
            hand_id: self.deck.hand_id().to_string(),
            seed_commitment: self.deck.seed_commitment(),
            revealed_seed: (self.phase == HandPhase::Complete)
                .then(|| self.deck.reveal_seed()),
            variant: self.variant,
            stakes: self.stakes,
            rules: self.rules.clone(),
            players,
            community_cards: self.boards[0].clone(),
            extra_boards: self.boards[1..].to_vec(),
            ghost_cards: self.ghost_cards.clone(),
            pot: self.pot_total(),
            side_pots: self.side_pots.clone(),
            current_bet: self.current_bet,
            min_raise: self.min_raise,
            dealer_seat: self.dealer_seat,
            current_player_seat: self.current_seat,
            is_bomb_pot: self.is_bomb_pot,
            is_dual_board: self.boards.len() > 1,
            straddles: self.straddles.clone(),
            pending_straddle: self.pending_straddle.clone(),
            run_it_prompt: self.run_it.clone(),
            winners: self.winners.clone(),
            seven_deuce_bonus: self.seven_deuce.clone(),
        }
    }
}
