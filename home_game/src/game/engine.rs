//! The per-room hand state machine.
//!
//! One `HandEngine` owns a single room's current hand: phase, pot,
//! per-seat betting state, the straddle chain, the run-it prompt, bomb-pot
//! and dual-board bookkeeping, and the winners of the last completed hand.
//! Every method is synchronous and pure with respect to I/O; timers and
//! fan-out live in the room actor, which drives this engine and publishes
//! its transitions.

use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use super::cards::{Card, Deck};
use super::constants::STRADDLE_TIMEOUT_SECS;
use super::errors::EngineError;
use super::player::{PlayerStatus, RoomPlayer, SeatIndex, UserId};
use super::pots::SidePot;
use super::rules::{Chips, CustomRules, RulesUpdate, Stakes};
use super::variant::{GameVariant, HandPhase, Variant, VariantRules};
use super::view::{StraddleEntry, StraddlePrompt, Winner};

/// A betting action as submitted by a client. `Raise` carries the target
/// total for the street ("raise to"), not the increment.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PlayerAction {
    Fold,
    Check,
    Call,
    Bet { amount: Chips },
    Raise { amount: Chips },
    AllIn,
}

/// An action after validation, with the chips it actually moved.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedAction {
    pub player_id: UserId,
    pub action: PlayerAction,
    /// Chips moved from the stack by this action.
    pub amount: Chips,
}

/// What `process_action` did, so the orchestrator knows what to schedule.
#[derive(Clone, Debug)]
pub struct ActionOutcome {
    pub applied: AppliedAction,
    pub round_complete: bool,
    pub street_advanced: bool,
    pub hand_complete: bool,
    /// A run-it prompt should be opened before the board runs out.
    pub run_it_pending: bool,
    pub next_actor: Option<SeatIndex>,
}

/// What removing a player did.
#[derive(Clone, Debug)]
pub struct RemovalOutcome {
    pub removed_now: bool,
    /// Settlement triggered by folding the seat out mid-hand.
    pub fold_outcome: Option<ActionOutcome>,
}

/// What processing a straddle decision did.
#[derive(Clone, Debug)]
pub struct StraddleOutcome {
    pub accepted: bool,
    pub seat: SeatIndex,
    pub entry: Option<StraddleEntry>,
    pub chain_complete: bool,
}

pub struct HandEngine {
    pub(crate) variant: Variant,
    pub(crate) strategy: GameVariant,
    pub(crate) stakes: Stakes,
    pub(crate) rules: CustomRules,
    staged_stakes: Option<Stakes>,
    staged_rules: Option<CustomRules>,
    max_players: usize,

    /// Seated players, kept sorted by seat.
    pub(crate) players: Vec<RoomPlayer>,
    pub(crate) phase: HandPhase,
    pub(crate) deck: Deck,
    /// All boards; `boards[0]` is the primary community board.
    pub(crate) boards: Vec<Vec<Card>>,
    pub(crate) ghost_cards: Vec<Card>,
    pub(crate) hole_cards: HashMap<UserId, Vec<Card>>,
    pub(crate) revealed: HashSet<UserId>,
    /// Per-player chips collected into the pot this hand.
    pub(crate) contributions: HashMap<UserId, Chips>,
    pub(crate) pot: Chips,
    pub(crate) side_pots: Vec<SidePot>,
    pub(crate) current_bet: Chips,
    pub(crate) min_raise: Chips,
    pub(crate) dealer_seat: SeatIndex,
    small_blind_seat: Option<SeatIndex>,
    big_blind_seat: Option<SeatIndex>,
    pub(crate) current_seat: Option<SeatIndex>,
    pub(crate) hand_number: u64,
    pub(crate) is_bomb_pot: bool,

    pub(crate) straddles: Vec<StraddleEntry>,
    straddle_queue: VecDeque<SeatIndex>,
    pub(crate) pending_straddle: Option<StraddlePrompt>,

    pub(crate) run_it: Option<super::view::RunItPrompt>,
    run_it_pending: bool,
    pub(crate) runout_from: Option<HandPhase>,

    pub(crate) winners: Vec<Winner>,
    pub(crate) seven_deuce: Option<super::view::SevenDeuceBonus>,
    pub(crate) showdown_reveal: bool,

    /// Chip-conservation baseline: stacks + street bets + pot must always
    /// sum to this between `start_hand` and resolution.
    expected_total: Chips,
}

impl HandEngine {
    pub fn new(
        variant: Variant,
        stakes: Stakes,
        rules: CustomRules,
        max_players: usize,
    ) -> Result<Self, EngineError> {
        stakes
            .validate()
            .map_err(EngineError::InvalidStakes)?;
        let strategy = variant.strategy().ok_or(EngineError::SwitchFailed)?;
        Ok(Self {
            variant,
            strategy,
            stakes,
            rules,
            staged_stakes: None,
            staged_rules: None,
            max_players,
            players: Vec::new(),
            phase: HandPhase::Waiting,
            deck: Deck::new_shuffled(),
            boards: vec![Vec::new()],
            ghost_cards: Vec::new(),
            hole_cards: HashMap::new(),
            revealed: HashSet::new(),
            contributions: HashMap::new(),
            pot: 0,
            side_pots: Vec::new(),
            current_bet: 0,
            min_raise: 0,
            dealer_seat: 0,
            small_blind_seat: None,
            big_blind_seat: None,
            current_seat: None,
            hand_number: 0,
            is_bomb_pot: false,
            straddles: Vec::new(),
            straddle_queue: VecDeque::new(),
            pending_straddle: None,
            run_it: None,
            run_it_pending: false,
            runout_from: None,
            winners: Vec::new(),
            seven_deuce: None,
            showdown_reveal: false,
            expected_total: 0,
        })
    }

    // === Roster ===========================================================

    /// Seat a player. Only legal between hands.
    pub fn add_player(
        &mut self,
        user_id: UserId,
        display_name: String,
        seat: SeatIndex,
        buy_in: Chips,
    ) -> Result<(), EngineError> {
        if self.is_hand_active() {
            return Err(EngineError::HandInProgress);
        }
        if seat >= self.max_players {
            return Err(EngineError::NoSuchSeat(seat));
        }
        if self.players.iter().any(|p| p.seat == seat) {
            return Err(EngineError::SeatTaken(seat));
        }
        if self.players.iter().any(|p| p.user_id == user_id) {
            return Err(EngineError::AlreadySeated);
        }
        let player = RoomPlayer::new(user_id, display_name, seat, buy_in);
        let idx = self
            .players
            .iter()
            .position(|p| p.seat > seat)
            .unwrap_or(self.players.len());
        self.players.insert(idx, player);
        self.expected_total += buy_in;
        Ok(())
    }

    /// Remove a player. Between hands the seat frees immediately; during a
    /// hand the player is folded out and removed once the hand completes.
    pub fn remove_player(&mut self, user_id: &UserId) -> Result<RemovalOutcome, EngineError> {
        let idx = self
            .players
            .iter()
            .position(|p| &p.user_id == user_id)
            .ok_or(EngineError::NotSeated)?;
        if self.is_hand_active() && self.players[idx].dealt_in {
            self.players[idx].pending_removal = true;
            if self.players[idx].is_folded {
                return Ok(RemovalOutcome {
                    removed_now: false,
                    fold_outcome: None,
                });
            }
            self.players[idx].is_folded = true;
            self.players[idx].has_acted = true;
            let fold_outcome = self.settle_after_forced_fold()?;
            return Ok(RemovalOutcome {
                removed_now: false,
                fold_outcome,
            });
        }
        let removed = self.players.remove(idx);
        self.expected_total = self.expected_total.saturating_sub(removed.chips);
        Ok(RemovalOutcome {
            removed_now: true,
            fold_outcome: None,
        })
    }

    /// Re-settle the betting round after a seat was folded out of turn
    /// (stand or forced removal mid-hand).
    fn settle_after_forced_fold(&mut self) -> Result<Option<ActionOutcome>, EngineError> {
        if !self.phase.is_betting_street() {
            return Ok(None);
        }
        let applied = AppliedAction {
            player_id: String::new(),
            action: PlayerAction::Fold,
            amount: 0,
        };
        if self.live_count() <= 1 {
            self.resolve_fold_out()?;
            return Ok(Some(ActionOutcome {
                applied,
                round_complete: true,
                street_advanced: false,
                hand_complete: true,
                run_it_pending: false,
                next_actor: None,
            }));
        }
        // If the dead seat held the action, pass it on before checking
        // whether the round closed.
        if let Some(seat) = self.current_seat
            && self
                .players
                .iter()
                .find(|p| p.seat == seat)
                .is_none_or(|p| !p.can_act())
        {
            self.current_seat = self.next_needing_action(seat);
        }
        if self.round_settled() {
            let mut outcome = ActionOutcome {
                applied,
                round_complete: true,
                street_advanced: false,
                hand_complete: false,
                run_it_pending: false,
                next_actor: None,
            };
            self.collect_street_bets();
            if self.phase == HandPhase::River {
                self.resolve_showdown()?;
                outcome.hand_complete = true;
            } else if self.actionable_count() <= 1 {
                if self.should_prompt_run_it() {
                    self.run_it_pending = true;
                    self.current_seat = None;
                    outcome.run_it_pending = true;
                } else {
                    self.runout_from = Some(self.phase);
                    self.run_out_remaining()?;
                    outcome.hand_complete = true;
                }
            } else {
                self.advance_street()?;
                outcome.street_advanced = true;
                outcome.next_actor = self.current_seat;
            }
            return Ok(Some(outcome));
        }
        Ok(None)
    }

    /// Drop seats that stood up mid-hand. Called by the actor after a hand
    /// completes.
    pub fn purge_pending_removals(&mut self) -> Vec<RoomPlayer> {
        let mut removed = Vec::new();
        self.players.retain(|p| {
            if p.pending_removal {
                removed.push(p.clone());
                false
            } else {
                true
            }
        });
        for p in &removed {
            self.expected_total = self.expected_total.saturating_sub(p.chips);
        }
        removed
    }

    pub fn set_player_status(
        &mut self,
        user_id: &UserId,
        status: PlayerStatus,
    ) -> Result<(), EngineError> {
        let player = self.player_mut(user_id)?;
        player.status = status;
        Ok(())
    }

    /// Reload a busted stack. Rejected while the player still has chips.
    pub fn rebuy(&mut self, user_id: &UserId, amount: Chips) -> Result<Chips, EngineError> {
        let clamped = self.stakes.clamp_buy_in(amount);
        let player = self.player_mut(user_id)?;
        if player.chips > 0 {
            return Err(EngineError::HasChips);
        }
        player.chips = clamped;
        player.status = PlayerStatus::Active;
        self.expected_total += clamped;
        Ok(clamped)
    }

    pub fn set_bomb_pot_preference(&mut self, user_id: &UserId, on: bool) -> Result<(), EngineError> {
        self.player_mut(user_id)?.bomb_pot_when_dealer = on;
        Ok(())
    }

    pub fn set_straddle_preference(&mut self, user_id: &UserId, on: bool) -> Result<(), EngineError> {
        self.player_mut(user_id)?.straddle_next_hand = on;
        Ok(())
    }

    // === Configuration ====================================================

    /// Merge a partial rules update. Takes effect at the next hand start if
    /// a hand is running.
    pub fn update_rules(&mut self, update: &RulesUpdate) -> CustomRules {
        if self.is_hand_active() {
            let mut staged = self.staged_rules.take().unwrap_or_else(|| self.rules.clone());
            update.apply_to(&mut staged);
            self.staged_rules = Some(staged.clone());
            staged
        } else {
            update.apply_to(&mut self.rules);
            self.rules.clone()
        }
    }

    pub fn update_stakes(&mut self, stakes: Stakes) -> Result<Stakes, EngineError> {
        stakes.validate().map_err(EngineError::InvalidStakes)?;
        if self.is_hand_active() {
            self.staged_stakes = Some(stakes);
        } else {
            self.stakes = stakes;
        }
        Ok(stakes)
    }

    pub fn switch_variant(&mut self, variant: Variant) -> Result<(), EngineError> {
        if self.is_hand_active() {
            return Err(EngineError::SwitchFailed);
        }
        self.strategy = variant.strategy().ok_or(EngineError::SwitchFailed)?;
        self.variant = variant;
        Ok(())
    }

    // === Hand lifecycle ===================================================

    #[must_use]
    pub fn is_hand_active(&self) -> bool {
        !matches!(self.phase, HandPhase::Waiting | HandPhase::Complete)
    }

    #[must_use]
    pub fn phase(&self) -> HandPhase {
        self.phase
    }

    #[must_use]
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }

    #[must_use]
    pub fn dealer_seat(&self) -> SeatIndex {
        self.dealer_seat
    }

    #[must_use]
    pub fn pot_total(&self) -> Chips {
        self.pot + self.players.iter().map(|p| p.total_bet_this_street).sum::<Chips>()
    }

    #[must_use]
    pub fn winners(&self) -> &[Winner] {
        &self.winners
    }

    #[must_use]
    pub fn seven_deuce_bonus(&self) -> Option<&super::view::SevenDeuceBonus> {
        self.seven_deuce.as_ref()
    }

    #[must_use]
    pub fn runout_from(&self) -> Option<HandPhase> {
        self.runout_from
    }

    #[must_use]
    pub fn rules(&self) -> &CustomRules {
        &self.rules
    }

    #[must_use]
    pub fn stakes(&self) -> &Stakes {
        &self.stakes
    }

    #[must_use]
    pub fn variant(&self) -> Variant {
        self.variant
    }

    #[must_use]
    pub fn players(&self) -> &[RoomPlayer] {
        &self.players
    }

    #[must_use]
    pub fn boards(&self) -> &[Vec<Card>] {
        &self.boards
    }

    #[must_use]
    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Shrink or grow the table. Occupied seats must stay in bounds.
    pub fn set_max_players(&mut self, max_players: usize) -> Result<(), EngineError> {
        if !(super::constants::MIN_PLAYERS..=super::constants::MAX_PLAYERS)
            .contains(&max_players)
        {
            return Err(EngineError::InvalidAmount);
        }
        if let Some(p) = self.players.iter().find(|p| p.seat >= max_players) {
            return Err(EngineError::SeatTaken(p.seat));
        }
        self.max_players = max_players;
        Ok(())
    }

    #[must_use]
    pub fn player(&self, user_id: &UserId) -> Option<&RoomPlayer> {
        self.players.iter().find(|p| &p.user_id == user_id)
    }

    fn player_mut(&mut self, user_id: &UserId) -> Result<&mut RoomPlayer, EngineError> {
        self.players
            .iter_mut()
            .find(|p| &p.user_id == user_id)
            .ok_or(EngineError::NotSeated)
    }

    #[must_use]
    pub fn current_actor(&self) -> Option<&RoomPlayer> {
        let seat = self.current_seat?;
        self.players.iter().find(|p| p.seat == seat)
    }

    /// Seats able to play a fresh hand right now.
    #[must_use]
    pub fn playable_count(&self) -> usize {
        self.players.iter().filter(|p| p.can_play()).count()
    }

    /// Where the button will land when the next hand starts.
    #[must_use]
    pub fn peek_next_dealer(&self) -> Option<&RoomPlayer> {
        self.next_matching(self.dealer_seat, |p| p.can_play())
            .map(|i| &self.players[i])
    }

    /// Start a new hand. `bomb_pot` forces an ante from every dealt-in seat
    /// and jumps straight to the flop; `dual_board` deals two boards (bomb
    /// pots only).
    pub fn start_hand(
        &mut self,
        bomb_pot: Option<Chips>,
        dual_board: bool,
    ) -> Result<(), EngineError> {
        if self.is_hand_active() {
            return Err(EngineError::HandInProgress);
        }
        if let Some(stakes) = self.staged_stakes.take() {
            self.stakes = stakes;
        }
        if let Some(rules) = self.staged_rules.take() {
            self.rules = rules;
        }
        if self.playable_count() < super::constants::MIN_PLAYERS {
            self.phase = HandPhase::Waiting;
            return Err(EngineError::NotEnoughPlayers);
        }

        self.phase = HandPhase::Starting;
        self.hand_number += 1;
        self.boards = vec![Vec::new()];
        self.ghost_cards.clear();
        self.hole_cards.clear();
        self.revealed.clear();
        self.contributions.clear();
        self.pot = 0;
        self.side_pots.clear();
        self.current_bet = 0;
        self.min_raise = self.stakes.min_bet();
        self.straddles.clear();
        self.straddle_queue.clear();
        self.pending_straddle = None;
        self.run_it = None;
        self.run_it_pending = false;
        self.runout_from = None;
        self.winners.clear();
        self.seven_deuce = None;
        self.showdown_reveal = false;
        self.is_bomb_pot = bomb_pot.is_some();

        for p in &mut self.players {
            p.reset_for_hand();
            p.dealt_in = p.can_play();
        }
        self.expected_total = self.players.iter().map(|p| p.chips).sum();

        // The button starts at the first occupied seat and moves to the
        // next seat that can play on every hand after that.
        self.dealer_seat = if self.hand_number == 1 {
            self.players
                .iter()
                .find(|p| p.dealt_in)
                .map(|p| p.seat)
                .ok_or(EngineError::NotEnoughPlayers)?
        } else {
            self.next_matching(self.dealer_seat, |p| p.dealt_in)
                .map(|i| self.players[i].seat)
                .ok_or(EngineError::NotEnoughPlayers)?
        };

        self.deck.reset(1);

        // Blind positions exist even on bomb pots; they order the deal.
        let heads_up = self.dealt_in_count() == 2;
        let sb_seat = if heads_up {
            self.dealer_seat
        } else {
            self.seat_after(self.dealer_seat, |p| p.dealt_in)?
        };
        let bb_seat = self.seat_after(sb_seat, |p| p.dealt_in)?;
        self.small_blind_seat = Some(sb_seat);
        self.big_blind_seat = Some(bb_seat);

        match bomb_pot {
            Some(amount) => {
                let boards = if dual_board { 2 } else { 1 };
                self.boards = vec![Vec::new(); boards];
                for idx in 0..self.players.len() {
                    if self.players[idx].dealt_in {
                        let user_id = self.players[idx].user_id.clone();
                        let paid = {
                            let p = &mut self.players[idx];
                            let paid = amount.min(p.chips);
                            p.chips -= paid;
                            if p.chips == 0 && paid > 0 {
                                p.is_all_in = true;
                            }
                            paid
                        };
                        self.credit_pot(&user_id, paid);
                    }
                }
                self.deal_hole_cards(sb_seat)?;
                // No preflop betting: straight to the flop.
                self.phase = HandPhase::Flop;
                self.deal_street()?;
                self.begin_postflop_round();
                if self.current_seat.is_none() {
                    // Everyone the ante left standing is all-in.
                    self.runout_from = Some(self.phase);
                    self.run_out_remaining()?;
                }
            }
            None => {
                if self.stakes.ante > 0 {
                    for idx in 0..self.players.len() {
                        if self.players[idx].dealt_in {
                            let user_id = self.players[idx].user_id.clone();
                            let paid = {
                                let p = &mut self.players[idx];
                                let paid = self.stakes.ante.min(p.chips);
                                p.chips -= paid;
                                if p.chips == 0 && paid > 0 {
                                    p.is_all_in = true;
                                }
                                paid
                            };
                            self.credit_pot(&user_id, paid);
                        }
                    }
                }

                let sb = self.stakes.small_blind;
                let bb = self.stakes.big_blind;
                if sb > 0 {
                    self.commit_at_seat(sb_seat, sb);
                }
                if bb > 0 {
                    self.commit_at_seat(bb_seat, bb);
                }
                self.current_bet = bb;
                self.min_raise = self.stakes.min_bet();

                self.deal_hole_cards(sb_seat)?;
                self.phase = HandPhase::Preflop;

                self.build_straddle_queue(bb_seat);

                self.current_seat = if heads_up {
                    self.find_actionable(self.dealer_seat, true)
                } else {
                    self.find_actionable(bb_seat, false)
                };
                if self.current_seat.is_none() {
                    // Blinds or antes put everyone all-in already.
                    if self.live_count() <= 1 {
                        self.resolve_fold_out()?;
                    } else {
                        self.runout_from = Some(self.phase);
                        self.run_out_remaining()?;
                    }
                }
            }
        }

        debug!(
            "hand {} started: dealer seat {}, phase {}",
            self.hand_number, self.dealer_seat, self.phase
        );
        self.verify_chip_conservation()?;
        Ok(())
    }

    // === Straddles ========================================================

    fn build_straddle_queue(&mut self, bb_seat: SeatIndex) {
        let cap = self.rules.straddle_cap();
        if cap == 0 || self.is_bomb_pot || self.dealt_in_count() < 3 {
            return;
        }
        let sb_seat = self.small_blind_seat.unwrap_or(self.dealer_seat);
        let mut seat = bb_seat;
        while self.straddle_queue.len() < cap {
            let Some(idx) = self.next_matching(seat, |p| p.dealt_in) else {
                break;
            };
            let next = self.players[idx].seat;
            // One orbit only: the chain may run through the button but
            // never wraps into the blinds.
            if next == sb_seat || next == bb_seat {
                break;
            }
            self.straddle_queue.push_back(next);
            seat = next;
        }
    }

    /// Amount of the next straddle in the chain: the big blind doubled for
    /// each link.
    #[must_use]
    fn next_straddle_amount(&self) -> Chips {
        let posted = self.straddles.len() as u32;
        self.stakes.big_blind.saturating_mul(2u32.saturating_pow(posted + 1))
    }

    /// Pop the next straddle prompt, if the chain continues. The returned
    /// flag is true when the seat auto-accepts (UTG with the preference
    /// set); later seats always get a real prompt.
    pub fn start_straddle_prompt(&mut self) -> Option<(StraddlePrompt, bool)> {
        if self.phase != HandPhase::Preflop || self.pending_straddle.is_some() {
            return None;
        }
        let amount = self.next_straddle_amount();
        let seat = loop {
            let seat = self.straddle_queue.pop_front()?;
            let Some(p) = self.players.iter().find(|p| p.seat == seat) else {
                continue;
            };
            if !p.can_act() {
                continue;
            }
            if p.chips < amount {
                // Cannot cover the doubled amount: the chain ends here.
                self.straddle_queue.clear();
                return None;
            }
            break seat;
        };
        let player = self
            .players
            .iter()
            .find(|p| p.seat == seat)
            .expect("seat checked above");
        let auto = self.straddles.is_empty() && player.straddle_next_hand;
        let prompt = StraddlePrompt {
            player_id: player.user_id.clone(),
            seat,
            amount,
            timeout_secs: STRADDLE_TIMEOUT_SECS,
        };
        self.pending_straddle = Some(prompt.clone());
        Some((prompt, auto))
    }

    /// Post or decline the pending straddle.
    pub fn process_straddle(
        &mut self,
        user_id: &UserId,
        accepted: bool,
    ) -> Result<StraddleOutcome, EngineError> {
        let prompt = self
            .pending_straddle
            .as_ref()
            .ok_or(EngineError::NoStraddlePending)?;
        if &prompt.player_id != user_id {
            return Err(EngineError::NotInPrompt);
        }
        let prompt = self.pending_straddle.take().expect("checked above");

        if !accepted {
            self.straddle_queue.clear();
            return Ok(StraddleOutcome {
                accepted: false,
                seat: prompt.seat,
                entry: None,
                chain_complete: true,
            });
        }

        let previous_bet = self.current_bet;
        let amount = prompt.amount;
        let committed = self.commit_at_seat(prompt.seat, amount);
        if committed < amount {
            // The prompt guaranteed the stack covered it; treat anything
            // else as a failed straddle and end the chain.
            error!("straddle at seat {} under-committed", prompt.seat);
            self.straddle_queue.clear();
            return Err(EngineError::StraddleFailed);
        }
        self.current_bet = amount;
        self.min_raise = amount - previous_bet;
        let entry = StraddleEntry {
            player_id: prompt.player_id.clone(),
            amount,
            seat: prompt.seat,
        };
        self.straddles.push(entry.clone());
        let chain_complete = self.straddle_queue.is_empty();
        Ok(StraddleOutcome {
            accepted: true,
            seat: prompt.seat,
            entry: Some(entry),
            chain_complete,
        })
    }

    /// Finalize preflop first-to-act once the chain is settled.
    pub fn end_straddle_phase(&mut self) {
        self.pending_straddle = None;
        self.straddle_queue.clear();
        if self.phase != HandPhase::Preflop {
            return;
        }
        let after = match self.straddles.last() {
            Some(entry) => entry.seat,
            None => match self.big_blind_seat {
                Some(seat) => seat,
                None => return,
            },
        };
        if self.dealt_in_count() == 2 && self.straddles.is_empty() {
            self.current_seat = self.find_actionable(self.dealer_seat, true);
        } else {
            self.current_seat = self.find_actionable(after, false);
        }
    }

    // === Betting ==========================================================

    /// The action set legal for the current actor.
    #[must_use]
    pub fn valid_actions(&self, user_id: &UserId) -> Option<super::view::ValidActions> {
        let player = self.player(user_id)?;
        if self.current_seat != Some(player.seat) || !self.phase.is_betting_street() {
            return None;
        }
        let to_call = self.current_bet.saturating_sub(player.total_bet_this_street);
        let can_check = to_call == 0;
        let mut actions = super::view::ValidActions {
            fold: true,
            check: can_check,
            call: (!can_check).then_some(to_call.min(player.chips)),
            bet: None,
            raise: None,
            all_in: player.total_bet_this_street + player.chips,
        };
        if self.current_bet == 0 && player.chips > 0 {
            actions.bet = Some(self.stakes.min_bet().min(player.chips));
        }
        if self.current_bet > 0 && player.chips > to_call && !player.has_acted {
            actions.raise = Some(self.current_bet + self.min_raise);
        }
        Some(actions)
    }

    /// Validate and execute a betting action, then advance the hand.
    pub fn process_action(
        &mut self,
        user_id: &UserId,
        action: PlayerAction,
    ) -> Result<ActionOutcome, EngineError> {
        if !self.phase.is_betting_street()
            || self.pending_straddle.is_some()
            || self.run_it_pending
        {
            return Err(EngineError::InvalidAction);
        }
        let idx = self
            .players
            .iter()
            .position(|p| &p.user_id == user_id)
            .ok_or(EngineError::NotSeated)?;
        if !self.players[idx].dealt_in || self.players[idx].is_folded {
            return Err(EngineError::InvalidAction);
        }
        if self.current_seat != Some(self.players[idx].seat) {
            return Err(EngineError::OutOfTurn);
        }

        let to_call = self
            .current_bet
            .saturating_sub(self.players[idx].total_bet_this_street);
        let moved;
        match action {
            PlayerAction::Fold => {
                self.players[idx].is_folded = true;
                moved = 0;
            }
            PlayerAction::Check => {
                if to_call != 0 {
                    return Err(EngineError::InvalidAction);
                }
                moved = 0;
            }
            PlayerAction::Call => {
                if to_call == 0 {
                    return Err(EngineError::InvalidAction);
                }
                moved = self.players[idx].commit(to_call);
            }
            PlayerAction::Bet { amount } => {
                if self.current_bet != 0 {
                    return Err(EngineError::InvalidAction);
                }
                let p = &self.players[idx];
                if amount == 0 || amount > p.chips {
                    return Err(EngineError::InvalidAmount);
                }
                if amount < self.stakes.min_bet() && amount < p.chips {
                    return Err(EngineError::InvalidAmount);
                }
                moved = self.players[idx].commit(amount);
                self.apply_wager(idx);
            }
            PlayerAction::Raise { amount } => {
                if self.current_bet == 0 {
                    return Err(EngineError::InvalidAction);
                }
                if self.players[idx].has_acted {
                    // A short all-in does not reopen the action.
                    return Err(EngineError::InvalidAction);
                }
                let p = &self.players[idx];
                let target = amount;
                if target <= self.current_bet {
                    return Err(EngineError::InvalidAmount);
                }
                let delta = target - p.total_bet_this_street;
                if delta > p.chips {
                    return Err(EngineError::InvalidAmount);
                }
                if target < self.current_bet + self.min_raise && delta < p.chips {
                    return Err(EngineError::InvalidAmount);
                }
                moved = self.players[idx].commit(delta);
                self.apply_wager(idx);
            }
            PlayerAction::AllIn => {
                let p = &self.players[idx];
                if p.chips == 0 {
                    return Err(EngineError::InvalidAmount);
                }
                let stack = p.chips;
                moved = self.players[idx].commit(stack);
                if self.players[idx].total_bet_this_street > self.current_bet {
                    self.apply_wager(idx);
                }
            }
        }
        self.players[idx].has_acted = true;

        let applied = AppliedAction {
            player_id: user_id.clone(),
            action,
            amount: moved,
        };
        debug!(
            "seat {} {:?} for {} (pot {})",
            self.players[idx].seat,
            applied.action,
            applied.amount,
            self.pot_total()
        );
        let outcome = self.settle_after_action(applied)?;
        self.verify_chip_conservation()?;
        Ok(outcome)
    }

    /// Register a wager that set a new high bet: classify full raise versus
    /// short all-in and update the reopen state accordingly.
    fn apply_wager(&mut self, idx: usize) {
        let total = self.players[idx].total_bet_this_street;
        let seat = self.players[idx].seat;
        debug_assert!(total > self.current_bet);
        let full = if self.current_bet == 0 {
            total >= self.stakes.min_bet()
        } else {
            total >= self.current_bet + self.min_raise
        };
        if full {
            if self.current_bet == 0 {
                self.min_raise = total.max(self.stakes.min_bet());
            } else {
                self.min_raise = total - self.current_bet;
            }
            self.current_bet = total;
            for p in &mut self.players {
                if p.seat != seat && p.can_act() {
                    p.has_acted = false;
                }
            }
        } else {
            // Short all-in: the bet stands but already-acted players may
            // only call or fold.
            self.current_bet = total;
        }
    }

    fn settle_after_action(&mut self, applied: AppliedAction) -> Result<ActionOutcome, EngineError> {
        let mut outcome = ActionOutcome {
            applied,
            round_complete: false,
            street_advanced: false,
            hand_complete: false,
            run_it_pending: false,
            next_actor: None,
        };

        if self.live_count() <= 1 {
            self.resolve_fold_out()?;
            outcome.hand_complete = true;
            return Ok(outcome);
        }

        if self.round_settled() {
            outcome.round_complete = true;
            self.collect_street_bets();

            if self.phase == HandPhase::River {
                self.resolve_showdown()?;
                outcome.hand_complete = true;
            } else if self.actionable_count() <= 1 {
                if self.should_prompt_run_it() {
                    self.run_it_pending = true;
                    self.current_seat = None;
                    outcome.run_it_pending = true;
                } else {
                    self.runout_from = Some(self.phase);
                    self.run_out_remaining()?;
                    outcome.hand_complete = true;
                }
            } else {
                self.advance_street()?;
                outcome.street_advanced = true;
                outcome.next_actor = self.current_seat;
            }
        } else {
            let current = self.current_seat.unwrap_or(self.dealer_seat);
            self.current_seat = self.next_needing_action(current);
            outcome.next_actor = self.current_seat;
        }
        Ok(outcome)
    }

    /// A betting round ends when every live, non-all-in seat has acted and
    /// matched the current bet.
    fn round_settled(&self) -> bool {
        self.players
            .iter()
            .filter(|p| p.can_act())
            .all(|p| p.has_acted && p.total_bet_this_street == self.current_bet)
    }

    fn next_needing_action(&self, after: SeatIndex) -> Option<SeatIndex> {
        self.next_matching(after, |p| {
            p.can_act() && (!p.has_acted || p.total_bet_this_street < self.current_bet)
        })
        .map(|i| self.players[i].seat)
    }

    pub(crate) fn collect_street_bets(&mut self) {
        for idx in 0..self.players.len() {
            let amount = self.players[idx].total_bet_this_street;
            if amount > 0 {
                let user_id = self.players[idx].user_id.clone();
                self.pot += amount;
                *self.contributions.entry(user_id).or_default() += amount;
            }
            self.players[idx].reset_for_street();
        }
        self.current_bet = 0;
        self.min_raise = self.stakes.min_bet();
    }

    /// Deal the next street onto every board and open its betting round.
    fn advance_street(&mut self) -> Result<(), EngineError> {
        self.phase = self.phase.next();
        self.deal_street()?;
        self.begin_postflop_round();
        if self.current_seat.is_none() {
            // Nobody can act after the deal; run the rest out silently.
            self.runout_from = Some(self.phase);
            self.run_out_remaining()?;
        }
        Ok(())
    }

    fn begin_postflop_round(&mut self) {
        self.current_bet = 0;
        self.min_raise = self.stakes.min_bet();
        self.current_seat = if self.actionable_count() >= 2 {
            self.find_actionable(self.dealer_seat, false)
        } else {
            None
        };
    }

    /// Burn and deal this phase's cards onto each board.
    pub(crate) fn deal_street(&mut self) -> Result<(), EngineError> {
        let count = self.phase.street_cards();
        if count == 0 {
            return Ok(());
        }
        for board_idx in 0..self.boards.len() {
            self.deck.burn().ok_or(EngineError::DeckExhausted)?;
            for _ in 0..count {
                let card = self.deck.deal().ok_or(EngineError::DeckExhausted)?;
                self.boards[board_idx].push(card);
            }
        }
        Ok(())
    }

    /// Deal every remaining street with no betting, then resolve.
    pub(crate) fn run_out_remaining(&mut self) -> Result<(), EngineError> {
        self.current_seat = None;
        while self.boards[0].len() < 5 && self.phase.is_betting_street() {
            self.phase = self.phase.next();
            self.deal_street()?;
        }
        self.resolve_showdown()
    }

    // === Run-it-multiple ==================================================

    /// Whether the run-it prompt should open: at least two all-in live
    /// seats, a single board with cards to come, and a rule allowing it.
    #[must_use]
    pub fn should_prompt_run_it(&self) -> bool {
        self.rules.run_it_allowed()
            && self.boards.len() == 1
            && self.boards[0].len() < 5
            && self
                .players
                .iter()
                .filter(|p| p.in_hand() && p.is_all_in)
                .count()
                >= 2
    }

    #[must_use]
    pub fn run_it_pending(&self) -> bool {
        self.run_it_pending
    }

    pub fn start_run_it_prompt(&mut self) -> Result<super::view::RunItPrompt, EngineError> {
        if !self.run_it_pending {
            return Err(EngineError::NoRunItPrompt);
        }
        let eligible: Vec<UserId> = self
            .players
            .iter()
            .filter(|p| p.in_hand() && p.is_all_in)
            .map(|p| p.user_id.clone())
            .collect();
        let prompt = super::view::RunItPrompt {
            eligible,
            decisions: HashMap::new(),
        };
        self.run_it = Some(prompt.clone());
        Ok(prompt)
    }

    /// Record a board-count selection, silently downgraded to the strongest
    /// enabled option.
    pub fn process_run_it_choice(
        &mut self,
        user_id: &UserId,
        choice: u8,
    ) -> Result<super::view::RunItDecision, EngineError> {
        if !(1..=3).contains(&choice) {
            return Err(EngineError::InvalidChoice);
        }
        let clamped = self.rules.clamp_run_it_choice(choice);
        let prompt = self.run_it.as_mut().ok_or(EngineError::NoRunItPrompt)?;
        if !prompt.eligible.contains(user_id) {
            return Err(EngineError::NotInPrompt);
        }
        let decision = prompt.decisions.entry(user_id.clone()).or_default();
        if decision.confirmed {
            return Err(EngineError::CannotConfirm);
        }
        decision.choice = Some(clamped);
        Ok(*decision)
    }

    pub fn confirm_run_it_choice(
        &mut self,
        user_id: &UserId,
    ) -> Result<super::view::RunItDecision, EngineError> {
        let prompt = self.run_it.as_mut().ok_or(EngineError::NoRunItPrompt)?;
        if !prompt.eligible.contains(user_id) {
            return Err(EngineError::NotInPrompt);
        }
        let decision = prompt
            .decisions
            .get_mut(user_id)
            .filter(|d| d.choice.is_some())
            .ok_or(EngineError::CannotConfirm)?;
        decision.confirmed = true;
        Ok(*decision)
    }

    #[must_use]
    pub fn all_run_it_choices_confirmed(&self) -> bool {
        self.run_it.as_ref().is_some_and(|p| p.all_confirmed())
    }

    #[must_use]
    pub fn all_confirmed_choices_same(&self) -> bool {
        self.run_it.as_ref().is_some_and(|p| p.confirmed_unanimous())
    }

    #[must_use]
    pub fn final_run_it_choice(&self) -> u8 {
        self.run_it.as_ref().map_or(1, |p| p.final_choice())
    }

    /// Deal `choice` independent run-outs and resolve each board.
    pub fn execute_run_it(&mut self, choice: u8) -> Result<(), EngineError> {
        if !self.run_it_pending {
            return Err(EngineError::NoRunItPrompt);
        }
        let choice = choice.clamp(1, 3) as usize;
        self.run_it_pending = false;
        self.run_it = None;
        self.runout_from = Some(self.phase);
        let remaining = 5 - self.boards[0].len();
        let base = self.boards[0].clone();
        let runouts = self.deck.deal_run_out(remaining, choice);
        if runouts.iter().any(|r| r.len() < remaining) {
            return Err(EngineError::DeckExhausted);
        }
        self.boards = runouts
            .into_iter()
            .map(|extra| {
                let mut board = base.clone();
                board.extend(extra);
                board
            })
            .collect();
        self.phase = HandPhase::River;
        self.resolve_showdown()
    }

    /// Close the prompt and run a single board out.
    pub fn skip_run_it(&mut self) -> Result<(), EngineError> {
        if !self.run_it_pending {
            return Err(EngineError::NoRunItPrompt);
        }
        self.run_it_pending = false;
        self.run_it = None;
        self.runout_from = Some(self.phase);
        self.run_out_remaining()
    }

    // === Reveals ==========================================================

    /// Voluntarily reveal hole cards after the hand completes.
    pub fn show_hand(&mut self, user_id: &UserId) -> Result<Vec<Card>, EngineError> {
        if self.phase != HandPhase::Complete {
            return Err(EngineError::NoCards);
        }
        let cards = self
            .hole_cards
            .get(user_id)
            .cloned()
            .ok_or(EngineError::NoCards)?;
        self.revealed.insert(user_id.clone());
        Ok(cards)
    }

    // === Integrity ========================================================

    /// Sum of stacks, live street bets, and the pot must never drift from
    /// the baseline taken at hand start.
    pub fn verify_chip_conservation(&self) -> Result<(), EngineError> {
        if !self.is_hand_active() && self.phase != HandPhase::Complete {
            return Ok(());
        }
        let total: Chips = self
            .players
            .iter()
            .map(|p| p.chips + p.total_bet_this_street)
            .sum::<Chips>()
            + self.pot;
        if total != self.expected_total {
            error!(
                "chip conservation breach: have {total}, expected {}",
                self.expected_total
            );
            return Err(EngineError::ChipConservation);
        }
        Ok(())
    }

    /// Abort a hand after an invariant breach: refund every seat's recorded
    /// contribution and live bets, drop the pot, and return to waiting.
    pub fn abort_hand(&mut self) {
        error!("aborting hand {}: refunding in-flight bets", self.hand_number);
        for p in &mut self.players {
            p.chips += p.total_bet_this_street;
            if let Some(contributed) = self.contributions.remove(&p.user_id) {
                p.chips += contributed;
            }
            p.reset_for_hand();
        }
        self.pot = 0;
        self.contributions.clear();
        self.current_bet = 0;
        self.current_seat = None;
        self.pending_straddle = None;
        self.straddle_queue.clear();
        self.run_it = None;
        self.run_it_pending = false;
        self.winners.clear();
        self.seven_deuce = None;
        self.boards = vec![Vec::new()];
        self.phase = HandPhase::Waiting;
    }

    // === Seat arithmetic ==================================================

    pub(crate) fn dealt_in_count(&self) -> usize {
        self.players.iter().filter(|p| p.dealt_in).count()
    }

    /// Live seats: dealt in and not folded.
    pub(crate) fn live_count(&self) -> usize {
        self.players.iter().filter(|p| p.in_hand()).count()
    }

    /// Seats that can still put chips in.
    fn actionable_count(&self) -> usize {
        self.players.iter().filter(|p| p.can_act()).count()
    }

    /// Index of the first player matching `pred` strictly after `seat` in
    /// clockwise order, wrapping once around the table.
    pub(crate) fn next_matching<F>(&self, seat: SeatIndex, pred: F) -> Option<usize>
    where
        F: Fn(&RoomPlayer) -> bool,
    {
        if self.players.is_empty() {
            return None;
        }
        let start = self
            .players
            .iter()
            .position(|p| p.seat > seat)
            .unwrap_or(0);
        for offset in 0..self.players.len() {
            let idx = (start + offset) % self.players.len();
            if self.players[idx].seat == seat {
                continue;
            }
            if pred(&self.players[idx]) {
                return Some(idx);
            }
        }
        None
    }

    fn seat_after<F>(&self, seat: SeatIndex, pred: F) -> Result<SeatIndex, EngineError>
    where
        F: Fn(&RoomPlayer) -> bool,
    {
        self.next_matching(seat, pred)
            .map(|i| self.players[i].seat)
            .ok_or(EngineError::NotEnoughPlayers)
    }

    /// First seat able to act, optionally including `seat` itself.
    fn find_actionable(&self, seat: SeatIndex, include_self: bool) -> Option<SeatIndex> {
        if include_self
            && let Some(p) = self.players.iter().find(|p| p.seat == seat)
            && p.can_act()
        {
            return Some(seat);
        }
        self.next_matching(seat, |p| p.can_act())
            .map(|i| self.players[i].seat)
    }

    fn commit_at_seat(&mut self, seat: SeatIndex, amount: Chips) -> Chips {
        match self.players.iter_mut().find(|p| p.seat == seat) {
            Some(p) => p.commit(amount),
            None => 0,
        }
    }

    /// Move chips straight into the pot (antes and bonuses), bypassing the
    /// street bet so they never count toward a call.
    fn credit_pot(&mut self, user_id: &UserId, amount: Chips) {
        if amount > 0 {
            self.pot += amount;
            *self.contributions.entry(user_id.clone()).or_default() += amount;
        }
    }

    /// Swap a player's dealt hand for a chosen one, for deterministic
    /// showdown tests.
    #[cfg(test)]
    pub(crate) fn override_hole_cards(&mut self, user_id: &UserId, cards: Vec<Card>) {
        self.hole_cards.insert(user_id.clone(), cards);
    }

    /// Replace a board for deterministic showdown tests.
    #[cfg(test)]
    pub(crate) fn override_board_for_test(&mut self, board_idx: usize, cards: Vec<Card>) {
        self.boards[board_idx] = cards;
    }

    fn deal_hole_cards(&mut self, first_seat: SeatIndex) -> Result<(), EngineError> {
        let count = self.strategy.hole_card_count();
        let order: Vec<UserId> = {
            let mut order = Vec::with_capacity(self.dealt_in_count());
            let mut seat = first_seat;
            for _ in 0..self.players.len() {
                if let Some(p) = self.players.iter().find(|p| p.seat == seat)
                    && p.dealt_in
                {
                    order.push(p.user_id.clone());
                }
                match self.next_matching(seat, |p| p.dealt_in) {
                    Some(idx) => seat = self.players[idx].seat,
                    None => break,
                }
                if seat == first_seat {
                    break;
                }
            }
            order
        };
        for _ in 0..count {
            for user_id in &order {
                let card = self.deck.deal().ok_or(EngineError::DeckExhausted)?;
                self.hole_cards.entry(user_id.clone()).or_default().push(card);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::variant::HandPhase;

    fn stakes() -> Stakes {
        Stakes {
            small_blind: 5,
            big_blind: 10,
            ante: 0,
            min_buy_in: 100,
            max_buy_in: 10_000,
        }
    }

    fn engine_with(rules: CustomRules, seats: &[(&str, usize, Chips)]) -> HandEngine {
        let mut engine = HandEngine::new(Variant::TexasHoldem, stakes(), rules, 10).unwrap();
        for &(id, seat, chips) in seats {
            engine
                .add_player(id.to_string(), id.to_string(), seat, chips)
                .unwrap();
        }
        engine
    }

    fn chips_of(engine: &HandEngine, id: &str) -> Chips {
        engine.player(&id.to_string()).unwrap().chips
    }

    fn total_chips(engine: &HandEngine) -> Chips {
        engine.players().iter().map(|p| p.chips).sum::<Chips>() + engine.pot_total()
    }

    fn act(engine: &mut HandEngine, id: &str, action: PlayerAction) -> ActionOutcome {
        engine.process_action(&id.to_string(), action).unwrap()
    }

    #[test]
    fn heads_up_preflop_fold() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();

        assert_eq!(e.dealer_seat(), 0);
        assert_eq!(chips_of(&e, "a"), 995, "dealer posts the small blind heads-up");
        assert_eq!(chips_of(&e, "b"), 990);
        assert_eq!(e.current_actor().unwrap().user_id, "a");

        let outcome = act(&mut e, "a", PlayerAction::Fold);
        assert!(outcome.hand_complete);
        assert_eq!(e.phase(), HandPhase::Complete);
        assert_eq!(chips_of(&e, "a"), 995);
        assert_eq!(chips_of(&e, "b"), 1005);

        let winner = &e.winners()[0];
        assert_eq!(winner.player_id, "b");
        assert_eq!(winner.amount, 15);
        assert!(winner.won_by_fold);
        assert!(winner.hand_result.is_none());
    }

    #[test]
    fn heads_up_dealer_acts_second_postflop() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        let outcome = act(&mut e, "a", PlayerAction::Call);
        assert_eq!(outcome.next_actor, Some(1));
        let outcome = act(&mut e, "b", PlayerAction::Check);
        assert!(outcome.street_advanced);
        assert_eq!(e.phase(), HandPhase::Flop);
        assert_eq!(e.current_actor().unwrap().user_id, "b");
    }

    #[test]
    fn dealer_button_advances_every_hand() {
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 1000), ("b", 1, 1000), ("c", 2, 1000)],
        );
        e.start_hand(None, false).unwrap();
        assert_eq!(e.dealer_seat(), 0);
        let first = e.current_actor().unwrap().user_id.clone();
        e.process_action(&first, PlayerAction::Fold).unwrap();
        let second = e.current_actor().unwrap().user_id.clone();
        e.process_action(&second, PlayerAction::Fold).unwrap();
        assert_eq!(e.phase(), HandPhase::Complete);

        e.start_hand(None, false).unwrap();
        assert_eq!(e.dealer_seat(), 1);
    }

    #[test]
    fn three_way_all_in_builds_nested_side_pots() {
        // The second hand reproduces the classic unequal-stack shape:
        // 100/200/300 all-in with the button on seat 1.
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 100), ("b", 1, 205), ("c", 2, 295)],
        );
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::Fold);
        act(&mut e, "b", PlayerAction::Fold);
        assert_eq!(chips_of(&e, "b"), 200);
        assert_eq!(chips_of(&e, "c"), 300);

        e.start_hand(None, false).unwrap();
        assert_eq!(e.dealer_seat(), 1);
        assert_eq!(e.current_actor().unwrap().user_id, "b");

        act(&mut e, "b", PlayerAction::AllIn);
        act(&mut e, "c", PlayerAction::AllIn);
        let outcome = act(&mut e, "a", PlayerAction::AllIn);
        assert!(outcome.hand_complete, "runout resolves straight to showdown");

        assert_eq!(e.side_pots.len(), 3);
        assert_eq!(e.side_pots[0].amount, 300);
        assert_eq!(e.side_pots[0].eligible_player_ids, vec!["a", "b", "c"]);
        assert_eq!(e.side_pots[1].amount, 200);
        assert_eq!(e.side_pots[1].eligible_player_ids, vec!["b", "c"]);
        assert_eq!(e.side_pots[2].amount, 100);
        assert_eq!(e.side_pots[2].eligible_player_ids, vec!["c"]);
        assert_eq!(total_chips(&e), 600);
        assert_eq!(e.runout_from(), Some(HandPhase::Preflop));
    }

    #[test]
    fn short_all_in_does_not_reopen_action() {
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 1000), ("b", 1, 140), ("c", 2, 1000)],
        );
        e.start_hand(None, false).unwrap();
        // Three-handed the button is under the gun.
        assert_eq!(e.current_actor().unwrap().user_id, "a");
        act(&mut e, "a", PlayerAction::Raise { amount: 100 });
        // 140 total is short of the 190 a full re-raise requires.
        act(&mut e, "b", PlayerAction::AllIn);
        assert_eq!(e.current_bet, 140);
        act(&mut e, "c", PlayerAction::Fold);

        let err = e
            .process_action(&"a".to_string(), PlayerAction::Raise { amount: 280 })
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidAction);
        assert!(e.valid_actions(&"a".to_string()).unwrap().raise.is_none());

        let outcome = act(&mut e, "a", PlayerAction::Call);
        assert!(outcome.hand_complete, "caller is alone against an all-in");
        assert_eq!(total_chips(&e), 2140);
    }

    #[test]
    fn full_raise_reopens_action() {
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 1000), ("b", 1, 1000), ("c", 2, 1000)],
        );
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::Raise { amount: 100 });
        act(&mut e, "b", PlayerAction::Fold);
        act(&mut e, "c", PlayerAction::Raise { amount: 300 });
        let actions = e.valid_actions(&"a".to_string()).unwrap();
        assert_eq!(actions.raise, Some(500), "full raise reopens and sets the price");
        assert_eq!(actions.call, Some(200));
    }

    #[test]
    fn big_blind_gets_the_option() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        let outcome = act(&mut e, "a", PlayerAction::Call);
        assert!(!outcome.round_complete, "big blind still holds the option");
        let actions = e.valid_actions(&"b".to_string()).unwrap();
        assert!(actions.check);
        assert!(actions.raise.is_some());
    }

    #[test]
    fn straddle_chain_with_utg_auto_accept() {
        let rules = CustomRules {
            straddle_enabled: true,
            multiple_straddles_allowed: true,
            max_straddles: 2,
            ..CustomRules::default()
        };
        let mut e = engine_with(
            rules,
            &[("a", 0, 1000), ("b", 1, 1000), ("c", 2, 1000), ("d", 3, 1000)],
        );
        e.set_straddle_preference(&"d".to_string(), true).unwrap();
        e.start_hand(None, false).unwrap();
        assert_eq!(e.dealer_seat(), 0);

        let (prompt, auto) = e.start_straddle_prompt().unwrap();
        assert_eq!(prompt.seat, 3);
        assert_eq!(prompt.amount, 20);
        assert!(auto, "UTG with the preference set auto-accepts");
        let outcome = e.process_straddle(&"d".to_string(), true).unwrap();
        assert!(outcome.accepted);
        assert!(!outcome.chain_complete);
        assert_eq!(e.current_bet, 20);

        let (prompt, auto) = e.start_straddle_prompt().unwrap();
        assert_eq!(prompt.seat, 0, "the chain runs through the button");
        assert_eq!(prompt.amount, 40);
        assert!(!auto, "seats after UTG always get a real prompt");
        let outcome = e.process_straddle(&"a".to_string(), false).unwrap();
        assert!(!outcome.accepted);
        assert!(outcome.chain_complete);

        e.end_straddle_phase();
        assert_eq!(e.current_seat, Some(0), "action starts after the last straddler");
        assert_eq!(e.current_bet, 20);
        assert_eq!(e.straddles.len(), 1);
    }

    #[test]
    fn no_straddles_heads_up() {
        let rules = CustomRules {
            straddle_enabled: true,
            ..CustomRules::default()
        };
        let mut e = engine_with(rules, &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        assert!(e.start_straddle_prompt().is_none());
    }

    #[test]
    fn bomb_pot_skips_preflop() {
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 1000), ("b", 1, 1000), ("c", 2, 1000)],
        );
        e.start_hand(Some(50), true).unwrap();
        assert_eq!(e.phase(), HandPhase::Flop);
        assert_eq!(e.boards().len(), 2);
        assert!(e.boards().iter().all(|b| b.len() == 3));
        assert_eq!(e.pot_total(), 150);
        assert_eq!(e.current_bet, 0);
        // First action on the flop, left of the button.
        assert_eq!(e.current_seat, Some(1));
        assert_eq!(total_chips(&e), 3000);
    }

    #[test]
    fn run_it_prompt_opens_for_two_all_ins() {
        let rules = CustomRules {
            run_it_twice: true,
            ..CustomRules::default()
        };
        let mut e = engine_with(rules, &[("a", 0, 100), ("b", 1, 100)]);
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::AllIn);
        let outcome = act(&mut e, "b", PlayerAction::AllIn);
        assert!(outcome.run_it_pending);
        assert!(e.run_it_pending());
        assert_eq!(e.phase(), HandPhase::Preflop, "board waits for the decision");

        let prompt = e.start_run_it_prompt().unwrap();
        assert_eq!(prompt.eligible.len(), 2);

        e.process_run_it_choice(&"a".to_string(), 2).unwrap();
        e.confirm_run_it_choice(&"a".to_string()).unwrap();
        e.process_run_it_choice(&"b".to_string(), 2).unwrap();
        e.confirm_run_it_choice(&"b".to_string()).unwrap();
        assert!(e.all_run_it_choices_confirmed());
        assert_eq!(e.final_run_it_choice(), 2);

        e.execute_run_it(2).unwrap();
        assert_eq!(e.phase(), HandPhase::Complete);
        assert_eq!(e.boards().len(), 2);
        assert!(e.boards().iter().all(|b| b.len() == 5));
        // 200 in the pot, 100 per board.
        let board_totals: Vec<Chips> = (0..2)
            .map(|b| {
                e.winners()
                    .iter()
                    .filter(|w| w.board_index == Some(b))
                    .map(|w| w.amount)
                    .sum()
            })
            .collect();
        assert_eq!(board_totals, vec![100, 100]);
        assert_eq!(total_chips(&e), 200);
    }

    #[test]
    fn three_way_run_it_twice_splits_the_pot_per_board() {
        let rules = CustomRules {
            run_it_twice: true,
            ..CustomRules::default()
        };
        let mut e = engine_with(rules, &[("a", 0, 100), ("b", 1, 100), ("c", 2, 100)]);
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::AllIn);
        act(&mut e, "b", PlayerAction::AllIn);
        let outcome = act(&mut e, "c", PlayerAction::AllIn);
        assert!(outcome.run_it_pending);

        let prompt = e.start_run_it_prompt().unwrap();
        assert_eq!(prompt.eligible.len(), 3);
        for id in ["a", "b", "c"] {
            e.process_run_it_choice(&id.to_string(), 2).unwrap();
            e.confirm_run_it_choice(&id.to_string()).unwrap();
        }
        assert!(e.all_run_it_choices_confirmed());
        assert!(e.all_confirmed_choices_same());

        e.execute_run_it(e.final_run_it_choice()).unwrap();
        assert_eq!(e.boards().len(), 2);
        let board_totals: Vec<Chips> = (0..2)
            .map(|b| {
                e.winners()
                    .iter()
                    .filter(|w| w.board_index == Some(b))
                    .map(|w| w.amount)
                    .sum()
            })
            .collect();
        assert_eq!(board_totals, vec![150, 150]);
        assert_eq!(total_chips(&e), 300);
    }

    #[test]
    fn run_it_choice_downgrades_to_strongest_enabled() {
        let rules = CustomRules {
            run_it_thrice: true,
            ..CustomRules::default()
        };
        let mut e = engine_with(rules, &[("a", 0, 100), ("b", 1, 100)]);
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::AllIn);
        act(&mut e, "b", PlayerAction::AllIn);
        e.start_run_it_prompt().unwrap();

        let decision = e.process_run_it_choice(&"a".to_string(), 2).unwrap();
        assert_eq!(decision.choice, Some(1), "two boards need runItTwice");
        let decision = e.process_run_it_choice(&"b".to_string(), 3).unwrap();
        assert_eq!(decision.choice, Some(3));
    }

    #[test]
    fn skip_run_it_runs_one_board() {
        let rules = CustomRules {
            run_it_twice: true,
            ..CustomRules::default()
        };
        let mut e = engine_with(rules, &[("a", 0, 100), ("b", 1, 100)]);
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::AllIn);
        act(&mut e, "b", PlayerAction::AllIn);
        e.start_run_it_prompt().unwrap();
        e.skip_run_it().unwrap();
        assert_eq!(e.phase(), HandPhase::Complete);
        assert_eq!(e.boards().len(), 1);
        assert_eq!(e.boards()[0].len(), 5);
        assert_eq!(total_chips(&e), 200);
    }

    #[test]
    fn rules_and_stakes_updates_stage_during_a_hand() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        let update = RulesUpdate {
            straddle_enabled: Some(true),
            ..RulesUpdate::default()
        };
        e.update_rules(&update);
        assert!(!e.rules().straddle_enabled, "applies at the next hand");

        let new_stakes = Stakes {
            small_blind: 10,
            big_blind: 20,
            ..stakes()
        };
        e.update_stakes(new_stakes).unwrap();
        assert_eq!(e.stakes().big_blind, 10);

        act(&mut e, "a", PlayerAction::Fold);
        e.start_hand(None, false).unwrap();
        assert!(e.rules().straddle_enabled);
        assert_eq!(e.stakes().big_blind, 20);
    }

    #[test]
    fn variant_switch_fails_mid_hand() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        assert_eq!(
            e.switch_variant(Variant::Omaha).unwrap_err(),
            EngineError::SwitchFailed
        );
        act(&mut e, "a", PlayerAction::Fold);
        e.switch_variant(Variant::Omaha).unwrap();
        e.start_hand(None, false).unwrap();
        let hole = e.hole_cards.values().next().unwrap();
        assert_eq!(hole.len(), 4);
    }

    #[test]
    fn unplayable_variant_rejected() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000)]);
        assert_eq!(
            e.switch_variant(Variant::Blackjack).unwrap_err(),
            EngineError::SwitchFailed
        );
    }

    #[test]
    fn start_hand_requires_two_stacks() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 0)]);
        assert_eq!(
            e.start_hand(None, false).unwrap_err(),
            EngineError::NotEnoughPlayers
        );
        assert_eq!(e.phase(), HandPhase::Waiting);
    }

    #[test]
    fn wrong_turn_and_bad_amounts_reject_without_state_change() {
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 1000), ("b", 1, 1000), ("c", 2, 1000)],
        );
        e.start_hand(None, false).unwrap();
        let before = e.state(None);
        assert_eq!(
            e.process_action(&"b".to_string(), PlayerAction::Fold)
                .unwrap_err(),
            EngineError::OutOfTurn
        );
        assert_eq!(
            e.process_action(&"a".to_string(), PlayerAction::Check)
                .unwrap_err(),
            EngineError::InvalidAction,
            "cannot check facing the blind"
        );
        assert_eq!(
            e.process_action(&"a".to_string(), PlayerAction::Raise { amount: 11 })
                .unwrap_err(),
            EngineError::InvalidAmount
        );
        assert_eq!(e.state(None), before);
    }

    #[test]
    fn rebuy_requires_a_busted_stack() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        assert_eq!(
            e.rebuy(&"a".to_string(), 500).unwrap_err(),
            EngineError::HasChips
        );
    }

    #[test]
    fn rebuy_clamps_to_buy_in_bounds() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 0), ("b", 1, 1000)]);
        let credited = e.rebuy(&"a".to_string(), 50_000).unwrap();
        assert_eq!(credited, 10_000);
        assert_eq!(chips_of(&e, "a"), 10_000);
    }

    #[test]
    fn seat_conflicts_rejected() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000)]);
        assert_eq!(
            e.add_player("b".into(), "b".into(), 0, 500).unwrap_err(),
            EngineError::SeatTaken(0)
        );
        assert_eq!(
            e.add_player("a".into(), "a".into(), 1, 500).unwrap_err(),
            EngineError::AlreadySeated
        );
    }

    #[test]
    fn hole_cards_hidden_from_other_viewers() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        let view = e.state(Some(&"a".to_string()));
        let own = view.players.iter().find(|p| p.user_id == "a").unwrap();
        let other = view.players.iter().find(|p| p.user_id == "b").unwrap();
        assert_eq!(own.cards.as_ref().map(Vec::len), Some(2));
        assert!(other.cards.is_none());

        let spectator = e.state(None);
        assert!(spectator.players.iter().all(|p| p.cards.is_none()));
    }

    #[test]
    fn showdown_reveals_surviving_hands() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 100), ("b", 1, 100)]);
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::AllIn);
        act(&mut e, "b", PlayerAction::AllIn);
        assert_eq!(e.phase(), HandPhase::Complete);
        let view = e.state(None);
        assert!(view.players.iter().all(|p| p.cards.is_some()));
        assert!(view.revealed_seed.is_some());
    }

    #[test]
    fn fold_win_keeps_cards_hidden() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::Fold);
        let view = e.state(None);
        assert!(view.players.iter().all(|p| p.cards.is_none()));
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut e = engine_with(CustomRules::default(), &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        let state = e.state(Some(&"a".to_string()));
        let json = serde_json::to_string(&state).unwrap();
        let back: crate::game::view::GameStateView = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn ghost_cards_dealt_on_fold_when_enabled() {
        let rules = CustomRules {
            run_out_on_fold: true,
            ..CustomRules::default()
        };
        let mut e = engine_with(rules, &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        act(&mut e, "a", PlayerAction::Fold);
        let view = e.state(None);
        assert_eq!(view.ghost_cards.len(), 5);
        assert!(view.community_cards.is_empty(), "ghosts never score");
    }

    #[test]
    fn chip_conservation_across_random_hands() {
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 500), ("b", 1, 700), ("c", 2, 900)],
        );
        for _ in 0..30 {
            if e.start_hand(None, false).is_err() {
                break;
            }
            let mut guard = 0;
            while e.is_hand_active() && guard < 100 {
                guard += 1;
                let Some(actor) = e.current_actor() else { break };
                let id = actor.user_id.clone();
                // Rotate through a simple action mix.
                let action = match guard % 4 {
                    0 => PlayerAction::Fold,
                    1 if e.valid_actions(&id).unwrap().check => PlayerAction::Check,
                    1 => PlayerAction::Call,
                    2 => PlayerAction::AllIn,
                    _ if e.valid_actions(&id).unwrap().check => PlayerAction::Check,
                    _ => PlayerAction::Call,
                };
                e.process_action(&id, action).unwrap();
            }
            assert_eq!(total_chips(&e), 2100);
            e.verify_chip_conservation().unwrap();
        }
    }
}
