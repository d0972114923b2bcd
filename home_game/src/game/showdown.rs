//! Hand resolution: fold-outs, showdowns, multi-board awards, and the 7-2
//! side bonus.

use log::debug;
use std::collections::HashMap;

use super::engine::HandEngine;
use super::errors::EngineError;
use super::eval::HandResult;
use super::player::{SeatIndex, UserId};
use super::pots::{self, Contribution};
use super::rules::Chips;
use super::variant::{HandPhase, VariantRules};
use super::view::{BonusPayment, PotKind, SevenDeuceBonus, Winner};

impl HandEngine {
    /// The hand ended with a single unfolded player: they take every pot,
    /// antes and straddles included, without showing.
    pub(crate) fn resolve_fold_out(&mut self) -> Result<(), EngineError> {
        self.collect_street_bets();
        self.current_seat = None;

        let winner_idx = self
            .players
            .iter()
            .position(|p| p.in_hand())
            .ok_or(EngineError::InvalidAction)?;
        let amount = self.pot;
        self.players[winner_idx].chips += amount;
        self.pot = 0;
        self.winners.push(Winner {
            player_id: self.players[winner_idx].user_id.clone(),
            amount,
            hand_result: None,
            pot_type: PotKind::Main,
            pot_index: None,
            won_by_fold: true,
            board_index: None,
        });

        if self.rules.run_out_on_fold && self.boards[0].len() < 5 {
            // Ghost cards show what the board would have been. They are
            // display-only and never score.
            let remaining = 5 - self.boards[0].len();
            self.ghost_cards = self
                .deck
                .deal_run_out(remaining, 1)
                .pop()
                .unwrap_or_default();
        }

        self.showdown_reveal = false;
        self.phase = HandPhase::Complete;
        debug!(
            "hand {} won by fold: {} takes {}",
            self.hand_number, self.winners[0].player_id, amount
        );
        Ok(())
    }

    /// Score every surviving hand against each board and pay out every pot
    /// tier independently.
    pub(crate) fn resolve_showdown(&mut self) -> Result<(), EngineError> {
        self.collect_street_bets();
        self.current_seat = None;
        self.phase = HandPhase::Showdown;
        self.showdown_reveal = true;

        // Contribution vector in seat order; folded chips stay in the pot
        // but fold out of eligibility.
        let contributions: Vec<Contribution> = self
            .players
            .iter()
            .filter_map(|p| {
                self.contributions.get(&p.user_id).map(|&amount| Contribution {
                    user_id: p.user_id.clone(),
                    amount,
                    folded: !p.in_hand(),
                })
            })
            .collect();
        self.side_pots = pots::build_pots(&contributions);

        let num_boards = self.boards.len();
        let mut evals: Vec<HashMap<UserId, HandResult>> = Vec::with_capacity(num_boards);
        for board in &self.boards {
            let mut scored = HashMap::new();
            for p in self.players.iter().filter(|p| p.in_hand()) {
                if let Some(hole) = self.hole_cards.get(&p.user_id) {
                    scored.insert(p.user_id.clone(), self.strategy.evaluate_hand(hole, board));
                }
            }
            evals.push(scored);
        }

        let tiers = self.side_pots.clone();
        for (pot_idx, tier) in tiers.iter().enumerate() {
            let base = tier.amount / num_boards as Chips;
            let remainder = tier.amount % num_boards as Chips;
            for (board_idx, scored) in evals.iter().enumerate() {
                let share = base + if board_idx == 0 { remainder } else { 0 };
                if share == 0 {
                    continue;
                }
                let best = tier
                    .eligible_player_ids
                    .iter()
                    .filter_map(|id| scored.get(id).map(|r| r.value))
                    .max();
                let Some(best) = best else { continue };
                let mut winner_ids: Vec<UserId> = tier
                    .eligible_player_ids
                    .iter()
                    .filter(|id| scored.get(*id).is_some_and(|r| r.value == best))
                    .cloned()
                    .collect();
                self.order_clockwise_from_dealer(&mut winner_ids);

                for (user_id, amount) in pots::split_between(share, &winner_ids) {
                    if let Some(p) = self.players.iter_mut().find(|p| p.user_id == user_id) {
                        p.chips += amount;
                    }
                    self.winners.push(Winner {
                        hand_result: scored.get(&user_id).cloned(),
                        player_id: user_id,
                        amount,
                        pot_type: if pot_idx == 0 {
                            PotKind::Main
                        } else {
                            PotKind::Side
                        },
                        pot_index: (pot_idx > 0).then_some(pot_idx),
                        won_by_fold: false,
                        board_index: (num_boards > 1).then_some(board_idx),
                    });
                }
            }
        }
        self.pot = 0;

        self.collect_seven_deuce_bonus();

        self.phase = HandPhase::Complete;
        debug!(
            "hand {} showdown paid {} winner entries across {} board(s)",
            self.hand_number,
            self.winners.len(),
            num_boards
        );
        Ok(())
    }

    /// When a lone winner took the hand down at showdown holding 7-2, every
    /// other seat dealt into the hand pays the bonus, busted stacks paying
    /// what they can.
    fn collect_seven_deuce_bonus(&mut self) {
        if !self.rules.seven_deuce || self.rules.seven_deuce_bonus == 0 {
            return;
        }
        let mut winner_ids: Vec<&UserId> = self.winners.iter().map(|w| &w.player_id).collect();
        winner_ids.sort();
        winner_ids.dedup();
        let [single] = winner_ids.as_slice() else {
            return;
        };
        let winner_id = (*single).clone();
        let Some(hole) = self.hole_cards.get(&winner_id) else {
            return;
        };
        let mut values: Vec<u8> = hole.iter().map(|c| c.value()).collect();
        values.sort_unstable();
        if values != [2, 7] {
            return;
        }

        let bonus = self.rules.seven_deuce_bonus;
        let mut payments = Vec::new();
        let mut total = 0;
        for p in &mut self.players {
            if p.user_id == winner_id || !p.dealt_in {
                continue;
            }
            let amount = bonus.min(p.chips);
            p.chips -= amount;
            total += amount;
            payments.push(BonusPayment {
                player_id: p.user_id.clone(),
                amount,
            });
        }
        if let Some(w) = self.players.iter_mut().find(|p| p.user_id == winner_id) {
            w.chips += total;
        }
        self.seven_deuce = Some(SevenDeuceBonus {
            winner_id,
            total,
            payments,
        });
    }

    /// Order user ids by seat, earliest clockwise from the dealer first.
    fn order_clockwise_from_dealer(&self, ids: &mut [UserId]) {
        let seats: HashMap<&UserId, SeatIndex> = self
            .players
            .iter()
            .map(|p| (&p.user_id, p.seat))
            .collect();
        let dealer = self.dealer_seat;
        let span = self
            .players
            .iter()
            .map(|p| p.seat)
            .max()
            .unwrap_or(dealer)
            + 1;
        ids.sort_by_key(|id| {
            let seat = seats.get(id).copied().unwrap_or(dealer);
            (seat + span - dealer - 1) % span.max(1)
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::game::cards::{Card, Suit};
    use crate::game::engine::{HandEngine, PlayerAction};
    use crate::game::rules::{Chips, CustomRules, Stakes};
    use crate::game::variant::{HandPhase, Variant};

    fn engine_with(rules: CustomRules, seats: &[(&str, usize, Chips)]) -> HandEngine {
        let stakes = Stakes {
            small_blind: 5,
            big_blind: 10,
            ante: 0,
            min_buy_in: 100,
            max_buy_in: 10_000,
        };
        let mut engine = HandEngine::new(Variant::TexasHoldem, stakes, rules, 10).unwrap();
        for &(id, seat, chips) in seats {
            engine
                .add_player(id.to_string(), id.to_string(), seat, chips)
                .unwrap();
        }
        engine
    }

    fn act(engine: &mut HandEngine, id: &str, action: PlayerAction) {
        engine.process_action(&id.to_string(), action).unwrap();
    }

    fn check_around(engine: &mut HandEngine, order: &[&str]) {
        for id in order {
            act(engine, id, PlayerAction::Check);
        }
    }

    #[test]
    fn seven_deuce_winner_collects_from_every_dealt_seat() {
        let rules = CustomRules {
            seven_deuce: true,
            seven_deuce_bonus: 25,
            ..CustomRules::default()
        };
        let mut e = engine_with(rules, &[("a", 0, 1000), ("b", 1, 1000), ("c", 2, 1000)]);
        e.start_hand(None, false).unwrap();

        // Limp to the flop, check to the river.
        act(&mut e, "a", PlayerAction::Call);
        act(&mut e, "b", PlayerAction::Call);
        act(&mut e, "c", PlayerAction::Check);
        check_around(&mut e, &["b", "c", "a"]);
        check_around(&mut e, &["b", "c", "a"]);
        assert_eq!(e.phase(), HandPhase::River);

        // Rig the showdown: seat 0 holds 7-2 and fills up.
        e.override_board_for_test(
            0,
            vec![
                Card(7, Suit::Diamond),
                Card(7, Suit::Heart),
                Card(2, Suit::Club),
                Card(13, Suit::Spade),
                Card(12, Suit::Spade),
            ],
        );
        e.override_hole_cards(&"a".to_string(), vec![Card(7, Suit::Spade), Card(2, Suit::Diamond)]);
        e.override_hole_cards(&"b".to_string(), vec![Card(8, Suit::Club), Card(4, Suit::Diamond)]);
        e.override_hole_cards(&"c".to_string(), vec![Card(9, Suit::Club), Card(3, Suit::Diamond)]);
        check_around(&mut e, &["b", "c", "a"]);

        assert_eq!(e.phase(), HandPhase::Complete);
        let bonus = e.seven_deuce_bonus().expect("bonus fires");
        assert_eq!(bonus.winner_id, "a");
        assert_eq!(bonus.total, 50);
        assert_eq!(bonus.payments.len(), 2);
        assert!(bonus.payments.iter().all(|p| p.amount == 25));

        // Pot of 30 plus two bonus payments of 25.
        assert_eq!(e.player(&"a".to_string()).unwrap().chips, 1070);
        assert_eq!(e.player(&"b".to_string()).unwrap().chips, 965);
        assert_eq!(e.player(&"c".to_string()).unwrap().chips, 965);
    }

    #[test]
    fn seven_deuce_not_triggered_on_fold_out() {
        let rules = CustomRules {
            seven_deuce: true,
            seven_deuce_bonus: 25,
            ..CustomRules::default()
        };
        let mut e = engine_with(rules, &[("a", 0, 1000), ("b", 1, 1000)]);
        e.start_hand(None, false).unwrap();
        e.override_hole_cards(&"b".to_string(), vec![Card(7, Suit::Spade), Card(2, Suit::Diamond)]);
        act(&mut e, "a", PlayerAction::Fold);
        assert_eq!(e.phase(), HandPhase::Complete);
        assert!(e.seven_deuce_bonus().is_none());
        assert!(e.winners()[0].won_by_fold);
    }

    #[test]
    fn dual_board_splits_pot_with_odd_chip_to_board_one() {
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 1000), ("b", 1, 1000), ("c", 2, 1000)],
        );
        // 3 x 33 ante leaves an odd 99-chip pot across two boards.
        e.start_hand(Some(33), true).unwrap();
        assert_eq!(e.phase(), HandPhase::Flop);
        check_around(&mut e, &["b", "c", "a"]);
        check_around(&mut e, &["b", "c", "a"]);
        assert_eq!(e.phase(), HandPhase::River);

        e.override_board_for_test(
            0,
            vec![
                Card(2, Suit::Club),
                Card(3, Suit::Diamond),
                Card(9, Suit::Spade),
                Card(13, Suit::Heart),
                Card(12, Suit::Diamond),
            ],
        );
        e.override_board_for_test(
            1,
            vec![
                Card(8, Suit::Club),
                Card(9, Suit::Diamond),
                Card(10, Suit::Heart),
                Card(11, Suit::Spade),
                Card(4, Suit::Spade),
            ],
        );
        e.override_hole_cards(&"a".to_string(), vec![Card(14, Suit::Spade), Card(14, Suit::Club)]);
        e.override_hole_cards(&"b".to_string(), vec![Card(12, Suit::Club), Card(7, Suit::Heart)]);
        e.override_hole_cards(&"c".to_string(), vec![Card(6, Suit::Diamond), Card(5, Suit::Diamond)]);
        check_around(&mut e, &["b", "c", "a"]);

        assert_eq!(e.phase(), HandPhase::Complete);
        let board0: Vec<_> = e
            .winners()
            .iter()
            .filter(|w| w.board_index == Some(0))
            .collect();
        let board1: Vec<_> = e
            .winners()
            .iter()
            .filter(|w| w.board_index == Some(1))
            .collect();
        assert_eq!(board0.len(), 1);
        assert_eq!(board0[0].player_id, "a");
        assert_eq!(board0[0].amount, 50, "board one takes the odd chip");
        assert_eq!(board1.len(), 1);
        assert_eq!(board1[0].player_id, "b");
        assert_eq!(board1[0].amount, 49);

        let total: Chips = e.players().iter().map(|p| p.chips).sum();
        assert_eq!(total, 3000);
    }

    #[test]
    fn split_pot_remainder_goes_to_earliest_seat_after_dealer() {
        let mut e = engine_with(
            CustomRules::default(),
            &[("a", 0, 1000), ("b", 1, 1000), ("c", 2, 1000)],
        );
        e.start_hand(None, false).unwrap();
        // The folded small blind leaves an odd 25-chip pot for the chop.
        act(&mut e, "a", PlayerAction::Call);
        act(&mut e, "b", PlayerAction::Fold);
        act(&mut e, "c", PlayerAction::Check);
        check_around(&mut e, &["c", "a"]);
        check_around(&mut e, &["c", "a"]);
        assert_eq!(e.phase(), HandPhase::River);

        // Both survivors play the board.
        e.override_board_for_test(
            0,
            vec![
                Card(14, Suit::Spade),
                Card(13, Suit::Spade),
                Card(12, Suit::Spade),
                Card(11, Suit::Spade),
                Card(10, Suit::Spade),
            ],
        );
        e.override_hole_cards(&"a".to_string(), vec![Card(2, Suit::Club), Card(3, Suit::Club)]);
        e.override_hole_cards(&"c".to_string(), vec![Card(2, Suit::Heart), Card(3, Suit::Heart)]);
        check_around(&mut e, &["c", "a"]);

        assert_eq!(e.phase(), HandPhase::Complete);
        let amount_of = |id: &str| -> Chips {
            e.winners()
                .iter()
                .filter(|w| w.player_id == id)
                .map(|w| w.amount)
                .sum()
        };
        // Seat 2 sits closer clockwise to the seat-0 dealer than seat 0
        // itself, so it takes the odd chip of the 25-chip pot.
        assert_eq!(amount_of("c"), 13);
        assert_eq!(amount_of("a"), 12);
    }
}
