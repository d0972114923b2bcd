//! Hand evaluation.
//!
//! Ranks any 5-7 card hand by picking the best five-card subset. The total
//! order is a single integer: `class * 15^5 + packed kickers`, where the
//! packed kickers are the chosen five values in descending significance,
//! base 15. Strictly larger value means a strictly better hand; equal
//! values split the pot.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::cards::{Card, Value};

/// Hand class, weakest first. The discriminants are the `rankClass`
/// multiplier of the packed value.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum HandRank {
    HighCard = 1,
    OnePair = 2,
    TwoPair = 3,
    ThreeOfAKind = 4,
    Straight = 5,
    Flush = 6,
    FullHouse = 7,
    FourOfAKind = 8,
    StraightFlush = 9,
    RoyalFlush = 10,
}

impl fmt::Display for HandRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::HighCard => "high card",
            Self::OnePair => "pair",
            Self::TwoPair => "two pair",
            Self::ThreeOfAKind => "three of a kind",
            Self::Straight => "straight",
            Self::Flush => "flush",
            Self::FullHouse => "full house",
            Self::FourOfAKind => "four of a kind",
            Self::StraightFlush => "straight flush",
            Self::RoyalFlush => "royal flush",
        };
        write!(f, "{repr}")
    }
}

/// Kicker base. Must exceed the largest card value (14).
const KICKER_BASE: u64 = 15;
/// Class multiplier, larger than any packable kicker value.
const CLASS_STEP: u64 = KICKER_BASE.pow(5);

/// The outcome of evaluating a hand: class, total-order value, the five
/// cards actually used, and a human-readable description.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandResult {
    pub rank: HandRank,
    pub value: u64,
    pub cards: Vec<Card>,
    pub description: String,
}

impl HandResult {
    #[must_use]
    pub fn beats(&self, other: &Self) -> bool {
        self.value > other.value
    }
}

impl fmt::Display for HandResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description)
    }
}

fn value_name(value: Value) -> &'static str {
    match value {
        14 => "Ace",
        13 => "King",
        12 => "Queen",
        11 => "Jack",
        10 => "Ten",
        9 => "Nine",
        8 => "Eight",
        7 => "Seven",
        6 => "Six",
        5 => "Five",
        4 => "Four",
        3 => "Three",
        2 => "Two",
        _ => "Ace",
    }
}

fn plural(value: Value) -> String {
    let name = value_name(value);
    if value == 6 { format!("{name}es") } else { format!("{name}s") }
}

/// Score exactly five cards. Returns the class and the five kicker values
/// in descending significance.
fn score_five(cards: &[Card; 5]) -> (HandRank, [Value; 5]) {
    let mut values: Vec<Value> = cards.iter().map(Card::value).collect();
    values.sort_unstable_by(|a, b| b.cmp(a));

    let is_flush = cards.iter().all(|c| c.suit() == cards[0].suit());

    // Straight detection; the wheel (A-5-4-3-2) counts the ace as one.
    let is_run = values.windows(2).all(|w| w[0] == w[1] + 1);
    let is_wheel = values == [14, 5, 4, 3, 2];
    let straight_kickers: Option<[Value; 5]> = if is_run {
        Some([values[0], values[1], values[2], values[3], values[4]])
    } else if is_wheel {
        Some([5, 4, 3, 2, 1])
    } else {
        None
    };

    if let Some(kickers) = straight_kickers {
        let rank = if is_flush {
            if kickers[0] == 14 {
                HandRank::RoyalFlush
            } else {
                HandRank::StraightFlush
            }
        } else {
            HandRank::Straight
        };
        return (rank, kickers);
    }

    // Group by value, ordered by (count, value) descending so the defining
    // group comes first and kickers follow.
    let mut counts: Vec<(usize, Value)> = Vec::with_capacity(5);
    for &v in &values {
        match counts.iter_mut().find(|(_, cv)| *cv == v) {
            Some((n, _)) => *n += 1,
            None => counts.push((1, v)),
        }
    }
    counts.sort_unstable_by(|a, b| b.cmp(a));

    let mut kickers = [0u8; 5];
    let mut idx = 0;
    for &(n, v) in &counts {
        for _ in 0..n {
            kickers[idx] = v;
            idx += 1;
        }
    }

    let shape: Vec<usize> = counts.iter().map(|&(n, _)| n).collect();
    let rank = match shape.as_slice() {
        [4, 1] => HandRank::FourOfAKind,
        [3, 2] => HandRank::FullHouse,
        _ if is_flush => HandRank::Flush,
        [3, 1, 1] => HandRank::ThreeOfAKind,
        [2, 2, 1] => HandRank::TwoPair,
        [2, 1, 1, 1] => HandRank::OnePair,
        _ => HandRank::HighCard,
    };
    (rank, kickers)
}

fn pack(rank: HandRank, kickers: [Value; 5]) -> u64 {
    let mut kicker_value: u64 = 0;
    for &k in &kickers {
        kicker_value = kicker_value * KICKER_BASE + u64::from(k);
    }
    rank as u64 * CLASS_STEP + kicker_value
}

fn describe(rank: HandRank, kickers: [Value; 5]) -> String {
    match rank {
        HandRank::RoyalFlush => "royal flush".to_string(),
        HandRank::StraightFlush => {
            format!("straight flush, {} high", value_name(kickers[0]))
        }
        HandRank::FourOfAKind => format!("four of a kind, {}", plural(kickers[0])),
        HandRank::FullHouse => format!(
            "full house, {} over {}",
            plural(kickers[0]),
            plural(kickers[3])
        ),
        HandRank::Flush => format!("flush, {} high", value_name(kickers[0])),
        HandRank::Straight => format!("straight, {} high", value_name(kickers[0])),
        HandRank::ThreeOfAKind => format!("three of a kind, {}", plural(kickers[0])),
        HandRank::TwoPair => format!(
            "two pair, {} and {}",
            plural(kickers[0]),
            plural(kickers[2])
        ),
        HandRank::OnePair => format!("pair of {}", plural(kickers[0])),
        HandRank::HighCard => format!("{} high", value_name(kickers[0])),
    }
}

fn result_for(five: [Card; 5]) -> HandResult {
    let (rank, kickers) = score_five(&five);
    HandResult {
        rank,
        value: pack(rank, kickers),
        cards: five.to_vec(),
        description: describe(rank, kickers),
    }
}

/// Evaluate 5 to 7 cards, returning the best five-card hand.
///
/// # Panics
///
/// Panics if given fewer than 5 or more than 7 cards; both indicate an
/// engine bug, never user input.
#[must_use]
pub fn evaluate(cards: &[Card]) -> HandResult {
    assert!(
        (5..=7).contains(&cards.len()),
        "evaluate requires 5-7 cards, got {}",
        cards.len()
    );
    let mut best: Option<HandResult> = None;
    for_each_five(cards, |five| {
        let result = result_for(five);
        if best.as_ref().is_none_or(|b| result.value > b.value) {
            best = Some(result);
        }
    });
    best.expect("at least one combination")
}

/// Evaluate an Omaha hand: exactly two of the four hole cards combined with
/// exactly three of the five board cards, over all 60 combinations.
#[must_use]
pub fn evaluate_omaha(hole: &[Card], board: &[Card]) -> HandResult {
    assert_eq!(hole.len(), 4, "omaha needs 4 hole cards");
    assert_eq!(board.len(), 5, "omaha needs a full board");
    let mut best: Option<HandResult> = None;
    for h1 in 0..hole.len() {
        for h2 in (h1 + 1)..hole.len() {
            for b1 in 0..board.len() {
                for b2 in (b1 + 1)..board.len() {
                    for b3 in (b2 + 1)..board.len() {
                        let five = [hole[h1], hole[h2], board[b1], board[b2], board[b3]];
                        let result = result_for(five);
                        if best.as_ref().is_none_or(|b| result.value > b.value) {
                            best = Some(result);
                        }
                    }
                }
            }
        }
    }
    best.expect("at least one combination")
}

/// Visit every five-card subset of `cards`.
fn for_each_five<F: FnMut([Card; 5])>(cards: &[Card], mut f: F) {
    let n = cards.len();
    if n == 5 {
        f([cards[0], cards[1], cards[2], cards[3], cards[4]]);
        return;
    }
    let mut idx = [0usize; 5];
    for a in 0..n {
        idx[0] = a;
        for b in (a + 1)..n {
            idx[1] = b;
            for c in (b + 1)..n {
                idx[2] = c;
                for d in (c + 1)..n {
                    idx[3] = d;
                    for e in (d + 1)..n {
                        idx[4] = e;
                        f([cards[a], cards[b], cards[c], cards[d], cards[e]]);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::cards::Suit::{Club, Diamond, Heart, Spade};

    fn hand(codes: &[(Value, crate::game::cards::Suit)]) -> Vec<Card> {
        codes.iter().map(|&(v, s)| Card(v, s)).collect()
    }

    #[test]
    fn royal_flush_beats_straight_flush() {
        let royal = evaluate(&hand(&[
            (14, Spade),
            (13, Spade),
            (12, Spade),
            (11, Spade),
            (10, Spade),
        ]));
        let sf = evaluate(&hand(&[
            (13, Heart),
            (12, Heart),
            (11, Heart),
            (10, Heart),
            (9, Heart),
        ]));
        assert_eq!(royal.rank, HandRank::RoyalFlush);
        assert_eq!(sf.rank, HandRank::StraightFlush);
        assert!(royal.beats(&sf));
    }

    #[test]
    fn wheel_is_a_five_high_straight() {
        let wheel = evaluate(&hand(&[
            (14, Spade),
            (2, Heart),
            (3, Club),
            (4, Diamond),
            (5, Spade),
        ]));
        let six_high = evaluate(&hand(&[
            (2, Heart),
            (3, Club),
            (4, Diamond),
            (5, Spade),
            (6, Spade),
        ]));
        assert_eq!(wheel.rank, HandRank::Straight);
        assert!(six_high.beats(&wheel));
    }

    #[test]
    fn broadway_is_ace_high_straight() {
        let broadway = evaluate(&hand(&[
            (14, Spade),
            (13, Heart),
            (12, Club),
            (11, Diamond),
            (10, Spade),
        ]));
        assert_eq!(broadway.rank, HandRank::Straight);
        assert_eq!(broadway.description, "straight, Ace high");
    }

    #[test]
    fn kickers_break_pair_ties() {
        let aces_king = evaluate(&hand(&[
            (14, Spade),
            (14, Heart),
            (13, Club),
            (9, Diamond),
            (4, Spade),
        ]));
        let aces_queen = evaluate(&hand(&[
            (14, Club),
            (14, Diamond),
            (12, Club),
            (9, Heart),
            (4, Heart),
        ]));
        assert_eq!(aces_king.rank, HandRank::OnePair);
        assert!(aces_king.beats(&aces_queen));
    }

    #[test]
    fn identical_ranks_tie_exactly() {
        let a = evaluate(&hand(&[
            (14, Spade),
            (14, Heart),
            (13, Club),
            (9, Diamond),
            (4, Spade),
        ]));
        let b = evaluate(&hand(&[
            (14, Club),
            (14, Diamond),
            (13, Heart),
            (9, Spade),
            (4, Heart),
        ]));
        assert_eq!(a.value, b.value);
    }

    #[test]
    fn full_house_beats_flush() {
        let boat = evaluate(&hand(&[
            (9, Spade),
            (9, Heart),
            (9, Club),
            (4, Diamond),
            (4, Spade),
        ]));
        let flush = evaluate(&hand(&[
            (14, Heart),
            (11, Heart),
            (9, Heart),
            (6, Heart),
            (2, Heart),
        ]));
        assert!(boat.beats(&flush));
        assert_eq!(boat.description, "full house, Nines over Fours");
    }

    #[test]
    fn seven_cards_pick_the_best_five() {
        // Nines full of deuces hides inside seven cards that also hold
        // two pair and a king kicker.
        let result = evaluate(&hand(&[
            (9, Spade),
            (9, Heart),
            (9, Club),
            (2, Diamond),
            (2, Spade),
            (13, Heart),
            (7, Club),
        ]));
        assert_eq!(result.rank, HandRank::FullHouse);
        assert_eq!(result.cards.len(), 5);
    }

    #[test]
    fn six_card_flush_uses_highest_five() {
        let result = evaluate(&hand(&[
            (14, Club),
            (12, Club),
            (9, Club),
            (7, Club),
            (4, Club),
            (2, Club),
        ]));
        assert_eq!(result.rank, HandRank::Flush);
        assert!(result.cards.iter().all(|c| c.value() != 2));
    }

    #[test]
    fn omaha_must_use_exactly_two_hole_cards() {
        // Four hearts on board, one in hole: not a flush in Omaha.
        let hole = hand(&[(14, Heart), (9, Spade), (4, Club), (2, Diamond)]);
        let board = hand(&[
            (13, Heart),
            (11, Heart),
            (8, Heart),
            (6, Heart),
            (3, Spade),
        ]);
        let result = evaluate_omaha(&hole, &board);
        assert_ne!(result.rank, HandRank::Flush);
    }

    #[test]
    fn omaha_finds_the_best_combination() {
        let hole = hand(&[(14, Spade), (14, Heart), (13, Club), (2, Diamond)]);
        let board = hand(&[(14, Club), (9, Heart), (9, Spade), (5, Diamond), (3, Club)]);
        let result = evaluate_omaha(&hole, &board);
        assert_eq!(result.rank, HandRank::FullHouse);
    }

    #[test]
    fn class_step_exceeds_any_kicker_packing() {
        let max_kickers = pack(HandRank::HighCard, [14, 14, 14, 14, 14]) - CLASS_STEP;
        assert!(max_kickers < CLASS_STEP);
    }

    #[test]
    fn quads_kicker_matters() {
        let quads_ace = evaluate(&hand(&[
            (9, Spade),
            (9, Heart),
            (9, Club),
            (9, Diamond),
            (14, Spade),
        ]));
        let quads_king = evaluate(&hand(&[
            (9, Spade),
            (9, Heart),
            (9, Club),
            (9, Diamond),
            (13, Spade),
        ]));
        assert!(quads_ace.beats(&quads_king));
    }

    #[test]
    fn two_pair_description_orders_pairs() {
        let result = evaluate(&hand(&[
            (14, Spade),
            (14, Heart),
            (4, Club),
            (4, Diamond),
            (9, Spade),
        ]));
        assert_eq!(result.description, "two pair, Aces and Fours");
    }
}
