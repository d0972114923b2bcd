//! Cards and the deck.
//!
//! The deck is shuffled with a committed per-hand seed: the server draws a
//! fresh 32-byte seed from the system CSPRNG, publishes the SHA-256 of that
//! seed before any card is dealt, and reveals the seed itself once the hand
//! completes so clients can replay the shuffle.

use rand::{RngCore, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{collections::VecDeque, fmt};

use super::constants::DECK_SIZE;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Diamond,
    Heart,
    Spade,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Diamond, Suit::Heart, Suit::Spade];

    fn code(self) -> char {
        match self {
            Self::Club => 'C',
            Self::Diamond => 'D',
            Self::Heart => 'H',
            Self::Spade => 'S',
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Diamond => "♦",
            Self::Heart => "♥",
            Self::Spade => "♠",
        };
        write!(f, "{repr}")
    }
}

/// Card value, 2..=14 with ace high.
pub type Value = u8;

pub const VALUE_MIN: Value = 2;
pub const VALUE_ACE: Value = 14;

/// A card is a tuple of a value (2..=14, ace = 14) and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl Card {
    /// Canonical two-character key, e.g. `"AS"` or `"TD"`. Used as the
    /// equality key on the wire.
    #[must_use]
    pub fn code(&self) -> String {
        format!("{}{}", value_char(self.0), self.1.code())
    }

    #[must_use]
    pub fn value(&self) -> Value {
        self.0
    }

    #[must_use]
    pub fn suit(&self) -> Suit {
        self.1
    }
}

fn value_char(value: Value) -> char {
    match value {
        14 => 'A',
        13 => 'K',
        12 => 'Q',
        11 => 'J',
        10 => 'T',
        v => (b'0' + v) as char,
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            14 => "A".to_string(),
            13 => "K".to_string(),
            12 => "Q".to_string(),
            11 => "J".to_string(),
            v => v.to_string(),
        };
        write!(f, "{value}{}", self.1)
    }
}

/// Draw a uniform index in `[0, bound)` by rejection sampling over the
/// minimum number of random bytes, so no modulo bias can leak into the
/// shuffle.
fn random_below<R: RngCore>(rng: &mut R, bound: usize) -> usize {
    debug_assert!(bound >= 1);
    if bound == 1 {
        return 0;
    }
    let bits = usize::BITS - (bound - 1).leading_zeros();
    let num_bytes = bits.div_ceil(8) as usize;
    let mask: u64 = (1u64 << bits) - 1;
    let mut buf = [0u8; 8];
    loop {
        rng.fill_bytes(&mut buf[..num_bytes]);
        let mut value: u64 = 0;
        for &byte in &buf[..num_bytes] {
            value = (value << 8) | u64::from(byte);
        }
        value &= mask;
        if (value as usize) < bound {
            return value as usize;
        }
    }
}

/// Fisher-Yates from the top index downward.
fn fisher_yates<R: RngCore>(cards: &mut [Card], rng: &mut R) {
    for i in (1..cards.len()).rev() {
        let j = random_below(rng, i + 1);
        cards.swap(i, j);
    }
}

/// An ordered card sequence with dealt and burn piles.
///
/// Invariant: `remaining + dealt + burned == 52 * num_decks`.
#[derive(Clone, Debug)]
pub struct Deck {
    remaining: VecDeque<Card>,
    dealt: Vec<Card>,
    burned: Vec<Card>,
    seed: [u8; 32],
    hand_id: String,
    num_decks: usize,
}

impl Default for Deck {
    fn default() -> Self {
        let mut deck = Self {
            remaining: VecDeque::with_capacity(DECK_SIZE),
            dealt: Vec::with_capacity(DECK_SIZE),
            burned: Vec::with_capacity(4),
            seed: [0u8; 32],
            hand_id: String::new(),
            num_decks: 1,
        };
        deck.reset(1);
        deck
    }
}

impl Deck {
    #[must_use]
    pub fn new_shuffled() -> Self {
        Self::default()
    }

    /// Rebuild and shuffle the deck for a new hand: fresh seed, fresh hand
    /// id, seven independent Fisher-Yates passes, then a random cut at a
    /// position uniformly drawn from the middle 80% of the deck.
    pub fn reset(&mut self, num_decks: usize) {
        let num_decks = num_decks.max(1);
        let mut entropy = rand::rng();
        entropy.fill_bytes(&mut self.seed);

        let mut id_bytes = [0u8; 8];
        entropy.fill_bytes(&mut id_bytes);
        self.hand_id = hex::encode(id_bytes);
        self.num_decks = num_decks;

        let mut cards = Vec::with_capacity(DECK_SIZE * num_decks);
        for _ in 0..num_decks {
            for value in VALUE_MIN..=VALUE_ACE {
                for suit in Suit::ALL {
                    cards.push(Card(value, suit));
                }
            }
        }

        let mut rng = StdRng::from_seed(self.seed);
        for _ in 0..7 {
            fisher_yates(&mut cards, &mut rng);
        }
        let n = cards.len();
        let margin = n / 10;
        let cut = margin + random_below(&mut rng, n - 2 * margin);
        cards.rotate_left(cut);

        self.remaining = cards.into();
        self.dealt.clear();
        self.burned.clear();
    }

    /// Deal the top card. `None` means the deck is exhausted, which callers
    /// must treat as a fatal engine bug: a correctly sized hand never draws
    /// more than the deck holds.
    pub fn deal(&mut self) -> Option<Card> {
        let card = self.remaining.pop_front()?;
        self.dealt.push(card);
        Some(card)
    }

    /// Deal `k` cards; returns fewer if the deck runs dry.
    pub fn deal_n(&mut self, k: usize) -> Vec<Card> {
        let mut cards = Vec::with_capacity(k);
        for _ in 0..k {
            match self.deal() {
                Some(card) => cards.push(card),
                None => break,
            }
        }
        cards
    }

    /// Discard the top card face-down.
    pub fn burn(&mut self) -> Option<Card> {
        let card = self.remaining.pop_front()?;
        self.burned.push(card);
        Some(card)
    }

    /// Shuffle the cards still in the deck; dealt and burned piles stay out.
    pub fn reshuffle(&mut self) {
        let mut rng = rand::rng();
        let mut cards: Vec<Card> = self.remaining.drain(..).collect();
        fisher_yates(&mut cards, &mut rng);
        self.remaining = cards.into();
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }

    /// Look at the next `k` cards without dealing them.
    #[must_use]
    pub fn peek_next(&self, k: usize) -> Vec<Card> {
        self.remaining.iter().take(k).copied().collect()
    }

    /// Deal the run-out boards for run-it-multiple resolution: for each
    /// board, burn one and deal `cards_per_board`.
    pub fn deal_run_out(&mut self, cards_per_board: usize, num_boards: usize) -> Vec<Vec<Card>> {
        let mut boards = Vec::with_capacity(num_boards);
        for _ in 0..num_boards {
            let _ = self.burn();
            boards.push(self.deal_n(cards_per_board));
        }
        boards
    }

    /// SHA-256 of the current seed, hex-encoded. Published before any card
    /// of the hand is shown.
    #[must_use]
    pub fn seed_commitment(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.seed);
        hex::encode(hasher.finalize())
    }

    /// The seed itself, hex-encoded. Only published once the hand is over.
    #[must_use]
    pub fn reveal_seed(&self) -> String {
        hex::encode(self.seed)
    }

    #[must_use]
    pub fn hand_id(&self) -> &str {
        &self.hand_id
    }

    /// Total cards across all piles. Anything other than `52 * num_decks`
    /// means a card leaked.
    #[must_use]
    pub fn total_cards(&self) -> usize {
        self.remaining.len() + self.dealt.len() + self.burned.len()
    }

    #[must_use]
    pub fn expected_cards(&self) -> usize {
        DECK_SIZE * self.num_decks
    }
}
