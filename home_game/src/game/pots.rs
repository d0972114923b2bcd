//! Pot tiers.
//!
//! Side pots are not tracked incrementally. They are rebuilt at resolution
//! time from the complete per-seat contribution vector, by peeling
//! contribution levels from the smallest non-folded stake upward. Folded
//! players' chips stay in whatever tier they reach; folded players are
//! never eligible to win.

use serde::{Deserialize, Serialize};

use super::player::UserId;
use super::rules::Chips;

/// One pot tier: its chips and the players who can win it.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SidePot {
    pub amount: Chips,
    pub eligible_player_ids: Vec<UserId>,
}

/// A contribution record for pot construction.
#[derive(Clone, Debug)]
pub struct Contribution {
    pub user_id: UserId,
    pub amount: Chips,
    pub folded: bool,
}

/// Build the ordered pot tiers (main pot first) from the hand's complete
/// contribution vector.
///
/// Each distinct non-folded contribution level seals one tier: every
/// contributor (folded or not) pays `level - previous_level` capped by what
/// they have left, and the tier's winners are the non-folded players at or
/// above the level. Any folded chips above the top live level are swept
/// into the last tier so no chip can leak.
#[must_use]
pub fn build_pots(contributions: &[Contribution]) -> Vec<SidePot> {
    let mut levels: Vec<Chips> = contributions
        .iter()
        .filter(|c| !c.folded && c.amount > 0)
        .map(|c| c.amount)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots = Vec::with_capacity(levels.len());
    let mut prev = 0;
    for &level in &levels {
        let slice = level - prev;
        let mut amount = 0;
        for c in contributions {
            let above_prev = c.amount.saturating_sub(prev);
            amount += above_prev.min(slice);
        }
        let eligible_player_ids: Vec<UserId> = contributions
            .iter()
            .filter(|c| !c.folded && c.amount >= level)
            .map(|c| c.user_id.clone())
            .collect();
        pots.push(SidePot {
            amount,
            eligible_player_ids,
        });
        prev = level;
    }

    // Folded chips above the top live level (a bet nobody matched before
    // the bettor folded) land in the last tier.
    let residual: Chips = contributions
        .iter()
        .map(|c| c.amount.saturating_sub(prev))
        .sum();
    if residual > 0 {
        if let Some(last) = pots.last_mut() {
            last.amount += residual;
        }
    }

    pots
}

/// Split `amount` between `winners` (already ordered clockwise from the
/// dealer). Remainder chips go to the earliest seat.
#[must_use]
pub fn split_between(amount: Chips, winners: &[UserId]) -> Vec<(UserId, Chips)> {
    if winners.is_empty() {
        return Vec::new();
    }
    let count = winners.len() as Chips;
    let share = amount / count;
    let remainder = amount % count;
    winners
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let extra = if i == 0 { remainder } else { 0 };
            (id.clone(), share + extra)
        })
        .collect()
}
