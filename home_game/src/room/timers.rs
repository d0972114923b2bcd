//! Per-room timer bookkeeping.
//!
//! All deadlines are monotonic `tokio::time::Instant`s owned by the room
//! actor and observed from its one-second tick; dropping the actor drops
//! every outstanding timer, so nothing can fire on a closed room. The only
//! wall-clock value is the rebuy prompt's client-visible `timeout_at`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::time::Instant;

use crate::game::player::{SeatIndex, UserId};
use crate::net::events::RebuyDecision;

#[derive(Clone, Debug)]
pub struct TurnTimer {
    pub user_id: UserId,
    pub seat: SeatIndex,
    pub deadline: Instant,
    /// The base countdown expired and the warning extension is running.
    pub warned: bool,
}

#[derive(Clone, Debug)]
pub struct StraddleTimer {
    pub user_id: UserId,
    pub seat: SeatIndex,
    pub deadline: Instant,
}

#[derive(Clone, Debug)]
pub struct RunItTimer {
    pub deadline: Instant,
}

#[derive(Clone, Debug)]
pub struct RebuyBarrier {
    pub decisions: HashMap<UserId, RebuyDecision>,
    pub deadline: Instant,
    pub timeout_at: DateTime<Utc>,
}

impl RebuyBarrier {
    #[must_use]
    pub fn listed(&self, user_id: &UserId) -> bool {
        self.decisions.contains_key(user_id)
    }

    #[must_use]
    pub fn all_decided(&self) -> bool {
        self.decisions
            .values()
            .all(|d| !matches!(d, RebuyDecision::Pending))
    }
}

#[derive(Clone, Debug)]
pub struct NextHandTimer {
    pub deadline: Instant,
}

/// The five timer slots a room can hold. At most one of each exists.
#[derive(Debug, Default)]
pub struct Timers {
    pub turn: Option<TurnTimer>,
    pub straddle: Option<StraddleTimer>,
    pub run_it: Option<RunItTimer>,
    pub rebuy: Option<RebuyBarrier>,
    pub next_hand: Option<NextHandTimer>,
}

impl Timers {
    pub fn cancel_all(&mut self) {
        self.turn = None;
        self.straddle = None;
        self.run_it = None;
        self.rebuy = None;
        self.next_hand = None;
    }

    /// Cancel everything scoped to the hand in progress; the rebuy barrier
    /// and next-hand schedule live between hands and survive.
    pub fn cancel_hand_timers(&mut self) {
        self.turn = None;
        self.straddle = None;
        self.run_it = None;
    }
}

/// Whole seconds until `deadline`, rounded up, zero once passed.
#[must_use]
pub fn secs_until(now: Instant, deadline: Instant) -> u64 {
    deadline
        .checked_duration_since(now)
        .map_or(0, |d| d.as_secs_f64().ceil() as u64)
}
