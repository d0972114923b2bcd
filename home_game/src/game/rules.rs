//! Table stakes and house rules.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type alias for chip amounts. Whole chips only; a game whose total
/// surpasses ~4.2 billion chips has bigger problems than overflow.
pub type Chips = u32;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stakes {
    pub small_blind: Chips,
    pub big_blind: Chips,
    #[serde(default)]
    pub ante: Chips,
    pub min_buy_in: Chips,
    pub max_buy_in: Chips,
}

impl Default for Stakes {
    fn default() -> Self {
        Self {
            small_blind: 5,
            big_blind: 10,
            ante: 0,
            min_buy_in: 200,
            max_buy_in: 2_000,
        }
    }
}

impl Stakes {
    /// Either blind may be zero (disabled), but buy-in bounds must be
    /// ordered and the big blind must not be smaller than the small blind.
    pub fn validate(&self) -> Result<(), String> {
        if self.big_blind < self.small_blind {
            return Err("big blind must be at least the small blind".to_string());
        }
        if self.min_buy_in > self.max_buy_in {
            return Err("min buy-in must not exceed max buy-in".to_string());
        }
        Ok(())
    }

    /// Minimum opening bet on a street: the big blind, falling back to the
    /// ante when blinds are disabled, and to one chip as a last resort.
    #[must_use]
    pub fn min_bet(&self) -> Chips {
        if self.big_blind > 0 {
            self.big_blind
        } else if self.ante > 0 {
            self.ante
        } else {
            1
        }
    }

    #[must_use]
    pub fn clamp_buy_in(&self, amount: Chips) -> Chips {
        amount.clamp(self.min_buy_in, self.max_buy_in)
    }
}

impl fmt::Display for Stakes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.small_blind, self.big_blind)
    }
}

/// House rules a room's host can toggle. Everything here is consulted by
/// the engine or the orchestrator; toggles made mid-hand apply at the next
/// hand start.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomRules {
    pub run_it_twice: bool,
    pub run_it_thrice: bool,
    pub run_out_on_fold: bool,

    pub bomb_pot_enabled: bool,
    pub bomb_pot_amount: Chips,
    pub bomb_pot_double_board: bool,

    pub straddle_enabled: bool,
    pub multiple_straddles_allowed: bool,
    pub max_straddles: usize,

    pub turn_time_enabled: bool,
    pub turn_time_seconds: u64,
    pub warning_time_seconds: u64,

    pub seven_deuce: bool,
    pub seven_deuce_bonus: Chips,

    pub wait_for_all_rebuys: bool,
}

impl Default for CustomRules {
    fn default() -> Self {
        Self {
            run_it_twice: false,
            run_it_thrice: false,
            run_out_on_fold: false,
            bomb_pot_enabled: false,
            bomb_pot_amount: 0,
            bomb_pot_double_board: false,
            straddle_enabled: false,
            multiple_straddles_allowed: false,
            max_straddles: 1,
            turn_time_enabled: true,
            turn_time_seconds: 30,
            warning_time_seconds: 10,
            seven_deuce: false,
            seven_deuce_bonus: 0,
            wait_for_all_rebuys: false,
        }
    }
}

impl CustomRules {
    /// How many straddles the chain may hold this hand.
    #[must_use]
    pub fn straddle_cap(&self) -> usize {
        if !self.straddle_enabled {
            0
        } else if self.multiple_straddles_allowed {
            self.max_straddles.max(1)
        } else {
            1
        }
    }

    /// Downgrade a run-it choice to the strongest enabled option.
    #[must_use]
    pub fn clamp_run_it_choice(&self, choice: u8) -> u8 {
        match choice {
            3 if self.run_it_thrice => 3,
            3 | 2 if self.run_it_twice => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn run_it_allowed(&self) -> bool {
        self.run_it_twice || self.run_it_thrice
    }
}

/// A partial rules update; `None` fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulesUpdate {
    pub run_it_twice: Option<bool>,
    pub run_it_thrice: Option<bool>,
    pub run_out_on_fold: Option<bool>,
    pub bomb_pot_enabled: Option<bool>,
    pub bomb_pot_amount: Option<Chips>,
    pub bomb_pot_double_board: Option<bool>,
    pub straddle_enabled: Option<bool>,
    pub multiple_straddles_allowed: Option<bool>,
    pub max_straddles: Option<usize>,
    pub turn_time_enabled: Option<bool>,
    pub turn_time_seconds: Option<u64>,
    pub warning_time_seconds: Option<u64>,
    pub seven_deuce: Option<bool>,
    pub seven_deuce_bonus: Option<Chips>,
    pub wait_for_all_rebuys: Option<bool>,
}

impl RulesUpdate {
    pub fn apply_to(&self, rules: &mut CustomRules) {
        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field.clone() {
                    rules.$field = value;
                })*
            };
        }
        merge!(
            run_it_twice,
            run_it_thrice,
            run_out_on_fold,
            bomb_pot_enabled,
            bomb_pot_amount,
            bomb_pot_double_board,
            straddle_enabled,
            multiple_straddles_allowed,
            max_straddles,
            turn_time_enabled,
            turn_time_seconds,
            warning_time_seconds,
            seven_deuce,
            seven_deuce_bonus,
            wait_for_all_rebuys,
        );
    }
}
