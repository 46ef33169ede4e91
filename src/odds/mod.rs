//! Betting odds helpers.

pub mod probability;

pub use probability::{best_line_stakes, combined_odds, odds_to_prob, prob_to_odds, StakePlan};
