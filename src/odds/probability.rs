//! Conversions between fractional odds and implied probability.
//!
//! Odds here are the net return per unit staked (evens = 1.0), so the implied
//! probability of odds `o` is `1 / (o + 1)`.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{Error, Result};

/// Implied probability of each price.
pub fn odds_to_prob(odds: &[f64]) -> Vec<f64> {
    odds.iter().map(|o| 1.0 / (o + 1.0)).collect()
}

/// Price implied by each probability.
pub fn prob_to_odds(probs: &[f64]) -> Vec<f64> {
    probs.iter().map(|p| 1.0 / p - 1.0).collect()
}

/// Fair price of backing every outcome at `odds` together: the implied
/// probabilities are summed and converted back to a single price.
pub fn combined_odds(odds: &[f64]) -> f64 {
    let total: f64 = odds_to_prob(odds).iter().sum();
    1.0 / total - 1.0
}

/// One outcome of a best-line staking plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakeLeg {
    pub outcome: usize,
    /// Index of the book offering the best price.
    pub book: usize,
    pub odds: f64,
    pub probability: f64,
    pub stake: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StakePlan {
    pub legs: Vec<StakeLeg>,
    /// Below 1.0 means the best prices together over-round in the punter's favour.
    pub summed_probability: f64,
    /// Smallest payout (stake returned plus winnings) over all outcomes.
    pub guaranteed_return: Decimal,
}

/// Take the best price per outcome across `books` and split `stake` in
/// proportion to each outcome's implied probability.
///
/// Every book must quote the same outcomes in the same order.
pub fn best_line_stakes(books: &[Vec<f64>], stake: Decimal) -> Result<StakePlan> {
    let first = books
        .first()
        .ok_or_else(|| Error::Validation("no books to compare".to_string()))?;
    let outcomes = first.len();
    if outcomes == 0 {
        return Err(Error::Validation("books quote no outcomes".to_string()));
    }
    if let Some(i) = books.iter().position(|b| b.len() != outcomes) {
        return Err(Error::Validation(format!(
            "book {i} quotes {} outcomes, expected {outcomes}",
            books[i].len()
        )));
    }
    if books.iter().flatten().any(|o| !o.is_finite() || *o < 0.0) {
        return Err(Error::Validation("odds must be finite and non-negative".to_string()));
    }

    let best: Vec<(usize, f64)> = (0..outcomes)
        .map(|outcome| {
            books
                .iter()
                .enumerate()
                .map(|(book, quotes)| (book, quotes[outcome]))
                .fold((0, f64::NEG_INFINITY), |acc, cur| if cur.1 > acc.1 { cur } else { acc })
        })
        .collect();
    let prices: Vec<f64> = best.iter().map(|(_, o)| *o).collect();
    let probs = odds_to_prob(&prices);
    let summed_probability: f64 = probs.iter().sum();

    let mut legs = Vec::with_capacity(outcomes);
    for (outcome, ((book, price), prob)) in best.iter().zip(&probs).enumerate() {
        let share = to_decimal(prob / summed_probability)?;
        legs.push(StakeLeg {
            outcome,
            book: *book,
            odds: *price,
            probability: *prob,
            stake: (stake * share).round_dp(4),
        });
    }

    let mut guaranteed_return: Option<Decimal> = None;
    for leg in &legs {
        let payout = leg.stake * (to_decimal(leg.odds)? + Decimal::ONE);
        guaranteed_return = Some(guaranteed_return.map_or(payout, |r| r.min(payout)));
    }

    Ok(StakePlan {
        legs,
        summed_probability,
        guaranteed_return: guaranteed_return.unwrap_or(Decimal::ZERO).round_dp(2),
    })
}

impl StakePlan {
    /// Guaranteed return minus the total staked.
    pub fn profit(&self) -> Decimal {
        let staked: Decimal = self.legs.iter().map(|l| l.stake).sum();
        self.guaranteed_return - staked
    }
}

fn to_decimal(v: f64) -> Result<Decimal> {
    Decimal::from_f64(v).ok_or_else(|| Error::Validation(format!("{v} is not representable as a decimal")))
}
