//! Payout calculator.
//!
//! Three-match is checked first with one uniform draw; only if it misses is a
//! second, independent draw compared against the two-match probability. The
//! combined win rate is therefore `p3 + (1 - p3) * p2`, not `max(p3, p2)`.

use rand::Rng;
use rust_decimal::Decimal;

use super::errors::{SpinError, SpinResult};
use crate::config::OddsConfig;

/// Which payout branch a spin landed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    ThreeMatch,
    TwoMatch,
    NoMatch,
}

impl Outcome {
    /// Bet multiplier for this outcome
    pub fn multiplier(self, odds: &OddsConfig) -> Decimal {
        match self {
            Outcome::ThreeMatch => odds.three_match_multiplier,
            Outcome::TwoMatch => odds.two_match_multiplier,
            Outcome::NoMatch => Decimal::ZERO,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::ThreeMatch => write!(f, "three_match"),
            Outcome::TwoMatch => write!(f, "two_match"),
            Outcome::NoMatch => write!(f, "no_match"),
        }
    }
}

// A probability of zero never fires, even on a draw of exactly 0.0
fn hits(draw: f64, probability: f64) -> bool {
    probability > 0.0 && draw <= probability
}

/// Draw the outcome of one spin
pub fn spin_outcome<R: Rng>(odds: &OddsConfig, rng: &mut R) -> Outcome {
    let r1: f64 = rng.random();
    if hits(r1, odds.three_match_probability) {
        return Outcome::ThreeMatch;
    }

    let r2: f64 = rng.random();
    if hits(r2, odds.two_match_probability) {
        Outcome::TwoMatch
    } else {
        Outcome::NoMatch
    }
}

/// Win amount for a bet that landed on `outcome`
pub fn win_amount(bet: Decimal, outcome: Outcome, odds: &OddsConfig) -> SpinResult<Decimal> {
    let multiplier = outcome.multiplier(odds);
    bet.checked_mul(multiplier)
        .ok_or(SpinError::PayoutOverflow { bet, multiplier })
}

/// Compute the randomized win amount for `bet`.
///
/// The bet is assumed positive; callers reject zero bets before this point.
pub fn payout<R: Rng>(bet: Decimal, odds: &OddsConfig, rng: &mut R) -> SpinResult<Decimal> {
    let outcome = spin_outcome(odds, rng);
    win_amount(bet, outcome, odds)
}
