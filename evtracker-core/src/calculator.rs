//! Expectation calculator: true rotation rate and expected balls for a session.
use serde::{Deserialize, Serialize};

use crate::constants::{
    BALLS_PER_1K_YEN, ROTATION_RATE_BASIS, TIER_BLUE_MAX_MARGIN, TIER_GREEN_MAX_MARGIN, YEN_PER_K,
};
use crate::error::CalcError;
use crate::machine::Machine;
use crate::numbers::{round_f64_to_i64, u64_to_f64};
use crate::session::SessionState;

/// How a rotation rate compares to the machine's border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateTier {
    /// Below border.
    Bad,
    /// Up to 1.0 above border.
    Blue,
    /// Up to 2.0 above border.
    Green,
    /// More than 2.0 above border.
    Purple,
}

impl RateTier {
    #[must_use]
    pub fn classify(rate: f64, border: Option<f64>) -> Option<Self> {
        let border = border?;
        if !rate.is_finite() || !border.is_finite() {
            return None;
        }
        let margin = rate - border;
        Some(if margin < 0.0 {
            Self::Bad
        } else if margin <= TIER_BLUE_MAX_MARGIN {
            Self::Blue
        } else if margin <= TIER_GREEN_MAX_MARGIN {
            Self::Green
        } else {
            Self::Purple
        })
    }
}

/// Yen investment converted to balls at the fixed exchange basis.
#[must_use]
pub fn invest_balls(invest_yen: u64) -> f64 {
    u64_to_f64(invest_yen) / YEN_PER_K * BALLS_PER_1K_YEN
}

/// Spins per 1000 yen of consumed balls (250 balls).
#[must_use]
pub fn rotation_rate(spins: u64, consumed_balls: f64) -> f64 {
    u64_to_f64(spins) / consumed_balls * ROTATION_RATE_BASIS
}

/// Point estimate of balls gained over `spins` at `rate`.
#[must_use]
pub fn expected_balls(machine: &Machine, rate: f64, spins: u64) -> i64 {
    let spins = u64_to_f64(spins);
    round_f64_to_i64(spins * (machine.per_spin_pay_balls - machine.cost_per_1k_balls / rate))
}

/// Outcome of a finalized session calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub spins: u64,
    pub hit_count: u64,
    pub invest_yen: u64,
    pub invest_balls: f64,
    pub net_payout: u64,
    pub end_balls: u64,
    pub consumed_balls: f64,
    pub rotation_rate: f64,
    pub expected_balls: i64,
    pub border: Option<f64>,
    pub tier: Option<RateTier>,
}

/// Live feedback while the session is still running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidCheckReport {
    pub counter: u64,
    pub spins: u64,
    pub consumed_balls: f64,
    pub rotation_rate: f64,
    pub border: Option<f64>,
    /// `rotation_rate - border`, when a border is known.
    pub border_diff: Option<f64>,
    pub tier: Option<RateTier>,
}

/// Compute the expected value of a closed session without mutating anything.
///
/// # Errors
///
/// Returns the first unmet precondition: spins recorded, nothing pending, a
/// confirmed ending balance, a confirmed investment, and positive consumption.
pub fn calculate(session: &SessionState, machine: &Machine) -> Result<CalculationResult, CalcError> {
    let agg = session.aggregates();
    if agg.total_spins == 0 {
        return Err(CalcError::NoSpins);
    }
    if session.pending_index.is_some() {
        return Err(CalcError::HitPending);
    }
    if session.payout_confirm_index.is_some() {
        return Err(CalcError::PayoutPending);
    }
    if session.end_balls_pending {
        return Err(CalcError::EndBalancePending);
    }
    let Some(end_balls) = session.end_balls_yame else {
        return Err(CalcError::EndBalanceMissing);
    };
    if session.confirmed_invest_yen == 0 {
        return Err(CalcError::NoInvestment);
    }

    let invest_balls = invest_balls(session.confirmed_invest_yen);
    let consumed_balls =
        invest_balls + u64_to_f64(agg.total_net_payout) - u64_to_f64(end_balls);
    if consumed_balls.is_nan() || consumed_balls <= 0.0 {
        return Err(CalcError::NonPositiveConsumption {
            consumed: consumed_balls,
        });
    }

    let rate = rotation_rate(agg.total_spins, consumed_balls);
    let border = machine.reference_border();
    Ok(CalculationResult {
        spins: agg.total_spins,
        hit_count: agg.hit_count,
        invest_yen: session.confirmed_invest_yen,
        invest_balls,
        net_payout: agg.total_net_payout,
        end_balls,
        consumed_balls,
        rotation_rate: rate,
        expected_balls: expected_balls(machine, rate, agg.total_spins),
        border,
        tier: RateTier::classify(rate, border),
    })
}

/// Rotation rate so far, treating the open segment as closed at `counter`.
/// Nothing is subtracted for balls in hand since the session has not ended.
///
/// # Errors
///
/// Fails when no spins have accumulated or nothing has been consumed yet.
pub fn mid_session_check(
    session: &SessionState,
    machine: &Machine,
    counter: u64,
) -> Result<MidCheckReport, CalcError> {
    let spins = session.spins_through(counter);
    if spins == 0 {
        return Err(CalcError::NoSpins);
    }
    let consumed_balls = invest_balls(session.confirmed_invest_yen)
        + u64_to_f64(session.aggregates().total_net_payout);
    if consumed_balls <= 0.0 {
        return Err(CalcError::NonPositiveConsumption {
            consumed: consumed_balls,
        });
    }

    let rate = rotation_rate(spins, consumed_balls);
    let border = machine.reference_border();
    Ok(MidCheckReport {
        counter,
        spins,
        consumed_balls,
        rotation_rate: rate,
        border,
        border_diff: border.map(|b| rate - b),
        tier: RateTier::classify(rate, border),
    })
}
