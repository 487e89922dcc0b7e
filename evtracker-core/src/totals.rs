//! Per-machine cumulative totals and the statistics derived from them.
use serde::{Deserialize, Serialize};

use crate::calculator::CalculationResult;
use crate::constants::{GOAL_STEPS_YEN, ROTATION_RATE_BASIS, YEN_PER_BALL, YEN_PER_K};
use crate::numbers::{i64_to_f64, round_f64_to_u64, u64_to_f64};

/// Running sums across every finalized session on one machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeTotals {
    #[serde(default)]
    pub total_expect_balls: i64,
    #[serde(default)]
    pub total_spin: u64,
    #[serde(default)]
    pub total_invest_yen: u64,
    #[serde(default)]
    pub total_k_invested: f64,
    /// Consumed balls (the name is kept for store compatibility).
    #[serde(default)]
    pub total_consumed_k: f64,
    #[serde(default)]
    pub total_hit_count: u64,
}

impl CumulativeTotals {
    /// Fold one finalized session into the running sums.
    pub fn fold(&mut self, result: &CalculationResult) {
        self.total_expect_balls = self.total_expect_balls.saturating_add(result.expected_balls);
        self.total_spin = self.total_spin.saturating_add(result.spins);
        self.total_invest_yen = self.total_invest_yen.saturating_add(result.invest_yen);
        self.total_k_invested += u64_to_f64(result.invest_yen) / YEN_PER_K;
        self.total_consumed_k += result.consumed_balls;
        self.total_hit_count = self.total_hit_count.saturating_add(result.hit_count);
    }

    /// Rotation rate over every session, or 0 before anything was consumed.
    #[must_use]
    pub fn average_rotation_rate(&self) -> f64 {
        if self.total_consumed_k > 0.0 {
            u64_to_f64(self.total_spin) / self.total_consumed_k * ROTATION_RATE_BASIS
        } else {
            0.0
        }
    }

    /// `N` in the observed first-hit probability `1/N`.
    #[must_use]
    pub fn hit_probability_denominator(&self) -> Option<u64> {
        if self.total_hit_count == 0 || self.total_spin == 0 {
            return None;
        }
        Some(round_f64_to_u64(
            u64_to_f64(self.total_spin) / u64_to_f64(self.total_hit_count),
        ))
    }

    /// Cumulative expectation converted to yen.
    #[must_use]
    pub fn expected_yen(&self) -> f64 {
        i64_to_f64(self.total_expect_balls) * YEN_PER_BALL
    }

    #[must_use]
    pub fn goal_progress(&self) -> GoalProgress {
        GoalProgress::for_expected_yen(self.expected_yen())
    }
}

/// Colour band of the current goal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalColor {
    Blue,
    Yellow,
    Green,
    Red,
    Rainbow,
}

impl GoalColor {
    #[must_use]
    pub const fn for_index(index: usize) -> Self {
        match index {
            0 => Self::Blue,
            1 => Self::Yellow,
            2 => Self::Green,
            3 => Self::Red,
            _ => Self::Rainbow,
        }
    }
}

/// Progress through the staged expectation goals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub index: usize,
    pub previous_goal_yen: u64,
    pub next_goal_yen: u64,
    pub span: f64,
    pub progress: f64,
    pub percent: f64,
    pub color: GoalColor,
}

impl GoalProgress {
    #[must_use]
    pub fn for_expected_yen(expected_yen: f64) -> Self {
        let value = if expected_yen.is_finite() {
            expected_yen.max(0.0)
        } else {
            0.0
        };
        let last = GOAL_STEPS_YEN.len() - 1;
        let index = GOAL_STEPS_YEN
            .iter()
            .position(|step| value < u64_to_f64(*step))
            .unwrap_or(last);
        let previous_goal_yen = if index == 0 {
            0
        } else {
            GOAL_STEPS_YEN[index - 1]
        };
        let next_goal_yen = GOAL_STEPS_YEN[index];
        let span = u64_to_f64(next_goal_yen.saturating_sub(previous_goal_yen)).max(1.0);
        let progress = (value - u64_to_f64(previous_goal_yen)).clamp(0.0, span);
        Self {
            index,
            previous_goal_yen,
            next_goal_yen,
            span,
            progress,
            percent: (progress / span * 100.0).min(100.0),
            color: GoalColor::for_index(index),
        }
    }
}
