//! Centralized tuning constants for the tracker's session math.
//!
//! Keeping these together ensures that the calculation can only be adjusted
//! via reviewed code changes, rather than through the machine catalog.

// Exchange basis -----------------------------------------------------------
/// Balls received per 1000 yen of investment. Fixed independently of each
/// machine's `costPer1kBalls`.
pub const BALLS_PER_1K_YEN: f64 = 250.0;
/// Rotation rates are expressed per this many consumed balls.
pub const ROTATION_RATE_BASIS: f64 = 250.0;
pub const YEN_PER_K: f64 = 1000.0;
pub const YEN_PER_BALL: f64 = 4.0;

// Machine defaults ---------------------------------------------------------
pub const DEFAULT_COST_PER_1K_BALLS: f64 = 250.0;
pub const DEFAULT_TAN_PAYOUT_DISP: u64 = 400;
pub const DEFAULT_TAN_PAYOUT_NET: u64 = 360;
pub const DEFAULT_CHARGE_PAYOUT_DISP: u64 = 300;
pub const DEFAULT_CHARGE_PAYOUT_NET: u64 = 280;

// Payout conversion --------------------------------------------------------
pub const DEFAULT_PAYOUT_BASE_DISP: u64 = 400;
pub const DEFAULT_PAYOUT_BASE_NET: u64 = 360;
pub const DEFAULT_PAYOUT_RETURN_UNIT: u64 = 15;

// Border comparison --------------------------------------------------------
/// Exchange tier used whenever a single border figure is shown.
pub const REFERENCE_BORDER_TIER: u32 = 28;
pub const TIER_BLUE_MAX_MARGIN: f64 = 1.0;
pub const TIER_GREEN_MAX_MARGIN: f64 = 2.0;

// Goals --------------------------------------------------------------------
pub const GOAL_YEN: u64 = 1_000_000;
pub const GOAL_STEPS_YEN: [u64; 5] = [10_000, 30_000, 100_000, 500_000, GOAL_YEN];

// Persistence keys ---------------------------------------------------------
pub const TOTALS_KEY_PREFIX: &str = "evTracker_machineTotals_v1_";
pub const SESSION_KEY_PREFIX: &str = "evTracker_session_v1_";
pub const SELECTED_MACHINE_KEY: &str = "evTracker_selectedMachineId_v1";
