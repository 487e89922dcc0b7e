//! Machine catalog records and their normalized, default-filled form.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use crate::MachineCatalog;
use crate::constants::{
    DEFAULT_CHARGE_PAYOUT_DISP, DEFAULT_CHARGE_PAYOUT_NET, DEFAULT_COST_PER_1K_BALLS,
    DEFAULT_PAYOUT_BASE_DISP, DEFAULT_PAYOUT_BASE_NET, DEFAULT_PAYOUT_RETURN_UNIT,
    DEFAULT_TAN_PAYOUT_DISP, DEFAULT_TAN_PAYOUT_NET, REFERENCE_BORDER_TIER,
};

/// How a hit ended, as chosen by the player after recording the hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeKind {
    /// Single hit with a fixed payout (単発).
    Tan,
    /// RUSH ended; payout read from the result screen.
    RushEnd,
    /// LT ended; payout read from the result screen.
    LtEnd,
    /// Charge hit with a fixed payout. Not counted as a first hit.
    Charge,
}

impl OutcomeKind {
    pub const ALL: [Self; 4] = [Self::Tan, Self::RushEnd, Self::LtEnd, Self::Charge];

    /// Catalog tag for this outcome.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Tan => "tan",
            Self::RushEnd => "rushEnd",
            Self::LtEnd => "ltEnd",
            Self::Charge => "charge",
        }
    }

    /// Label shown on the finalized log row.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Tan => "単発",
            Self::RushEnd => "RUSH終了",
            Self::LtEnd => "LT終了",
            Self::Charge => "チャージ",
        }
    }

    /// Whether the payout is fixed by the machine rather than read from the result screen.
    #[must_use]
    pub const fn has_fixed_payout(self) -> bool {
        matches!(self, Self::Tan | Self::Charge)
    }

    /// Whether this outcome counts toward the first-hit tally.
    #[must_use]
    pub const fn counts_as_hit(self) -> bool {
        !matches!(self, Self::Charge)
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Error returned when an outcome tag is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown outcome `{0}` (expected tan, rushEnd, ltEnd or charge)")]
pub struct ParseOutcomeError(pub String);

impl FromStr for OutcomeKind {
    type Err = ParseOutcomeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "tan" | "single" => Ok(Self::Tan),
            "rushend" | "rush" => Ok(Self::RushEnd),
            "ltend" | "lt" => Ok(Self::LtEnd),
            "charge" => Ok(Self::Charge),
            _ => Err(ParseOutcomeError(s.to_string())),
        }
    }
}

/// Displayed / net payout pair for fixed-payout outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPayout {
    pub disp: u64,
    pub net: u64,
}

/// Parameters of the displayed-to-net payout conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRule {
    #[serde(default = "PayoutRule::default_base_disp")]
    pub base_disp: u64,
    #[serde(default = "PayoutRule::default_base_net")]
    pub base_net: u64,
    /// Displayed balls per one ball of return commission.
    #[serde(default = "PayoutRule::default_unit")]
    pub unit: u64,
}

impl PayoutRule {
    const fn default_base_disp() -> u64 {
        DEFAULT_PAYOUT_BASE_DISP
    }

    const fn default_base_net() -> u64 {
        DEFAULT_PAYOUT_BASE_NET
    }

    const fn default_unit() -> u64 {
        DEFAULT_PAYOUT_RETURN_UNIT
    }
}

impl Default for PayoutRule {
    fn default() -> Self {
        Self {
            base_disp: Self::default_base_disp(),
            base_net: Self::default_base_net(),
            unit: Self::default_unit(),
        }
    }
}

/// Outcome → counter value that play resumes from after that outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestartTable {
    #[serde(default)]
    pub tan: Option<u64>,
    #[serde(default)]
    pub rush_end: Option<u64>,
    #[serde(default)]
    pub lt_end: Option<u64>,
    #[serde(default)]
    pub charge: Option<u64>,
}

impl RestartTable {
    #[must_use]
    pub const fn get(&self, kind: OutcomeKind) -> Option<u64> {
        match kind {
            OutcomeKind::Tan => self.tan,
            OutcomeKind::RushEnd => self.rush_end,
            OutcomeKind::LtEnd => self.lt_end,
            OutcomeKind::Charge => self.charge,
        }
    }
}

/// One machine model as supplied by the catalog. Optional fields are filled by
/// [`MachineConfig::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    pub id: String,
    pub name: String,
    pub per_spin_pay_balls: f64,
    #[serde(default)]
    pub cost_per_1k_balls: Option<f64>,
    /// Exchange tier → border rotation rate.
    #[serde(default)]
    pub border: BTreeMap<u32, f64>,
    #[serde(default)]
    pub jackpot: Option<String>,
    #[serde(default)]
    pub rush_entry: Option<String>,
    #[serde(default)]
    pub hit_options: Option<Vec<OutcomeKind>>,
    #[serde(default)]
    pub restart: RestartTable,
    #[serde(default)]
    pub tan_payout: Option<FixedPayout>,
    #[serde(default)]
    pub charge_payout: Option<FixedPayout>,
    #[serde(default)]
    pub payout_rule: Option<PayoutRule>,
}

impl MachineConfig {
    /// Fill every documented default once so downstream logic never re-checks
    /// for absent fields.
    #[must_use]
    pub fn normalize(&self) -> Machine {
        let cost = self
            .cost_per_1k_balls
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(DEFAULT_COST_PER_1K_BALLS);
        let hit_options = match &self.hit_options {
            Some(options) if !options.is_empty() => {
                let mut seen = Vec::with_capacity(options.len());
                for kind in options {
                    if !seen.contains(kind) {
                        seen.push(*kind);
                    }
                }
                seen
            }
            _ => vec![OutcomeKind::Tan, OutcomeKind::RushEnd, OutcomeKind::LtEnd],
        };
        Machine {
            id: self.id.clone(),
            name: self.name.clone(),
            per_spin_pay_balls: self.per_spin_pay_balls,
            cost_per_1k_balls: cost,
            border: self.border.clone(),
            jackpot: self.jackpot.clone(),
            rush_entry: self.rush_entry.clone(),
            hit_options,
            restart: Restarts {
                tan: self.restart.tan.unwrap_or(0),
                rush_end: self.restart.rush_end.unwrap_or(0),
                lt_end: self.restart.lt_end.unwrap_or(0),
                charge: self.restart.charge.unwrap_or(0),
            },
            tan_payout: self.tan_payout.unwrap_or(FixedPayout {
                disp: DEFAULT_TAN_PAYOUT_DISP,
                net: DEFAULT_TAN_PAYOUT_NET,
            }),
            charge_payout: self.charge_payout.unwrap_or(FixedPayout {
                disp: DEFAULT_CHARGE_PAYOUT_DISP,
                net: DEFAULT_CHARGE_PAYOUT_NET,
            }),
            payout_rule: self.payout_rule.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restarts {
    pub tan: u64,
    pub rush_end: u64,
    pub lt_end: u64,
    pub charge: u64,
}

/// A machine with every default resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub per_spin_pay_balls: f64,
    pub cost_per_1k_balls: f64,
    pub border: BTreeMap<u32, f64>,
    pub jackpot: Option<String>,
    pub rush_entry: Option<String>,
    pub hit_options: Vec<OutcomeKind>,
    pub restart: Restarts,
    pub tan_payout: FixedPayout,
    pub charge_payout: FixedPayout,
    pub payout_rule: PayoutRule,
}

impl Machine {
    /// Counter value play resumes from after `kind`.
    #[must_use]
    pub const fn restart_for(&self, kind: OutcomeKind) -> u64 {
        match kind {
            OutcomeKind::Tan => self.restart.tan,
            OutcomeKind::RushEnd => self.restart.rush_end,
            OutcomeKind::LtEnd => self.restart.lt_end,
            OutcomeKind::Charge => self.restart.charge,
        }
    }

    /// Fixed payout for `kind`, or `None` when the payout is read from the result screen.
    #[must_use]
    pub const fn fixed_payout(&self, kind: OutcomeKind) -> Option<FixedPayout> {
        match kind {
            OutcomeKind::Tan => Some(self.tan_payout),
            OutcomeKind::Charge => Some(self.charge_payout),
            OutcomeKind::RushEnd | OutcomeKind::LtEnd => None,
        }
    }

    #[must_use]
    pub fn offers(&self, kind: OutcomeKind) -> bool {
        self.hit_options.contains(&kind)
    }

    #[must_use]
    pub fn border_at(&self, tier: u32) -> Option<f64> {
        self.border.get(&tier).copied().filter(|b| b.is_finite())
    }

    /// Border at the reference exchange tier.
    #[must_use]
    pub fn reference_border(&self) -> Option<f64> {
        self.border_at(REFERENCE_BORDER_TIER)
    }
}

/// In-memory catalog, typically parsed from the bundled JSON asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaticCatalog {
    machines: Vec<MachineConfig>,
}

impl StaticCatalog {
    #[must_use]
    pub const fn new(machines: Vec<MachineConfig>) -> Self {
        Self { machines }
    }

    /// Parse a catalog from a JSON array of machine records.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a record is missing required fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json).map(Self::new)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }
}

impl MachineCatalog for StaticCatalog {
    type Error = Infallible;

    fn machines(&self) -> Result<Vec<MachineConfig>, Self::Error> {
        Ok(self.machines.clone())
    }
}
