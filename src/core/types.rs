use serde::{Serialize, Serializer};
use thiserror::Error;

/// Distribution family for per-period revenue growth draws. Both variants
/// share the configured mean and standard deviation; Uniform spans
/// mean +/- sqrt(3) * volatility.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GrowthDistribution {
    Normal,
    Uniform,
}

/// A recurring cost that switches on at `start_period` and stays on for the
/// rest of the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedHire {
    pub start_period: u32,
    pub monthly_cost: f64,
}

/// Insolvency-probability and deterministic-runway cutoffs for the ordered
/// risk taxonomy. Probability cuts partition [0, 1]; runway cuts partition
/// the month axis. Both must be ascending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskThresholds {
    pub safe_max_insolvency: f64,
    pub caution_max_insolvency: f64,
    pub high_risk_max_insolvency: f64,
    pub caution_min_runway: u32,
    pub high_risk_min_runway: u32,
    pub critical_min_runway: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            safe_max_insolvency: 0.05,
            caution_max_insolvency: 0.20,
            high_risk_max_insolvency: 0.50,
            caution_min_runway: 12,
            high_risk_min_runway: 6,
            critical_min_runway: 3,
        }
    }
}

impl RiskThresholds {
    fn validate(&self) -> Result<(), SimulationError> {
        for (name, value) in [
            ("safe_max_insolvency", self.safe_max_insolvency),
            ("caution_max_insolvency", self.caution_max_insolvency),
            ("high_risk_max_insolvency", self.high_risk_max_insolvency),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(SimulationError::invalid(format!(
                    "{name} must be between 0 and 1"
                )));
            }
        }
        if self.safe_max_insolvency > self.caution_max_insolvency
            || self.caution_max_insolvency > self.high_risk_max_insolvency
        {
            return Err(SimulationError::invalid(
                "insolvency thresholds must be ascending (safe <= caution <= high risk)",
            ));
        }
        if self.critical_min_runway > self.high_risk_min_runway
            || self.high_risk_min_runway > self.caution_min_runway
        {
            return Err(SimulationError::invalid(
                "runway thresholds must be ascending (critical <= high risk <= caution)",
            ));
        }
        Ok(())
    }
}

/// Ordered severity taxonomy; later variants are worse.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    Safe,
    Caution,
    HighRisk,
    Critical,
}

/// Configuration for the hiring-safety bisection search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HiringSearchConfig {
    /// Insolvency probability the company is willing to run at.
    pub tolerance: f64,
    /// Top of the search bracket; defaults to cash_on_hand + monthly_revenue,
    /// an increment guaranteed to go cash-negative in period 0.
    pub search_max: Option<f64>,
    /// Stop once the bracket is narrower than this many currency units.
    pub cost_resolution: f64,
    pub max_iterations: u32,
    /// Reduced per-iteration sample count; the final evaluation always uses
    /// the full `num_simulations`.
    pub simulations_per_iteration: Option<u32>,
}

impl Default for HiringSearchConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.20,
            search_max: None,
            cost_resolution: 50.0,
            max_iterations: 32,
            simulations_per_iteration: None,
        }
    }
}

impl HiringSearchConfig {
    fn validate(&self) -> Result<(), SimulationError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 || self.tolerance > 1.0 {
            return Err(SimulationError::invalid(
                "hiring tolerance must be in (0, 1]",
            ));
        }
        if let Some(max) = self.search_max {
            if !max.is_finite() || max <= 0.0 {
                return Err(SimulationError::invalid(
                    "hiring search_max must be > 0 when set",
                ));
            }
        }
        if !self.cost_resolution.is_finite() || self.cost_resolution <= 0.0 {
            return Err(SimulationError::invalid(
                "hiring cost_resolution must be > 0",
            ));
        }
        if self.max_iterations == 0 {
            return Err(SimulationError::invalid("hiring max_iterations must be > 0"));
        }
        if self.simulations_per_iteration == Some(0) {
            return Err(SimulationError::invalid(
                "hiring simulations_per_iteration must be > 0 when set",
            ));
        }
        Ok(())
    }
}

/// Immutable configuration for one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    pub cash_on_hand: f64,
    pub monthly_revenue: f64,
    pub fixed_costs: f64,
    pub variable_costs: f64,
    pub team_size: u32,
    pub cost_per_employee: f64,
    pub revenue_growth_rate: f64,
    pub growth_volatility: f64,
    pub growth_distribution: GrowthDistribution,
    pub planned_hires: Vec<PlannedHire>,
    pub horizon_periods: u32,
    pub num_simulations: u32,
    pub percentiles: Vec<f64>,
    /// Retain every sampled path in the result. Off by default: the
    /// aggregator then keeps only per-period reductions, so memory stays
    /// proportional to the horizon rather than horizon x simulations.
    pub keep_sample_paths: bool,
    pub seed: u64,
    pub risk_thresholds: RiskThresholds,
    pub hiring: HiringSearchConfig,
    pub sensitivity_multipliers: Vec<f64>,
    /// Ceiling on num_simulations * horizon_periods.
    pub max_period_cells: u64,
}

pub const DEFAULT_PERCENTILES: [f64; 3] = [10.0, 50.0, 90.0];
pub const DEFAULT_SENSITIVITY_MULTIPLIERS: [f64; 3] = [0.5, 1.0, 1.5];
pub const DEFAULT_MAX_PERIOD_CELLS: u64 = 50_000_000;

impl Inputs {
    pub fn validate(&self) -> Result<(), SimulationError> {
        for (name, value) in [
            ("cash_on_hand", self.cash_on_hand),
            ("monthly_revenue", self.monthly_revenue),
            ("fixed_costs", self.fixed_costs),
            ("variable_costs", self.variable_costs),
            ("cost_per_employee", self.cost_per_employee),
            ("growth_volatility", self.growth_volatility),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimulationError::invalid(format!(
                    "{name} must be a finite value >= 0"
                )));
            }
        }

        if !self.revenue_growth_rate.is_finite() || self.revenue_growth_rate <= -1.0 {
            return Err(SimulationError::invalid(
                "revenue_growth_rate must be finite and > -1",
            ));
        }

        if self.horizon_periods == 0 {
            return Err(SimulationError::invalid("horizon_periods must be > 0"));
        }
        if self.num_simulations == 0 {
            return Err(SimulationError::invalid("num_simulations must be > 0"));
        }

        let mut previous_start = None;
        for hire in &self.planned_hires {
            if !hire.monthly_cost.is_finite() || hire.monthly_cost < 0.0 {
                return Err(SimulationError::invalid(
                    "planned hire monthly_cost must be a finite value >= 0",
                ));
            }
            if hire.start_period >= self.horizon_periods {
                return Err(SimulationError::invalid(format!(
                    "planned hire start_period {} is outside the horizon",
                    hire.start_period
                )));
            }
            if let Some(prev) = previous_start {
                if hire.start_period <= prev {
                    return Err(SimulationError::invalid(
                        "planned hires must have strictly increasing start periods",
                    ));
                }
            }
            previous_start = Some(hire.start_period);
        }

        for pct in &self.percentiles {
            if !pct.is_finite() || !(0.0..=100.0).contains(pct) {
                return Err(SimulationError::invalid(
                    "percentiles must be between 0 and 100",
                ));
            }
        }

        for multiplier in &self.sensitivity_multipliers {
            if !multiplier.is_finite() {
                return Err(SimulationError::invalid(
                    "sensitivity multipliers must be finite",
                ));
            }
            if self.revenue_growth_rate * multiplier <= -1.0 {
                return Err(SimulationError::invalid(format!(
                    "sensitivity multiplier {multiplier} pushes growth below -100%"
                )));
            }
        }

        self.risk_thresholds.validate()?;
        self.hiring.validate()?;

        let cells = u64::from(self.num_simulations) * u64::from(self.horizon_periods);
        if cells > self.max_period_cells {
            return Err(SimulationError::ResourceBoundExceeded {
                cells,
                ceiling: self.max_period_cells,
            });
        }

        Ok(())
    }

    /// Recurring costs that apply to every period before hiring increments.
    pub fn baseline_monthly_costs(&self) -> f64 {
        self.fixed_costs
            + self.variable_costs
            + f64::from(self.team_size) * self.cost_per_employee
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("simulation too large: {cells} period-cells exceeds the ceiling of {ceiling}")]
    ResourceBoundExceeded { cells: u64, ceiling: u64 },
}

impl SimulationError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}

/// One simulated month of cash state. Negative `ending_cash` is a meaningful
/// state (insolvency), not an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub index: u32,
    pub starting_cash: f64,
    pub revenue: f64,
    pub total_costs: f64,
    pub net_burn: f64,
    pub ending_cash: f64,
}

impl Period {
    pub fn derive(index: u32, starting_cash: f64, revenue: f64, total_costs: f64) -> Self {
        let net_burn = total_costs - revenue;
        Self {
            index,
            starting_cash,
            revenue,
            total_costs,
            net_burn,
            ending_cash: starting_cash - net_burn,
        }
    }
}

/// First period index whose ending cash goes negative, or a sentinel when the
/// balance survives the whole horizon. Serialized as the month number or the
/// string `"beyond-horizon"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runway {
    Months(u32),
    BeyondHorizon,
}

impl Runway {
    pub fn months(self) -> Option<u32> {
        match self {
            Runway::Months(m) => Some(m),
            Runway::BeyondHorizon => None,
        }
    }

    pub fn is_beyond_horizon(self) -> bool {
        matches!(self, Runway::BeyondHorizon)
    }
}

impl Serialize for Runway {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Runway::Months(m) => serializer.serialize_u32(*m),
            Runway::BeyondHorizon => serializer.serialize_str("beyond-horizon"),
        }
    }
}

/// One full projection over the horizon: always exactly `horizon_periods`
/// periods, with first-crossing indices derived at construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPath {
    pub periods: Vec<Period>,
    pub runway: Runway,
    pub break_even_month: Option<u32>,
}

impl ProjectionPath {
    pub fn is_insolvent_within_horizon(&self) -> bool {
        matches!(self.runway, Runway::Months(_))
    }

    /// Headline "current" burn: period-0 net burn.
    pub fn current_net_burn(&self) -> f64 {
        self.periods.first().map(|p| p.net_burn).unwrap_or(0.0)
    }
}

/// Per-period cash cut at one percentile across all sample paths. Values are
/// linearly interpolated between order statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileBand {
    pub percentile: f64,
    pub ending_cash: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonteCarloSummary {
    pub num_simulations: u32,
    pub insolvency_probability: f64,
    pub break_even_probability: f64,
    pub percentile_bands: Vec<PercentileBand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HiringSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_cost: f64,
    pub insolvency_probability: f64,
}

/// Outcome of the hiring-safety search. "No safe increment" is reported here
/// (`feasible == false`), never raised as an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HiringSafetyOutcome {
    pub tolerance: f64,
    pub search_max: f64,
    pub cost_resolution: f64,
    pub max_iterations: u32,
    pub safe_increment: Option<f64>,
    pub achieved_insolvency_probability: Option<f64>,
    pub iterations: Vec<HiringSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityPoint {
    pub multiplier: f64,
    pub growth_rate: f64,
    pub runway: Runway,
}

/// Final aggregate handed to the caller; owned exclusively by the caller and
/// never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub deterministic: ProjectionPath,
    pub monte_carlo: MonteCarloSummary,
    /// Empty unless `keep_sample_paths` was set.
    pub sample_paths: Vec<ProjectionPath>,
    pub risk: RiskLevel,
    pub hiring_safety: HiringSafetyOutcome,
    pub revenue_sensitivity: Vec<SensitivityPoint>,
}
