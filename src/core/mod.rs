mod engine;
mod risk;
mod solver;
mod types;

pub use engine::{project_deterministic, simulate};
pub use risk::{classify_risk, revenue_sensitivity};
pub use solver::solve_hiring_safety;
pub use types::{
    DEFAULT_MAX_PERIOD_CELLS, DEFAULT_PERCENTILES, DEFAULT_SENSITIVITY_MULTIPLIERS,
    GrowthDistribution, HiringSafetyOutcome, HiringSearchConfig, HiringSolveIteration, Inputs,
    MonteCarloSummary, PercentileBand, Period, PlannedHire, ProjectionPath, RiskLevel,
    RiskThresholds, Runway, SensitivityPoint, SimulationError, SimulationResult,
};
