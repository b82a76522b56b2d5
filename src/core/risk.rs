use super::engine::project_fixed_growth;
use super::types::{Inputs, RiskLevel, RiskThresholds, Runway, SensitivityPoint};

/// Maps aggregated statistics onto the ordered taxonomy. The result is the
/// worse of two bands: the insolvency-probability band and the deterministic
/// runway band, so a short certain runway cannot classify as Safe just
/// because the probability bands are quiet.
pub fn classify_risk(
    thresholds: &RiskThresholds,
    insolvency_probability: f64,
    deterministic_runway: Runway,
) -> RiskLevel {
    let probability_band = if insolvency_probability < thresholds.safe_max_insolvency {
        RiskLevel::Safe
    } else if insolvency_probability < thresholds.caution_max_insolvency {
        RiskLevel::Caution
    } else if insolvency_probability < thresholds.high_risk_max_insolvency {
        RiskLevel::HighRisk
    } else {
        RiskLevel::Critical
    };

    let runway_band = match deterministic_runway {
        Runway::BeyondHorizon => RiskLevel::Safe,
        Runway::Months(months) => {
            if months < thresholds.critical_min_runway {
                RiskLevel::Critical
            } else if months < thresholds.high_risk_min_runway {
                RiskLevel::HighRisk
            } else if months < thresholds.caution_min_runway {
                RiskLevel::Caution
            } else {
                RiskLevel::Safe
            }
        }
    };

    probability_band.max(runway_band)
}

/// Deterministic re-projection across the configured growth multipliers,
/// reported as multiplier -> runway. No Monte Carlo involved.
pub fn revenue_sensitivity(inputs: &Inputs) -> Vec<SensitivityPoint> {
    inputs
        .sensitivity_multipliers
        .iter()
        .map(|&multiplier| {
            let growth_rate = inputs.revenue_growth_rate * multiplier;
            let path = project_fixed_growth(inputs, growth_rate);
            SensitivityPoint {
                multiplier,
                growth_rate,
                runway: path.runway,
            }
        })
        .collect()
}
