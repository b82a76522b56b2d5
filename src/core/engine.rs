use std::f64::consts::PI;

use super::risk::{classify_risk, revenue_sensitivity};
use super::solver::solve_hiring_safety;
use super::types::{
    GrowthDistribution, Inputs, MonteCarloSummary, PercentileBand, Period, ProjectionPath, Runway,
    SimulationError, SimulationResult,
};

/// Full analysis: deterministic projection, Monte Carlo aggregation, risk
/// classification, hiring-safety search, and revenue sensitivity. Fails fast
/// on invalid inputs; no partial results.
pub fn simulate(inputs: &Inputs) -> Result<SimulationResult, SimulationError> {
    inputs.validate()?;

    let deterministic = project_fixed_growth(inputs, inputs.revenue_growth_rate);
    let (monte_carlo, sample_paths) = run_monte_carlo(inputs, 0.0);
    let risk = classify_risk(
        &inputs.risk_thresholds,
        monte_carlo.insolvency_probability,
        deterministic.runway,
    );
    let hiring_safety = solve_hiring_safety(inputs);
    let revenue_sensitivity = revenue_sensitivity(inputs);

    Ok(SimulationResult {
        deterministic,
        monte_carlo,
        sample_paths,
        risk,
        hiring_safety,
        revenue_sensitivity,
    })
}

/// Single fixed-growth projection for callers that do not need the
/// distributional output.
pub fn project_deterministic(inputs: &Inputs) -> Result<ProjectionPath, SimulationError> {
    inputs.validate()?;
    Ok(project_fixed_growth(inputs, inputs.revenue_growth_rate))
}

pub(crate) fn project_fixed_growth(inputs: &Inputs, growth_rate: f64) -> ProjectionPath {
    let rates = vec![growth_rate; inputs.horizon_periods as usize];
    project_path(inputs, &rates, 0.0)
}

/// Shared rollover rule. Always fills exactly `horizon_periods` periods so
/// downstream consumers see fixed-length paths; runway and break-even are
/// recorded as first-crossing indices. `growth_rates[i]` advances revenue
/// from period i to i+1.
pub(crate) fn project_path(
    inputs: &Inputs,
    growth_rates: &[f64],
    extra_monthly_cost: f64,
) -> ProjectionPath {
    debug_assert_eq!(growth_rates.len(), inputs.horizon_periods as usize);

    let base_costs = inputs.baseline_monthly_costs() + extra_monthly_cost;
    let mut periods = Vec::with_capacity(inputs.horizon_periods as usize);
    let mut cash = inputs.cash_on_hand;
    let mut revenue = inputs.monthly_revenue;
    let mut runway = Runway::BeyondHorizon;
    let mut break_even_month = None;

    for index in 0..inputs.horizon_periods {
        let total_costs = base_costs + hiring_costs_at(inputs, index);
        let period = Period::derive(index, cash, revenue, total_costs);

        if runway.is_beyond_horizon() && period.ending_cash < 0.0 {
            runway = Runway::Months(index);
        }
        if break_even_month.is_none() && period.net_burn <= 0.0 {
            break_even_month = Some(index);
        }

        cash = period.ending_cash;
        revenue *= 1.0 + growth_rates[index as usize];
        periods.push(period);
    }

    ProjectionPath {
        periods,
        runway,
        break_even_month,
    }
}

fn hiring_costs_at(inputs: &Inputs, period: u32) -> f64 {
    inputs
        .planned_hires
        .iter()
        .filter(|hire| hire.start_period <= period)
        .map(|hire| hire.monthly_cost)
        .sum()
}

/// Runs `num_simulations` independent projections, one sampled growth
/// trajectory each, and reduces them into distributional statistics. The
/// reduction is streaming per period, so individual paths are only retained
/// when `keep_sample_paths` asks for them. Bit-for-bit reproducible for a
/// given seed.
pub(crate) fn run_monte_carlo(
    inputs: &Inputs,
    extra_monthly_cost: f64,
) -> (MonteCarloSummary, Vec<ProjectionPath>) {
    let horizon = inputs.horizon_periods as usize;
    let samples = inputs.num_simulations as usize;

    let mut insolvent = 0u32;
    let mut reached_break_even = 0u32;
    let mut cash_by_period: Vec<Vec<f64>> = vec![Vec::with_capacity(samples); horizon];
    let mut kept_paths = Vec::new();

    for sample_id in 0..inputs.num_simulations {
        let mut rng = Rng::new(derive_seed(inputs.seed, sample_id));
        let rates = sample_growth_rates(inputs, &mut rng);
        let path = project_path(inputs, &rates, extra_monthly_cost);

        if path.is_insolvent_within_horizon() {
            insolvent += 1;
        }
        if path.break_even_month.is_some() {
            reached_break_even += 1;
        }
        for (column, period) in cash_by_period.iter_mut().zip(&path.periods) {
            column.push(period.ending_cash);
        }
        if inputs.keep_sample_paths {
            kept_paths.push(path);
        }
    }

    let percentile_bands = inputs
        .percentiles
        .iter()
        .map(|&pct| PercentileBand {
            percentile: pct,
            ending_cash: cash_by_period
                .iter_mut()
                .map(|column| percentile(column, pct))
                .collect(),
        })
        .collect();

    let total = f64::from(inputs.num_simulations);
    let summary = MonteCarloSummary {
        num_simulations: inputs.num_simulations,
        insolvency_probability: f64::from(insolvent) / total,
        break_even_probability: f64::from(reached_break_even) / total,
        percentile_bands,
    };

    (summary, kept_paths)
}

/// One independent draw per period, so growth varies month to month within a
/// single trajectory. Draws are floored at -1 (revenue can reach zero but
/// never turn negative).
fn sample_growth_rates(inputs: &Inputs, rng: &mut Rng) -> Vec<f64> {
    (0..inputs.horizon_periods)
        .map(|_| {
            let draw = match inputs.growth_distribution {
                GrowthDistribution::Normal => {
                    inputs.revenue_growth_rate + inputs.growth_volatility * rng.standard_normal()
                }
                GrowthDistribution::Uniform => {
                    let half_width = 3.0f64.sqrt() * inputs.growth_volatility;
                    inputs.revenue_growth_rate + half_width * (2.0 * rng.next_f64() - 1.0)
                }
            };
            draw.max(-1.0)
        })
        .collect()
}

fn derive_seed(base_seed: u64, sample_id: u32) -> u64 {
    let mixed = base_seed ^ ((sample_id as u64) << 32) ^ sample_id as u64;
    splitmix64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

struct Rng {
    state: u64,
    cached_normal: Option<f64>,
}

impl Rng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self {
            state,
            cached_normal: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        let z0 = r * theta.cos();
        let z1 = r * theta.sin();
        self.cached_normal = Some(z1);
        z0
    }
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        DEFAULT_MAX_PERIOD_CELLS, DEFAULT_PERCENTILES, DEFAULT_SENSITIVITY_MULTIPLIERS,
        HiringSearchConfig, PlannedHire, RiskThresholds,
    };
    use proptest::prelude::{any, prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_inputs() -> Inputs {
        Inputs {
            cash_on_hand: 120_000.0,
            monthly_revenue: 10_000.0,
            fixed_costs: 15_000.0,
            variable_costs: 5_000.0,
            team_size: 0,
            cost_per_employee: 0.0,
            revenue_growth_rate: 0.0,
            growth_volatility: 0.0,
            growth_distribution: GrowthDistribution::Normal,
            planned_hires: Vec::new(),
            horizon_periods: 24,
            num_simulations: 200,
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            keep_sample_paths: false,
            seed: 42,
            risk_thresholds: RiskThresholds::default(),
            hiring: HiringSearchConfig::default(),
            sensitivity_multipliers: DEFAULT_SENSITIVITY_MULTIPLIERS.to_vec(),
            max_period_cells: DEFAULT_MAX_PERIOD_CELLS,
        }
    }

    #[test]
    fn flat_burn_runs_out_after_twelve_months() {
        let inputs = sample_inputs();
        let path = project_deterministic(&inputs).expect("valid inputs");

        assert_approx(path.current_net_burn(), 10_000.0);
        assert_eq!(path.runway, Runway::Months(12));
        assert_eq!(path.break_even_month, None);
        assert_eq!(path.periods.len(), 24);
        // Month 11 ends exactly at zero, which is still solvent.
        assert_approx(path.periods[11].ending_cash, 0.0);
        assert!(path.periods[12].ending_cash < 0.0);
    }

    #[test]
    fn profitable_company_never_crosses_zero() {
        let mut inputs = sample_inputs();
        inputs.monthly_revenue = 25_000.0;
        let path = project_deterministic(&inputs).expect("valid inputs");

        assert_eq!(path.runway, Runway::BeyondHorizon);
        assert!(!path.is_insolvent_within_horizon());
        assert_eq!(path.break_even_month, Some(0));
        assert_approx(path.current_net_burn(), -5_000.0);
    }

    #[test]
    fn fixed_growth_compounds_revenue() {
        let mut inputs = sample_inputs();
        inputs.revenue_growth_rate = 0.10;
        inputs.horizon_periods = 3;
        let path = project_deterministic(&inputs).expect("valid inputs");

        assert_approx(path.periods[0].revenue, 10_000.0);
        assert_approx(path.periods[1].revenue, 11_000.0);
        assert_approx(path.periods[2].revenue, 12_100.0);
    }

    #[test]
    fn planned_hires_raise_costs_from_their_start_period() {
        let mut inputs = sample_inputs();
        inputs.planned_hires = vec![
            PlannedHire {
                start_period: 2,
                monthly_cost: 4_000.0,
            },
            PlannedHire {
                start_period: 5,
                monthly_cost: 6_000.0,
            },
        ];
        let path = project_deterministic(&inputs).expect("valid inputs");

        assert_approx(path.periods[1].total_costs, 20_000.0);
        assert_approx(path.periods[2].total_costs, 24_000.0);
        assert_approx(path.periods[4].total_costs, 24_000.0);
        assert_approx(path.periods[5].total_costs, 30_000.0);
        assert_approx(path.periods[23].total_costs, 30_000.0);
    }

    #[test]
    fn simulate_rejects_invalid_inputs_before_any_work() {
        let mut inputs = sample_inputs();
        inputs.cash_on_hand = f64::NAN;
        assert!(matches!(
            simulate(&inputs),
            Err(SimulationError::InvalidInput(_))
        ));
    }

    #[test]
    fn zero_volatility_collapses_onto_deterministic_path() {
        let mut inputs = sample_inputs();
        inputs.revenue_growth_rate = 0.04;
        inputs.num_simulations = 50;
        let result = simulate(&inputs).expect("valid inputs");
        let deterministic = &result.deterministic;

        let expected_insolvency = if deterministic.is_insolvent_within_horizon() {
            1.0
        } else {
            0.0
        };
        let expected_break_even = if deterministic.break_even_month.is_some() {
            1.0
        } else {
            0.0
        };
        assert_eq!(result.monte_carlo.insolvency_probability, expected_insolvency);
        assert_eq!(result.monte_carlo.break_even_probability, expected_break_even);

        for band in &result.monte_carlo.percentile_bands {
            for (cash, period) in band.ending_cash.iter().zip(&deterministic.periods) {
                assert!(
                    (cash - period.ending_cash).abs() <= 1e-6,
                    "band p{} diverged: {cash} vs {}",
                    band.percentile,
                    period.ending_cash
                );
            }
        }
    }

    #[test]
    fn identical_seed_and_inputs_reproduce_bit_identical_results() {
        let mut inputs = sample_inputs();
        inputs.growth_volatility = 0.05;
        inputs.revenue_growth_rate = 0.03;
        inputs.keep_sample_paths = true;
        inputs.num_simulations = 64;

        let first = simulate(&inputs).expect("valid inputs");
        let second = simulate(&inputs).expect("valid inputs");
        assert_eq!(first, second);
    }

    #[test]
    fn different_seeds_diverge() {
        let mut inputs = sample_inputs();
        inputs.growth_volatility = 0.05;
        inputs.num_simulations = 64;

        let first = simulate(&inputs).expect("valid inputs");
        inputs.seed = 43;
        let second = simulate(&inputs).expect("valid inputs");
        assert_ne!(
            first.monte_carlo.percentile_bands,
            second.monte_carlo.percentile_bands
        );
    }

    #[test]
    fn wider_volatility_never_narrows_the_percentile_spread() {
        let spreads = |volatility: f64| -> Vec<f64> {
            let mut inputs = sample_inputs();
            inputs.revenue_growth_rate = 0.03;
            inputs.growth_volatility = volatility;
            inputs.num_simulations = 400;
            inputs.horizon_periods = 12;
            let (summary, _) = run_monte_carlo(&inputs, 0.0);
            let p10 = &summary.percentile_bands[0].ending_cash;
            let p90 = &summary.percentile_bands[2].ending_cash;
            p10.iter().zip(p90).map(|(lo, hi)| hi - lo).collect()
        };

        let narrow = spreads(0.02);
        let wide = spreads(0.08);
        for (period, (n, w)) in narrow.iter().zip(&wide).enumerate() {
            assert!(
                w + 1e-9 >= *n,
                "spread narrowed at period {period}: {w} < {n}"
            );
        }
    }

    #[test]
    fn single_sample_run_equals_its_own_trajectory() {
        let mut inputs = sample_inputs();
        inputs.growth_volatility = 0.06;
        inputs.revenue_growth_rate = 0.02;
        inputs.num_simulations = 1;
        inputs.keep_sample_paths = true;

        let (summary, paths) = run_monte_carlo(&inputs, 0.0);
        assert_eq!(paths.len(), 1);

        let mut rng = Rng::new(derive_seed(inputs.seed, 0));
        let rates = sample_growth_rates(&inputs, &mut rng);
        let expected = project_path(&inputs, &rates, 0.0);
        assert_eq!(paths[0], expected);

        assert!(summary.insolvency_probability == 0.0 || summary.insolvency_probability == 1.0);
        for band in &summary.percentile_bands {
            for (cash, period) in band.ending_cash.iter().zip(&expected.periods) {
                assert_approx(*cash, period.ending_cash);
            }
        }
    }

    #[test]
    fn uniform_draws_stay_inside_their_support() {
        let mut inputs = sample_inputs();
        inputs.growth_distribution = GrowthDistribution::Uniform;
        inputs.revenue_growth_rate = 0.05;
        inputs.growth_volatility = 0.02;
        let half_width = 3.0f64.sqrt() * inputs.growth_volatility;

        let mut rng = Rng::new(derive_seed(inputs.seed, 7));
        let rates = sample_growth_rates(&inputs, &mut rng);
        for rate in rates {
            assert!(rate >= inputs.revenue_growth_rate - half_width - EPS);
            assert!(rate <= inputs.revenue_growth_rate + half_width + EPS);
        }
    }

    #[test]
    fn percentile_interpolates_between_order_statistics() {
        let mut values = vec![30.0, 10.0, 20.0, 40.0];
        assert_approx(percentile(&mut values, 0.0), 10.0);
        assert_approx(percentile(&mut values, 100.0), 40.0);
        assert_approx(percentile(&mut values, 50.0), 25.0);
        // rank 0.3 between the first two order statistics
        assert_approx(percentile(&mut values, 10.0), 13.0);
    }

    #[test]
    fn percentile_of_single_value_is_that_value() {
        let mut values = vec![7.5];
        assert_approx(percentile(&mut values, 90.0), 7.5);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_consecutive_periods_chain_ending_to_starting_cash(
            seed in any::<u64>(),
            cash in 0u32..500_000,
            revenue in 0u32..80_000,
            fixed in 0u32..60_000,
            variable in 0u32..40_000,
            growth_bp in -500i32..1500,
            vol_bp in 0u32..1200,
            horizon in 1u32..36,
        ) {
            let mut inputs = sample_inputs();
            inputs.seed = seed;
            inputs.cash_on_hand = cash as f64;
            inputs.monthly_revenue = revenue as f64;
            inputs.fixed_costs = fixed as f64;
            inputs.variable_costs = variable as f64;
            inputs.revenue_growth_rate = growth_bp as f64 / 10_000.0;
            inputs.growth_volatility = vol_bp as f64 / 10_000.0;
            inputs.horizon_periods = horizon;
            inputs.num_simulations = 8;
            inputs.keep_sample_paths = true;

            let result = simulate(&inputs).expect("valid inputs");
            let mut paths = result.sample_paths.clone();
            paths.push(result.deterministic.clone());

            for path in &paths {
                prop_assert!(path.periods.len() == horizon as usize);
                prop_assert!((path.periods[0].starting_cash - inputs.cash_on_hand).abs() <= EPS);
                for pair in path.periods.windows(2) {
                    prop_assert!((pair[0].ending_cash - pair[1].starting_cash).abs() <= EPS);
                }
                for period in &path.periods {
                    prop_assert!(period.ending_cash.is_finite());
                    prop_assert!((period.net_burn - (period.total_costs - period.revenue)).abs() <= EPS);
                }
            }
        }
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_runway_is_the_first_negative_crossing(
            cash in 0u32..400_000,
            burn in 1u32..50_000,
            horizon in 1u32..48,
        ) {
            let mut inputs = sample_inputs();
            inputs.cash_on_hand = cash as f64;
            inputs.monthly_revenue = 0.0;
            inputs.fixed_costs = burn as f64;
            inputs.variable_costs = 0.0;
            inputs.horizon_periods = horizon;

            let path = project_deterministic(&inputs).expect("valid inputs");
            match path.runway {
                Runway::Months(m) => {
                    prop_assert!(path.periods[m as usize].ending_cash < 0.0);
                    for period in &path.periods[..m as usize] {
                        prop_assert!(period.ending_cash >= 0.0);
                    }
                }
                Runway::BeyondHorizon => {
                    for period in &path.periods {
                        prop_assert!(period.ending_cash >= 0.0);
                    }
                }
            }
        }
    }
}
