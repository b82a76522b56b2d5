use super::engine::run_monte_carlo;
use super::types::{HiringSafetyOutcome, HiringSolveIteration, Inputs};

/// Finds the largest recurring monthly cost increment (a new hire from period
/// 0 onward) that keeps the Monte Carlo insolvency probability strictly below
/// the configured tolerance.
///
/// Bisection over [0, search_max]: the lower bound is always a safe
/// increment, the upper bound always unsafe, and the bracket shrinks until it
/// is narrower than the cost resolution or the iteration cap is hit. "Even
/// zero additional hiring breaches tolerance" is a legitimate business
/// answer, reported as an infeasible outcome rather than an error.
pub fn solve_hiring_safety(inputs: &Inputs) -> HiringSafetyOutcome {
    let config = inputs.hiring;
    // An increment of cash + revenue burns the whole balance in period 0, so
    // the default bracket top is guaranteed unsafe.
    let search_max = config
        .search_max
        .unwrap_or((inputs.cash_on_hand + inputs.monthly_revenue).max(1.0));

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let zero_probability = evaluate_increment(inputs, 0.0, config.simulations_per_iteration);
    let top_probability = evaluate_increment(inputs, search_max, config.simulations_per_iteration);

    let mut safe_increment = None;
    let mut converged = false;
    let feasible;
    let message;

    if zero_probability >= config.tolerance {
        feasible = false;
        message = "No safe increment: even without additional hiring, insolvency risk meets or exceeds the tolerance.".to_string();
    } else if top_probability < config.tolerance {
        safe_increment = Some(search_max);
        converged = true;
        feasible = true;
        message =
            "Upper search bound is still safe; increase search max for a larger increment."
                .to_string();
    } else {
        let mut lo = 0.0;
        let mut hi = search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let probability = evaluate_increment(inputs, mid, config.simulations_per_iteration);
            iterations.push(HiringSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_cost: mid,
                insolvency_probability: probability,
            });

            if probability < config.tolerance {
                lo = mid;
            } else {
                hi = mid;
            }

            if (hi - lo).abs() <= config.cost_resolution {
                converged = true;
                safe_increment = Some(lo);
                break;
            }
        }
        if safe_increment.is_none() {
            safe_increment = Some(lo);
        }
        feasible = true;
        message = if converged {
            "Solved maximum safe hiring increment.".to_string()
        } else {
            "Reached max iterations before the cost resolution was met; returning best safe bound."
                .to_string()
        };
    }

    // Re-evaluate the chosen increment at the full sample count.
    let achieved_insolvency_probability = safe_increment
        .map(|increment| evaluate_increment(inputs, increment, None));

    HiringSafetyOutcome {
        tolerance: config.tolerance,
        search_max,
        cost_resolution: config.cost_resolution,
        max_iterations: config.max_iterations,
        safe_increment,
        achieved_insolvency_probability,
        iterations,
        converged,
        feasible,
        message,
    }
}

fn evaluate_increment(
    base_inputs: &Inputs,
    increment: f64,
    simulations_override: Option<u32>,
) -> f64 {
    let mut inputs = base_inputs.clone();
    if let Some(simulations) = simulations_override {
        inputs.num_simulations = simulations.max(1);
    }
    inputs.keep_sample_paths = false;
    run_monte_carlo(&inputs, increment).0.insolvency_probability
}
