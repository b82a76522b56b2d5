use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    GrowthDistribution, HiringSafetyOutcome, HiringSearchConfig, Inputs, PercentileBand,
    PlannedHire, ProjectionPath, RiskLevel, RiskThresholds, Runway, SensitivityPoint,
    SimulationResult, simulate,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliGrowthDistribution {
    Normal,
    Uniform,
}

impl From<CliGrowthDistribution> for GrowthDistribution {
    fn from(value: CliGrowthDistribution) -> Self {
        match value {
            CliGrowthDistribution::Normal => GrowthDistribution::Normal,
            CliGrowthDistribution::Uniform => GrowthDistribution::Uniform,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiGrowthDistribution {
    Normal,
    Uniform,
}

impl From<ApiGrowthDistribution> for CliGrowthDistribution {
    fn from(value: ApiGrowthDistribution) -> Self {
        match value {
            ApiGrowthDistribution::Normal => CliGrowthDistribution::Normal,
            ApiGrowthDistribution::Uniform => CliGrowthDistribution::Uniform,
        }
    }
}

/// Engine tunables with their documented defaults. Growth, volatility, and
/// probability cutoffs are given in percent and converted to fractions when
/// the `Inputs` value is built.
#[derive(Parser, Debug)]
#[command(
    name = "runway",
    about = "Cash runway and burn-risk estimator (deterministic projection + Monte Carlo)"
)]
struct Cli {
    #[arg(long)]
    cash_on_hand: f64,
    #[arg(long)]
    monthly_revenue: f64,
    #[arg(long)]
    fixed_costs: f64,
    #[arg(long, default_value_t = 0.0)]
    variable_costs: f64,
    #[arg(long, default_value_t = 0, help = "Current headcount")]
    team_size: u32,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Fully loaded monthly cost per employee"
    )]
    cost_per_employee: f64,
    #[arg(
        long,
        help = "Expected month-over-month revenue growth in percent, e.g. 5"
    )]
    revenue_growth_rate: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Month-over-month growth volatility in percent"
    )]
    growth_volatility: f64,
    #[arg(
        long,
        value_enum,
        default_value_t = CliGrowthDistribution::Normal,
        help = "Distribution family for sampled growth rates"
    )]
    growth_distribution: CliGrowthDistribution,
    #[arg(
        long = "hire",
        value_name = "PERIOD:COST",
        help = "Planned hire as start-period:monthly-cost; repeatable"
    )]
    hires: Vec<String>,
    #[arg(long, default_value_t = 24, help = "Projection horizon in months")]
    horizon_months: u32,
    #[arg(long, default_value_t = 5_000, help = "Monte Carlo sample count")]
    simulations: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(
        long,
        default_value_t = false,
        help = "Retain every sampled path in the response"
    )]
    keep_sample_paths: bool,
    #[arg(
        long,
        default_value_t = 5.0,
        help = "Insolvency probability in percent below which risk is Safe"
    )]
    safe_max_insolvency: f64,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Insolvency probability in percent below which risk is Caution"
    )]
    caution_max_insolvency: f64,
    #[arg(
        long,
        default_value_t = 50.0,
        help = "Insolvency probability in percent below which risk is High Risk"
    )]
    high_risk_max_insolvency: f64,
    #[arg(
        long,
        default_value_t = 12,
        help = "Deterministic runway in months below which risk is at least Caution"
    )]
    caution_min_runway: u32,
    #[arg(
        long,
        default_value_t = 6,
        help = "Deterministic runway in months below which risk is at least High Risk"
    )]
    high_risk_min_runway: u32,
    #[arg(
        long,
        default_value_t = 3,
        help = "Deterministic runway in months below which risk is Critical"
    )]
    critical_min_runway: u32,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Insolvency probability tolerance in percent for the hiring-safety search"
    )]
    hiring_tolerance: f64,
    #[arg(
        long,
        help = "Top of the hiring-increment search bracket; defaults to cash-on-hand + monthly-revenue"
    )]
    hiring_search_max: Option<f64>,
    #[arg(
        long,
        default_value_t = 50.0,
        help = "Stop the hiring search once the bracket is this narrow"
    )]
    hiring_cost_resolution: f64,
    #[arg(long, default_value_t = 32)]
    hiring_max_iterations: u32,
    #[arg(
        long,
        help = "Reduced sample count for hiring-search probe iterations; defaults to --simulations"
    )]
    hiring_simulations_per_iteration: Option<u32>,
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [10.0, 50.0, 90.0],
        help = "Percentile bands to report"
    )]
    percentiles: Vec<f64>,
    #[arg(
        long,
        value_delimiter = ',',
        default_values_t = [0.5, 1.0, 1.5],
        help = "Growth multipliers for the revenue sensitivity table"
    )]
    sensitivity_multipliers: Vec<f64>,
    #[arg(
        long,
        default_value_t = 50_000_000,
        help = "Ceiling on simulations x horizon before a run is rejected"
    )]
    max_period_cells: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HirePayload {
    start_period: u32,
    monthly_cost: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    cash_on_hand: Option<f64>,
    monthly_revenue: Option<f64>,
    fixed_costs: Option<f64>,
    variable_costs: Option<f64>,
    team_size: Option<u32>,
    cost_per_employee: Option<f64>,
    revenue_growth_rate: Option<f64>,
    growth_volatility: Option<f64>,
    growth_distribution: Option<ApiGrowthDistribution>,
    planned_hires: Option<Vec<HirePayload>>,
    horizon_months: Option<u32>,
    simulations: Option<u32>,
    seed: Option<u64>,
    keep_sample_paths: Option<bool>,
    safe_max_insolvency: Option<f64>,
    caution_max_insolvency: Option<f64>,
    high_risk_max_insolvency: Option<f64>,
    caution_min_runway: Option<u32>,
    high_risk_min_runway: Option<u32>,
    critical_min_runway: Option<u32>,
    hiring_tolerance: Option<f64>,
    hiring_search_max: Option<f64>,
    hiring_cost_resolution: Option<f64>,
    hiring_max_iterations: Option<u32>,
    hiring_simulations_per_iteration: Option<u32>,
    percentiles: Option<Vec<f64>>,
    sensitivity_multipliers: Option<Vec<f64>>,
    max_period_cells: Option<u64>,
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    let planned_hires = parse_hires(&cli.hires)?;

    let inputs = Inputs {
        cash_on_hand: cli.cash_on_hand,
        monthly_revenue: cli.monthly_revenue,
        fixed_costs: cli.fixed_costs,
        variable_costs: cli.variable_costs,
        team_size: cli.team_size,
        cost_per_employee: cli.cost_per_employee,
        revenue_growth_rate: cli.revenue_growth_rate / 100.0,
        growth_volatility: cli.growth_volatility / 100.0,
        growth_distribution: cli.growth_distribution.into(),
        planned_hires,
        horizon_periods: cli.horizon_months,
        num_simulations: cli.simulations,
        percentiles: cli.percentiles,
        keep_sample_paths: cli.keep_sample_paths,
        seed: cli.seed,
        risk_thresholds: RiskThresholds {
            safe_max_insolvency: cli.safe_max_insolvency / 100.0,
            caution_max_insolvency: cli.caution_max_insolvency / 100.0,
            high_risk_max_insolvency: cli.high_risk_max_insolvency / 100.0,
            caution_min_runway: cli.caution_min_runway,
            high_risk_min_runway: cli.high_risk_min_runway,
            critical_min_runway: cli.critical_min_runway,
        },
        hiring: HiringSearchConfig {
            tolerance: cli.hiring_tolerance / 100.0,
            search_max: cli.hiring_search_max,
            cost_resolution: cli.hiring_cost_resolution,
            max_iterations: cli.hiring_max_iterations,
            simulations_per_iteration: cli.hiring_simulations_per_iteration,
        },
        sensitivity_multipliers: cli.sensitivity_multipliers,
        max_period_cells: cli.max_period_cells,
    };

    inputs.validate().map_err(|e| e.to_string())?;
    Ok(inputs)
}

fn parse_hires(raw: &[String]) -> Result<Vec<PlannedHire>, String> {
    let mut hires = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some((period, cost)) = entry.split_once(':') else {
            return Err(format!("--hire must look like PERIOD:COST, got '{entry}'"));
        };
        let start_period = period
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("--hire period must be a non-negative integer, got '{period}'"))?;
        let monthly_cost = cost
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("--hire cost must be a number, got '{cost}'"))?;
        hires.push(PlannedHire {
            start_period,
            monthly_cost,
        });
    }
    hires.sort_by_key(|hire| hire.start_period);
    Ok(hires)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("Runway HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/health");

    axum::serve(listener, app).await
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match simulate(&inputs) {
        Ok(result) => json_response(StatusCode::OK, build_simulate_response(&inputs, result)),
        Err(e) => error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn inputs_from_payload(payload: SimulatePayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.cash_on_hand {
        cli.cash_on_hand = v;
    }
    if let Some(v) = payload.monthly_revenue {
        cli.monthly_revenue = v;
    }
    if let Some(v) = payload.fixed_costs {
        cli.fixed_costs = v;
    }
    if let Some(v) = payload.variable_costs {
        cli.variable_costs = v;
    }
    if let Some(v) = payload.team_size {
        cli.team_size = v;
    }
    if let Some(v) = payload.cost_per_employee {
        cli.cost_per_employee = v;
    }
    if let Some(v) = payload.revenue_growth_rate {
        cli.revenue_growth_rate = v;
    }
    if let Some(v) = payload.growth_volatility {
        cli.growth_volatility = v;
    }
    if let Some(v) = payload.growth_distribution {
        cli.growth_distribution = CliGrowthDistribution::from(v);
    }
    if let Some(hires) = &payload.planned_hires {
        cli.hires = hires
            .iter()
            .map(|h| format!("{}:{}", h.start_period, h.monthly_cost))
            .collect();
    }
    if let Some(v) = payload.horizon_months {
        cli.horizon_months = v;
    }
    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = v;
    }
    if let Some(v) = payload.keep_sample_paths {
        cli.keep_sample_paths = v;
    }
    if let Some(v) = payload.safe_max_insolvency {
        cli.safe_max_insolvency = v;
    }
    if let Some(v) = payload.caution_max_insolvency {
        cli.caution_max_insolvency = v;
    }
    if let Some(v) = payload.high_risk_max_insolvency {
        cli.high_risk_max_insolvency = v;
    }
    if let Some(v) = payload.caution_min_runway {
        cli.caution_min_runway = v;
    }
    if let Some(v) = payload.high_risk_min_runway {
        cli.high_risk_min_runway = v;
    }
    if let Some(v) = payload.critical_min_runway {
        cli.critical_min_runway = v;
    }
    if let Some(v) = payload.hiring_tolerance {
        cli.hiring_tolerance = v;
    }
    if let Some(v) = payload.hiring_search_max {
        cli.hiring_search_max = Some(v);
    }
    if let Some(v) = payload.hiring_cost_resolution {
        cli.hiring_cost_resolution = v;
    }
    if let Some(v) = payload.hiring_max_iterations {
        cli.hiring_max_iterations = v;
    }
    if let Some(v) = payload.hiring_simulations_per_iteration {
        cli.hiring_simulations_per_iteration = Some(v);
    }
    if let Some(v) = payload.percentiles {
        cli.percentiles = v;
    }
    if let Some(v) = payload.sensitivity_multipliers {
        cli.sensitivity_multipliers = v;
    }
    if let Some(v) = payload.max_period_cells {
        cli.max_period_cells = v;
    }

    build_inputs(cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        cash_on_hand: 250_000.0,
        monthly_revenue: 30_000.0,
        fixed_costs: 20_000.0,
        variable_costs: 8_000.0,
        team_size: 5,
        cost_per_employee: 9_000.0,
        revenue_growth_rate: 5.0,
        growth_volatility: 3.0,
        growth_distribution: CliGrowthDistribution::Normal,
        hires: Vec::new(),
        horizon_months: 24,
        simulations: 5_000,
        seed: 42,
        keep_sample_paths: false,
        safe_max_insolvency: 5.0,
        caution_max_insolvency: 20.0,
        high_risk_max_insolvency: 50.0,
        caution_min_runway: 12,
        high_risk_min_runway: 6,
        critical_min_runway: 3,
        hiring_tolerance: 20.0,
        hiring_search_max: None,
        hiring_cost_resolution: 50.0,
        hiring_max_iterations: 32,
        hiring_simulations_per_iteration: Some(500),
        percentiles: vec![10.0, 50.0, 90.0],
        sensitivity_multipliers: vec![0.5, 1.0, 1.5],
        max_period_cells: 50_000_000,
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    horizon_months: u32,
    simulations: u32,
    seed: u64,
    current_net_burn: f64,
    runway_months: Runway,
    break_even_month: Option<u32>,
    risk: RiskLevel,
    insolvency_probability: f64,
    break_even_probability: f64,
    percentile_bands: Vec<PercentileBand>,
    deterministic: ProjectionPath,
    sample_paths: Vec<ProjectionPath>,
    hiring_safety: HiringSafetyOutcome,
    revenue_sensitivity: Vec<SensitivityPoint>,
}

fn build_simulate_response(inputs: &Inputs, result: SimulationResult) -> SimulateResponse {
    SimulateResponse {
        horizon_months: inputs.horizon_periods,
        simulations: inputs.num_simulations,
        seed: inputs.seed,
        current_net_burn: result.deterministic.current_net_burn(),
        runway_months: result.deterministic.runway,
        break_even_month: result.deterministic.break_even_month,
        risk: result.risk,
        insolvency_probability: result.monte_carlo.insolvency_probability,
        break_even_probability: result.monte_carlo.break_even_probability,
        percentile_bands: result.monte_carlo.percentile_bands,
        deterministic: result.deterministic,
        sample_paths: result.sample_paths,
        hiring_safety: result.hiring_safety,
        revenue_sensitivity: result.revenue_sensitivity,
    }
}
