use std::io::{self, Read, Write};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use prodplan_engine::model::{
    ProductionJob, Resource, ScenarioDescriptor, ScheduleOptimizationResult,
};
use prodplan_engine::{analyze_scenario, solver, validator, EngineConfig, ValidationError, ValidationIssue};

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
enum Request {
    #[serde(rename_all = "camelCase")]
    Optimize {
        jobs: Vec<ProductionJob>,
        resources: Vec<Resource>,
        start_date: Option<NaiveDateTime>,
        #[serde(default)]
        config: EngineConfig,
    },
    #[serde(rename_all = "camelCase")]
    Validate {
        jobs: Vec<ProductionJob>,
        resources: Vec<Resource>,
        start_date: Option<NaiveDateTime>,
        #[serde(default)]
        config: EngineConfig,
    },
    #[serde(rename_all = "camelCase")]
    AnalyzeScenario {
        baseline: Box<ScheduleOptimizationResult>,
        scenario: ScenarioDescriptor,
        jobs: Vec<ProductionJob>,
        resources: Vec<Resource>,
        #[serde(default)]
        config: EngineConfig,
    },
}

#[derive(Debug, Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrResponse {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    issues: Option<Vec<ValidationIssue>>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn init_logging() {
    let filter = EnvFilter::try_from_env("PRODPLAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    // stdout carries the response, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn write_ok<T: Serialize>(data: T) {
    let resp = OkResponse { ok: true, data };
    let json = serde_json::to_string(&resp).unwrap_or_else(|e| {
        format!("{{\"ok\":false,\"error\":\"serialization error: {}\"}}", e)
    });
    println!("{}", json);
    let _ = io::stdout().flush();
}

fn write_err(msg: impl std::fmt::Display, issues: Option<Vec<ValidationIssue>>) -> ! {
    let resp = ErrResponse {
        ok: false,
        error: msg.to_string(),
        issues,
    };
    let json = serde_json::to_string(&resp).unwrap_or_else(|_| {
        "{\"ok\":false,\"error\":\"double serialization error\"}".to_string()
    });
    println!("{}", json);
    let _ = io::stdout().flush();
    std::process::exit(1);
}

fn write_validation_err(e: ValidationError) -> ! {
    let message = e.to_string();
    write_err(message, Some(e.0))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    init_logging();

    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        write_err(format!("Failed to read stdin: {}", e), None);
    }

    let request: Request = match serde_json::from_str(&input) {
        Ok(r) => r,
        Err(e) => write_err(format!("Invalid JSON input: {}", e), None),
    };

    match request {
        Request::Optimize {
            jobs,
            resources,
            start_date,
            config,
        } => match solver::optimize_schedule(&jobs, &resources, start_date, &config) {
            Ok(result) => write_ok(result),
            Err(e) => write_validation_err(e),
        },
        Request::Validate {
            jobs,
            resources,
            start_date,
            config,
        } => {
            let start = solver::normalize_start(
                start_date.unwrap_or_else(|| chrono::Local::now().naive_local()),
            );
            write_ok(validator::validate(&jobs, &resources, start, &config));
        }
        Request::AnalyzeScenario {
            baseline,
            scenario,
            jobs,
            resources,
            config,
        } => match analyze_scenario(&baseline, &scenario, &jobs, &resources, &config) {
            Ok(comparison) => write_ok(comparison),
            Err(e) => write_validation_err(e),
        },
    }
}
