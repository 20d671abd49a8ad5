/// Integration tests for the prodplan-engine binary.
///
/// These spawn the compiled binary via assert_cmd and exercise the JSON
/// stdin/stdout protocol for each command.
use assert_cmd::Command;
use predicates::str::contains;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn cmd() -> Command {
    Command::cargo_bin("prodplan-engine").unwrap()
}

fn job(id: &str, priority: &str, deadline: &str, hours: f64, skill: &str, stage: &str, deps: &[&str]) -> Value {
    json!({
        "id": id,
        "orderId": format!("ord-{id}"),
        "clientName": "Northwind",
        "garmentType": "hoodie",
        "quantity": 50,
        "priority": priority,
        "deadline": deadline,
        "estimatedHours": hours,
        "requiredSkills": [skill],
        "dependencies": deps,
        "currentStage": stage
    })
}

fn resource(id: &str, kind: &str, skills: &[&str]) -> Value {
    json!({
        "id": id,
        "name": id,
        "resourceType": kind,
        "skills": skills,
        "capacityHoursPerDay": 8.0
    })
}

fn three_jobs() -> Value {
    json!([
        job("J1", "URGENT", "2026-03-02T12:00:00", 2.0, "cut", "CUTTING", &[]),
        job("J2", "LOW", "2026-03-04T08:00:00", 6.0, "cut", "CUTTING", &[]),
        job("J3", "MEDIUM", "2026-03-02T18:00:00", 3.0, "sew", "SEWING", &["J1"]),
    ])
}

fn run(input: &Value) -> Value {
    let output = cmd().write_stdin(input.to_string()).output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// optimize
// ---------------------------------------------------------------------------

#[test]
fn optimize_three_job_order() {
    let input = json!({
        "command": "optimize",
        "jobs": three_jobs(),
        "resources": [resource("cutter", "MACHINE", &["cut"]), resource("sewer", "OPERATOR", &["sew"])],
        "startDate": "2026-03-02T08:00:00"
    });

    cmd()
        .write_stdin(input.to_string())
        .assert()
        .success()
        .stdout(contains(r#""ok":true"#))
        .stdout(contains(r#""optimizationScore""#));

    let resp = run(&input);
    let tasks = resp["data"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 3);

    let find = |id: &str| tasks.iter().find(|t| t["jobId"] == id).unwrap().clone();
    assert_eq!(find("J1")["start"], "2026-03-02T08:00:00");
    assert_eq!(find("J1")["end"], "2026-03-02T10:00:00");
    assert_eq!(find("J2")["start"], "2026-03-02T10:00:00");
    assert_eq!(find("J3")["start"], "2026-03-02T10:00:00");
    assert_eq!(find("J3")["resourceId"], "sewer");
    assert_eq!(resp["data"]["metrics"]["onTimeRate"], 1.0);
    assert_eq!(resp["data"]["priorityOrder"][0]["jobId"], "J1");
}

#[test]
fn optimize_reports_missing_skill() {
    let input = json!({
        "command": "optimize",
        "jobs": three_jobs(),
        "resources": [resource("cutter", "MACHINE", &["cut"])],
        "startDate": "2026-03-02T08:00:00"
    });

    let resp = run(&input);
    assert_eq!(resp["ok"], true);
    let unscheduled = resp["data"]["unscheduled"].as_array().unwrap();
    assert_eq!(unscheduled.len(), 1);
    assert_eq!(unscheduled[0]["jobId"], "J3");
    assert_eq!(unscheduled[0]["reason"], "NO_ELIGIBLE_RESOURCE");

    let kinds: Vec<&str> = resp["data"]["recommendations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"ADD_SKILL_CAPACITY"));
}

#[test]
fn optimize_rejects_cycle() {
    let input = json!({
        "command": "optimize",
        "jobs": [
            job("a", "HIGH", "2026-03-03T08:00:00", 1.0, "cut", "CUTTING", &["b"]),
            job("b", "HIGH", "2026-03-03T08:00:00", 1.0, "cut", "CUTTING", &["a"]),
        ],
        "resources": [resource("cutter", "MACHINE", &["cut"])],
        "startDate": "2026-03-02T08:00:00"
    });

    cmd()
        .write_stdin(input.to_string())
        .assert()
        .failure()
        .code(1)
        .stdout(contains(r#""ok":false"#))
        .stdout(contains(r#""code":"DEPENDENCY_CYCLE""#));
}

#[test]
fn optimize_rejects_oversized_horizon() {
    let input = json!({
        "command": "optimize",
        "jobs": three_jobs(),
        "resources": [resource("cutter", "MACHINE", &["cut"])],
        "startDate": "2026-03-02T08:00:00",
        "config": {"allocation": {"maxHorizonDays": 4611686018427387903i64}}
    });

    cmd()
        .write_stdin(input.to_string())
        .assert()
        .failure()
        .code(1)
        .stdout(contains(r#""code":"INVALID_CONFIG""#))
        .stdout(contains("allocation.maxHorizonDays"));
}

#[test]
fn optimize_multi_day_utilization_stays_bounded() {
    let input = json!({
        "command": "optimize",
        "jobs": [
            job("big", "URGENT", "2026-03-04T08:00:00", 8.0, "cut", "CUTTING", &[]),
            job("small", "LOW", "2026-03-04T08:00:00", 4.0, "cut", "CUTTING", &[]),
        ],
        "resources": [resource("cutter", "MACHINE", &["cut"])],
        "startDate": "2026-03-02T08:00:00"
    });

    let resp = run(&input);
    let metrics = &resp["data"]["metrics"];
    assert_eq!(metrics["horizonDays"], 2);
    assert_eq!(metrics["utilizationByResource"]["cutter"], 0.75);
    assert_eq!(metrics["wastedCapacityHours"], 4.0);
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_lists_errors_without_failing() {
    let input = json!({
        "command": "validate",
        "jobs": three_jobs(),
        "resources": [
            resource("cutter", "MACHINE", &["cut"]),
            resource("cutter", "MACHINE", &["cut"])
        ],
        "startDate": "2026-03-02T08:00:00"
    });

    let output = cmd().write_stdin(input.to_string()).assert().success();
    let resp: Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(resp["ok"], true);
    let errors = resp["data"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "DUPLICATE_RESOURCE_ID");
    assert_eq!(errors[0]["id"], "cutter");
}

// ---------------------------------------------------------------------------
// analyzeScenario
// ---------------------------------------------------------------------------

#[test]
fn analyze_scenario_add_resource() {
    let resources = json!([resource("cutter", "MACHINE", &["cut"])]);
    let baseline = run(&json!({
        "command": "optimize",
        "jobs": three_jobs(),
        "resources": resources,
        "startDate": "2026-03-02T08:00:00"
    }));

    let input = json!({
        "command": "analyzeScenario",
        "baseline": baseline["data"],
        "scenario": {"type": "ADD_RESOURCE", "resource": resource("sewer", "OPERATOR", &["sew"])},
        "jobs": three_jobs(),
        "resources": resources
    });

    let resp = run(&input);
    assert_eq!(resp["ok"], true);
    assert_eq!(resp["data"]["newlyScheduled"], json!(["J3"]));
    assert_eq!(resp["data"]["result"]["metrics"]["onTimeRate"], 1.0);
    assert_eq!(resp["data"]["result"]["startDate"], "2026-03-02T08:00:00");
    let on_time = resp["data"]["deltas"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["metric"] == "onTimeRate")
        .unwrap()
        .clone();
    assert!(on_time["delta"].as_f64().unwrap() > 0.0);
}

#[test]
fn analyze_scenario_unknown_job() {
    let resources = json!([resource("cutter", "MACHINE", &["cut"])]);
    let baseline = run(&json!({
        "command": "optimize",
        "jobs": three_jobs(),
        "resources": resources,
        "startDate": "2026-03-02T08:00:00"
    }));

    let input = json!({
        "command": "analyzeScenario",
        "baseline": baseline["data"],
        "scenario": {"type": "REMOVE_JOB", "jobId": "ghost"},
        "jobs": three_jobs(),
        "resources": resources
    });

    cmd()
        .write_stdin(input.to_string())
        .assert()
        .failure()
        .stdout(contains(r#""code":"UNKNOWN_SCENARIO_JOB""#));
}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

#[test]
fn invalid_json_input() {
    cmd()
        .write_stdin("not json")
        .assert()
        .failure()
        .stdout(contains(r#""ok":false"#))
        .stdout(contains("Invalid JSON input"));
}

#[test]
fn unknown_command() {
    cmd()
        .write_stdin(r#"{"command":"reticulate"}"#)
        .assert()
        .failure()
        .stdout(contains(r#""ok":false"#));
}
