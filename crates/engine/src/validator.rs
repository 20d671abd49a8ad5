use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, MAX_HORIZON_DAYS_LIMIT};
use crate::dependency::DependencyGraph;
use crate::matcher;
use crate::model::{JobStatus, ProductionJob, Resource};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A hard input error. Any one of these rejects the whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationIssue {
    #[error("Circular dependency between jobs: {}", .jobs.join(" -> "))]
    DependencyCycle { jobs: Vec<String> },
    #[error("Duplicate job ID '{id}'")]
    DuplicateJobId { id: String },
    #[error("Duplicate resource ID '{id}'")]
    DuplicateResourceId { id: String },
    #[error("Resource '{resource}' has non-positive capacity ({value} hours/day)")]
    InvalidCapacity { resource: String, value: f64 },
    #[error("Resource '{resource}' has non-positive efficiency rating ({value})")]
    InvalidEfficiency { resource: String, value: f64 },
    #[error("Resource '{resource}' has a malformed availability window: {detail}")]
    InvalidAvailability { resource: String, detail: String },
    #[error("Config setting '{field}' is out of range: {detail}")]
    InvalidConfig { field: String, detail: String },
    #[error("Scenario references unknown job '{id}'")]
    UnknownScenarioJob { id: String },
}

/// Every hard error found in one input set.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("input validation failed: {}", render_issues(.0))]
pub struct ValidationError(pub Vec<ValidationIssue>);

impl ValidationError {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }
}

fn render_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Job-level problem. The job is degraded to unscheduled instead of
/// failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobWarningKind {
    NonPositiveQuantity,
    NonPositiveDuration,
    DeadlineNotAfterStart,
    UnknownDependency,
    NoCompatibleResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobWarning {
    pub job_id: String,
    pub kind: JobWarningKind,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Validation result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<JobWarning>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Hard errors become a `ValidationError`; otherwise the job warnings
    /// grouped by job id.
    pub fn into_result(self) -> Result<BTreeMap<String, Vec<JobWarning>>, ValidationError> {
        if !self.errors.is_empty() {
            return Err(ValidationError(self.errors));
        }
        let mut by_job: BTreeMap<String, Vec<JobWarning>> = BTreeMap::new();
        for w in self.warnings {
            by_job.entry(w.job_id.clone()).or_default().push(w);
        }
        Ok(by_job)
    }
}

// ---------------------------------------------------------------------------
// Validate implementation
// ---------------------------------------------------------------------------

/// Validate jobs and resources against the run start. All violations are
/// collected; errors are listed in discovery order (ids, resources, cycles).
pub fn validate(
    jobs: &[ProductionJob],
    resources: &[Resource],
    start: NaiveDateTime,
    config: &EngineConfig,
) -> ValidationResult {
    let mut errors: Vec<ValidationIssue> = Vec::new();
    let mut warnings: Vec<JobWarning> = Vec::new();

    let job_ids: HashSet<&str> = jobs.iter().map(|j| j.id.as_str()).collect();

    // -----------------------------------------------------------------------
    // Error: duplicate IDs
    // -----------------------------------------------------------------------
    {
        let mut seen: HashSet<&str> = HashSet::new();
        for job in jobs {
            if !seen.insert(job.id.as_str()) {
                errors.push(ValidationIssue::DuplicateJobId { id: job.id.clone() });
            }
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for resource in resources {
            if !seen.insert(resource.id.as_str()) {
                errors.push(ValidationIssue::DuplicateResourceId {
                    id: resource.id.clone(),
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Error: malformed resources
    // -----------------------------------------------------------------------
    for resource in resources {
        // Negated comparisons so NaN is rejected too.
        if !(resource.capacity_hours_per_day > 0.0) {
            errors.push(ValidationIssue::InvalidCapacity {
                resource: resource.id.clone(),
                value: resource.capacity_hours_per_day,
            });
        }
        if !(resource.efficiency_rating > 0.0) {
            errors.push(ValidationIssue::InvalidEfficiency {
                resource: resource.id.clone(),
                value: resource.efficiency_rating,
            });
        }
        for window in &resource.availability {
            if window.start_hour >= window.end_hour || window.end_hour > 24 {
                errors.push(ValidationIssue::InvalidAvailability {
                    resource: resource.id.clone(),
                    detail: format!(
                        "{} {}:00-{}:00",
                        window.weekday, window.start_hour, window.end_hour
                    ),
                });
            }
        }
    }

    // -----------------------------------------------------------------------
    // Error: out-of-range allocation settings
    // -----------------------------------------------------------------------
    let allocation = &config.allocation;
    let mut bad_config = |field: &str, detail: String| {
        errors.push(ValidationIssue::InvalidConfig {
            field: field.to_string(),
            detail,
        });
    };
    if !(1..=MAX_HORIZON_DAYS_LIMIT).contains(&allocation.max_horizon_days) {
        bad_config(
            "allocation.maxHorizonDays",
            format!(
                "{} is not within 1..={}",
                allocation.max_horizon_days, MAX_HORIZON_DAYS_LIMIT
            ),
        );
    }
    let max_tolerance = MAX_HORIZON_DAYS_LIMIT * 24 * 60;
    if !(0..=max_tolerance).contains(&allocation.completion_tolerance_minutes) {
        bad_config(
            "allocation.completionToleranceMinutes",
            format!(
                "{} is not within 0..={}",
                allocation.completion_tolerance_minutes, max_tolerance
            ),
        );
    }
    if !(allocation.load_horizon_days > 0.0 && allocation.load_horizon_days.is_finite()) {
        bad_config(
            "allocation.loadHorizonDays",
            format!("{} must be a positive number", allocation.load_horizon_days),
        );
    }

    // -----------------------------------------------------------------------
    // Error: circular dependencies
    // -----------------------------------------------------------------------
    let graph = DependencyGraph::build(jobs);
    for cycle in graph.cycles() {
        errors.push(ValidationIssue::DependencyCycle { jobs: cycle });
    }

    // -----------------------------------------------------------------------
    // Warnings: per-job problems (pending jobs only)
    // -----------------------------------------------------------------------
    for job in jobs.iter().filter(|j| j.status == JobStatus::Pending) {
        let mut warn = |kind: JobWarningKind, message: String| {
            warnings.push(JobWarning {
                job_id: job.id.clone(),
                kind,
                message,
            });
        };

        if job.quantity <= 0 {
            warn(
                JobWarningKind::NonPositiveQuantity,
                format!("Job '{}' has non-positive quantity {}", job.id, job.quantity),
            );
        }
        if !(job.estimated_hours > 0.0) {
            warn(
                JobWarningKind::NonPositiveDuration,
                format!(
                    "Job '{}' has non-positive estimated duration {}h",
                    job.id, job.estimated_hours
                ),
            );
        }
        if job.deadline <= start {
            warn(
                JobWarningKind::DeadlineNotAfterStart,
                format!(
                    "Job '{}' deadline {} is not after the scheduling start {}",
                    job.id, job.deadline, start
                ),
            );
        }
        for dep in &job.dependencies {
            if !job_ids.contains(dep.as_str()) {
                warn(
                    JobWarningKind::UnknownDependency,
                    format!("Job '{}' depends on '{}' which doesn't exist", job.id, dep),
                );
            }
        }
        if job.required_skills.is_empty()
            && !matcher::has_compatible_type(job, resources, &config.stage_compatibility)
        {
            warn(
                JobWarningKind::NoCompatibleResource,
                format!(
                    "Job '{}' requires no skills but no resource can work the {:?} stage",
                    job.id, job.current_stage
                ),
            );
        }
    }

    if !errors.is_empty() {
        tracing::warn!(errors = errors.len(), "input rejected by validation");
    }

    ValidationResult { errors, warnings }
}
