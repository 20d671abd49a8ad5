use std::collections::BTreeSet;

use crate::config::EngineConfig;
use crate::model::{
    MetricDelta, ProductionJob, Resource, ScenarioComparisonResult, ScenarioDescriptor,
    ScheduleOptimizationResult,
};
use crate::solver;
use crate::validator::{ValidationError, ValidationIssue};

// ---------------------------------------------------------------------------
// Applying a scenario
// ---------------------------------------------------------------------------

/// Produce the modified job/resource lists for `scenario`. The inputs are
/// never mutated. Duplicate ids introduced by ADD_* are left for the
/// validator to report.
pub fn apply_scenario(
    jobs: &[ProductionJob],
    resources: &[Resource],
    scenario: &ScenarioDescriptor,
) -> Result<(Vec<ProductionJob>, Vec<Resource>), ValidationError> {
    let mut jobs = jobs.to_vec();
    let mut resources = resources.to_vec();

    let unknown = |id: &str| ValidationError(vec![ValidationIssue::UnknownScenarioJob { id: id.to_string() }]);

    match scenario {
        ScenarioDescriptor::AddJob { job } => jobs.push(job.clone()),
        ScenarioDescriptor::RemoveJob { job_id } => {
            let before = jobs.len();
            jobs.retain(|j| &j.id != job_id);
            if jobs.len() == before {
                return Err(unknown(job_id));
            }
        }
        ScenarioDescriptor::AddResource { resource } => resources.push(resource.clone()),
        ScenarioDescriptor::ChangeDeadline { job_id, deadline } => {
            let job = jobs
                .iter_mut()
                .find(|j| &j.id == job_id)
                .ok_or_else(|| unknown(job_id))?;
            job.deadline = *deadline;
        }
    }

    Ok((jobs, resources))
}

// ---------------------------------------------------------------------------
// Comparison
// ---------------------------------------------------------------------------

/// How a metric's change is worded.
#[derive(Debug, Clone, Copy)]
enum Unit {
    /// A 0..1 fraction, reported in percentage points.
    Rate,
    /// Already on a 0..100 scale.
    Points,
    Hours,
    Count,
}

struct Tracked {
    name: &'static str,
    label: &'static str,
    unit: Unit,
    /// Whether an increase is an improvement.
    higher_is_better: bool,
    value: fn(&ScheduleOptimizationResult) -> f64,
    /// Full range of the metric for a result, used to compare changes
    /// across metrics.
    range: fn(&ScheduleOptimizationResult) -> f64,
}

const TRACKED: &[Tracked] = &[
    Tracked {
        name: "onTimeRate",
        label: "On-time rate",
        unit: Unit::Rate,
        higher_is_better: true,
        value: |r| r.metrics.on_time_rate,
        range: |_| 1.0,
    },
    Tracked {
        name: "averageUtilization",
        label: "Average utilization",
        unit: Unit::Rate,
        higher_is_better: true,
        value: |r| r.metrics.average_utilization,
        range: |_| 1.0,
    },
    Tracked {
        name: "makespanHours",
        label: "Makespan",
        unit: Unit::Hours,
        higher_is_better: false,
        value: |r| r.metrics.makespan_hours,
        range: |r| r.metrics.makespan_hours,
    },
    Tracked {
        name: "wastedCapacityHours",
        label: "Wasted capacity",
        unit: Unit::Hours,
        higher_is_better: false,
        value: |r| r.metrics.wasted_capacity_hours,
        range: |r| r.metrics.total_capacity_hours,
    },
    Tracked {
        name: "optimizationScore",
        label: "Optimization score",
        unit: Unit::Points,
        higher_is_better: true,
        value: |r| r.optimization_score,
        range: |_| 100.0,
    },
    Tracked {
        name: "scheduledCount",
        label: "Scheduled jobs",
        unit: Unit::Count,
        higher_is_better: true,
        value: |r| r.metrics.scheduled_count as f64,
        range: |r| r.metrics.total_jobs as f64,
    },
    Tracked {
        name: "unscheduledCount",
        label: "Unscheduled jobs",
        unit: Unit::Count,
        higher_is_better: false,
        value: |r| r.metrics.unscheduled_count as f64,
        range: |r| r.metrics.total_jobs as f64,
    },
    Tracked {
        name: "deadlineRiskCount",
        label: "Deadline-risk tasks",
        unit: Unit::Count,
        higher_is_better: false,
        value: |r| r.metrics.deadline_risk_count as f64,
        range: |r| r.metrics.total_jobs as f64,
    },
];

fn normalized_magnitude(
    t: &Tracked,
    delta: f64,
    baseline: &ScheduleOptimizationResult,
    after: &ScheduleOptimizationResult,
) -> f64 {
    let range = (t.range)(baseline).max((t.range)(after)).max(1.0);
    delta.abs() / range * 100.0
}

fn describe_change(t: &Tracked, delta: f64) -> String {
    let rising = delta > 0.0;
    match t.unit {
        Unit::Rate => format!(
            "{} {} {:.1} points",
            t.label,
            if rising { "rises" } else { "drops" },
            delta.abs() * 100.0
        ),
        Unit::Points => format!(
            "{} {} {:.1} points",
            t.label,
            if rising { "rises" } else { "drops" },
            delta.abs()
        ),
        Unit::Hours => format!(
            "{} {} by {:.1}h",
            t.label,
            if rising { "grows" } else { "shrinks" },
            delta.abs()
        ),
        Unit::Count => format!(
            "{} {} by {}",
            t.label,
            if rising { "increase" } else { "decrease" },
            delta.abs().round() as i64
        ),
    }
}

fn scenario_context(scenario: &ScenarioDescriptor, after: &ScheduleOptimizationResult) -> String {
    match scenario {
        ScenarioDescriptor::AddJob { job } => format!("after adding job '{}'", job.id),
        ScenarioDescriptor::RemoveJob { job_id } => format!("after removing job '{}'", job_id),
        ScenarioDescriptor::AddResource { resource } => {
            let taken = after
                .tasks
                .iter()
                .filter(|t| t.resource_id == resource.id)
                .count();
            format!("with '{}' taking {} job(s)", resource.name, taken)
        }
        ScenarioDescriptor::ChangeDeadline { job_id, deadline } => {
            format!("after moving job '{}' deadline to {}", job_id, deadline)
        }
    }
}

/// The most utilized resource in `after`, if it is past the overload level.
fn oversubscribed(after: &ScheduleOptimizationResult, config: &EngineConfig) -> Option<(String, f64)> {
    after
        .metrics
        .utilization_by_resource
        .iter()
        .fold(None::<(&String, f64)>, |acc, (id, &u)| match acc {
            Some((_, best)) if best >= u => acc,
            _ => Some((id, u)),
        })
        .filter(|(_, u)| *u >= config.thresholds.overload_level)
        .map(|(id, u)| (id.clone(), u))
}

fn impact_summary(
    deltas: &[MetricDelta],
    scenario: &ScenarioDescriptor,
    baseline: &ScheduleOptimizationResult,
    after: &ScheduleOptimizationResult,
    config: &EngineConfig,
) -> String {
    let dominant = TRACKED
        .iter()
        .zip(deltas)
        .map(|(t, d)| (t, d, normalized_magnitude(t, d.delta, baseline, after)))
        .filter(|(_, _, m)| *m > 1e-9)
        // First metric wins on equal magnitude.
        .fold(None, |acc: Option<(&Tracked, &MetricDelta, f64)>, cur| match acc {
            Some((_, _, best)) if best + 1e-6 >= cur.2 => acc,
            _ => Some(cur),
        });

    let Some((tracked, delta, _)) = dominant else {
        return format!("No measurable impact {}", scenario_context(scenario, after));
    };

    let mut summary = format!(
        "{} {}",
        describe_change(tracked, delta.delta),
        scenario_context(scenario, after)
    );
    let worsened = (delta.delta > 0.0) != tracked.higher_is_better;
    if worsened {
        if let Some((resource, u)) = oversubscribed(after, config) {
            summary.push_str(&format!(
                " because resource '{}' is now oversubscribed ({:.0}% utilized)",
                resource,
                u * 100.0
            ));
        }
    }
    summary
}

fn scheduled_ids(result: &ScheduleOptimizationResult) -> BTreeSet<&str> {
    result.tasks.iter().map(|t| t.job_id.as_str()).collect()
}

/// Apply `scenario` to the baseline inputs, rerun the whole pipeline from
/// the baseline's start date, and diff the metrics.
pub fn analyze_scenario(
    baseline: &ScheduleOptimizationResult,
    scenario: &ScenarioDescriptor,
    jobs: &[ProductionJob],
    resources: &[Resource],
    config: &EngineConfig,
) -> Result<ScenarioComparisonResult, ValidationError> {
    let (modified_jobs, modified_resources) = apply_scenario(jobs, resources, scenario)?;
    tracing::info!(?scenario, "analyzing scenario");

    let mut result = solver::optimize_schedule(
        &modified_jobs,
        &modified_resources,
        Some(baseline.start_date),
        config,
    )?;

    // Greedy placement can let a new resource reshuffle the queue into a
    // worse schedule. Keeping the baseline placements fixed can only add
    // on-time jobs, so that plan is the floor for ADD_RESOURCE.
    if matches!(scenario, ScenarioDescriptor::AddResource { .. })
        && result.metrics.on_time_rate < baseline.metrics.on_time_rate
    {
        let kept = solver::optimize_schedule_around(
            &modified_jobs,
            &modified_resources,
            Some(baseline.start_date),
            &baseline.tasks,
            config,
        )?;
        if kept.metrics.on_time_rate >= result.metrics.on_time_rate {
            tracing::info!(
                rerun = result.metrics.on_time_rate,
                kept = kept.metrics.on_time_rate,
                "keeping baseline placements"
            );
            result = kept;
        }
    }

    let deltas: Vec<MetricDelta> = TRACKED
        .iter()
        .map(|t| {
            let before = (t.value)(baseline);
            let after = (t.value)(&result);
            MetricDelta {
                metric: t.name.to_string(),
                before,
                after,
                delta: after - before,
            }
        })
        .collect();

    let before_ids = scheduled_ids(baseline);
    let after_ids = scheduled_ids(&result);
    let newly_scheduled: Vec<String> = after_ids
        .difference(&before_ids)
        .map(|s| s.to_string())
        .collect();
    let newly_unscheduled: Vec<String> = before_ids
        .difference(&after_ids)
        .map(|s| s.to_string())
        .collect();

    let impact_summary = impact_summary(&deltas, scenario, baseline, &result, config);

    tracing::info!(summary = %impact_summary, "scenario analyzed");

    Ok(ScenarioComparisonResult {
        scenario: scenario.clone(),
        result,
        deltas,
        newly_scheduled,
        newly_unscheduled,
        impact_summary,
    })
}
