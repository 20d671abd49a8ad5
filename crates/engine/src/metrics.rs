//! Schedule quality metrics and conflict detection.
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Utilization (per resource) | committed effective hours / capacity available over the horizon |
//! | Average utilization | mean of per-resource utilization |
//! | On-time rate | tasks ending by their deadline / pending input jobs |
//! | Makespan | max(end) - min(start) over scheduled tasks |
//! | Wasted capacity | capacity over the horizon - committed hours |
//!
//! The horizon is every calendar day from the run start to the day of the
//! last task end, and at least one day. Each resource's capacity over it is
//! counted the way its calendar spends capacity: per day, the open window
//! time after the run start, capped at the daily capacity.
//!
//! The optimization score is
//! `100 * (w_on * on_time_rate + w_util * min(avg_util, 1) + w_place * (1 - unscheduled_fraction)) / (w_on + w_util + w_place)`
//! rounded to two decimals, so it can be recomputed from the metrics alone.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDateTime};

use crate::calendar::ResourceCalendar;
use crate::config::{EngineConfig, ScoreWeights};
use crate::model::{
    ConflictKind, ConflictSeverity, Resource, ScheduleConflict, ScheduleMetrics, ScheduledTask,
    UnscheduledJob, UnscheduledReason,
};
use crate::priority::hours_between;

/// Compute metrics for a finished run. `pending_jobs` is the on-time
/// denominator: every PENDING input job, placed or not.
pub fn calculate(
    tasks: &[ScheduledTask],
    unscheduled: &[UnscheduledJob],
    resources: &[Resource],
    pending_jobs: usize,
    start: NaiveDateTime,
) -> ScheduleMetrics {
    let first_start = tasks.iter().map(|t| t.start).min();
    let last_end = tasks.iter().map(|t| t.end).max();

    // An end at midnight does not touch the next day.
    let last_day = last_end
        .map(|end| (end - Duration::minutes(1)).date().max(start.date()))
        .unwrap_or(start.date());
    let horizon_days = (last_day - start.date()).num_days() + 1;

    let mut committed_by_resource: BTreeMap<&str, f64> = BTreeMap::new();
    for task in tasks {
        *committed_by_resource.entry(task.resource_id.as_str()).or_insert(0.0) +=
            task.effective_hours;
    }

    let mut utilization_by_resource: BTreeMap<String, f64> = BTreeMap::new();
    let mut total_capacity_hours = 0.0;
    for resource in resources {
        let available =
            ResourceCalendar::new(resource).capacity_minutes(start, last_day) as f64 / 60.0;
        total_capacity_hours += available;
        let committed = committed_by_resource
            .get(resource.id.as_str())
            .copied()
            .unwrap_or(0.0);
        let utilization = if available > 0.0 { committed / available } else { 0.0 };
        utilization_by_resource.insert(resource.id.clone(), utilization);
    }

    let average_utilization = if utilization_by_resource.is_empty() {
        0.0
    } else {
        utilization_by_resource.values().sum::<f64>() / utilization_by_resource.len() as f64
    };
    let utilization_spread = {
        let max = utilization_by_resource.values().copied().fold(f64::MIN, f64::max);
        let min = utilization_by_resource.values().copied().fold(f64::MAX, f64::min);
        if utilization_by_resource.is_empty() {
            0.0
        } else {
            max - min
        }
    };

    let committed_hours: f64 = tasks.iter().map(|t| t.effective_hours).sum();
    let on_time = tasks.iter().filter(|t| t.on_time).count();
    let on_time_rate = if pending_jobs == 0 {
        1.0
    } else {
        on_time as f64 / pending_jobs as f64
    };

    let total_tardiness_hours = tasks
        .iter()
        .filter(|t| t.end > t.deadline)
        .map(|t| hours_between(t.deadline, t.end))
        .sum();

    let makespan_hours = match (first_start, last_end) {
        (Some(s), Some(e)) => hours_between(s, e),
        _ => 0.0,
    };

    ScheduleMetrics {
        average_utilization,
        utilization_by_resource,
        utilization_spread,
        on_time_rate,
        makespan_hours,
        horizon_days,
        total_capacity_hours,
        committed_hours,
        wasted_capacity_hours: (total_capacity_hours - committed_hours).max(0.0),
        total_tardiness_hours,
        deadline_risk_count: tasks.iter().filter(|t| !t.on_time).count(),
        scheduled_count: tasks.len(),
        unscheduled_count: unscheduled
            .iter()
            .filter(|u| u.reason != UnscheduledReason::NotPending)
            .count(),
        total_jobs: pending_jobs,
    }
}

/// The 0..100 blend described in the module docs.
pub fn optimization_score(metrics: &ScheduleMetrics, pending_jobs: usize, weights: &ScoreWeights) -> f64 {
    let total_weight = weights.on_time + weights.utilization + weights.placement;
    if total_weight <= 0.0 {
        return 0.0;
    }
    let unscheduled_fraction = if pending_jobs == 0 {
        0.0
    } else {
        metrics.unscheduled_count as f64 / pending_jobs as f64
    };
    let blend = weights.on_time * metrics.on_time_rate
        + weights.utilization * metrics.average_utilization.min(1.0)
        + weights.placement * (1.0 - unscheduled_fraction);
    let score = (100.0 * blend / total_weight).clamp(0.0, 100.0);
    (score * 100.0).round() / 100.0
}

/// Severity bands for a task finishing `overdue_hours` past its deadline.
pub fn deadline_risk_severity(overdue_hours: f64) -> ConflictSeverity {
    if overdue_hours <= 1.0 {
        ConflictSeverity::Low
    } else if overdue_hours <= 8.0 {
        ConflictSeverity::Medium
    } else if overdue_hours <= 24.0 {
        ConflictSeverity::High
    } else {
        ConflictSeverity::Critical
    }
}

/// Deadline-risk conflicts in task order, then overloaded resources by id.
pub fn detect_conflicts(
    tasks: &[ScheduledTask],
    metrics: &ScheduleMetrics,
    resources: &[Resource],
    config: &EngineConfig,
) -> Vec<ScheduleConflict> {
    let mut conflicts: Vec<ScheduleConflict> = tasks
        .iter()
        .filter(|t| !t.on_time)
        .map(|t| {
            let overdue = hours_between(t.deadline, t.end);
            ScheduleConflict {
                kind: ConflictKind::DeadlineRisk,
                severity: deadline_risk_severity(overdue),
                job_id: Some(t.job_id.clone()),
                resource_id: t.resource_id.clone(),
                message: format!(
                    "Job '{}' on '{}' finishes {:.1}h after its deadline",
                    t.job_id, t.resource_name, overdue
                ),
            }
        })
        .collect();

    let mut sorted: Vec<&Resource> = resources.iter().collect();
    sorted.sort_by(|a, b| a.id.cmp(&b.id));
    for resource in sorted {
        let in_run = metrics
            .utilization_by_resource
            .get(&resource.id)
            .copied()
            .unwrap_or(0.0);
        let combined = resource.current_utilization + in_run;
        if in_run > 0.0 && combined >= config.thresholds.overload_level {
            conflicts.push(ScheduleConflict {
                kind: ConflictKind::ResourceOverload,
                severity: ConflictSeverity::Medium,
                job_id: None,
                resource_id: resource.id.clone(),
                message: format!(
                    "Resource '{}' is at {:.0}% combined utilization",
                    resource.name,
                    combined * 100.0
                ),
            });
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceType;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn make_task(job: &str, resource: &str, start_h: i64, end_h: i64, deadline_h: i64) -> ScheduledTask {
        ScheduledTask {
            job_id: job.to_string(),
            order_id: "o".to_string(),
            client_name: "c".to_string(),
            resource_id: resource.to_string(),
            resource_name: resource.to_string(),
            start: t0() + Duration::hours(start_h),
            end: t0() + Duration::hours(end_h),
            deadline: t0() + Duration::hours(deadline_h),
            effective_hours: (end_h - start_h) as f64,
            priority_score: 1.0,
            priority_rank: 1,
            on_time: end_h <= deadline_h,
            segments: vec![],
        }
    }

    fn make_resource(id: &str, utilization: f64) -> Resource {
        Resource {
            id: id.to_string(),
            name: id.to_string(),
            resource_type: ResourceType::Station,
            skills: Default::default(),
            capacity_hours_per_day: 8.0,
            availability: vec![],
            current_utilization: utilization,
            efficiency_rating: 1.0,
        }
    }

    #[test]
    fn test_basic_metrics() {
        let tasks = vec![make_task("a", "r1", 0, 2, 4), make_task("b", "r1", 2, 8, 48)];
        let resources = vec![make_resource("r1", 0.0), make_resource("r2", 0.0)];
        let m = calculate(&tasks, &[], &resources, 2, t0());

        assert_eq!(m.horizon_days, 1);
        assert_eq!(m.utilization_by_resource["r1"], 1.0);
        assert_eq!(m.utilization_by_resource["r2"], 0.0);
        assert_eq!(m.average_utilization, 0.5);
        assert_eq!(m.utilization_spread, 1.0);
        assert_eq!(m.on_time_rate, 1.0);
        assert_eq!(m.makespan_hours, 8.0);
        assert_eq!(m.total_capacity_hours, 16.0);
        assert_eq!(m.wasted_capacity_hours, 8.0);
    }

    #[test]
    fn test_work_spilling_past_midnight_counts_both_days() {
        // Monday 08:00-16:00, then Tuesday 00:00-04:00.
        let tasks = vec![make_task("a", "r1", 0, 8, 48), make_task("b", "r1", 16, 20, 48)];
        let resources = vec![make_resource("r1", 0.0)];
        let m = calculate(&tasks, &[], &resources, 2, t0());

        assert_eq!(m.horizon_days, 2);
        assert_eq!(m.total_capacity_hours, 16.0);
        assert_eq!(m.utilization_by_resource["r1"], 0.75);
        assert_eq!(m.wasted_capacity_hours, 4.0);
        assert!(detect_conflicts(&tasks, &m, &resources, &EngineConfig::default()).is_empty());
    }

    #[test]
    fn test_end_at_midnight_stays_on_one_day() {
        let tasks = vec![make_task("a", "r1", 8, 16, 48)];
        let m = calculate(&tasks, &[], &[make_resource("r1", 0.0)], 1, t0());
        assert_eq!(m.horizon_days, 1);
        assert_eq!(m.utilization_by_resource["r1"], 1.0);
    }

    #[test]
    fn test_unscheduled_jobs_lower_on_time_rate() {
        let tasks = vec![make_task("a", "r1", 0, 2, 4), make_task("b", "r1", 2, 8, 48)];
        let unscheduled = vec![UnscheduledJob {
            job_id: "c".to_string(),
            reason: UnscheduledReason::NoEligibleResource,
            detail: String::new(),
        }];
        let m = calculate(&tasks, &unscheduled, &[make_resource("r1", 0.0)], 3, t0());
        assert!((m.on_time_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(m.unscheduled_count, 1);
    }

    #[test]
    fn test_score_is_reproducible_from_metrics() {
        let tasks = vec![make_task("a", "r1", 0, 4, 24)];
        let m = calculate(&tasks, &[], &[make_resource("r1", 0.0)], 1, t0());
        // 100 * (0.5 * 1.0 + 0.2 * 0.5 + 0.3 * 1.0)
        assert_eq!(optimization_score(&m, 1, &ScoreWeights::default()), 90.0);
    }

    #[test]
    fn test_empty_run() {
        let m = calculate(&[], &[], &[], 0, t0());
        assert_eq!(m.on_time_rate, 1.0);
        assert_eq!(m.makespan_hours, 0.0);
        assert_eq!(m.average_utilization, 0.0);
        assert_eq!(m.utilization_spread, 0.0);
    }

    #[test]
    fn test_conflicts() {
        let tasks = vec![make_task("late", "r1", 0, 6, 3), make_task("ok", "r2", 0, 1, 3)];
        let resources = vec![make_resource("r1", 0.5), make_resource("r2", 0.0)];
        let m = calculate(&tasks, &[], &resources, 2, t0());
        let conflicts = detect_conflicts(&tasks, &m, &resources, &EngineConfig::default());
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].kind, ConflictKind::DeadlineRisk);
        assert_eq!(conflicts[0].severity, ConflictSeverity::Medium);
        assert_eq!(conflicts[1].kind, ConflictKind::ResourceOverload);
        assert_eq!(conflicts[1].resource_id, "r1");
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(deadline_risk_severity(0.5), ConflictSeverity::Low);
        assert_eq!(deadline_risk_severity(12.0), ConflictSeverity::High);
        assert_eq!(deadline_risk_severity(30.0), ConflictSeverity::Critical);
    }
}
