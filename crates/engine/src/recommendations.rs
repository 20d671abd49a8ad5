use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::EngineConfig;
use crate::matcher;
use crate::model::{
    ProductionJob, ProductionStage, Recommendation, RecommendationKind, Resource,
    ScheduleMetrics, ScheduledTask, UnscheduledJob, UnscheduledReason,
};

/// Apply every rule to a finished run. Rules are independent; output is in
/// rule order, and within a rule ordered by the key it groups on.
pub fn recommend(
    metrics: &ScheduleMetrics,
    tasks: &[ScheduledTask],
    unscheduled: &[UnscheduledJob],
    jobs: &[ProductionJob],
    resources: &[Resource],
    config: &EngineConfig,
) -> Vec<Recommendation> {
    let mut out: Vec<Recommendation> = Vec::new();
    let job_by_id: HashMap<&str, &ProductionJob> = jobs.iter().map(|j| (j.id.as_str(), j)).collect();
    let thresholds = &config.thresholds;

    let ids_with = |reasons: &[UnscheduledReason]| -> Vec<String> {
        unscheduled
            .iter()
            .filter(|u| reasons.contains(&u.reason))
            .map(|u| u.job_id.clone())
            .collect()
    };

    // -----------------------------------------------------------------------
    // Capacity gaps behind "no eligible resource"
    // -----------------------------------------------------------------------
    let mut by_skill: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut by_stage: BTreeMap<ProductionStage, (BTreeSet<String>, Vec<String>)> = BTreeMap::new();
    for u in unscheduled
        .iter()
        .filter(|u| u.reason == UnscheduledReason::NoEligibleResource)
    {
        let Some(job) = job_by_id.get(u.job_id.as_str()) else {
            continue;
        };
        let missing = matcher::missing_skills(job, resources);
        if missing.is_empty() {
            let entry = by_stage.entry(job.current_stage).or_default();
            entry.0.extend(job.required_skills.iter().cloned());
            entry.1.push(job.id.clone());
        } else {
            for skill in missing {
                by_skill.entry(skill).or_default().push(job.id.clone());
            }
        }
    }

    for (skill, job_ids) in by_skill {
        out.push(Recommendation {
            kind: RecommendationKind::AddSkillCapacity,
            message: format!(
                "Add capacity with skill '{}': {} job(s) have no resource that can perform it",
                skill,
                job_ids.len()
            ),
            related: std::iter::once(skill).chain(job_ids).collect(),
        });
    }

    for (stage, (skills, job_ids)) in by_stage {
        let types = config
            .stage_compatibility
            .allowed(stage)
            .iter()
            .map(|t| format!("{:?}", t).to_uppercase())
            .collect::<Vec<_>>()
            .join(" or ");
        out.push(Recommendation {
            kind: RecommendationKind::AddResourceType,
            message: format!(
                "Add a {} resource combining skills [{}] for {:?} work ({} job(s) unplaced)",
                types,
                skills.iter().cloned().collect::<Vec<_>>().join(", "),
                stage,
                job_ids.len()
            ),
            related: job_ids,
        });
    }

    // -----------------------------------------------------------------------
    // Deadlines
    // -----------------------------------------------------------------------
    if metrics.total_jobs > 0 && metrics.on_time_rate < thresholds.on_time_floor {
        let mut at_risk: Vec<String> = tasks
            .iter()
            .filter(|t| !t.on_time)
            .map(|t| t.job_id.clone())
            .collect();
        at_risk.extend(
            unscheduled
                .iter()
                .filter(|u| u.reason != UnscheduledReason::NotPending)
                .map(|u| u.job_id.clone()),
        );
        at_risk.sort();
        out.push(Recommendation {
            kind: RecommendationKind::RenegotiateDeadlines,
            message: format!(
                "On-time rate is {:.0}% (target {:.0}%): renegotiate deadlines or add overtime",
                metrics.on_time_rate * 100.0,
                thresholds.on_time_floor * 100.0
            ),
            related: at_risk,
        });
    }

    let mut late_by_resource: BTreeMap<&str, (&str, Vec<String>)> = BTreeMap::new();
    for t in tasks.iter().filter(|t| !t.on_time) {
        late_by_resource
            .entry(t.resource_id.as_str())
            .or_insert((t.resource_name.as_str(), Vec::new()))
            .1
            .push(t.job_id.clone());
    }
    for (resource_id, (name, job_ids)) in late_by_resource {
        out.push(Recommendation {
            kind: RecommendationKind::ScheduleOvertime,
            message: format!(
                "Schedule overtime on '{}': {} task(s) finish past their deadline",
                name,
                job_ids.len()
            ),
            related: std::iter::once(resource_id.to_string()).chain(job_ids).collect(),
        });
    }

    // -----------------------------------------------------------------------
    // Load balance
    // -----------------------------------------------------------------------
    if metrics.utilization_by_resource.len() > 1
        && metrics.utilization_spread > thresholds.utilization_spread_ceiling
    {
        // BTreeMap iteration makes the max/min picks stable on ties.
        let busiest = metrics
            .utilization_by_resource
            .iter()
            .fold(None::<(&String, f64)>, |acc, (id, &u)| match acc {
                Some((_, best)) if best >= u => acc,
                _ => Some((id, u)),
            });
        let idlest = metrics
            .utilization_by_resource
            .iter()
            .fold(None::<(&String, f64)>, |acc, (id, &u)| match acc {
                Some((_, best)) if best <= u => acc,
                _ => Some((id, u)),
            });
        if let (Some((hi, hi_u)), Some((lo, lo_u))) = (busiest, idlest) {
            out.push(Recommendation {
                kind: RecommendationKind::RebalanceLoad,
                message: format!(
                    "Rebalance work: '{}' is at {:.0}% while '{}' is at {:.0}%; cross-train or widen skills on the idle resource",
                    hi,
                    hi_u * 100.0,
                    lo,
                    lo_u * 100.0
                ),
                related: vec![hi.clone(), lo.clone()],
            });
        }
    }

    if !tasks.is_empty() && metrics.average_utilization < thresholds.low_utilization_floor {
        let idle: Vec<String> = metrics
            .utilization_by_resource
            .iter()
            .filter(|(_, u)| **u < thresholds.low_utilization_floor)
            .map(|(id, _)| id.clone())
            .collect();
        out.push(Recommendation {
            kind: RecommendationKind::ConsolidateCapacity,
            message: format!(
                "Average utilization is only {:.0}%: consolidate shifts or take on more orders",
                metrics.average_utilization * 100.0
            ),
            related: idle,
        });
    }

    // -----------------------------------------------------------------------
    // Dependency chains and data quality
    // -----------------------------------------------------------------------
    let blocked = ids_with(&[
        UnscheduledReason::BlockedByUnscheduledDependency,
        UnscheduledReason::DependencyDeadlock,
        UnscheduledReason::ExhaustedRetries,
    ]);
    if !blocked.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::ResolveBlockedDependencies,
            message: format!(
                "{} job(s) are blocked by prerequisites that could not be scheduled; resolve the upstream jobs first",
                blocked.len()
            ),
            related: blocked,
        });
    }

    let invalid = ids_with(&[UnscheduledReason::Validation]);
    if !invalid.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::FixJobData,
            message: format!(
                "{} job(s) were skipped due to invalid data (quantity, duration, deadline or dependencies)",
                invalid.len()
            ),
            related: invalid,
        });
    }

    out
}
