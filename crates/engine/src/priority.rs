use std::cmp::Ordering;

use chrono::NaiveDateTime;

use crate::config::PriorityWeights;
use crate::dependency::DependencyGraph;
use crate::model::{PrioritizedJob, ProductionJob, ScoreBreakdown};

/// Hours between two instants, as a float.
pub(crate) fn hours_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_minutes() as f64 / 60.0
}

/// Score one job. Slack is (deadline - start) - estimated hours.
pub fn score_job(
    job: &ProductionJob,
    dependents: usize,
    start: NaiveDateTime,
    weights: &PriorityWeights,
) -> (f64, f64, ScoreBreakdown) {
    let slack_hours = hours_between(start, job.deadline) - job.estimated_hours;

    let urgency = if slack_hours <= weights.near_zero_slack_hours {
        weights.urgency_boost
    } else {
        (weights.urgency_scale / slack_hours).min(weights.urgency_boost)
    };

    let breakdown = ScoreBreakdown {
        base: weights.base_weight(job.priority),
        urgency,
        fan_out: dependents as f64 * weights.fan_out_weight,
        quantity: (job.quantity.max(0) as f64).ln_1p() * weights.quantity_weight,
    };
    let score = breakdown.base + breakdown.urgency + breakdown.fan_out + breakdown.quantity;
    (score, slack_hours, breakdown)
}

/// Produce the total order over `jobs`: score descending, then earliest
/// deadline, then job id. `graph` must be built from the full input set so
/// fan-out counts dependents that are not themselves being ranked.
pub fn prioritize(
    jobs: &[&ProductionJob],
    graph: &DependencyGraph,
    start: NaiveDateTime,
    weights: &PriorityWeights,
) -> Vec<PrioritizedJob> {
    let mut scored: Vec<(PrioritizedJob, NaiveDateTime)> = jobs
        .iter()
        .map(|job| {
            let dependents = graph.transitive_dependents(&job.id);
            let (score, slack_hours, breakdown) = score_job(job, dependents, start, weights);
            (
                PrioritizedJob {
                    job_id: job.id.clone(),
                    rank: 0,
                    score,
                    slack_hours,
                    dependents,
                    breakdown,
                },
                job.deadline,
            )
        })
        .collect();

    scored.sort_by(|(a, a_deadline), (b, b_deadline)| {
        let score_ord = b.score.total_cmp(&a.score);
        if score_ord != Ordering::Equal {
            return score_ord;
        }
        let deadline_ord = a_deadline.cmp(b_deadline);
        if deadline_ord != Ordering::Equal {
            return deadline_ord;
        }
        a.job_id.cmp(&b.job_id)
    });

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (mut p, _))| {
            p.rank = i + 1;
            p
        })
        .collect()
}
