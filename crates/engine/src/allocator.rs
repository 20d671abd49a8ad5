use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

use crate::calendar::{ResourceCalendar, SlotPlan};
use crate::config::AllocationSettings;
use crate::model::{ProductionJob, Resource};

// ---------------------------------------------------------------------------
// Placement result
// ---------------------------------------------------------------------------

/// The winning resource and slot for one job.
#[derive(Debug, Clone)]
pub struct Placement {
    pub resource_id: String,
    pub resource_name: String,
    pub plan: SlotPlan,
    pub effective_hours: f64,
    /// False when no candidate could meet the deadline and the least-overdue
    /// one was taken instead.
    pub deadline_met: bool,
}

/// Effective work minutes for `job` on `resource`: estimated hours divided
/// by efficiency, rounded up to a whole minute, at least one minute.
pub fn effective_minutes(job: &ProductionJob, resource: &Resource) -> i64 {
    let mins = (job.estimated_hours / resource.efficiency_rating * 60.0).ceil();
    (mins as i64).max(1)
}

#[derive(Debug)]
struct Candidate {
    idx: usize,
    plan: SlotPlan,
    load: f64,
}

// ---------------------------------------------------------------------------
// Slot allocator
// ---------------------------------------------------------------------------

/// Owns one calendar per resource for the duration of a run.
#[derive(Debug)]
pub struct SlotAllocator<'a> {
    resources: &'a [Resource],
    calendars: Vec<ResourceCalendar>,
    index: HashMap<&'a str, usize>,
    settings: AllocationSettings,
    horizon_end: NaiveDateTime,
}

impl<'a> SlotAllocator<'a> {
    pub fn new(resources: &'a [Resource], start: NaiveDateTime, settings: &AllocationSettings) -> Self {
        Self {
            resources,
            calendars: resources.iter().map(ResourceCalendar::new).collect(),
            index: resources
                .iter()
                .enumerate()
                .map(|(i, r)| (r.id.as_str(), i))
                .collect(),
            settings: settings.clone(),
            horizon_end: Duration::try_days(settings.max_horizon_days.max(1))
                .and_then(|d| start.checked_add_signed(d))
                .unwrap_or(NaiveDateTime::MAX),
        }
    }

    /// Work minutes committed on `resource_id` so far in this run.
    pub fn committed_minutes(&self, resource_id: &str) -> i64 {
        self.index
            .get(resource_id)
            .map(|&i| self.calendars[i].committed_minutes())
            .unwrap_or(0)
    }

    /// Commit an already-decided plan on `resource_id`. Returns false if the
    /// resource is not part of this run.
    pub fn pin(&mut self, resource_id: &str, plan: &SlotPlan) -> bool {
        match self.index.get(resource_id) {
            Some(&i) => {
                self.calendars[i].reserve(plan);
                true
            }
            None => false,
        }
    }

    fn projected_load(&self, idx: usize) -> f64 {
        let resource = &self.resources[idx];
        let horizon_hours = resource.capacity_hours_per_day * self.settings.load_horizon_days;
        let committed_hours = self.calendars[idx].committed_minutes() as f64 / 60.0;
        let in_run = if horizon_hours > 0.0 {
            committed_hours / horizon_hours
        } else {
            0.0
        };
        resource.current_utilization + in_run
    }

    /// Pick the best resource and slot for `job` among `eligible`, starting
    /// no earlier than `earliest`, and commit it.
    ///
    /// Candidates that meet the deadline are preferred. Earliest completion
    /// decides among them; only candidates finishing within the completion
    /// tolerance of the best one (0 minutes by default, so exact ties) are
    /// ranked by projected load, then completion, then resource id. If none
    /// meets the deadline, the candidate finishing first is taken. Returns
    /// `None` when no eligible resource has room before the planning horizon.
    pub fn allocate(
        &mut self,
        job: &ProductionJob,
        eligible: &[&Resource],
        earliest: NaiveDateTime,
    ) -> Option<Placement> {
        let mut candidates: Vec<Candidate> = eligible
            .iter()
            .filter_map(|r| self.index.get(r.id.as_str()).copied())
            .filter_map(|idx| {
                let work = effective_minutes(job, &self.resources[idx]);
                self.calendars[idx]
                    .earliest_slot(earliest, work, self.horizon_end)
                    .map(|plan| Candidate {
                        idx,
                        plan,
                        load: self.projected_load(idx),
                    })
            })
            .collect();

        if candidates.is_empty() {
            return None;
        }

        let any_feasible = candidates.iter().any(|c| c.plan.end <= job.deadline);
        let chosen = if any_feasible {
            candidates.retain(|c| c.plan.end <= job.deadline);
            let best_end = candidates.iter().map(|c| c.plan.end).min()?;
            let cutoff = Duration::try_minutes(self.settings.completion_tolerance_minutes.max(0))
                .and_then(|d| best_end.checked_add_signed(d))
                .unwrap_or(NaiveDateTime::MAX);
            candidates
                .into_iter()
                .filter(|c| c.plan.end <= cutoff)
                .min_by(|a, b| {
                    a.load
                        .total_cmp(&b.load)
                        .then(a.plan.end.cmp(&b.plan.end))
                        .then_with(|| self.resources[a.idx].id.cmp(&self.resources[b.idx].id))
                })?
        } else {
            candidates.into_iter().min_by(|a, b| {
                a.plan
                    .end
                    .cmp(&b.plan.end)
                    .then(a.load.total_cmp(&b.load))
                    .then_with(|| self.resources[a.idx].id.cmp(&self.resources[b.idx].id))
            })?
        };

        let resource = &self.resources[chosen.idx];
        self.calendars[chosen.idx].reserve(&chosen.plan);

        tracing::debug!(
            job = %job.id,
            resource = %resource.id,
            start = %chosen.plan.start,
            end = %chosen.plan.end,
            deadline_met = any_feasible,
            "slot allocated"
        );

        Some(Placement {
            resource_id: resource.id.clone(),
            resource_name: resource.name.clone(),
            effective_hours: job.estimated_hours / resource.efficiency_rating,
            plan: chosen.plan,
            deadline_met: any_feasible,
        })
    }
}
