use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{NaiveDateTime, Timelike};

use crate::allocator::SlotAllocator;
use crate::calendar::SlotPlan;
use crate::config::EngineConfig;
use crate::dependency::{DependencyGraph, DependencyResolver, Readiness};
use crate::matcher;
use crate::metrics;
use crate::model::{
    JobStatus, PrioritizedJob, ProductionJob, Resource, ScheduleOptimizationResult,
    ScheduledTask, UnscheduledJob, UnscheduledReason,
};
use crate::priority;
use crate::recommendations;
use crate::validator::{self, JobWarning, ValidationError};

// ---------------------------------------------------------------------------
// Assembler state machine
// ---------------------------------------------------------------------------

/// Phases of one optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Init,
    Prioritizing,
    Allocating,
    Finalizing,
    Done,
    Failed,
}

/// Outcome of attempting a single job during ALLOCATING.
#[derive(Debug)]
enum JobOutcome {
    Scheduled(ScheduledTask),
    Unscheduled(UnscheduledJob),
    Deferred,
}

/// Drives one run: prioritize, then place jobs in order, deferring those
/// whose prerequisites are still pending.
struct ScheduleAssembler<'a> {
    state: AssemblerState,
    config: &'a EngineConfig,
    start: NaiveDateTime,
    jobs: &'a [ProductionJob],
    resources: &'a [Resource],
    /// Placements committed as-is before the queue is allocated.
    pinned: &'a [ScheduledTask],
    allocator: SlotAllocator<'a>,
    resolver: DependencyResolver,
    tasks: Vec<ScheduledTask>,
    unscheduled: Vec<UnscheduledJob>,
}

impl<'a> ScheduleAssembler<'a> {
    fn new(
        jobs: &'a [ProductionJob],
        resources: &'a [Resource],
        start: NaiveDateTime,
        pinned: &'a [ScheduledTask],
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            state: AssemblerState::Init,
            config,
            start,
            jobs,
            resources,
            pinned,
            allocator: SlotAllocator::new(resources, start, &config.allocation),
            resolver: DependencyResolver::new(jobs, start),
            tasks: Vec::new(),
            unscheduled: Vec::new(),
        }
    }

    fn transition(&mut self, next: AssemblerState) {
        tracing::debug!(from = ?self.state, to = ?next, "assembler state");
        self.state = next;
    }

    /// Run the validation gate. Hard errors move the assembler to FAILED.
    fn validate(&mut self) -> Result<BTreeMap<String, Vec<JobWarning>>, ValidationError> {
        validator::validate(self.jobs, self.resources, self.start, self.config)
            .into_result()
            .map_err(|e| {
                self.transition(AssemblerState::Failed);
                tracing::debug!(issues = e.issues().len(), "run rejected");
                e
            })
    }

    /// Commit the pinned placements for jobs that are still queueable and
    /// whose resource can still take them. Returns the ids placed.
    fn place_pinned(
        &mut self,
        by_id: &HashMap<&str, &ProductionJob>,
        priority_order: &[PrioritizedJob],
    ) -> HashSet<String> {
        let mut placed = HashSet::new();
        for pin in self.pinned {
            let Some(&job) = by_id.get(pin.job_id.as_str()) else {
                continue;
            };
            let Some(ranked) = priority_order.iter().find(|p| p.job_id == job.id) else {
                continue;
            };
            let eligible =
                matcher::eligible_resources(job, self.resources, &self.config.stage_compatibility);
            if placed.contains(&job.id) || !eligible.iter().any(|r| r.id == pin.resource_id) {
                continue;
            }
            let plan = SlotPlan {
                start: pin.start,
                end: pin.end,
                segments: pin.segments.clone(),
            };
            if !self.allocator.pin(&pin.resource_id, &plan) {
                continue;
            }
            tracing::debug!(job = %job.id, resource = %pin.resource_id, "placement pinned");
            self.resolver.mark_scheduled(&job.id, pin.end);
            self.tasks.push(ScheduledTask {
                deadline: job.deadline,
                on_time: pin.end <= job.deadline,
                priority_score: ranked.score,
                priority_rank: ranked.rank,
                ..pin.clone()
            });
            placed.insert(job.id.clone());
        }
        placed
    }

    fn give_up(&mut self, job_id: &str, reason: UnscheduledReason, detail: String) {
        // Non-pending jobs keep their input status for dependency checks.
        if reason != UnscheduledReason::NotPending {
            self.resolver.mark_unscheduled(job_id);
        }
        tracing::debug!(job = %job_id, ?reason, %detail, "job unscheduled");
        self.unscheduled.push(UnscheduledJob {
            job_id: job_id.to_string(),
            reason,
            detail,
        });
    }

    /// Attempt one job whose turn has come in the queue.
    fn attempt(&mut self, job: &ProductionJob, ranked: &PrioritizedJob) -> JobOutcome {
        let earliest = match self.resolver.check(job) {
            Readiness::Ready { earliest_start } => earliest_start,
            Readiness::Waiting { .. } => return JobOutcome::Deferred,
            Readiness::Blocked { dependency } => {
                return JobOutcome::Unscheduled(UnscheduledJob {
                    job_id: job.id.clone(),
                    reason: UnscheduledReason::BlockedByUnscheduledDependency,
                    detail: format!("Dependency '{}' could not be scheduled", dependency),
                })
            }
        };

        let eligible =
            matcher::eligible_resources(job, self.resources, &self.config.stage_compatibility);
        if eligible.is_empty() {
            let missing = matcher::missing_skills(job, self.resources);
            let detail = if missing.is_empty() {
                format!(
                    "No {:?}-compatible resource has all of: {}",
                    job.current_stage,
                    job.required_skills.iter().cloned().collect::<Vec<_>>().join(", ")
                )
            } else {
                format!("No resource has skill(s): {}", missing.join(", "))
            };
            return JobOutcome::Unscheduled(UnscheduledJob {
                job_id: job.id.clone(),
                reason: UnscheduledReason::NoEligibleResource,
                detail,
            });
        }

        match self.allocator.allocate(job, &eligible, earliest) {
            Some(placement) => {
                if !placement.deadline_met {
                    tracing::warn!(
                        job = %job.id,
                        resource = %placement.resource_id,
                        end = %placement.plan.end,
                        deadline = %job.deadline,
                        "placed past deadline"
                    );
                }
                JobOutcome::Scheduled(ScheduledTask {
                    job_id: job.id.clone(),
                    order_id: job.order_id.clone(),
                    client_name: job.client_name.clone(),
                    resource_id: placement.resource_id,
                    resource_name: placement.resource_name,
                    start: placement.plan.start,
                    end: placement.plan.end,
                    deadline: job.deadline,
                    effective_hours: placement.effective_hours,
                    priority_score: ranked.score,
                    priority_rank: ranked.rank,
                    on_time: placement.deadline_met,
                    segments: placement.plan.segments,
                })
            }
            None => JobOutcome::Unscheduled(UnscheduledJob {
                job_id: job.id.clone(),
                reason: UnscheduledReason::NoCapacityInHorizon,
                detail: format!(
                    "No eligible resource has room within {} days",
                    self.config.allocation.max_horizon_days
                ),
            }),
        }
    }

    fn run(
        mut self,
        warnings: BTreeMap<String, Vec<JobWarning>>,
    ) -> ScheduleOptimizationResult {
        // -------------------------------------------------------------------
        // PRIORITIZING: split out jobs that never enter the queue
        // -------------------------------------------------------------------
        self.transition(AssemblerState::Prioritizing);

        let mut queueable: Vec<&ProductionJob> = Vec::new();
        for job in self.jobs {
            if job.status != JobStatus::Pending {
                self.give_up(
                    &job.id,
                    UnscheduledReason::NotPending,
                    format!("Job status is {:?}", job.status),
                );
            } else if let Some(w) = warnings.get(&job.id) {
                let detail = w.iter().map(|w| w.message.as_str()).collect::<Vec<_>>().join("; ");
                self.give_up(&job.id, UnscheduledReason::Validation, detail);
            } else {
                queueable.push(job);
            }
        }

        let graph = DependencyGraph::build(self.jobs);
        let priority_order =
            priority::prioritize(&queueable, &graph, self.start, &self.config.priority);

        // -------------------------------------------------------------------
        // ALLOCATING: bounded passes over the queue
        // -------------------------------------------------------------------
        self.transition(AssemblerState::Allocating);

        let by_id: HashMap<&str, &ProductionJob> =
            queueable.iter().map(|j| (j.id.as_str(), *j)).collect();
        let pinned = self.place_pinned(&by_id, &priority_order);
        let mut queue: Vec<&PrioritizedJob> = priority_order
            .iter()
            .filter(|p| !pinned.contains(&p.job_id))
            .collect();
        let max_passes = queue.len() + 1;
        let mut pass = 0usize;

        while !queue.is_empty() && pass < max_passes {
            pass += 1;
            let mut deferred: Vec<&PrioritizedJob> = Vec::new();
            let mut progressed = false;

            for ranked in queue {
                let Some(&job) = by_id.get(ranked.job_id.as_str()) else {
                    continue;
                };
                match self.attempt(job, ranked) {
                    JobOutcome::Scheduled(task) => {
                        self.resolver.mark_scheduled(&task.job_id, task.end);
                        self.tasks.push(task);
                        progressed = true;
                    }
                    JobOutcome::Unscheduled(u) => {
                        self.give_up(&u.job_id, u.reason, u.detail);
                        progressed = true;
                    }
                    JobOutcome::Deferred => deferred.push(ranked),
                }
            }

            tracing::debug!(pass, deferred = deferred.len(), "allocation pass complete");

            if !progressed && !deferred.is_empty() {
                // Second deferral with nothing resolved in between.
                for ranked in deferred {
                    self.give_up(
                        &ranked.job_id,
                        UnscheduledReason::DependencyDeadlock,
                        "Dependencies made no progress across a full pass".to_string(),
                    );
                }
                queue = Vec::new();
                break;
            }
            queue = deferred;
        }

        for ranked in queue {
            self.give_up(
                &ranked.job_id,
                UnscheduledReason::ExhaustedRetries,
                format!("Still waiting on dependencies after {} passes", pass),
            );
        }

        // -------------------------------------------------------------------
        // FINALIZING: order output, compute metrics and advice
        // -------------------------------------------------------------------
        self.transition(AssemblerState::Finalizing);

        self.tasks.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then(a.resource_id.cmp(&b.resource_id))
                .then(a.job_id.cmp(&b.job_id))
        });

        let pending_jobs = self
            .jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .count();
        let computed = metrics::calculate(
            &self.tasks,
            &self.unscheduled,
            self.resources,
            pending_jobs,
            self.start,
        );
        let optimization_score =
            metrics::optimization_score(&computed, pending_jobs, &self.config.score);
        let conflicts = metrics::detect_conflicts(&self.tasks, &computed, self.resources, self.config);
        let recommendations = recommendations::recommend(
            &computed,
            &self.tasks,
            &self.unscheduled,
            self.jobs,
            self.resources,
            self.config,
        );

        self.transition(AssemblerState::Done);

        tracing::info!(
            scheduled = self.tasks.len(),
            unscheduled = self.unscheduled.len(),
            on_time_rate = computed.on_time_rate,
            score = optimization_score,
            "schedule optimized"
        );

        ScheduleOptimizationResult {
            start_date: self.start,
            tasks: self.tasks,
            unscheduled: self.unscheduled,
            priority_order,
            metrics: computed,
            optimization_score,
            recommendations,
            conflicts,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Truncate to the whole minute so all computed times are minute-aligned.
pub fn normalize_start(start: NaiveDateTime) -> NaiveDateTime {
    start
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(start)
}

/// Assign PENDING jobs to resources and report the resulting schedule.
///
/// 1. Validates the input. Hard errors (cycles, duplicate ids, malformed
///    resources or settings) reject the whole call; job-level warnings
///    degrade only the affected jobs.
/// 2. Ranks the remaining jobs once by priority score.
/// 3. Places each job in rank order on its best eligible resource, deferring
///    jobs whose prerequisites have not been placed yet.
/// 4. Derives metrics, conflicts and recommendations.
///
/// `start_date` defaults to the current local time.
pub fn optimize_schedule(
    jobs: &[ProductionJob],
    resources: &[Resource],
    start_date: Option<NaiveDateTime>,
    config: &EngineConfig,
) -> Result<ScheduleOptimizationResult, ValidationError> {
    optimize_schedule_around(jobs, resources, start_date, &[], config)
}

/// Like [`optimize_schedule`], but `pinned` placements are committed first,
/// exactly as given, and only the remaining jobs are allocated around them.
/// A pinned task is skipped when its job is not queueable this run or its
/// resource is no longer eligible for it.
pub fn optimize_schedule_around(
    jobs: &[ProductionJob],
    resources: &[Resource],
    start_date: Option<NaiveDateTime>,
    pinned: &[ScheduledTask],
    config: &EngineConfig,
) -> Result<ScheduleOptimizationResult, ValidationError> {
    let start = normalize_start(
        start_date.unwrap_or_else(|| chrono::Local::now().naive_local()),
    );
    tracing::info!(
        jobs = jobs.len(),
        resources = resources.len(),
        pinned = pinned.len(),
        %start,
        "optimizing schedule"
    );

    let mut assembler = ScheduleAssembler::new(jobs, resources, start, pinned, config);
    let warnings = assembler.validate()?;
    Ok(assembler.run(warnings))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
