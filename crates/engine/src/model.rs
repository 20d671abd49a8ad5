use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Caller-supplied priority hint. The engine turns it into a numeric score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Production stage a job is currently in. Used to match resource types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionStage {
    Cutting,
    Printing,
    Sewing,
    Finishing,
}

/// Lifecycle flag owned by the caller. Only `Pending` jobs are scheduled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Scheduled,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Machine,
    Operator,
    Station,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A unit of production work tied to one client order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductionJob {
    pub id: String,
    pub order_id: String,
    pub client_name: String,
    pub garment_type: String,
    /// Piece count. Must be > 0.
    pub quantity: i64,
    pub priority: Priority,
    pub deadline: NaiveDateTime,
    /// Nominal effort at 100% resource efficiency. Must be > 0.
    pub estimated_hours: f64,
    #[serde(default)]
    pub required_skills: BTreeSet<String>,
    /// Jobs that must be scheduled to completion before this one may start.
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
    pub current_stage: ProductionStage,
    #[serde(default = "default_status")]
    pub status: JobStatus,
}

fn default_status() -> JobStatus {
    JobStatus::Pending
}

/// A recurring weekly availability window, in whole hours of the day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWindow {
    pub weekday: Weekday,
    /// Inclusive start hour (0..24).
    pub start_hour: u32,
    /// Exclusive end hour (1..=24).
    pub end_hour: u32,
}

/// A schedulable capacity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub name: String,
    pub resource_type: ResourceType,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    /// Working hours available per calendar day. Must be > 0.
    pub capacity_hours_per_day: f64,
    /// Empty means available all day, subject to daily capacity.
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
    /// Utilization fraction [0, 1] carried in from outside the engine.
    #[serde(default)]
    pub current_utilization: f64,
    /// Effective duration = estimated hours / efficiency. Must be > 0.
    #[serde(default = "default_efficiency")]
    pub efficiency_rating: f64,
}

fn default_efficiency() -> f64 {
    1.0
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// One contiguous stretch of work on a resource. A task split across days
/// has one segment per working window it touches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkSegment {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// A job placed on a resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub job_id: String,
    pub order_id: String,
    pub client_name: String,
    pub resource_id: String,
    pub resource_name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub deadline: NaiveDateTime,
    /// Estimated hours divided by the resource's efficiency rating.
    pub effective_hours: f64,
    /// Score the job held when it was placed.
    pub priority_score: f64,
    /// 1-based position in the prioritized queue.
    pub priority_rank: usize,
    pub on_time: bool,
    pub segments: Vec<WorkSegment>,
}

/// Why a job did not make it into the schedule.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnscheduledReason {
    /// Job-level validation warnings degraded the job.
    Validation,
    NotPending,
    NoEligibleResource,
    BlockedByUnscheduledDependency,
    DependencyDeadlock,
    ExhaustedRetries,
    NoCapacityInHorizon,
}

impl UnscheduledReason {
    pub fn describe(&self) -> &'static str {
        match self {
            UnscheduledReason::Validation => "validation",
            UnscheduledReason::NotPending => "job is not pending",
            UnscheduledReason::NoEligibleResource => "no eligible resource",
            UnscheduledReason::BlockedByUnscheduledDependency => {
                "blocked by unscheduled dependency"
            }
            UnscheduledReason::DependencyDeadlock => "dependency deadlock",
            UnscheduledReason::ExhaustedRetries => "exhausted retries",
            UnscheduledReason::NoCapacityInHorizon => "no capacity within planning horizon",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UnscheduledJob {
    pub job_id: String,
    pub reason: UnscheduledReason,
    /// Human-readable explanation (includes validation messages, blocking ids).
    pub detail: String,
}

/// Component breakdown of a job's priority score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub base: f64,
    pub urgency: f64,
    pub fan_out: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedJob {
    pub job_id: String,
    pub rank: usize,
    pub score: f64,
    pub slack_hours: f64,
    /// Number of jobs that transitively depend on this one.
    pub dependents: usize,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleMetrics {
    pub average_utilization: f64,
    pub utilization_by_resource: BTreeMap<String, f64>,
    /// Max minus min per-resource utilization.
    pub utilization_spread: f64,
    pub on_time_rate: f64,
    pub makespan_hours: f64,
    pub horizon_days: i64,
    pub total_capacity_hours: f64,
    pub committed_hours: f64,
    pub wasted_capacity_hours: f64,
    pub total_tardiness_hours: f64,
    pub deadline_risk_count: usize,
    pub scheduled_count: usize,
    pub unscheduled_count: usize,
    pub total_jobs: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// Task placed past its deadline because no feasible slot existed.
    DeadlineRisk,
    ResourceOverload,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConflict {
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    pub job_id: Option<String>,
    pub resource_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    AddSkillCapacity,
    AddResourceType,
    RenegotiateDeadlines,
    ScheduleOvertime,
    RebalanceLoad,
    ConsolidateCapacity,
    ResolveBlockedDependencies,
    FixJobData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub message: String,
    /// Job, resource or skill identifiers the recommendation refers to.
    pub related: Vec<String>,
}

/// The complete output of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOptimizationResult {
    pub start_date: NaiveDateTime,
    pub tasks: Vec<ScheduledTask>,
    pub unscheduled: Vec<UnscheduledJob>,
    pub priority_order: Vec<PrioritizedJob>,
    pub metrics: ScheduleMetrics,
    /// Weighted blend of on-time rate, utilization and placement rate (0..100).
    pub optimization_score: f64,
    pub recommendations: Vec<Recommendation>,
    pub conflicts: Vec<ScheduleConflict>,
}

impl ScheduleOptimizationResult {
    pub fn task(&self, job_id: &str) -> Option<&ScheduledTask> {
        self.tasks.iter().find(|t| t.job_id == job_id)
    }

    pub fn unscheduled_job(&self, job_id: &str) -> Option<&UnscheduledJob> {
        self.unscheduled.iter().find(|u| u.job_id == job_id)
    }
}

// ---------------------------------------------------------------------------
// Scenario types
// ---------------------------------------------------------------------------

/// A hypothetical change to the job/resource set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioDescriptor {
    AddJob {
        job: ProductionJob,
    },
    RemoveJob {
        #[serde(rename = "jobId")]
        job_id: String,
    },
    AddResource {
        resource: Resource,
    },
    ChangeDeadline {
        #[serde(rename = "jobId")]
        job_id: String,
        deadline: NaiveDateTime,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    pub metric: String,
    pub before: f64,
    pub after: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioComparisonResult {
    pub scenario: ScenarioDescriptor,
    pub result: ScheduleOptimizationResult,
    pub deltas: Vec<MetricDelta>,
    pub newly_scheduled: Vec<String>,
    pub newly_unscheduled: Vec<String>,
    pub impact_summary: String,
}
