//! Tunable weights and thresholds for the scheduling heuristics.
//!
//! Every constant is exposed by name so that a result's score can be
//! reproduced from its inputs. Requests may override any subset; missing
//! fields fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::model::{Priority, ProductionStage, ResourceType};

pub const DEFAULT_URGENT_WEIGHT: f64 = 100.0;
pub const DEFAULT_HIGH_WEIGHT: f64 = 70.0;
pub const DEFAULT_MEDIUM_WEIGHT: f64 = 40.0;
pub const DEFAULT_LOW_WEIGHT: f64 = 10.0;
pub const DEFAULT_URGENCY_SCALE: f64 = 100.0;
pub const DEFAULT_NEAR_ZERO_SLACK_HOURS: f64 = 1.0;
pub const DEFAULT_URGENCY_BOOST: f64 = 150.0;
pub const DEFAULT_FAN_OUT_WEIGHT: f64 = 15.0;
pub const DEFAULT_QUANTITY_WEIGHT: f64 = 1.0;

pub const DEFAULT_COMPLETION_TOLERANCE_MINUTES: i64 = 0;
pub const DEFAULT_MAX_HORIZON_DAYS: i64 = 90;
/// Largest accepted `max_horizon_days`.
pub const MAX_HORIZON_DAYS_LIMIT: i64 = 3650;
pub const DEFAULT_LOAD_HORIZON_DAYS: f64 = 7.0;

pub const DEFAULT_ON_TIME_SCORE_WEIGHT: f64 = 0.5;
pub const DEFAULT_UTILIZATION_SCORE_WEIGHT: f64 = 0.2;
pub const DEFAULT_PLACEMENT_SCORE_WEIGHT: f64 = 0.3;

pub const DEFAULT_ON_TIME_FLOOR: f64 = 0.8;
pub const DEFAULT_UTILIZATION_SPREAD_CEILING: f64 = 0.3;
pub const DEFAULT_LOW_UTILIZATION_FLOOR: f64 = 0.3;
pub const DEFAULT_OVERLOAD_LEVEL: f64 = 0.95;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub priority: PriorityWeights,
    pub allocation: AllocationSettings,
    pub score: ScoreWeights,
    pub thresholds: RecommendationThresholds,
    pub stage_compatibility: StageCompatibility,
}

/// Inputs to the per-job priority score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct PriorityWeights {
    pub urgent: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    /// Urgency = scale / slack_hours, capped at `urgency_boost`.
    pub urgency_scale: f64,
    /// Slack at or below this many hours receives the full boost.
    pub near_zero_slack_hours: f64,
    pub urgency_boost: f64,
    /// Added per transitive dependent.
    pub fan_out_weight: f64,
    /// Multiplies ln(1 + quantity).
    pub quantity_weight: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            urgent: DEFAULT_URGENT_WEIGHT,
            high: DEFAULT_HIGH_WEIGHT,
            medium: DEFAULT_MEDIUM_WEIGHT,
            low: DEFAULT_LOW_WEIGHT,
            urgency_scale: DEFAULT_URGENCY_SCALE,
            near_zero_slack_hours: DEFAULT_NEAR_ZERO_SLACK_HOURS,
            urgency_boost: DEFAULT_URGENCY_BOOST,
            fan_out_weight: DEFAULT_FAN_OUT_WEIGHT,
            quantity_weight: DEFAULT_QUANTITY_WEIGHT,
        }
    }
}

impl PriorityWeights {
    pub fn base_weight(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Urgent => self.urgent,
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AllocationSettings {
    /// Candidates finishing within this many minutes of the best completion
    /// are considered tied, and the least-loaded resource wins among them.
    /// The default of 0 leaves earliest completion as the deciding key.
    pub completion_tolerance_minutes: i64,
    /// How far past the run start a resource calendar is searched.
    pub max_horizon_days: i64,
    /// Denominator (in days of capacity) for the projected-load tie-break.
    pub load_horizon_days: f64,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            completion_tolerance_minutes: DEFAULT_COMPLETION_TOLERANCE_MINUTES,
            max_horizon_days: DEFAULT_MAX_HORIZON_DAYS,
            load_horizon_days: DEFAULT_LOAD_HORIZON_DAYS,
        }
    }
}

/// Weights of the 0..100 optimization score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ScoreWeights {
    pub on_time: f64,
    pub utilization: f64,
    pub placement: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            on_time: DEFAULT_ON_TIME_SCORE_WEIGHT,
            utilization: DEFAULT_UTILIZATION_SCORE_WEIGHT,
            placement: DEFAULT_PLACEMENT_SCORE_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RecommendationThresholds {
    pub on_time_floor: f64,
    pub utilization_spread_ceiling: f64,
    pub low_utilization_floor: f64,
    /// Carried-in plus in-run utilization at which a resource is overloaded.
    pub overload_level: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            on_time_floor: DEFAULT_ON_TIME_FLOOR,
            utilization_spread_ceiling: DEFAULT_UTILIZATION_SPREAD_CEILING,
            low_utilization_floor: DEFAULT_LOW_UTILIZATION_FLOOR,
            overload_level: DEFAULT_OVERLOAD_LEVEL,
        }
    }
}

/// Resource types allowed to work a job at each production stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StageCompatibility {
    pub cutting: Vec<ResourceType>,
    pub printing: Vec<ResourceType>,
    pub sewing: Vec<ResourceType>,
    pub finishing: Vec<ResourceType>,
}

impl Default for StageCompatibility {
    fn default() -> Self {
        use ResourceType::*;
        Self {
            cutting: vec![Machine, Operator],
            printing: vec![Machine, Station],
            sewing: vec![Machine, Operator],
            finishing: vec![Operator, Station],
        }
    }
}

impl StageCompatibility {
    pub fn allowed(&self, stage: ProductionStage) -> &[ResourceType] {
        match stage {
            ProductionStage::Cutting => &self.cutting,
            ProductionStage::Printing => &self.printing,
            ProductionStage::Sewing => &self.sewing,
            ProductionStage::Finishing => &self.finishing,
        }
    }

    pub fn accepts(&self, stage: ProductionStage, resource_type: ResourceType) -> bool {
        self.allowed(stage).contains(&resource_type)
    }
}
