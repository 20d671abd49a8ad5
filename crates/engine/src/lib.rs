pub mod allocator;
pub mod calendar;
pub mod config;
pub mod dependency;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod priority;
pub mod recommendations;
pub mod scenario;
pub mod solver;
pub mod validator;

pub use config::EngineConfig;
pub use scenario::analyze_scenario;
pub use solver::optimize_schedule;
pub use validator::{ValidationError, ValidationIssue};
