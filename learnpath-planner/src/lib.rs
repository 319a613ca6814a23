//! learnpath-planner - turns a learner goal into an ordered, week-packed plan
//!
//! The planner resolves target skills, walks the prerequisite graph, pulls candidate
//! resources per skill through a [`ResourceFinder`], and packs lessons into weeks
//! without exceeding the weekly or total time budget. Replanning keeps the plan id and
//! reschedules whatever is left.

mod error;
mod finder;
mod planner;
mod request;
mod schedule;
mod select;
mod targets;

pub use error::{PlanError, Result};
pub use finder::ResourceFinder;
pub use planner::{Planner, PlannerConfig};
pub use request::{PlanRequest, ReplanRequest};
pub use select::DEFAULT_RESOURCE_MINUTES;
