pub use canonical_planner::CanonicalPlanner;
pub use context::QueryContext;
pub use validator::Validator;

mod canonical_planner;
mod context;
pub mod plan_util;
mod validator;
