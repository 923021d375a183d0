#[macro_use]
extern crate log;

pub mod query;
pub use query::{CanonicalPlanner, QueryContext};
