//! Pipeline entry points for harvester operations.
//!
//! - `run_pass`: One harvest pass followed by pruning and feed refresh
//! - `run_scheduler`: Periodic pass execution until cancelled

pub mod harvest;
pub mod scheduler;

pub use harvest::{HarvestContext, run_pass};
pub use scheduler::run_scheduler;
