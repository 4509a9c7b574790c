//! Cycle wiring and execution.

pub mod builder;
pub mod cycle;
pub mod shutdown;

pub use builder::build_cycle;
pub use cycle::{error_chain, CycleError, WarmingCycle};
pub use shutdown::{setup_shutdown_handler, wait_for_shutdown};
