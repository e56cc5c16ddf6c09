//! Built-in locked-key retrieve strategies.

pub mod run_executor;
pub mod wait_for_result;
