//! Execution control
//!
//! Runs the compiled artifact under CPU and wall-clock ceilings.

pub mod supervisor;
