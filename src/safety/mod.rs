//! Safety and cleanup
//!
//! Owns the workspace directory and guarantees nothing crosses a cycle.

pub mod workspace;
