//! Run outcome classification
//!
//! Derives the reported outcome as a pure function of wait evidence.

pub mod verdict;

pub use verdict::{classify, RunOutcome};
