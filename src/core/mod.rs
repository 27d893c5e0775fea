//! Session core.
//!
//! Owns the per-cycle control flow and the banners written between the
//! supervised program's own output. Compile and run specifics live in the
//! judge adapters and the execution supervisor.

pub mod report;
pub mod session;

pub use session::{Session, SessionEnd, SessionState, SessionSummary};
