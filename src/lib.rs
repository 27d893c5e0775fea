//! code-harness: per-session compile-and-run harness for exercise submissions
//!
//! Reads a line-oriented control stream, writes the submitted sources into a
//! fixed workspace, compiles them with gcc/g++ and runs the result under CPU
//! and wall-clock ceilings, reporting each outcome as a banner.
//!
//! # Architecture
//!
//! ## Control Protocol ([`protocol`])
//! - [`protocol::parser`]: Byte-exact line tokenizer with no read-ahead
//!
//! ## Workspace ([`safety`])
//! - [`safety::workspace`]: Artifact creation, name validation and purge
//!
//! ## Build ([`judge`])
//! - [`judge::adapter`]: Compiler adapter trait
//! - [`judge::languages`]: C and C++ variants
//! - [`judge::build`]: Build Invoker (diagnostics capture, ccache, compile timeout)
//!
//! ## Execution Control ([`exec`], [`kernel`])
//! - [`exec::supervisor`]: Wall-clock watchdog and run lifecycle
//! - [`kernel::process`]: Launcher and child traits, rlimits, `wait4` accounting
//! - [`kernel::signal`]: Shutdown signal handling
//!
//! ## Verdict ([`verdict`])
//! - [`verdict::verdict`]: Run outcome classification
//!
//! ## Session ([`core`])
//! - [`core::session`]: `Idle → Collecting → Building → Running` loop
//! - [`core::report`]: Output banners
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: `HarnessConfig`, `HarnessError`
//! - [`config::loader`]: JSON config file
//! - [`config::validator`]: Startup validation

pub mod cli;
pub mod config;
pub mod core;
pub mod exec;
pub mod judge;
pub mod kernel;
pub mod protocol;
pub mod safety;
pub mod verdict;
