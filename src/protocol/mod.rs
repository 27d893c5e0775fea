//! Line-oriented control protocol
//!
//! Three events (`__FILE_START__`, `__RUN_CODE__`, end of stream); every other
//! line is submitted source.

pub mod parser;

pub use parser::{ControlEvent, ControlStreamParser, RUN_SENTINEL, START_SENTINEL};
