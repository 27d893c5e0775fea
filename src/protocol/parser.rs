//! Control-stream tokenizer.
//!
//! Canonical line form:
//! - lines end with `\n`; one trailing `\r` is dropped;
//! - `__RUN_CODE__` must match the whole line exactly;
//! - `__FILE_START__` alone is the legacy no-name start, and
//!   `__FILE_START__ <name>` (one or more spaces) carries a file name that is
//!   trimmed of surrounding spaces;
//! - anything else, including case variants, leading whitespace and
//!   `__FILE_START__name` without a separator, is content.
//!
//! Lines longer than the configured bound are truncated: the excess up to the
//! next newline is dropped.

use crate::kernel::signal::ShutdownWatch;
use std::io::{self, Read};

pub const START_SENTINEL: &str = "__FILE_START__";
pub const RUN_SENTINEL: &str = "__RUN_CODE__";

/// One tokenized unit of the control stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlEvent {
    /// Begin a new source artifact, optionally named
    StartArtifact { name: Option<String> },
    /// Literal line, without its terminator
    Content(Vec<u8>),
    /// Finalize, build, execute, report, purge
    Run,
    EndOfStream,
}

/// Classify one line with its terminator already removed.
pub fn parse_line(line: Vec<u8>) -> ControlEvent {
    if line == RUN_SENTINEL.as_bytes() {
        return ControlEvent::Run;
    }

    if let Some(rest) = line.strip_prefix(START_SENTINEL.as_bytes()) {
        if rest.is_empty() {
            return ControlEvent::StartArtifact { name: None };
        }
        if rest[0] == b' ' {
            let name = String::from_utf8_lossy(rest).trim_matches(' ').to_string();
            return ControlEvent::StartArtifact {
                name: (!name.is_empty()).then_some(name),
            };
        }
    }

    ControlEvent::Content(line)
}

/// Reads the control stream one byte at a time.
///
/// No read-ahead: a supervised program that inherits the same descriptor
/// must see every byte not yet consumed here.
pub struct ControlStreamParser<R> {
    input: R,
    max_line_bytes: usize,
    shutdown: ShutdownWatch,
    eof: bool,
    truncated_lines: u64,
}

impl<R: Read> ControlStreamParser<R> {
    pub fn new(input: R, max_line_bytes: usize) -> Self {
        Self {
            input,
            max_line_bytes,
            shutdown: ShutdownWatch::disarmed(),
            eof: false,
            truncated_lines: 0,
        }
    }

    /// Abort blocking reads with `ErrorKind::Interrupted` once shutdown is
    /// requested.
    pub fn with_shutdown(mut self, shutdown: ShutdownWatch) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Number of lines cut at the line bound so far.
    pub fn truncated_lines(&self) -> u64 {
        self.truncated_lines
    }

    pub fn next_event(&mut self) -> io::Result<ControlEvent> {
        match self.read_line()? {
            Some(line) => Ok(parse_line(line)),
            None => Ok(ControlEvent::EndOfStream),
        }
    }

    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.eof {
            return Ok(None);
        }

        let mut line = Vec::new();
        let mut truncated = false;
        // A `\r` arriving at the bound may still be the CR of a CRLF.
        let mut held_cr = false;
        let mut byte = [0u8; 1];

        loop {
            match self.input.read(&mut byte) {
                Ok(0) => {
                    self.eof = true;
                    if line.is_empty() && !truncated && !held_cr {
                        return Ok(None);
                    }
                    break;
                }
                Ok(_) => {
                    if byte[0] == b'\n' {
                        break;
                    }
                    if line.len() < self.max_line_bytes {
                        line.push(byte[0]);
                    } else if byte[0] == b'\r' && !held_cr && !truncated {
                        held_cr = true;
                    } else {
                        truncated = true;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    if self.shutdown.requested() {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if truncated {
            self.truncated_lines += 1;
            log::warn!(
                "Control line exceeded {} bytes; excess dropped",
                self.max_line_bytes
            );
        }
        // A held CR already was the line's one trailing `\r`.
        if !held_cr && !truncated && line.last() == Some(&b'\r') {
            line.pop();
        }

        Ok(Some(line))
    }
}
