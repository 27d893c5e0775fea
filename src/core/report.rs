/// Session output banners
///
/// Everything here goes to the same stream the supervised program inherits,
/// so every banner is flushed before control returns to the caller.
use crate::kernel::signal::signal_name;
use crate::verdict::RunOutcome;
use std::io::{self, Write};

const RED: &str = "\x1b[91m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const RESET: &str = "\x1b[0m";

pub const CYCLE_END: &str = "--- Execution Finished ---";

pub struct Reporter<W: Write> {
    out: W,
    color: bool,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn banner(&mut self, leading_newline: bool, color: &str, text: &str) -> io::Result<()> {
        let lead = if leading_newline { "\n" } else { "" };
        if self.color {
            writeln!(self.out, "{lead}{color}{text}{RESET}")?;
        } else {
            writeln!(self.out, "{lead}{text}")?;
        }
        self.out.flush()
    }

    /// Compiler output verbatim, then the failure banner.
    pub fn compilation_failed(&mut self, diagnostics: &[u8]) -> io::Result<()> {
        self.out.write_all(diagnostics)?;
        if !diagnostics.is_empty() && !diagnostics.ends_with(b"\n") {
            self.out.write_all(b"\n")?;
        }
        self.banner(false, RED, "❌ Compilation failed")
    }

    /// Success banner plus the blank separator ahead of the program's output.
    pub fn compilation_succeeded(&mut self) -> io::Result<()> {
        self.banner(false, GREEN, "✅ Compilation successful")?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }

    pub fn no_code(&mut self) -> io::Result<()> {
        self.banner(false, YELLOW, "⚠️ No code submitted")
    }

    pub fn rejected_name(&mut self, name: &str) -> io::Result<()> {
        self.banner(false, YELLOW, &format!("⚠️ Rejected file name: {name}"))
    }

    /// Recoverable workspace trouble inside a cycle.
    pub fn workspace_error(&mut self, detail: &str) -> io::Result<()> {
        self.banner(false, RED, &format!("❌ Workspace error: {detail}"))
    }

    pub fn outcome(&mut self, outcome: &RunOutcome) -> io::Result<()> {
        match outcome {
            RunOutcome::NormalExit { code } => self.banner(
                true,
                "",
                &format!("...Program finished with exit code {code}"),
            ),
            RunOutcome::CpuLimitExceeded => {
                self.banner(true, "", "⏱️ Program killed - CPU time limit exceeded")
            }
            RunOutcome::WallTimeoutExceeded => {
                self.banner(true, "", "⏱️ Program killed - Wall-clock timeout exceeded")
            }
            RunOutcome::SignaledOther { signal } => self.banner(
                true,
                YELLOW,
                &format!(
                    "...Program killed by signal {signal} ({})",
                    signal_name(*signal)
                ),
            ),
            RunOutcome::ForkFailed { reason } => {
                self.banner(true, RED, &format!("❌ Fork failed: {reason}"))
            }
            RunOutcome::ExecFailed { reason } => {
                self.banner(true, RED, &format!("❌ Execution failed: {reason}"))
            }
        }
    }

    pub fn cycle_end(&mut self) -> io::Result<()> {
        self.banner(true, CYAN, CYCLE_END)
    }
}
