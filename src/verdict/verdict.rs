/// Run outcome classification
///
/// `classify` is a pure function over wait evidence, the watchdog decision
/// and the configured ceilings. Nothing here touches processes.
use crate::kernel::process::{ExitState, Termination};
use std::fmt;
use std::time::Duration;

/// Terminal result of one supervised run. Reported, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program exited on its own
    NormalExit { code: i32 },
    /// Killed by the kernel CPU-time ceiling
    CpuLimitExceeded,
    /// Killed by the supervisor wall-clock watchdog
    WallTimeoutExceeded,
    /// Terminated by any other signal
    SignaledOther { signal: i32 },
    /// No process could be created
    ForkFailed { reason: String },
    /// The process could not execute the compiled artifact
    ExecFailed { reason: String },
}

impl RunOutcome {
    pub fn is_limit_kill(&self) -> bool {
        matches!(self, Self::CpuLimitExceeded | Self::WallTimeoutExceeded)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NormalExit { code } => write!(f, "exit({code})"),
            Self::CpuLimitExceeded => f.write_str("cpu-limit"),
            Self::WallTimeoutExceeded => f.write_str("wall-timeout"),
            Self::SignaledOther { signal } => write!(f, "signal({signal})"),
            Self::ForkFailed { reason } => write!(f, "fork-failed({reason})"),
            Self::ExecFailed { reason } => write!(f, "exec-failed({reason})"),
        }
    }
}

/// Classify a reaped child.
///
/// Precedence: a watchdog kill wins over whatever signal the child died
/// from, since the forced SIGKILL is indistinguishable otherwise. A SIGKILL
/// without watchdog involvement is attributed to the CPU ceiling only when
/// the child actually burned through it (the hard `RLIMIT_CPU` limit, reached
/// by programs that ignore SIGXCPU).
pub fn classify(termination: &Termination, watchdog_fired: bool, cpu_limit: Duration) -> RunOutcome {
    if watchdog_fired {
        return RunOutcome::WallTimeoutExceeded;
    }

    match termination.state {
        ExitState::Exited(code) => RunOutcome::NormalExit { code },
        ExitState::Signaled(libc::SIGXCPU) => RunOutcome::CpuLimitExceeded,
        ExitState::Signaled(libc::SIGKILL) if termination.cpu_time >= cpu_limit => {
            RunOutcome::CpuLimitExceeded
        }
        ExitState::Signaled(signal) => RunOutcome::SignaledOther { signal },
    }
}
