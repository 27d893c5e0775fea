//! Child process handle over the Unix spawn primitives.
//!
//! The supervisor only sees the [`ProcessLauncher`] / [`SupervisedChild`]
//! traits; rlimit application and wait-status decoding live here.

use crate::config::types::{ChildStdin, RunLimits};
use nix::sys::resource::{setrlimit, Resource};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use std::io;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;

/// How a reaped child left.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitState {
    Exited(i32),
    Signaled(i32),
}

/// Wait evidence for one reaped child.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Termination {
    pub state: ExitState,
    /// User + system CPU time consumed by the child
    pub cpu_time: Duration,
}

/// Spawn failure, split the way the report needs it.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// No process could be created
    #[error("{0}")]
    Fork(io::Error),
    /// A process was created but the artifact could not be executed
    #[error("{0}")]
    Exec(io::Error),
}

impl LaunchError {
    fn from_spawn(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(libc::EAGAIN) | Some(libc::ENOMEM) => Self::Fork(err),
            _ => Self::Exec(err),
        }
    }
}

/// A started child the supervisor can poll and kill.
pub trait SupervisedChild {
    fn pid(&self) -> u32;

    /// Non-blocking reap. `Ok(None)` while the child is still running.
    fn try_wait(&mut self) -> io::Result<Option<Termination>>;

    /// Unconditional SIGKILL to the child and everything it forked.
    /// Killing an already reaped child is not an error.
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts the compiled artifact under the configured ceilings.
pub trait ProcessLauncher {
    fn launch(
        &self,
        program: &Path,
        limits: &RunLimits,
    ) -> Result<Box<dyn SupervisedChild>, LaunchError>;
}

/// Runs in the forked child between fork and exec; syscalls only.
fn apply_child_limits(cpu_secs: u64) -> io::Result<()> {
    // soft = limit -> SIGXCPU, hard = limit + 1 -> SIGKILL
    setrlimit(Resource::RLIMIT_CPU, cpu_secs, cpu_secs + 1)?;
    setrlimit(Resource::RLIMIT_CORE, 0, 0)?;
    Ok(())
}

/// Whether fd 0 is a terminal whose foreground group is ours.
///
/// Only then does a child in its own process group need the terminal handed
/// over; its first read would otherwise stop it with SIGTTIN.
fn owns_terminal_foreground() -> bool {
    // SAFETY: read-only queries on fd 0.
    unsafe { libc::isatty(0) == 1 && libc::tcgetpgrp(0) == libc::getpgrp() }
}

/// Make `pgrp` the terminal's foreground group.
///
/// SIGTTOU is blocked around `tcsetpgrp` because the caller may itself be in
/// a background group. Async-signal-safe, so usable from `pre_exec`.
fn set_terminal_foreground(pgrp: libc::pid_t) -> io::Result<()> {
    // SAFETY: both sigsets are local storage initialised by sigemptyset or
    // filled by pthread_sigmask before use.
    unsafe {
        let mut block: libc::sigset_t = std::mem::zeroed();
        let mut previous: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut block);
        libc::sigaddset(&mut block, libc::SIGTTOU);
        libc::pthread_sigmask(libc::SIG_BLOCK, &block, &mut previous);

        let result = if libc::tcsetpgrp(0, pgrp) == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        };

        libc::pthread_sigmask(libc::SIG_SETMASK, &previous, std::ptr::null_mut());
        result
    }
}

/// SIGKILL every process in the group led by `pgid`. An empty group is fine.
pub fn kill_process_group(pgid: Pid) -> io::Result<()> {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

/// Launcher backed by `std::process::Command` with a `pre_exec` rlimit hook.
///
/// Each child leads its own process group so a kill reaches everything it
/// forked. When the harness owns the terminal and the child shares its stdin,
/// the child's group is made the foreground group for the run.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixLauncher;

impl ProcessLauncher for UnixLauncher {
    fn launch(
        &self,
        program: &Path,
        limits: &RunLimits,
    ) -> Result<Box<dyn SupervisedChild>, LaunchError> {
        let mut cmd = Command::new(program);
        cmd.stdin(match limits.stdin {
            ChildStdin::Inherit => Stdio::inherit(),
            ChildStdin::Null => Stdio::null(),
        })
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .process_group(0);

        if let Some(dir) = program.parent() {
            cmd.current_dir(dir);
        }

        let cpu_secs = limits.cpu_time.as_secs().max(1);
        let foreground = limits.stdin == ChildStdin::Inherit && owns_terminal_foreground();
        // SAFETY: the hook only issues setrlimit, sigprocmask and tcsetpgrp,
        // all async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                apply_child_limits(cpu_secs)?;
                if foreground {
                    set_terminal_foreground(std::process::id() as libc::pid_t)?;
                }
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(LaunchError::from_spawn)?;
        let pid = Pid::from_raw(child.id() as i32);
        log::debug!(
            "Spawned {} as pid {} (foreground={})",
            program.display(),
            pid,
            foreground
        );

        // Reaping goes through wait4 below; the std handle is not used again.
        drop(child);

        Ok(Box::new(UnixChild {
            pid,
            reaped: None,
            holds_terminal: foreground,
        }))
    }
}

struct UnixChild {
    /// Also the process group id
    pid: Pid,
    reaped: Option<Termination>,
    holds_terminal: bool,
}

impl UnixChild {
    fn reclaim_terminal(&mut self) {
        if !self.holds_terminal {
            return;
        }
        self.holds_terminal = false;
        // SAFETY: getpgrp cannot fail.
        let ours = unsafe { libc::getpgrp() };
        if let Err(e) = set_terminal_foreground(ours) {
            log::warn!("Failed to reclaim terminal from pid {}: {}", self.pid, e);
        }
    }
}

impl SupervisedChild for UnixChild {
    fn pid(&self) -> u32 {
        self.pid.as_raw() as u32
    }

    fn try_wait(&mut self) -> io::Result<Option<Termination>> {
        if let Some(termination) = self.reaped {
            return Ok(Some(termination));
        }

        let mut status: libc::c_int = 0;
        let mut usage = std::mem::MaybeUninit::<libc::rusage>::zeroed();
        // SAFETY: status and usage point to live, properly sized storage.
        let rc = unsafe {
            libc::wait4(
                self.pid.as_raw(),
                &mut status,
                libc::WNOHANG,
                usage.as_mut_ptr(),
            )
        };

        if rc == 0 {
            return Ok(None);
        }
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(err);
        }

        // SAFETY: wait4 filled the struct for a reaped child.
        let usage = unsafe { usage.assume_init() };
        let state = match WaitStatus::from_raw(self.pid, status)? {
            WaitStatus::Exited(_, code) => ExitState::Exited(code),
            WaitStatus::Signaled(_, sig, _) => ExitState::Signaled(sig as i32),
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("unexpected wait status: {other:?}"),
                ))
            }
        };

        let termination = Termination {
            state,
            cpu_time: timeval_to_duration(usage.ru_utime) + timeval_to_duration(usage.ru_stime),
        };
        self.reaped = Some(termination);
        self.reclaim_terminal();
        Ok(Some(termination))
    }

    fn kill(&mut self) -> io::Result<()> {
        kill_process_group(self.pid)
    }
}

impl Drop for UnixChild {
    fn drop(&mut self) {
        // Whatever the program forked dies with the handle, reaped or not.
        let _ = kill_process_group(self.pid);
        if self.reaped.is_none() {
            let _ = waitpid(self.pid, None);
        }
        self.reclaim_terminal();
    }
}

/// Helpers for tests that check no process outlives its cycle.
#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::time::{Duration, Instant};

    /// Pid written to `path` by a test program, waiting for it to appear.
    pub(crate) fn read_pid_file(path: &Path) -> i32 {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Ok(text) = std::fs::read_to_string(path) {
                if let Ok(pid) = text.trim().parse() {
                    return pid;
                }
            }
            assert!(Instant::now() < deadline, "{} never written", path.display());
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// True once `pid` no longer exists or is only a zombie awaiting init.
    pub(crate) fn gone_within(pid: i32, within: Duration) -> bool {
        let deadline = Instant::now() + within;
        loop {
            let gone = match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
                Err(_) => true,
                Ok(stat) => stat
                    .rsplit_once(')')
                    .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
            };
            if gone {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}
