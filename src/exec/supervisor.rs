/// Execution supervision: one child per cycle under CPU and wall ceilings
use crate::config::types::RunLimits;
use crate::kernel::process::{LaunchError, ProcessLauncher, SupervisedChild};
use crate::kernel::signal::ShutdownWatch;
use crate::verdict::{classify, RunOutcome};
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lifecycle of one supervised run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionState {
    NotStarted,
    Running { pid: u32 },
    Finished(RunOutcome),
}

/// Spawns the compiled artifact and enforces the wall-clock ceiling.
///
/// The CPU ceiling is applied inside the child by the launcher; the
/// supervisor only polls, kills on wall-clock expiry and classifies.
pub struct ExecutionSupervisor {
    launcher: Box<dyn ProcessLauncher>,
    limits: RunLimits,
    poll_interval: Duration,
    shutdown: ShutdownWatch,
    state: ExecutionState,
}

impl ExecutionSupervisor {
    pub fn new(limits: RunLimits, launcher: Box<dyn ProcessLauncher>) -> Self {
        Self {
            launcher,
            limits,
            poll_interval: DEFAULT_POLL_INTERVAL,
            shutdown: ShutdownWatch::disarmed(),
            state: ExecutionState::NotStarted,
        }
    }

    /// Kill the running child when a shutdown signal arrives.
    pub fn with_shutdown(mut self, shutdown: ShutdownWatch) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn limits(&self) -> &RunLimits {
        &self.limits
    }

    /// State of the most recent run.
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    fn transition(&mut self, next: ExecutionState) {
        log::debug!("Execution state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Execute `program` with no arguments and block until it is resolved.
    pub fn run(&mut self, program: &Path) -> RunOutcome {
        self.transition(ExecutionState::NotStarted);

        let outcome = match self.launcher.launch(program, &self.limits) {
            Ok(mut child) => {
                self.transition(ExecutionState::Running { pid: child.pid() });
                self.supervise(child.as_mut())
            }
            Err(LaunchError::Fork(e)) => {
                log::error!("fork failed for {}: {}", program.display(), e);
                RunOutcome::ForkFailed {
                    reason: e.to_string(),
                }
            }
            Err(LaunchError::Exec(e)) => {
                log::error!("exec failed for {}: {}", program.display(), e);
                RunOutcome::ExecFailed {
                    reason: e.to_string(),
                }
            }
        };

        self.transition(ExecutionState::Finished(outcome.clone()));
        outcome
    }

    fn supervise(&self, child: &mut dyn SupervisedChild) -> RunOutcome {
        let started = Instant::now();
        let mut watchdog_fired = false;
        let mut kill_sent = false;

        loop {
            match child.try_wait() {
                Ok(Some(termination)) => {
                    let outcome = classify(&termination, watchdog_fired, self.limits.cpu_time);
                    log::debug!(
                        "pid {} resolved as {} after {:?} wall, {:?} cpu",
                        child.pid(),
                        outcome,
                        started.elapsed(),
                        termination.cpu_time
                    );
                    return outcome;
                }
                Ok(None) => {
                    if !kill_sent && started.elapsed() >= self.limits.wall_time {
                        log::info!(
                            "Wall-clock limit {:?} exceeded by pid {}; killing",
                            self.limits.wall_time,
                            child.pid()
                        );
                        watchdog_fired = true;
                        kill_sent = true;
                        if let Err(e) = child.kill() {
                            log::error!("kill(pid {}) failed: {}", child.pid(), e);
                        }
                    } else if !kill_sent && self.shutdown.requested() {
                        log::warn!("Shutdown requested; killing pid {}", child.pid());
                        kill_sent = true;
                        if let Err(e) = child.kill() {
                            log::error!("kill(pid {}) failed: {}", child.pid(), e);
                        }
                    }
                    std::thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    log::error!("wait(pid {}) failed: {}", child.pid(), e);
                    let _ = child.kill();
                    return RunOutcome::ExecFailed {
                        reason: format!("wait failed: {e}"),
                    };
                }
            }
        }
    }
}
