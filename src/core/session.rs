/// Session loop: drives one control stream through collect, build, run cycles
///
/// Single-threaded and cooperative. The only concurrency is the supervised
/// child during `Running`; the next control event is not read until that
/// cycle has been reported and purged.
use crate::config::types::{HarnessConfig, HarnessError, Result};
use crate::core::report::Reporter;
use crate::exec::supervisor::ExecutionSupervisor;
use crate::judge::build::{BuildInvoker, BuildOutcome};
use crate::kernel::process::{ProcessLauncher, UnixLauncher};
use crate::kernel::signal::ShutdownWatch;
use crate::protocol::{ControlEvent, ControlStreamParser};
use crate::safety::workspace::Workspace;
use std::io::{self, Read, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Collecting,
    Building,
    Running,
}

/// Why the session stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    EndOfStream,
    Shutdown(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    /// Completed run cycles
    pub cycles: u64,
    pub end: SessionEnd,
    /// Control lines cut at the line bound
    pub truncated_lines: u64,
}

pub struct Session<R, W: Write> {
    parser: ControlStreamParser<R>,
    workspace: Workspace,
    builder: BuildInvoker,
    supervisor: ExecutionSupervisor,
    reporter: Reporter<W>,
    shutdown: ShutdownWatch,
    state: SessionState,
    cycles: u64,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(config: &HarnessConfig, workspace: Workspace, input: R, output: W) -> Self {
        Self {
            parser: ControlStreamParser::new(input, config.max_line_bytes),
            workspace,
            builder: BuildInvoker::from_config(config),
            supervisor: ExecutionSupervisor::new(config.run_limits(), Box::new(UnixLauncher)),
            reporter: Reporter::new(output, config.color),
            shutdown: ShutdownWatch::disarmed(),
            state: SessionState::Idle,
            cycles: 0,
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownWatch) -> Self {
        self.shutdown = shutdown;
        self.parser = self.parser.with_shutdown(shutdown);
        self.supervisor = self.supervisor.with_shutdown(shutdown);
        self
    }

    pub fn with_builder(mut self, builder: BuildInvoker) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_launcher(mut self, launcher: Box<dyn ProcessLauncher>) -> Self {
        let limits = self.supervisor.limits().clone();
        self.supervisor = ExecutionSupervisor::new(limits, launcher).with_shutdown(self.shutdown);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            log::debug!("Session state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Consume the control stream until it ends or shutdown is requested.
    ///
    /// Only output-stream and control-stream I/O failures are returned as
    /// errors; everything that goes wrong inside a cycle is reported on the
    /// output stream and the session carries on.
    pub fn run(&mut self) -> Result<SessionSummary> {
        self.workspace.purge();

        loop {
            if let Some(signal) = self.shutdown.signal() {
                log::warn!("Shutdown requested by signal {}", signal);
                return Ok(self.finish(SessionEnd::Shutdown(signal)));
            }

            let event = match self.parser.next_event() {
                Ok(event) => event,
                // Only surfaced once shutdown is requested; the check above ends the loop.
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };

            match event {
                ControlEvent::StartArtifact { name } => self.start_artifact(name)?,
                ControlEvent::Content(line) => self.append(&line)?,
                ControlEvent::Run => self.run_cycle()?,
                ControlEvent::EndOfStream => return Ok(self.finish(SessionEnd::EndOfStream)),
            }
        }
    }

    fn finish(&mut self, end: SessionEnd) -> SessionSummary {
        self.workspace.purge();
        self.transition(SessionState::Idle);
        let summary = SessionSummary {
            cycles: self.cycles,
            end,
            truncated_lines: self.parser.truncated_lines(),
        };
        log::debug!("Session finished: {:?}", summary);
        summary
    }

    fn start_artifact(&mut self, name: Option<String>) -> Result<()> {
        let name = name.unwrap_or_else(|| self.builder.adapter().default_source_name().to_string());

        match self.workspace.start(&name) {
            Ok(_) => self.transition(SessionState::Collecting),
            Err(HarnessError::InvalidArtifactName(rejected)) => {
                log::warn!("Rejected artifact name {:?}", rejected);
                // Content up to the next start belongs to nobody.
                self.workspace.finalize();
                self.transition(SessionState::Idle);
                self.reporter.rejected_name(&rejected)?;
            }
            Err(e) => {
                log::warn!("Failed to start artifact {}: {}", name, e);
                self.workspace.finalize();
                self.transition(SessionState::Idle);
                self.reporter.workspace_error(&e.to_string())?;
            }
        }
        Ok(())
    }

    fn append(&mut self, line: &[u8]) -> Result<()> {
        if let Err(e) = self.workspace.write_line(line) {
            self.transition(SessionState::Idle);
            self.reporter.workspace_error(&e.to_string())?;
        }
        Ok(())
    }

    fn run_cycle(&mut self) -> Result<()> {
        self.workspace.finalize();
        self.cycles += 1;
        self.transition(SessionState::Building);

        match self.builder.build(&self.workspace) {
            Ok(BuildOutcome::NoCodeSubmitted) => self.reporter.no_code()?,
            Ok(BuildOutcome::Failed { diagnostics }) => {
                self.reporter.compilation_failed(&diagnostics)?
            }
            Ok(BuildOutcome::Succeeded { binary }) => {
                self.reporter.compilation_succeeded()?;
                self.transition(SessionState::Running);
                let outcome = self.supervisor.run(&binary);
                if outcome.is_limit_kill() {
                    log::info!("Cycle {} ended by limit: {}", self.cycles, outcome);
                }
                self.reporter.outcome(&outcome)?;
            }
            Err(e) => {
                log::warn!("Build of cycle {} failed: {}", self.cycles, e);
                self.reporter.workspace_error(&e.to_string())?;
            }
        }

        self.reporter.cycle_end()?;
        self.workspace.purge();
        self.transition(SessionState::Idle);
        Ok(())
    }
}
