/// Async-safe shutdown signal handling for the harness
///
/// Handlers only flip atomics. They are installed without `SA_RESTART`, so a
/// blocking read on the control stream returns `EINTR` and the session loop
/// gets a chance to observe the flag.
use log::info;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Global shutdown flag (async-safe atomic)
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Global signal received (async-safe atomic)
static SIGNAL_RECEIVED: AtomicI32 = AtomicI32::new(0);

/// Signal handler state
pub struct SignalHandler;

impl SignalHandler {
    /// Initialize signal handlers
    /// Must be called early in main() before any child is spawned
    pub fn init() -> Result<Self, String> {
        Self::install_signal_handlers()?;
        Ok(Self)
    }

    /// Install signal handlers for SIGINT, SIGTERM, SIGHUP
    fn install_signal_handlers() -> Result<(), String> {
        let sig_action = SigAction::new(
            SigHandler::Handler(Self::signal_handler),
            SaFlags::empty(),
            SigSet::empty(),
        );

        for sig in [Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP] {
            // SAFETY: the handler only stores to atomics.
            unsafe {
                signal::sigaction(sig, &sig_action)
                    .map_err(|e| format!("Failed to install {} handler: {}", sig, e))?;
            }
        }

        info!("Signal handlers installed (SIGINT, SIGTERM, SIGHUP)");
        Ok(())
    }

    /// Only performs atomic operations - no allocations, no locks, no I/O
    extern "C" fn signal_handler(signal: libc::c_int) {
        SIGNAL_RECEIVED.store(signal, Ordering::SeqCst);
        SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
    }

    /// Watch handle for the installed handlers.
    pub fn watch(&self) -> ShutdownWatch {
        ShutdownWatch { armed: true }
    }
}

/// Cheap copyable view of the shutdown flag, polled by the parser and the
/// supervisor.
///
/// A disarmed watch never reports shutdown; it is what components get when
/// no handlers were installed (library use, tests).
#[derive(Clone, Copy, Debug, Default)]
pub struct ShutdownWatch {
    armed: bool,
}

impl ShutdownWatch {
    pub fn disarmed() -> Self {
        Self { armed: false }
    }

    pub fn requested(&self) -> bool {
        self.armed && SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
    }

    /// Signal that requested the shutdown, if any.
    pub fn signal(&self) -> Option<i32> {
        if !self.requested() {
            return None;
        }
        match SIGNAL_RECEIVED.load(Ordering::SeqCst) {
            0 => None,
            sig => Some(sig),
        }
    }
}

/// Human readable signal name, `SIG?` for numbers nix does not know.
pub fn signal_name(signal: i32) -> &'static str {
    Signal::try_from(signal)
        .map(Signal::as_str)
        .unwrap_or("SIG?")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_watch_ignores_flag() {
        let _guard = test_support::lock_flag();
        test_support::raise(libc::SIGTERM);

        let disarmed = ShutdownWatch::disarmed();
        assert!(!disarmed.requested());
        assert_eq!(disarmed.signal(), None);

        let armed = test_support::armed_watch();
        assert!(armed.requested());
        assert_eq!(armed.signal(), Some(libc::SIGTERM));

        test_support::clear();
    }

    #[test]
    fn signal_names() {
        assert_eq!(signal_name(libc::SIGXCPU), "SIGXCPU");
        assert_eq!(signal_name(libc::SIGSEGV), "SIGSEGV");
        assert_eq!(signal_name(0), "SIG?");
    }
}
