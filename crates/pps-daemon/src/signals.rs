//! Signal handling for clean shutdown of the capture loop.
//!
//! SIGINT and SIGTERM set an atomic flag and nothing else. The handlers are
//! installed without `SA_RESTART`, so a fetch blocked in the kernel returns
//! `EINTR`. The loop then logs the interruption, and the flag is observed at
//! the top of the next WAITING iteration.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};
use tracing::debug;

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - Graceful termination request.
    Terminate,
    /// SIGINT - Interrupt (Ctrl+C).
    Interrupt,
}

impl SignalKind {
    const fn code(self) -> u8 {
        match self {
            SignalKind::Terminate => 1,
            SignalKind::Interrupt => 2,
        }
    }

    const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(SignalKind::Terminate),
            2 => Some(SignalKind::Interrupt),
            _ => None,
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Shared state for signal handling.
///
/// All fields are atomics so the state can be touched from a signal handler.
#[derive(Debug)]
pub struct SignalState {
    /// Set to true when a shutdown signal is received.
    shutdown_requested: AtomicBool,
    /// Count of signals received (for diagnostics).
    signal_count: AtomicU32,
    /// Most recent signal, encoded by `SignalKind::code` (0 = none).
    last_signal: AtomicU8,
}

impl Default for SignalState {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalState {
    /// Create a new signal state.
    pub const fn new() -> Self {
        Self {
            shutdown_requested: AtomicBool::new(false),
            signal_count: AtomicU32::new(0),
            last_signal: AtomicU8::new(0),
        }
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Relaxed)
    }

    /// Request shutdown.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::Relaxed);
    }

    /// Record a signal. Async-signal-safe.
    fn record_signal(&self, kind: SignalKind) {
        self.last_signal.store(kind.code(), Ordering::Relaxed);
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        self.request_shutdown();
    }

    /// The most recent shutdown signal, if any arrived.
    pub fn last_signal(&self) -> Option<SignalKind> {
        SignalKind::from_code(self.last_signal.load(Ordering::Relaxed))
    }

    /// Get the total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }
}

/// Process-wide state written by the signal handlers.
static SIGNAL_STATE: SignalState = SignalState::new();

/// Handle for signal management.
#[derive(Clone, Copy)]
pub struct SignalHandler {
    state: &'static SignalState,
}

impl SignalHandler {
    /// Install handlers for SIGTERM and SIGINT.
    ///
    /// On non-Unix platforms only manual shutdown is supported.
    ///
    /// # Errors
    ///
    /// Returns an error if `sigaction` fails.
    pub fn new() -> std::io::Result<Self> {
        let handler = Self {
            state: &SIGNAL_STATE,
        };

        #[cfg(unix)]
        handler.register_unix_handlers()?;

        Ok(handler)
    }

    #[cfg(unix)]
    #[allow(unsafe_code)]
    fn register_unix_handlers(&self) -> std::io::Result<()> {
        use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

        extern "C" fn on_shutdown_signal(signum: libc::c_int) {
            let kind = if signum == libc::SIGTERM {
                SignalKind::Terminate
            } else {
                SignalKind::Interrupt
            };
            SIGNAL_STATE.record_signal(kind);
        }

        // No SA_RESTART: a blocked PPS_FETCH must come back with EINTR.
        let action = SigAction::new(
            SigHandler::Handler(on_shutdown_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );

        for signal in [Signal::SIGTERM, Signal::SIGINT] {
            // SAFETY: the handler only touches atomics.
            unsafe { sigaction(signal, &action) }.map_err(std::io::Error::from)?;
        }

        debug!("Unix signal handlers registered for SIGTERM and SIGINT");
        Ok(())
    }

    /// Check if shutdown has been requested.
    #[inline]
    pub fn shutdown_requested(&self) -> bool {
        self.state.shutdown_requested()
    }

    /// Get the signal state for inspection.
    pub fn state(&self) -> &SignalState {
        self.state
    }
}
