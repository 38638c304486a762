use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// PPS error types covering source acquisition, fetch failures, and output.
#[derive(Debug, Error)]
pub enum PpsError {
    /// The device path could not be opened or is not a PPS source.
    #[error("unable to open PPS device {}: {source}", path.display())]
    Open {
        /// Device path that was tried.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Capability discovery failed.
    #[error("cannot get PPS capabilities: {source}")]
    Capability {
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A mandatory capability is not supported by the source.
    #[error("PPS source does not support {capability}")]
    MissingCapability {
        /// Name of the missing capability.
        capability: &'static str,
    },

    /// Reading or applying capture parameters failed.
    #[error("cannot configure PPS parameters: {source}")]
    Configure {
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The blocking fetch was interrupted by a signal.
    #[error("PPS fetch interrupted by a signal")]
    InterruptedFetch,

    /// No pulse arrived within the fetch timeout.
    #[error("no PPS event within {}", humantime::format_duration(*timeout))]
    FetchTimeout {
        /// Timeout that elapsed.
        timeout: Duration,
    },

    /// Any other fetch failure.
    #[error("PPS fetch failed: {source}")]
    Fetch {
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Writing a report line failed.
    #[error("cannot write report: {source}")]
    Output {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration or platform error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid control loop state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

impl PpsError {
    /// Returns true for a signal interruption of the blocking fetch.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::InterruptedFetch)
    }

    /// Returns true when the fetch timed out without an event.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::FetchTimeout { .. })
    }

    /// Returns true for failures raised while opening or configuring a source.
    #[must_use]
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::Open { .. }
                | Self::Capability { .. }
                | Self::MissingCapability { .. }
                | Self::Configure { .. }
        )
    }
}

/// Convenience type alias for PPS operations.
pub type PpsResult<T> = Result<T, PpsError>;
