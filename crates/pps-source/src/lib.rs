//! PPS timestamp sources.
//!
//! This crate provides:
//! - [`PpsSource`] trait, the one operation the capture loop needs
//! - [`Capabilities`] mask mirroring the kernel mode bits
//! - [`device`] module with the Linux `/dev/ppsN` implementation
//! - [`simulated`] module with a scripted source for tests

pub mod capabilities;
pub mod device;
#[cfg(target_os = "linux")]
pub mod kernel;
#[cfg(feature = "simulated")]
pub mod simulated;

pub use capabilities::Capabilities;
pub use device::{acquire, PpsDevice};
#[cfg(feature = "simulated")]
pub use simulated::{ScriptedFetch, SimulatedSource};

use pps_common::{PpsResult, Timestamp};
use std::time::Duration;

/// One assert event as reported by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEvent {
    /// Time of the assert edge.
    pub timestamp: Timestamp,
    /// Source-maintained assert counter; wraps at `u32::MAX`.
    pub sequence: u32,
}

/// A source of PPS assert timestamps.
///
/// Acquisition (opening and configuring) is source specific and happens
/// before the source is handed to the capture loop.
pub trait PpsSource {
    /// Capabilities negotiated during acquisition.
    fn capabilities(&self) -> Capabilities;

    /// Block until the next assert event or until `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - [`pps_common::PpsError::InterruptedFetch`] if a signal arrived
    /// - [`pps_common::PpsError::FetchTimeout`] if no event arrived in time
    /// - [`pps_common::PpsError::Fetch`] for any other failure
    fn fetch(&mut self, timeout: Duration) -> PpsResult<PulseEvent>;
}

impl<S: PpsSource + ?Sized> PpsSource for Box<S> {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn fetch(&mut self, timeout: Duration) -> PpsResult<PulseEvent> {
        (**self).fetch(timeout)
    }
}
