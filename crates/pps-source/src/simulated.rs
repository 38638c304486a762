//! In-memory PPS source for testing without hardware.
//!
//! A [`SimulatedSource`] first replays a script of fetch outcomes. Once the
//! script runs dry it either fails (the default, so tests terminate) or, in
//! free-running mode, keeps producing pulses one nominal second apart with a
//! small deterministic jitter.

use crate::{Capabilities, PpsSource, PulseEvent};
use pps_common::error::{PpsError, PpsResult};
use pps_common::time::{Timestamp, NANOS_PER_SEC};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::trace;

/// Seed for free-running jitter, so runs are reproducible.
const JITTER_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// One scripted fetch outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedFetch {
    /// Deliver an assert event at this time.
    Pulse(Timestamp),
    /// Fail with a signal interruption.
    Interrupt,
    /// Fail with a timeout.
    Timeout,
    /// Fail with an OS error.
    Fail(std::io::ErrorKind),
}

/// Free-running pulse generator used after the script is exhausted.
#[derive(Debug, Clone)]
struct FreeRun {
    next: Timestamp,
    jitter_ns: i64,
    rng: Xoshiro256PlusPlus,
    /// Wall-clock pacing anchor; `None` delivers pulses immediately.
    paced_from: Option<Instant>,
}

impl FreeRun {
    /// Uniform offset in `[-jitter_ns, jitter_ns]`.
    fn next_jitter(&mut self) -> i64 {
        if self.jitter_ns == 0 {
            return 0;
        }
        self.rng.random_range(-self.jitter_ns..=self.jitter_ns)
    }
}

/// Scripted PPS source.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    capabilities: Capabilities,
    script: VecDeque<ScriptedFetch>,
    free_run: Option<FreeRun>,
    sequence: u32,
    fetch_count: u64,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSource {
    /// Create an empty source that can wait and capture assert edges.
    #[must_use]
    pub fn new() -> Self {
        Self {
            capabilities: Capabilities::CAPTURE_ASSERT
                | Capabilities::OFFSET_ASSERT
                | Capabilities::CAN_WAIT
                | Capabilities::TSFMT_TSPEC,
            script: VecDeque::new(),
            free_run: None,
            sequence: 0,
            fetch_count: 0,
        }
    }

    /// Source that delivers a pulse for each timestamp, in order.
    #[must_use]
    pub fn from_timestamps<I>(timestamps: I) -> Self
    where
        I: IntoIterator<Item = Timestamp>,
    {
        Self::new().with_script(timestamps.into_iter().map(ScriptedFetch::Pulse))
    }

    /// Endless 1 PPS source starting at `start` with up to `jitter` of
    /// deviation per pulse. When `paced`, each fetch blocks until the pulse
    /// is due in wall-clock time.
    #[must_use]
    pub fn free_running(start: Timestamp, jitter: Duration, paced: bool) -> Self {
        let mut source = Self::new();
        source.free_run = Some(FreeRun {
            next: start,
            jitter_ns: i64::try_from(jitter.as_nanos()).unwrap_or(i64::MAX / 4),
            rng: Xoshiro256PlusPlus::seed_from_u64(JITTER_SEED),
            paced_from: paced.then(Instant::now),
        });
        source
    }

    /// Append scripted outcomes.
    #[must_use]
    pub fn with_script<I>(mut self, script: I) -> Self
    where
        I: IntoIterator<Item = ScriptedFetch>,
    {
        self.script.extend(script);
        self
    }

    /// Override the advertised capabilities.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Number of fetch calls made so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count
    }

    /// Scripted outcomes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn pulse(&mut self, timestamp: Timestamp) -> PulseEvent {
        self.sequence = self.sequence.wrapping_add(1);
        PulseEvent {
            timestamp,
            sequence: self.sequence,
        }
    }

    fn free_running_pulse(&mut self, timeout: Duration) -> PpsResult<PulseEvent> {
        let Some(run) = self.free_run.as_mut() else {
            return Err(PpsError::Fetch {
                source: std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "simulated source script exhausted",
                ),
            });
        };

        if let Some(anchor) = run.paced_from {
            let due = anchor + Duration::from_secs(u64::from(self.sequence) + 1);
            let wait = due.saturating_duration_since(Instant::now());
            if wait > timeout {
                std::thread::sleep(timeout);
                return Err(PpsError::FetchTimeout { timeout });
            }
            std::thread::sleep(wait);
        }

        let timestamp = run.next;
        let jitter = run.next_jitter();
        run.next = Timestamp::from_nanos(
            run.next
                .nanos_since(Timestamp::default())
                .saturating_add(NANOS_PER_SEC + jitter),
        );
        Ok(self.pulse(timestamp))
    }
}

impl PpsSource for SimulatedSource {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn fetch(&mut self, timeout: Duration) -> PpsResult<PulseEvent> {
        self.fetch_count += 1;
        let next = self.script.pop_front();
        trace!(fetch = self.fetch_count, ?next, "Simulated fetch");

        match next {
            Some(ScriptedFetch::Pulse(timestamp)) => Ok(self.pulse(timestamp)),
            Some(ScriptedFetch::Interrupt) => Err(PpsError::InterruptedFetch),
            Some(ScriptedFetch::Timeout) => Err(PpsError::FetchTimeout { timeout }),
            Some(ScriptedFetch::Fail(kind)) => Err(PpsError::Fetch {
                source: std::io::Error::from(kind),
            }),
            None => self.free_running_pulse(timeout),
        }
    }
}
