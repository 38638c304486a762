//! PPS capture loop.
//!
//! Each iteration starts in WAITING:
//! 1. Check for a stop request (shutdown or report limit)
//! 2. Sleep first if the source cannot block on events itself
//! 3. Fetch the next assert event with a bounded timeout
//! 4. On success go to DELIVERED, update statistics, emit the report, and
//!    return to WAITING
//!
//! Interrupted fetches are retried without limit. Timeouts follow the
//! configured [`TimeoutPolicy`]. Every other fetch error stops the loop.

use crate::report::ReportSink;
use pps_common::config::{MonitorConfig, TimeoutPolicy};
use pps_common::error::{PpsError, PpsResult};
use pps_common::state::{LoopState, LoopStateMachine};
use pps_common::stats::{CaptureSession, Report};
use pps_source::{PpsSource, PulseEvent};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use tracing::{debug, error, info, warn};

/// Why the loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The shutdown predicate returned true.
    Shutdown,
    /// `max_reports` reports were emitted.
    ReportLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown requested"),
            Self::ReportLimit => write!(f, "report limit reached"),
        }
    }
}

/// Result of a single loop iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// First pulse; nothing to report yet.
    Seeded,
    /// A report was emitted.
    Reported(Report),
    /// The fetch was interrupted by a signal and will be retried.
    Interrupted,
    /// The fetch timed out and the policy is to keep waiting.
    TimedOut,
    /// The loop has stopped.
    Stopped(StopReason),
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    /// Reports emitted.
    pub reports: u64,
    /// Fetches retried after a signal.
    pub interruptions: u64,
    /// Fetches that timed out and were tolerated.
    pub timeouts: u64,
    /// Pulses skipped according to the source's sequence counter.
    pub missed_pulses: u64,
    /// Reports with a zero or negative interval.
    pub anomalies: u64,
    /// Final mean deviation in microseconds.
    pub mean_us: Option<f64>,
    /// Final standard deviation in microseconds.
    pub std_dev_us: Option<f64>,
    /// Why the loop ended.
    pub stop_reason: StopReason,
}

/// Capture loop over one PPS source.
pub struct Monitor<S: PpsSource, W: Write> {
    source: S,
    session: CaptureSession,
    sink: ReportSink<W>,
    state: LoopStateMachine,
    config: MonitorConfig,
    /// Assert sequence of the last delivered event.
    last_sequence: Option<u32>,
    reports: u64,
    interruptions: u64,
    timeouts: u64,
    missed_pulses: u64,
    anomalies: u64,
}

impl<S: PpsSource, W: Write> Monitor<S, W> {
    /// Create a monitor that writes reports to `writer`.
    pub fn new(source: S, writer: W, config: MonitorConfig) -> Self {
        let sink = ReportSink::new(writer, config.output);
        Self {
            source,
            session: CaptureSession::new(),
            sink,
            state: LoopStateMachine::new(),
            config,
            last_sequence: None,
            reports: 0,
            interruptions: 0,
            timeouts: 0,
            missed_pulses: 0,
            anomalies: 0,
        }
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.state.state()
    }

    /// Statistics accumulated so far.
    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// The wrapped source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The report sink.
    pub fn sink(&self) -> &ReportSink<W> {
        &self.sink
    }

    /// Run until `shutdown` returns true, the report limit is reached, or a
    /// fatal error occurs.
    ///
    /// `shutdown` is only consulted at the top of each WAITING iteration,
    /// never while a fetch is blocked.
    ///
    /// # Errors
    ///
    /// Returns the first fatal fetch or output error.
    pub fn run<F>(&mut self, shutdown: F) -> PpsResult<RunSummary>
    where
        F: Fn() -> bool,
    {
        info!(
            timeout_ms = self.config.fetch_timeout.as_millis(),
            can_wait = self.source.capabilities().can_wait(),
            timeout_policy = ?self.config.timeout_policy,
            "Entering capture loop"
        );

        loop {
            if let StepOutcome::Stopped(reason) = self.step(shutdown())? {
                let summary = self.summary(reason);
                info!(reason = %reason, reports = summary.reports, "Capture loop stopped");
                return Ok(summary);
            }
        }
    }

    /// Perform one WAITING iteration.
    ///
    /// # Errors
    ///
    /// Returns fatal fetch errors, output errors, or
    /// [`PpsError::InvalidStateTransition`] if the loop has already stopped.
    pub fn step(&mut self, shutdown_requested: bool) -> PpsResult<StepOutcome> {
        if self.state.state() == LoopState::Stopped {
            return Err(PpsError::InvalidStateTransition {
                from: LoopState::Stopped.to_string(),
                to: LoopState::Waiting.to_string(),
            });
        }

        if shutdown_requested {
            self.state.transition(LoopState::Stopped)?;
            return Ok(StepOutcome::Stopped(StopReason::Shutdown));
        }
        if self.config.max_reports > 0 && self.reports >= self.config.max_reports {
            self.state.transition(LoopState::Stopped)?;
            return Ok(StepOutcome::Stopped(StopReason::ReportLimit));
        }

        if !self.source.capabilities().can_wait() && !self.config.fallback_poll_interval.is_zero()
        {
            std::thread::sleep(self.config.fallback_poll_interval);
        }

        match self.source.fetch(self.config.fetch_timeout) {
            Ok(event) => self.deliver(event),
            Err(PpsError::InterruptedFetch) => {
                self.interruptions += 1;
                warn!(
                    interruptions = self.interruptions,
                    "PPS fetch got a signal, retrying"
                );
                self.state.transition(LoopState::Waiting)?;
                Ok(StepOutcome::Interrupted)
            }
            Err(e) if e.is_timeout() && self.config.timeout_policy == TimeoutPolicy::Continue => {
                self.timeouts += 1;
                warn!(error = %e, timeouts = self.timeouts, "No pulse, still waiting");
                self.state.transition(LoopState::Waiting)?;
                Ok(StepOutcome::TimedOut)
            }
            Err(e) => {
                error!(error = %e, "PPS fetch failed");
                self.state.transition(LoopState::Stopped)?;
                Err(e)
            }
        }
    }

    /// DELIVERED: feed the statistics and emit the report.
    fn deliver(&mut self, event: PulseEvent) -> PpsResult<StepOutcome> {
        self.state.transition(LoopState::Delivered)?;
        self.track_sequence(event.sequence);

        let outcome = match self.session.observe(event.timestamp) {
            None => {
                debug!(timestamp = %event.timestamp, "First pulse captured");
                StepOutcome::Seeded
            }
            Some(report) => {
                if report.anomalous {
                    self.anomalies += 1;
                    warn!(
                        delta_ns = report.delta_ns,
                        timestamp = %event.timestamp,
                        "Non-increasing pulse timestamp"
                    );
                }
                if let Err(e) = self.sink.emit(&report) {
                    error!(error = %e, "Report output failed");
                    self.state.transition(LoopState::Waiting)?;
                    self.state.transition(LoopState::Stopped)?;
                    return Err(e);
                }
                self.reports += 1;
                StepOutcome::Reported(report)
            }
        };

        self.state.transition(LoopState::Waiting)?;
        Ok(outcome)
    }

    fn track_sequence(&mut self, sequence: u32) {
        if let Some(previous) = self.last_sequence {
            let gap = sequence.wrapping_sub(previous);
            if gap > 1 {
                let missed = u64::from(gap - 1);
                self.missed_pulses += missed;
                warn!(
                    previous,
                    sequence,
                    missed,
                    "Pulses missed between fetches"
                );
            }
        }
        self.last_sequence = Some(sequence);
    }

    /// Totals so far.
    pub fn summary(&self, stop_reason: StopReason) -> RunSummary {
        RunSummary {
            reports: self.reports,
            interruptions: self.interruptions,
            timeouts: self.timeouts,
            missed_pulses: self.missed_pulses,
            anomalies: self.anomalies,
            mean_us: self.session.mean_us(),
            std_dev_us: self.session.std_dev_us(),
            stop_reason,
        }
    }

    /// Consume the monitor, returning the report writer.
    pub fn into_writer(self) -> W {
        self.sink.into_inner()
    }
}
