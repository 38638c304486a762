//! Shared helpers for the capture loop scenarios.
//!
//! Provides:
//! - A scripted monitor writing reports into memory
//! - Capture of warning and error log lines

#![allow(dead_code)] // Not every scenario uses every helper

use pps_common::config::MonitorConfig;
use pps_common::time::Timestamp;
use pps_runtime::monitor::{Monitor, RunSummary};
use pps_source::{ScriptedFetch, SimulatedSource};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Log sink shared between a subscriber and the test.
#[derive(Debug, Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Everything logged so far.
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Number of logged lines at `level` ("WARN", "ERROR").
    pub fn count_level(&self, level: &str) -> usize {
        self.contents()
            .lines()
            .filter(|line| line.contains(level))
            .count()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with warnings and errors captured into the returned buffer.
pub fn with_captured_logs<T>(f: impl FnOnce() -> T) -> (T, LogBuffer) {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs)
}

/// Config for scripted runs: no fallback sleeps.
pub fn test_config() -> MonitorConfig {
    MonitorConfig {
        fallback_poll_interval: Duration::ZERO,
        ..MonitorConfig::default()
    }
}

/// Pulse at `sec` seconds plus `nsec` nanoseconds.
pub fn pulse(sec: i64, nsec: u32) -> ScriptedFetch {
    ScriptedFetch::Pulse(Timestamp::new(sec, nsec))
}

/// Output of a finished scripted run.
#[derive(Debug)]
pub struct ScriptedRun {
    /// Loop totals, or the fatal error text.
    pub result: Result<RunSummary, String>,
    /// Report lines written to the sink.
    pub stdout: String,
}

/// Run the capture loop over `script` until the script is consumed.
///
/// Shutdown is requested as soon as no scripted outcome remains, so the
/// run never reaches the exhausted-script error.
pub fn run_script(script: Vec<ScriptedFetch>, config: MonitorConfig) -> ScriptedRun {
    let source = SimulatedSource::new().with_script(script);
    let mut monitor = Monitor::new(source, Vec::new(), config);

    let result = loop {
        let exhausted = monitor.source().remaining() == 0;
        match monitor.step(exhausted) {
            Ok(pps_runtime::monitor::StepOutcome::Stopped(reason)) => {
                break Ok(monitor.summary(reason));
            }
            Ok(_) => {}
            Err(e) => break Err(e.to_string()),
        }
    };

    let stdout = String::from_utf8(monitor.into_writer()).unwrap();
    ScriptedRun { result, stdout }
}
