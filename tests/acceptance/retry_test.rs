//! Interruption and timeout handling acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - An interrupted fetch is retried and leaves the report stream untouched,
//!   apart from a single warning on the diagnostic channel
//! - Tolerated timeouts keep waiting; the exit policy stops with failure
//! - Any other fetch error is fatal

use super::common::{pulse, run_script, test_config, with_captured_logs};
use pps_common::config::{MonitorConfig, TimeoutPolicy};
use pps_source::ScriptedFetch;

fn base_script() -> Vec<ScriptedFetch> {
    vec![pulse(0, 0), pulse(1, 10_000), pulse(2, 0), pulse(3, 2_000)]
}

#[test]
fn test_interrupted_fetch_is_transparent() {
    let (clean, clean_logs) = with_captured_logs(|| run_script(base_script(), test_config()));

    let mut script = base_script();
    script.insert(2, ScriptedFetch::Interrupt);
    let (interrupted, interrupted_logs) =
        with_captured_logs(|| run_script(script, test_config()));

    assert_eq!(clean.stdout, interrupted.stdout);
    assert_eq!(clean.stdout.lines().count(), 3);

    let clean_summary = clean.result.unwrap();
    let interrupted_summary = interrupted.result.unwrap();
    assert_eq!(clean_summary.interruptions, 0);
    assert_eq!(interrupted_summary.interruptions, 1);
    assert_eq!(clean_summary.mean_us, interrupted_summary.mean_us);
    assert_eq!(clean_summary.std_dev_us, interrupted_summary.std_dev_us);

    assert_eq!(
        interrupted_logs.count_level("WARN"),
        clean_logs.count_level("WARN") + 1,
        "logs: {}",
        interrupted_logs.contents()
    );
    assert!(interrupted_logs.contents().contains("retrying"));
}

#[test]
fn test_repeated_interruptions_are_retried() {
    let mut script = vec![pulse(0, 0)];
    script.extend(std::iter::repeat(ScriptedFetch::Interrupt).take(25));
    script.push(pulse(1, 0));

    let run = run_script(script, test_config());
    let summary = run.result.unwrap();
    assert_eq!(summary.interruptions, 25);
    assert_eq!(summary.reports, 1);
}

#[test]
fn test_timeout_continue_keeps_waiting() {
    let script = vec![pulse(0, 0), ScriptedFetch::Timeout, pulse(1, 0)];
    let (run, logs) = with_captured_logs(|| run_script(script, test_config()));

    let summary = run.result.unwrap();
    assert_eq!(summary.timeouts, 1);
    assert_eq!(summary.reports, 1);
    assert_eq!(logs.count_level("WARN"), 1);
}

#[test]
fn test_timeout_exit_is_fatal() {
    let config = MonitorConfig {
        timeout_policy: TimeoutPolicy::Exit,
        ..test_config()
    };
    let script = vec![pulse(0, 0), pulse(1, 0), ScriptedFetch::Timeout, pulse(2, 0)];
    let (run, logs) = with_captured_logs(|| run_script(script, config));

    let err = run.result.unwrap_err();
    assert!(err.contains("no PPS event"), "error: {err}");
    assert_eq!(run.stdout.lines().count(), 1);
    assert_eq!(logs.count_level("ERROR"), 1);
}

#[test]
fn test_fetch_failure_is_fatal() {
    let script = vec![
        pulse(0, 0),
        ScriptedFetch::Fail(std::io::ErrorKind::PermissionDenied),
        pulse(1, 0),
    ];
    let run = run_script(script, test_config());
    assert!(run.result.is_err());
    assert!(run.stdout.is_empty());
}

#[test]
fn test_report_limit_stops_run() {
    let config = MonitorConfig {
        max_reports: 2,
        ..test_config()
    };
    let run = run_script(base_script(), config);
    let summary = run.result.unwrap();
    assert_eq!(
        summary.stop_reason,
        pps_runtime::monitor::StopReason::ReportLimit
    );
    assert_eq!(run.stdout.lines().count(), 2);
}
