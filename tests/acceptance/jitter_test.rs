//! Jitter report acceptance tests.
//!
//! # Acceptance Criteria
//!
//! - One report line per interval after the first pulse
//! - Exact text rendering for known pulse sequences
//! - Running mean and population standard deviation match a direct
//!   computation over every prefix of the run

use super::common::{pulse, run_script, test_config};
use pps_common::config::OutputFormat;
use pps_common::stats::NOMINAL_PERIOD_NS;
use pps_common::time::Timestamp;
use pps_runtime::monitor::{Monitor, StepOutcome, StopReason};
use pps_source::SimulatedSource;

#[test]
fn test_known_sequence_report_lines() {
    let run = run_script(
        vec![pulse(0, 0), pulse(1, 10_000), pulse(2, 0)],
        test_config(),
    );

    let summary = run.result.unwrap();
    assert_eq!(summary.reports, 2);
    assert_eq!(summary.stop_reason, StopReason::Shutdown);
    assert_eq!(
        run.stdout.lines().collect::<Vec<_>>(),
        [
            "diff 1000010000 ns - pps 10.00 - avg 10.00 - std 0.00",
            "diff 999990000 ns - pps -10.00 - avg 0.00 - std 10.00",
        ]
    );
}

#[test]
fn test_zero_jitter_reports_zero() {
    let script = (0..10).map(|s| pulse(1_700_000_000 + s, 250)).collect();
    let run = run_script(script, test_config());

    let summary = run.result.unwrap();
    assert_eq!(summary.reports, 9);
    assert_eq!(summary.mean_us, Some(0.0));
    assert_eq!(summary.std_dev_us, Some(0.0));
    for line in run.stdout.lines() {
        assert_eq!(line, "diff 1000000000 ns - pps 0.00 - avg 0.00 - std 0.00");
    }
}

#[test]
fn test_single_pulse_prints_nothing() {
    let run = run_script(vec![pulse(42, 0)], test_config());
    let summary = run.result.unwrap();
    assert_eq!(summary.reports, 0);
    assert_eq!(summary.mean_us, None);
    assert!(run.stdout.is_empty());
}

#[test]
fn test_running_moments_match_direct_computation() {
    let offsets_ns: [i64; 8] = [0, 3_500, -1_200, 800, 15_000, -7_250, 0, 42];
    let timestamps: Vec<Timestamp> = offsets_ns
        .iter()
        .enumerate()
        .map(|(i, off)| {
            let base = i64::try_from(i).unwrap() * NOMINAL_PERIOD_NS;
            Timestamp::from_nanos(1_000 * NOMINAL_PERIOD_NS + base + off)
        })
        .collect();

    let source = SimulatedSource::from_timestamps(timestamps.clone());
    let mut monitor = Monitor::new(source, Vec::new(), test_config());
    assert_eq!(monitor.step(false).unwrap(), StepOutcome::Seeded);

    let mut deviations = Vec::new();
    for pair in timestamps.windows(2) {
        let delta = pair[1] - pair[0];
        #[allow(clippy::cast_precision_loss)]
        deviations.push((delta - NOMINAL_PERIOD_NS) as f64 / 1000.0);

        let StepOutcome::Reported(report) = monitor.step(false).unwrap() else {
            panic!("expected a report");
        };
        assert_eq!(report.delta_ns, delta);

        #[allow(clippy::cast_precision_loss)]
        let n = deviations.len() as f64;
        let mean = deviations.iter().sum::<f64>() / n;
        let variance = deviations.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / n;

        assert!((report.mean_us - mean).abs() < 1e-6, "mean after {n}");
        assert!(
            (report.std_dev_us - variance.sqrt()).abs() < 1e-6,
            "std after {n}"
        );
    }
}

#[test]
fn test_json_output_lines() {
    let config = pps_common::config::MonitorConfig {
        output: OutputFormat::Json,
        ..test_config()
    };
    let run = run_script(vec![pulse(0, 0), pulse(1, 10_000)], config);
    run.result.unwrap();

    let lines: Vec<&str> = run.stdout.lines().collect();
    assert_eq!(lines.len(), 1);
    let value: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(value["delta_ns"], 1_000_010_000_i64);
    assert_eq!(value["anomalous"], false);
    assert!((value["deviation_us"].as_f64().unwrap() - 10.0).abs() < 1e-9);
}
