use std::io;
use std::sync::{Arc, Mutex};

use vmsim_bench::{
    invoker::{ProcessOutput, Simulator},
    policy::Policy,
    sweep::{SweepController, SweepError},
    testing::ScriptedRunner,
};

/// Collects formatted log lines so tests can read them back.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer lock")).into_owned()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn controller(runner: ScriptedRunner) -> SweepController<ScriptedRunner> {
    SweepController::new(Simulator::new("./vmsim_prog", runner))
}

#[test]
fn diffs_of_three_point_range() {
    let mut sweep = controller(ScriptedRunner::with_faults(|_, frames| match frames {
        2 => 200,
        3 => 180,
        _ => 175,
    }));

    let result = sweep
        .sensitivity("gcc.trace", Policy::Second, &[2, 3, 4])
        .expect("sensitivity sweep succeeds");

    assert_eq!(result.policy, Policy::Second);
    assert_eq!(result.frame_counts, [2, 3, 4]);
    assert_eq!(result.fault_counts, [200, 180, 175]);
    assert_eq!(result.diffs, [-20, -5]);
    assert_eq!(result.diff_points().collect::<Vec<_>>(), [(3, -20), (4, -5)]);
}

#[test]
fn diffs_are_one_shorter_over_a_wide_range() {
    let mut sweep = controller(ScriptedRunner::with_faults(|_, frames| {
        10_000 / u64::from(frames)
    }));
    let frames: Vec<u32> = (2..=100).collect();

    let result = sweep.sensitivity("swim.trace", Policy::Lru, &frames).unwrap();

    assert_eq!(result.fault_counts.len(), frames.len());
    assert_eq!(result.diffs.len(), frames.len() - 1);
    for (i, diff) in result.diffs.iter().enumerate() {
        assert_eq!(
            *diff,
            result.fault_counts[i + 1] as i64 - result.fault_counts[i] as i64
        );
        assert!(*diff <= 0);
    }
    assert_eq!(sweep.simulator().invocations(), frames.len());
}

#[test]
fn short_ranges_give_empty_diffs() {
    let mut sweep = controller(ScriptedRunner::with_faults(|_, _| 50));

    let single = sweep.sensitivity("gcc.trace", Policy::Opt, &[8]).unwrap();
    assert_eq!(single.fault_counts, [50]);
    assert!(single.diffs.is_empty());

    let none = sweep.sensitivity("gcc.trace", Policy::Opt, &[]).unwrap();
    assert!(none.fault_counts.is_empty());
    assert!(none.diffs.is_empty());
}

#[test]
fn rising_faults_are_kept_as_is() {
    // Belady's anomaly: FIFO-like policies can fault more with more frames
    let mut sweep = controller(ScriptedRunner::with_faults(|_, frames| match frames {
        3 => 9,
        4 => 10,
        _ => 5,
    }));
    let result = sweep
        .sensitivity("anomaly.trace", Policy::Second, &[3, 4, 5])
        .unwrap();
    assert_eq!(result.diffs, [1, -5]);
    assert_eq!(result.rising_steps().collect::<Vec<_>>(), [(4, 1)]);
}

#[test]
fn rising_faults_are_logged_as_warnings() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let mut sweep = controller(ScriptedRunner::with_faults(|_, frames| match frames {
        3 => 9,
        4 => 10,
        5 => 5,
        _ => 7,
    }));

    let result = tracing::subscriber::with_default(subscriber, || {
        sweep.sensitivity("anomaly.trace", Policy::Second, &[3, 4, 5, 6])
    })
    .expect("sensitivity sweep succeeds");
    assert_eq!(result.diffs, [1, -5, 2]);

    let logs = logs.contents();
    let warnings: Vec<&str> = logs
        .lines()
        .filter(|line| line.contains("page faults rose with an extra frame"))
        .collect();
    assert_eq!(warnings.len(), 2, "{logs}");
    assert!(warnings[0].contains("WARN"));
    assert!(warnings[0].contains("frames=4"));
    assert!(warnings[0].contains("diff=1"));
    assert!(warnings[1].contains("frames=6"));
    assert!(warnings[1].contains("diff=2"));
}

#[test]
fn steady_decline_logs_no_warning() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let mut sweep = controller(ScriptedRunner::with_faults(|_, frames| {
        100 / u64::from(frames)
    }));

    tracing::subscriber::with_default(subscriber, || {
        sweep.sensitivity("gcc.trace", Policy::Lru, &[2, 4, 8])
    })
    .expect("sensitivity sweep succeeds");

    assert!(logs.contents().is_empty(), "{}", logs.contents());
}

#[test]
fn failure_returns_no_partial_series() {
    let mut sweep = controller(ScriptedRunner::new(|call| {
        if call.frame_count == 4 {
            ProcessOutput::ok("not: [valid")
        } else {
            ProcessOutput::ok("Total page faults: 1\n")
        }
    }));

    let err = sweep
        .sensitivity("gcc.trace", Policy::Second, &[2, 3, 4, 5])
        .unwrap_err();
    assert!(matches!(
        err,
        SweepError::Cell {
            frame_count: 4,
            policy: Policy::Second,
            ..
        }
    ));
}
