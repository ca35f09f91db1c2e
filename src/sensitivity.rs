//! Marginal cost of each extra frame for a single policy.

use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::decode::ResultDecoder;
use crate::invoker::ProcessRunner;
use crate::policy::Policy;
use crate::sweep::{SweepController, SweepError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensitivityResult {
    pub policy: Policy,
    pub frame_counts: Vec<u32>,
    pub fault_counts: Vec<u64>,
    /// `fault_counts[i + 1] - fault_counts[i]`
    pub diffs: Vec<i64>,
}

impl SensitivityResult {
    /// Each diff paired with the frame count it was reached at.
    pub fn diff_points(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.frame_counts
            .iter()
            .skip(1)
            .copied()
            .zip(self.diffs.iter().copied())
    }

    /// Frame counts where one more frame cost more faults.
    pub fn rising_steps(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.diff_points().filter(|(_, diff)| *diff > 0)
    }
}

/// First difference of a series. Empty for fewer than two values.
/// Each step saturates at the `i64` bounds.
pub fn first_difference(values: &[u64]) -> Vec<i64> {
    values.windows(2).map(|pair| step(pair[0], pair[1])).collect()
}

fn step(from: u64, to: u64) -> i64 {
    let diff = i128::from(to) - i128::from(from);
    i64::try_from(diff).unwrap_or(if diff < 0 { i64::MIN } else { i64::MAX })
}

impl<R: ProcessRunner, D: ResultDecoder> SweepController<R, D> {
    pub fn sensitivity(
        &mut self,
        trace: impl AsRef<Path>,
        policy: Policy,
        frame_counts: &[u32],
    ) -> Result<SensitivityResult, SweepError> {
        let trace = trace.as_ref();
        let series = self
            .sweep(trace, &[policy], frame_counts)?
            .into_series(policy)
            .unwrap_or_default();
        let diffs = first_difference(&series.fault_counts);

        let result = SensitivityResult {
            policy,
            frame_counts: series.frame_counts,
            fault_counts: series.fault_counts,
            diffs,
        };
        for (frames, diff) in result.rising_steps() {
            warn!(
                trace = %trace.display(),
                %policy,
                frames,
                diff,
                "page faults rose with an extra frame"
            );
        }
        Ok(result)
    }
}
