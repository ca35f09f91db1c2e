//! Running the simulator across a (policy × frame count) grid for one trace.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info};

use crate::decode::{MalformedResultError, ResultDecoder, SimulationResult, YamlDecoder};
use crate::invoker::{
    Configuration, ProcessRunner, SimulatorInvocationError, Simulator, ZeroFrameCount,
};
use crate::policy::Policy;

/// What to do when a sweep asks for the same policy or frame count twice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateMode {
    /// Run every repeat again.
    #[default]
    Allow,
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOptions {
    pub duplicates: DuplicateMode,
    pub max_invocations: Option<usize>,
}

/// Index-aligned frame counts and fault counts for one policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Series {
    pub frame_counts: Vec<u32>,
    pub fault_counts: Vec<u64>,
}

impl Series {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            frame_counts: Vec::with_capacity(capacity),
            fault_counts: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, frame_count: u32, faults: u64) {
        self.frame_counts.push(frame_count);
        self.fault_counts.push(faults);
    }

    pub fn len(&self) -> usize {
        self.frame_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_counts.is_empty()
    }

    pub fn points(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.frame_counts
            .iter()
            .copied()
            .zip(self.fault_counts.iter().copied())
    }
}

/// Per-policy series, in the order the policies were requested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepResult {
    series: Vec<(Policy, Series)>,
}

impl SweepResult {
    pub fn get(&self, policy: Policy) -> Option<&Series> {
        self.series
            .iter()
            .find(|(candidate, _)| *candidate == policy)
            .map(|(_, series)| series)
    }

    pub fn into_series(self, policy: Policy) -> Option<Series> {
        self.series
            .into_iter()
            .find(|(candidate, _)| *candidate == policy)
            .map(|(_, series)| series)
    }

    pub fn policies(&self) -> impl Iterator<Item = Policy> + '_ {
        self.series.iter().map(|(policy, _)| *policy)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Policy, &Series)> + '_ {
        self.series.iter().map(|(policy, series)| (*policy, series))
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    fn insert(&mut self, policy: Policy, series: Series) {
        match self.series.iter_mut().find(|(candidate, _)| *candidate == policy) {
            Some(slot) => slot.1 = series,
            None => self.series.push((policy, series)),
        }
    }
}

impl Serialize for SweepResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

#[derive(Debug, Error)]
pub enum CellError {
    #[error(transparent)]
    Invocation(#[from] SimulatorInvocationError),
    #[error(transparent)]
    Malformed(#[from] MalformedResultError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error(transparent)]
    FrameCount(#[from] ZeroFrameCount),
    #[error("sweep needs {requested} simulator runs, limit is {limit}")]
    TooLarge { requested: usize, limit: usize },
    #[error("policy {0} requested more than once")]
    DuplicatePolicy(Policy),
    #[error("frame count {0} requested more than once")]
    DuplicateFrameCount(u32),
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("invalid sweep for {}", .trace.display())]
    Grid {
        trace: PathBuf,
        #[source]
        source: GridError,
    },
    #[error("{policy} with {frame_count} frames on {} failed", .trace.display())]
    Cell {
        policy: Policy,
        frame_count: u32,
        trace: PathBuf,
        #[source]
        source: CellError,
    },
}

/// Drives the simulator over a grid and folds the decoded fault counts into series.
pub struct SweepController<R, D = YamlDecoder> {
    simulator: Simulator<R>,
    decoder: D,
    options: SweepOptions,
}

impl<R: ProcessRunner> SweepController<R, YamlDecoder> {
    pub fn new(simulator: Simulator<R>) -> Self {
        Self {
            simulator,
            decoder: YamlDecoder,
            options: SweepOptions::default(),
        }
    }
}

impl<R: ProcessRunner, D: ResultDecoder> SweepController<R, D> {
    pub fn with_decoder<E: ResultDecoder>(self, decoder: E) -> SweepController<R, E> {
        SweepController {
            simulator: self.simulator,
            decoder,
            options: self.options,
        }
    }

    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    pub fn simulator(&self) -> &Simulator<R> {
        &self.simulator
    }

    /// One invocation followed by one decode.
    pub fn run_cell(
        &mut self,
        configuration: &Configuration,
    ) -> Result<SimulationResult, CellError> {
        let text = self.simulator.invoke(configuration)?;
        Ok(self.decoder.decode(&text)?)
    }

    /// Runs every (policy, frame count) pair, policies outermost, in the order given.
    /// The first failure aborts the sweep.
    pub fn sweep(
        &mut self,
        trace: impl AsRef<Path>,
        policies: &[Policy],
        frame_counts: &[u32],
    ) -> Result<SweepResult, SweepError> {
        let trace = trace.as_ref();
        self.check_grid(policies, frame_counts)
            .map_err(|source| SweepError::Grid {
                trace: trace.to_path_buf(),
                source,
            })?;

        let started_at = self.simulator.invocations();
        let mut result = SweepResult::default();
        for &policy in policies {
            let mut series = Series::with_capacity(frame_counts.len());
            for &frame_count in frame_counts {
                let faults = self.fault_count(trace, policy, frame_count)?;
                series.push(frame_count, faults);
            }
            result.insert(policy, series);
        }

        info!(
            trace = %trace.display(),
            policies = policies.len(),
            invocations = self.simulator.invocations() - started_at,
            "sweep complete"
        );
        Ok(result)
    }

    fn fault_count(
        &mut self,
        trace: &Path,
        policy: Policy,
        frame_count: u32,
    ) -> Result<u64, SweepError> {
        let configuration =
            Configuration::new(frame_count, policy, trace).map_err(|err| SweepError::Grid {
                trace: trace.to_path_buf(),
                source: err.into(),
            })?;
        let result = self
            .run_cell(&configuration)
            .map_err(|source| SweepError::Cell {
                policy,
                frame_count,
                trace: trace.to_path_buf(),
                source,
            })?;
        debug!(
            %policy,
            frames = frame_count,
            faults = result.total_page_faults,
            "cell complete"
        );
        Ok(result.total_page_faults)
    }

    fn check_grid(
        &self,
        policies: &[Policy],
        frame_counts: &[u32],
    ) -> Result<(), GridError> {
        if frame_counts.contains(&0) {
            return Err(ZeroFrameCount.into());
        }

        if let Some(limit) = self.options.max_invocations {
            let requested = policies.len().saturating_mul(frame_counts.len());
            if requested > limit {
                return Err(GridError::TooLarge { requested, limit });
            }
        }

        if self.options.duplicates == DuplicateMode::Reject {
            let mut seen = HashSet::new();
            if let Some(policy) = policies.iter().find(|policy| !seen.insert(**policy)) {
                return Err(GridError::DuplicatePolicy(*policy));
            }
            let mut seen = HashSet::new();
            if let Some(frames) = frame_counts.iter().find(|frames| !seen.insert(**frames)) {
                return Err(GridError::DuplicateFrameCount(*frames));
            }
        }

        Ok(())
    }
}
