use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::Policy;
use crate::sweep::{DuplicateMode, SweepOptions};

fn default_simulator() -> PathBuf {
    PathBuf::from("./vmsim_prog")
}

fn default_traces() -> Vec<PathBuf> {
    ["test/gcc.trace", "test/gzip.trace", "test/swim.trace"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}

fn default_comparison() -> Option<ComparisonConfig> {
    Some(ComparisonConfig::default())
}

fn default_sensitivity() -> Option<SensitivityConfig> {
    Some(SensitivityConfig::default())
}

fn default_policies() -> Vec<Policy> {
    Policy::ALL.to_vec()
}

fn default_comparison_frames() -> FrameGrid {
    FrameGrid::List(vec![8, 16, 32, 64])
}

fn default_sensitivity_policy() -> Policy {
    Policy::Second
}

fn default_sensitivity_frames() -> FrameGrid {
    FrameGrid::Range {
        from: 2,
        to: 100,
        step: default_step(),
    }
}

fn default_step() -> u32 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

/// The whole benchmark grid: which simulator, which traces, which sweeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default = "default_simulator")]
    pub simulator: PathBuf,
    #[serde(default = "default_traces")]
    pub traces: Vec<PathBuf>,
    /// Charts are written next to each trace when unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_invocations: Option<usize>,
    #[serde(default)]
    pub duplicates: DuplicateMode,
    #[serde(default = "default_comparison")]
    pub comparison: Option<ComparisonConfig>,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: Option<SensitivityConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    #[serde(default = "default_policies")]
    pub policies: Vec<Policy>,
    #[serde(default = "default_comparison_frames")]
    pub frames: FrameGrid,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            policies: default_policies(),
            frames: default_comparison_frames(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    #[serde(default = "default_sensitivity_policy")]
    pub policy: Policy,
    #[serde(default = "default_sensitivity_frames")]
    pub frames: FrameGrid,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            policy: default_sensitivity_policy(),
            frames: default_sensitivity_frames(),
        }
    }
}

/// Either an explicit list of frame counts or an inclusive range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrameGrid {
    List(Vec<u32>),
    Range {
        from: u32,
        to: u32,
        #[serde(default = "default_step")]
        step: u32,
    },
}

impl FrameGrid {
    pub fn frame_counts(&self) -> Vec<u32> {
        match self {
            FrameGrid::List(frames) => frames.clone(),
            FrameGrid::Range { from, to, step } => {
                (*from..=*to).step_by((*step).max(1) as usize).collect()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config validation error: {0}")]
    Validation(String),
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            simulator: default_simulator(),
            traces: default_traces(),
            output_dir: None,
            timeout_secs: None,
            max_invocations: None,
            duplicates: DuplicateMode::default(),
            comparison: default_comparison(),
            sensitivity: default_sensitivity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl BenchConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.traces.is_empty() {
            return Err(ConfigError::Validation(
                "at least one trace file is required".into(),
            ));
        }

        if let Some(comparison) = &self.comparison {
            if comparison.policies.is_empty() {
                return Err(ConfigError::Validation(
                    "comparison sweep needs at least one policy".into(),
                ));
            }
            validate_grid("comparison", &comparison.frames)?;
        }

        if let Some(sensitivity) = &self.sensitivity {
            validate_grid("sensitivity", &sensitivity.frames)?;
        }

        Ok(())
    }

    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            duplicates: self.duplicates,
            max_invocations: self.max_invocations,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn validate_grid(sweep: &str, grid: &FrameGrid) -> Result<(), ConfigError> {
    match grid {
        FrameGrid::List(frames) if frames.contains(&0) => Err(ConfigError::Validation(format!(
            "{sweep} frame counts must be positive"
        ))),
        FrameGrid::Range { step: 0, .. } => Err(ConfigError::Validation(format!(
            "{sweep} frame range step must be positive"
        ))),
        FrameGrid::Range { from: 0, .. } => Err(ConfigError::Validation(format!(
            "{sweep} frame range must start at 1 or more"
        ))),
        FrameGrid::Range { from, to, .. } if from > to => Err(ConfigError::Validation(format!(
            "{sweep} frame range {from}..={to} is empty"
        ))),
        _ => Ok(()),
    }
}

pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<BenchConfig> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read benchmark config {}", path.display()))?;
        let config = BenchConfig::from_yaml_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid benchmark config {}", path.display()))?;
        Ok(config)
    }
}
