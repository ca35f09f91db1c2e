use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::BenchConfig;
use crate::decode::{ResultDecoder, YamlDecoder};
use crate::invoker::{ChildProcessRunner, ProcessRunner, Simulator};
use crate::report::{ChartBackend, ReportRenderer, SvgChartBackend};
use crate::sensitivity::SensitivityResult;
use crate::sweep::{SweepController, SweepResult};

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOutcome {
    pub result: SweepResult,
    pub chart: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensitivityOutcome {
    pub result: SensitivityResult,
    pub chart: PathBuf,
}

/// Everything produced for one trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceReport {
    pub trace: PathBuf,
    pub comparison: Option<ComparisonOutcome>,
    pub sensitivity: Option<SensitivityOutcome>,
}

/// Walks the configured traces, runs the enabled sweeps and saves their charts.
pub struct BenchDriver<R, B = SvgChartBackend, D = YamlDecoder> {
    config: BenchConfig,
    controller: SweepController<R, D>,
    renderer: ReportRenderer<B>,
}

impl BenchDriver<ChildProcessRunner> {
    /// Real simulator process, SVG charts.
    pub fn from_config(config: BenchConfig) -> Self {
        let runner = ChildProcessRunner::new().with_timeout(config.timeout());
        let controller = SweepController::new(Simulator::new(&config.simulator, runner))
            .with_options(config.sweep_options());
        let renderer = ReportRenderer::new().with_output_dir(config.output_dir.clone());
        Self::new(config, controller, renderer)
    }
}

impl<R, B, D> BenchDriver<R, B, D>
where
    R: ProcessRunner,
    B: ChartBackend,
    D: ResultDecoder,
{
    pub fn new(
        config: BenchConfig,
        controller: SweepController<R, D>,
        renderer: ReportRenderer<B>,
    ) -> Self {
        Self {
            config,
            controller,
            renderer,
        }
    }

    pub fn controller(&self) -> &SweepController<R, D> {
        &self.controller
    }

    pub fn renderer(&self) -> &ReportRenderer<B> {
        &self.renderer
    }

    /// Stops at the first trace whose sweeps fail.
    pub fn run(&mut self) -> Result<Vec<TraceReport>> {
        let traces = self.config.traces.clone();
        let mut reports = Vec::with_capacity(traces.len());
        for trace in &traces {
            let report = self
                .run_trace(trace)
                .with_context(|| format!("Benchmark of {} aborted", trace.display()))?;
            reports.push(report);
        }
        info!(
            traces = reports.len(),
            invocations = self.controller.simulator().invocations(),
            "benchmark complete"
        );
        Ok(reports)
    }

    /// Both sweeps run before any chart is drawn, so a failing trace leaves no chart.
    pub fn run_trace(&mut self, trace: &Path) -> Result<TraceReport> {
        info!(trace = %trace.display(), "benchmarking trace");

        let comparison = match &self.config.comparison {
            Some(comparison) => Some(self.controller.sweep(
                trace,
                &comparison.policies,
                &comparison.frames.frame_counts(),
            )?),
            None => None,
        };
        let sensitivity = match &self.config.sensitivity {
            Some(sensitivity) => Some(self.controller.sensitivity(
                trace,
                sensitivity.policy,
                &sensitivity.frames.frame_counts(),
            )?),
            None => None,
        };

        let comparison = comparison
            .map(|result| -> Result<ComparisonOutcome> {
                let chart = self.renderer.render_comparison(trace, &result)?;
                Ok(ComparisonOutcome { result, chart })
            })
            .transpose()?;
        let sensitivity = sensitivity
            .map(|result| -> Result<SensitivityOutcome> {
                let chart =
                    self.renderer
                        .render_sensitivity(trace, &result.frame_counts, &result.diffs)?;
                Ok(SensitivityOutcome { result, chart })
            })
            .transpose()?;

        Ok(TraceReport {
            trace: trace.to_path_buf(),
            comparison,
            sensitivity,
        })
    }
}
