//! Charts for sweep results, one image per trace and sweep kind.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use thiserror::Error;
use tracing::info;

use crate::sweep::SweepResult;

pub const X_LABEL: &str = "Number of Frames";
pub const Y_LABEL: &str = "Page Faults";
pub const IMAGE_EXTENSION: &str = "svg";
pub const SENSITIVITY_SUFFIX: &str = "_sensitivity";

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub label: Option<String>,
    pub points: Vec<(f64, f64)>,
}

/// A backend-neutral line chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub lines: Vec<Line>,
}

impl Chart {
    fn new(title: String, lines: Vec<Line>) -> Self {
        Self {
            title,
            x_label: X_LABEL.to_string(),
            y_label: Y_LABEL.to_string(),
            lines,
        }
    }

    pub fn x_range(&self) -> Range<f64> {
        span(self.points().map(|(x, _)| x))
    }

    /// Padded by a twentieth of the spread on both ends.
    pub fn y_range(&self) -> Range<f64> {
        let range = span(self.points().map(|(_, y)| y));
        let pad = (range.end - range.start) / 20.0;
        (range.start - pad)..(range.end + pad)
    }

    fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.lines.iter().flat_map(|line| line.points.iter().copied())
    }
}

fn span(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
        (min.min(value), max.max(value))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    if min == max {
        return (min - 1.0)..(max + 1.0);
    }
    min..max
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create output directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to draw chart {}: {message}", .path.display())]
    Draw { path: PathBuf, message: String },
}

/// Something that can turn a [`Chart`] into an image file.
pub trait ChartBackend {
    fn render(&mut self, chart: &Chart, path: &Path) -> Result<(), RenderError>;
}

/// Writes SVG files through plotters.
#[derive(Debug, Clone, Copy)]
pub struct SvgChartBackend {
    width: u32,
    height: u32,
}

impl Default for SvgChartBackend {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

impl SvgChartBackend {
    fn draw(&self, chart: &Chart, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let root = SVGBackend::new(path, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut ctx = ChartBuilder::on(&root)
            .caption(chart.title.as_str(), ("sans-serif", 30).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(chart.x_range(), chart.y_range())?;
        ctx.configure_mesh()
            .x_desc(chart.x_label.as_str())
            .y_desc(chart.y_label.as_str())
            .draw()?;

        let mut has_legend = false;
        for (index, line) in chart.lines.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();
            let series =
                ctx.draw_series(LineSeries::new(line.points.iter().copied(), color))?;
            if let Some(label) = &line.label {
                has_legend = true;
                series.label(label.as_str()).legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color)
                });
            }
        }

        if has_legend {
            ctx.configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(&WHITE.mix(0.8))
                .border_style(&BLACK)
                .draw()?;
        }

        root.present()?;
        Ok(())
    }
}

impl ChartBackend for SvgChartBackend {
    fn render(&mut self, chart: &Chart, path: &Path) -> Result<(), RenderError> {
        self.draw(chart, path).map_err(|err| RenderError::Draw {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// Lays out sweep results as charts and decides where they are saved.
pub struct ReportRenderer<B = SvgChartBackend> {
    backend: B,
    output_dir: Option<PathBuf>,
}

impl ReportRenderer<SvgChartBackend> {
    pub fn new() -> Self {
        Self::with_backend(SvgChartBackend::default())
    }
}

impl Default for ReportRenderer<SvgChartBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: ChartBackend> ReportRenderer<B> {
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            output_dir: None,
        }
    }

    /// Save charts under `dir` instead of next to the trace.
    pub fn with_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.output_dir = dir;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// `<trace>.svg`
    pub fn comparison_path(&self, trace: &Path) -> PathBuf {
        self.image_path(trace, "")
    }

    /// `<trace>_sensitivity.svg`
    pub fn sensitivity_path(&self, trace: &Path) -> PathBuf {
        self.image_path(trace, SENSITIVITY_SUFFIX)
    }

    fn image_path(&self, trace: &Path, suffix: &str) -> PathBuf {
        let mut name = match &self.output_dir {
            Some(_) => trace
                .file_name()
                .map(OsString::from)
                .unwrap_or_else(|| OsString::from("trace")),
            None => trace.as_os_str().to_owned(),
        };
        name.push(suffix);
        name.push(".");
        name.push(IMAGE_EXTENSION);
        match &self.output_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    }

    pub fn comparison_chart(trace: &Path, sweep: &SweepResult) -> Chart {
        let lines = sweep
            .iter()
            .map(|(policy, series)| Line {
                label: Some(policy.label().to_string()),
                points: series
                    .points()
                    .map(|(frames, faults)| (f64::from(frames), faults as f64))
                    .collect(),
            })
            .collect();
        Chart::new(title(trace), lines)
    }

    /// Plots `diffs` against `frame_counts[1..]`.
    pub fn sensitivity_chart(trace: &Path, frame_counts: &[u32], diffs: &[i64]) -> Chart {
        let points = frame_counts
            .iter()
            .skip(1)
            .zip(diffs)
            .map(|(frames, diff)| (f64::from(*frames), *diff as f64))
            .collect();
        Chart::new(
            title(trace),
            vec![Line {
                label: None,
                points,
            }],
        )
    }

    pub fn render_comparison(
        &mut self,
        trace: &Path,
        sweep: &SweepResult,
    ) -> Result<PathBuf, RenderError> {
        let chart = Self::comparison_chart(trace, sweep);
        let path = self.comparison_path(trace);
        self.save(&chart, path)
    }

    pub fn render_sensitivity(
        &mut self,
        trace: &Path,
        frame_counts: &[u32],
        diffs: &[i64],
    ) -> Result<PathBuf, RenderError> {
        let chart = Self::sensitivity_chart(trace, frame_counts, diffs);
        let path = self.sensitivity_path(trace);
        self.save(&chart, path)
    }

    fn save(&mut self, chart: &Chart, path: PathBuf) -> Result<PathBuf, RenderError> {
        if let Some(dir) = &self.output_dir {
            fs::create_dir_all(dir).map_err(|source| RenderError::CreateDir {
                path: dir.clone(),
                source,
            })?;
        }
        self.backend.render(chart, &path)?;
        info!(chart = %path.display(), "chart saved");
        Ok(path)
    }
}

fn title(trace: &Path) -> String {
    trace
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| trace.display().to_string())
}
