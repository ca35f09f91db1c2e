use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use vmsim_bench::{
    config::{BenchConfig, ConfigLoader},
    driver::{BenchDriver, TraceReport},
    logging,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Page-replacement simulator benchmark driver")]
struct Cli {
    /// Path to the benchmark YAML file (built-in grid when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the simulator binary
    #[arg(long)]
    simulator: Option<PathBuf>,

    /// Trace file to benchmark; repeat to give several (replaces the configured list)
    #[arg(long = "trace")]
    traces: Vec<PathBuf>,

    /// Directory for charts (next to each trace when omitted)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Kill a simulator run that takes longer than this
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Skip the policy comparison sweep
    #[arg(long)]
    no_comparison: bool,

    /// Skip the sensitivity sweep
    #[arg(long)]
    no_sensitivity: bool,

    /// Print the results as JSON instead of a text summary
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, mut config: BenchConfig) -> BenchConfig {
        if let Some(simulator) = &self.simulator {
            config.simulator = simulator.clone();
        }
        if !self.traces.is_empty() {
            config.traces = self.traces.clone();
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir.clone();
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }
        if self.no_comparison {
            config.comparison = None;
        }
        if self.no_sensitivity {
            config.sensitivity = None;
        }
        config
    }
}

fn print_summary(reports: &[TraceReport]) {
    for report in reports {
        println!("{}", report.trace.display());
        if let Some(comparison) = &report.comparison {
            for (policy, series) in comparison.result.iter() {
                let faults: Vec<String> = series
                    .points()
                    .map(|(frames, faults)| format!("{frames}:{faults}"))
                    .collect();
                println!("  {:<7}{}", policy.label(), faults.join(" "));
            }
            println!("  comparison chart: {}", comparison.chart.display());
        }
        if let Some(sensitivity) = &report.sensitivity {
            let steepest = sensitivity.result.diff_points().min_by_key(|(_, diff)| *diff);
            if let Some((frames, diff)) = steepest {
                println!(
                    "  {} steepest drop: {diff:+} faults at {frames} frames",
                    sensitivity.result.policy.label()
                );
            }
            println!("  sensitivity chart: {}", sensitivity.chart.display());
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ConfigLoader::new(".").load(path)?,
        None => BenchConfig::default(),
    };
    let config = cli.apply(config);
    config.validate()?;
    logging::init_tracing(&config.logging.level)?;

    let mut driver = BenchDriver::from_config(config);
    let reports = driver.run()?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports);
    }
    Ok(())
}
