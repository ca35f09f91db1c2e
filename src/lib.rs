pub mod config;
pub mod decode;
pub mod driver;
pub mod invoker;
pub mod logging;
pub mod policy;
pub mod report;
pub mod sensitivity;
pub mod sweep;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::{BenchConfig, ConfigLoader};
pub use decode::{decode, MalformedResultError, ResultDecoder, SimulationResult, YamlDecoder};
pub use driver::{BenchDriver, TraceReport};
pub use invoker::{
    ChildProcessRunner, Configuration, ProcessOutput, ProcessRunner, SimulatorInvocationError,
    Simulator,
};
pub use policy::Policy;
pub use report::{ChartBackend, ReportRenderer, SvgChartBackend};
pub use sensitivity::{first_difference, SensitivityResult};
pub use sweep::{SweepController, SweepError, SweepOptions, SweepResult};
