//! Launching the external simulator and capturing what it prints.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use crate::policy::Policy;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One grid cell: a single simulator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    frame_count: u32,
    policy: Policy,
    trace_path: PathBuf,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("frame count must be a positive integer")]
pub struct ZeroFrameCount;

impl Configuration {
    pub fn new(
        frame_count: u32,
        policy: Policy,
        trace_path: impl AsRef<Path>,
    ) -> Result<Self, ZeroFrameCount> {
        if frame_count == 0 {
            return Err(ZeroFrameCount);
        }
        Ok(Self {
            frame_count,
            policy,
            trace_path: trace_path.as_ref().to_path_buf(),
        })
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn trace_path(&self) -> &Path {
        &self.trace_path
    }

    /// `-n <frames> -a <policy> <trace>`
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "-n".into(),
            self.frame_count.to_string().into(),
            "-a".into(),
            self.policy.id().into(),
            self.trace_path.clone().into_os_string(),
        ]
    }
}

/// What a finished child process left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum SimulatorInvocationError {
    #[error("failed to start simulator {}", .program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed while waiting for simulator")]
    Wait(#[source] io::Error),
    #[error("simulator exited with {}: {}", describe_status(.status), diagnostic(.stderr, .stdout))]
    Exit {
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("simulator did not finish within {0:?} and was killed")]
    TimedOut(Duration),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

// vmsim reports its own usage errors on stdout, so fall back to it.
fn diagnostic<'a>(stderr: &'a str, stdout: &'a str) -> &'a str {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        let stdout = stdout.trim();
        if stdout.is_empty() {
            "<no output>"
        } else {
            stdout
        }
    } else {
        stderr
    }
}

/// Runs a program to completion. The seam between the sweep and the OS.
pub trait ProcessRunner {
    fn run(
        &mut self,
        program: &Path,
        args: &[OsString],
    ) -> Result<ProcessOutput, SimulatorInvocationError>;
}

/// Spawns a real child process.
#[derive(Debug, Clone, Default)]
pub struct ChildProcessRunner {
    timeout: Option<Duration>,
}

impl ChildProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// The deadline also bounds reading the pipes, which a grandchild may
    /// hold open after the child itself has exited.
    fn run_with_deadline(
        mut child: Child,
        timeout: Duration,
    ) -> Result<ProcessOutput, SimulatorInvocationError> {
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);
        let started = Instant::now();

        let status = loop {
            match child.try_wait().map_err(SimulatorInvocationError::Wait)? {
                Some(status) => break status,
                None if started.elapsed() >= timeout => {
                    warn!(timeout = ?timeout, "simulator timed out, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SimulatorInvocationError::TimedOut(timeout));
                }
                None => thread::sleep(POLL_INTERVAL),
            }
        };

        Ok(ProcessOutput {
            status: status.code(),
            stdout: collect(stdout, started, timeout)?,
            stderr: collect(stderr, started, timeout)?,
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<Vec<u8>> {
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = Vec::new();
        let _ = pipe.read_to_end(&mut buffer);
        let _ = sender.send(buffer);
    });
    receiver
}

fn collect(
    pipe: Option<Receiver<Vec<u8>>>,
    started: Instant,
    timeout: Duration,
) -> Result<String, SimulatorInvocationError> {
    let Some(pipe) = pipe else {
        return Ok(String::new());
    };
    match pipe.recv_timeout(timeout.saturating_sub(started.elapsed())) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(RecvTimeoutError::Disconnected) => Ok(String::new()),
        Err(RecvTimeoutError::Timeout) => {
            warn!(timeout = ?timeout, "simulator output still open after exit");
            Err(SimulatorInvocationError::TimedOut(timeout))
        }
    }
}

fn output_from(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> ProcessOutput {
    ProcessOutput {
        status: status.code(),
        stdout: String::from_utf8_lossy(stdout).into_owned(),
        stderr: String::from_utf8_lossy(stderr).into_owned(),
    }
}

impl ProcessRunner for ChildProcessRunner {
    fn run(
        &mut self,
        program: &Path,
        args: &[OsString],
    ) -> Result<ProcessOutput, SimulatorInvocationError> {
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());
        let spawn_error = |source| SimulatorInvocationError::Spawn {
            program: program.to_path_buf(),
            source,
        };

        match self.timeout {
            None => {
                let output = command.output().map_err(spawn_error)?;
                Ok(output_from(output.status, &output.stdout, &output.stderr))
            }
            Some(timeout) => {
                let child = command
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(spawn_error)?;
                Self::run_with_deadline(child, timeout)
            }
        }
    }
}

/// The simulator binary plus the runner used to launch it.
pub struct Simulator<R> {
    program: PathBuf,
    runner: R,
    invocations: usize,
}

impl<R: ProcessRunner> Simulator<R> {
    pub fn new(program: impl AsRef<Path>, runner: R) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            runner,
            invocations: 0,
        }
    }

    /// Runs one configuration and returns the simulator's stdout.
    pub fn invoke(
        &mut self,
        configuration: &Configuration,
    ) -> Result<String, SimulatorInvocationError> {
        let args = configuration.args();
        debug!(
            program = %self.program.display(),
            frames = configuration.frame_count(),
            policy = %configuration.policy(),
            trace = %configuration.trace_path().display(),
            "invoking simulator"
        );
        self.invocations += 1;
        let output = self.runner.run(&self.program, &args)?;
        if !output.success() {
            return Err(SimulatorInvocationError::Exit {
                status: output.status,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }

    /// Number of launch attempts so far, failed ones included.
    pub fn invocations(&self) -> usize {
        self.invocations
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[test]
    fn configuration_rejects_zero_frames() {
        assert_eq!(
            Configuration::new(0, Policy::Lru, "gcc.trace"),
            Err(ZeroFrameCount)
        );
    }

    #[test]
    fn args_follow_simulator_usage() {
        let configuration = Configuration::new(16, Policy::Second, "test/gcc.trace").unwrap();
        let args: Vec<String> = configuration
            .args()
            .into_iter()
            .map(|arg| arg.into_string().unwrap())
            .collect();
        assert_eq!(args, ["-n", "16", "-a", "second", "test/gcc.trace"]);
    }

    #[test]
    fn non_zero_exit_is_an_invocation_error() {
        let runner = ScriptedRunner::new(|_| ProcessOutput::failed(1, "cannot open trace"));
        let mut simulator = Simulator::new("./vmsim", runner);
        let configuration = Configuration::new(8, Policy::Opt, "missing.trace").unwrap();

        let err = simulator.invoke(&configuration).unwrap_err();
        match &err {
            SimulatorInvocationError::Exit { status, stderr, .. } => {
                assert_eq!(*status, Some(1));
                assert_eq!(stderr, "cannot open trace");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("status 1"));
        assert!(err.to_string().contains("cannot open trace"));
        assert_eq!(simulator.invocations(), 1);
    }

    #[test]
    fn exit_message_falls_back_to_stdout() {
        let err = SimulatorInvocationError::Exit {
            status: None,
            stdout: "ERROR: -n argument not provided.\n".into(),
            stderr: String::new(),
        };
        let message = err.to_string();
        assert!(message.contains("terminated by signal"));
        assert!(message.contains("-n argument not provided"));
    }

    #[test]
    fn success_returns_stdout() {
        let runner = ScriptedRunner::new(|_| ProcessOutput::ok("Total page faults: 3\n"));
        let mut simulator = Simulator::new("./vmsim", runner);
        let configuration = Configuration::new(2, Policy::Lru, "a.trace").unwrap();
        assert_eq!(
            simulator.invoke(&configuration).unwrap(),
            "Total page faults: 3\n"
        );
        assert_eq!(simulator.runner().calls().len(), 1);
    }
}
