//! A scripted stand-in for the simulator binary, used by the tests.

use std::ffi::OsString;
use std::path::Path;

use crate::invoker::{ProcessOutput, ProcessRunner, SimulatorInvocationError};
use crate::policy::Policy;

/// The arguments of one scripted launch, read back from the argv.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedCall {
    pub frame_count: u32,
    pub policy: String,
    pub trace: String,
}

impl ScriptedCall {
    fn from_args(args: &[OsString]) -> Self {
        let args: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let flag = |name: &str| {
            args.iter()
                .position(|arg| arg == name)
                .and_then(|index| args.get(index + 1))
                .cloned()
                .unwrap_or_default()
        };
        Self {
            frame_count: flag("-n").parse().unwrap_or(0),
            policy: flag("-a"),
            trace: args.last().cloned().unwrap_or_default(),
        }
    }
}

type Responder = Box<dyn FnMut(&ScriptedCall) -> ProcessOutput>;

/// Answers every launch from a closure and records what was asked.
pub struct ScriptedRunner {
    respond: Responder,
    calls: Vec<ScriptedCall>,
}

impl ScriptedRunner {
    pub fn new(respond: impl FnMut(&ScriptedCall) -> ProcessOutput + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Vec::new(),
        }
    }

    /// Always succeeds with a vmsim-style report carrying `faults(policy, frames)`.
    /// Unknown policies exit with status 1.
    pub fn with_faults(faults: impl Fn(Policy, u32) -> u64 + 'static) -> Self {
        Self::new(move |call| match call.policy.parse::<Policy>() {
            Ok(policy) => ProcessOutput::ok(simulator_report(
                policy,
                call.frame_count,
                faults(policy, call.frame_count),
            )),
            Err(err) => ProcessOutput::failed(1, err.to_string()),
        })
    }

    pub fn calls(&self) -> &[ScriptedCall] {
        &self.calls
    }
}

impl ProcessRunner for ScriptedRunner {
    fn run(
        &mut self,
        _program: &Path,
        args: &[OsString],
    ) -> Result<ProcessOutput, SimulatorInvocationError> {
        let call = ScriptedCall::from_args(args);
        let output = (self.respond)(&call);
        self.calls.push(call);
        Ok(output)
    }
}

/// Renders the report vmsim prints after a run.
pub fn simulator_report(policy: Policy, frame_count: u32, faults: u64) -> String {
    format!(
        "Algorithm: {}\nNumber of frames: {frame_count}\nTotal memory accesses: {}\nTotal page faults: {faults}\nTotal writes to disk: {}\n",
        policy.id().to_uppercase(),
        faults * 10,
        faults / 2,
    )
}
