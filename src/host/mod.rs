//! Host module for launching and waiting on child processes

pub mod process_runner;

#[allow(unused_imports)]
pub use process_runner::{
    CapturedOutput, ChildProcessHandle, CommandSpec, ExitStatus, LaunchOptions, ProcessRunner,
    RunnerError, StreamMode,
};
