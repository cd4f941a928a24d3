//! Fixture flow
//!
//! Launches the configured command once, waits for it, and turns the result
//! into a diagnostic and an exit code. A run moves through
//! `NotStarted -> Running -> Terminated` and never retries.

use std::error::Error as StdError;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use serde::Deserialize;

use crate::cli::exit_codes;
use crate::config::{ConfigError, FixtureConfig};
use crate::host::{
    CapturedOutput, CommandSpec, ExitStatus, LaunchOptions, ProcessRunner, RunnerError, StreamMode,
};

/// Maps the child's outcome onto the fixture's own exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Always exit 0 once the run is over, whatever happened to the child
    Ignore,
    /// Exit with the child's code, or a dedicated code on launch/wait failure
    Propagate,
}

impl ExitPolicy {
    pub fn exit_code(self, result: &Result<ExitStatus, RunnerError>) -> i32 {
        match self {
            ExitPolicy::Ignore => exit_codes::SUCCESS,
            ExitPolicy::Propagate => match result {
                Ok(ExitStatus::Exited(code)) => *code,
                // Shell convention for signal deaths
                Ok(ExitStatus::Signaled(signal)) => 128 + signal,
                Ok(ExitStatus::Unknown) => exit_codes::UNEXPECTED_FAILURE,
                Err(RunnerError::Launch { .. }) => exit_codes::LAUNCH_FAILED,
                Err(RunnerError::WaitInterrupted { .. }) => exit_codes::WAIT_INTERRUPTED,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running,
    Terminated,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        matches!(
            (self, next),
            (RunState::NotStarted, RunState::Running)
                | (RunState::NotStarted, RunState::Terminated)
                | (RunState::Running, RunState::Terminated)
        )
    }
}

/// What a finished run produced
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub result: Result<ExitStatus, RunnerError>,
    /// Child output, only when streams were piped
    pub captured: Option<CapturedOutput>,
    pub elapsed: Duration,
}

impl RunReport {
    /// Print a diagnostic for a failed run to stderr; silent on success
    pub fn print_diagnostic(&self) {
        if let Err(e) = &self.result {
            eprintln!("{}", format_diagnostic(e));
        }
    }

    pub fn exit_code(&self, policy: ExitPolicy) -> i32 {
        policy.exit_code(&self.result)
    }
}

/// One-shot invocation of an external command
#[derive(Debug)]
pub struct Fixture {
    runner: ProcessRunner,
    command: CommandSpec,
    options: LaunchOptions,
    state: RunState,
}

impl Fixture {
    pub fn new(runner: ProcessRunner, command: CommandSpec, options: LaunchOptions) -> Self {
        Self {
            runner,
            command,
            options,
            state: RunState::NotStarted,
        }
    }

    pub fn from_config(config: &FixtureConfig) -> Result<Self, ConfigError> {
        let runner = ProcessRunner::new().with_envs(config.env.clone());
        Ok(Self::new(
            runner,
            config.command_spec()?,
            config.launch_options(),
        ))
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    fn advance(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(from = ?self.state, to = ?next, "Run state changed");
        self.state = next;
    }

    /// Launch the command and block until it terminates
    pub fn run(mut self) -> RunReport {
        let started = Instant::now();
        tracing::info!(command = %self.command, "Starting fixture command");

        let command = self.command.clone();
        let mut captured = None;
        let result = match self.runner.launch(command, &self.options) {
            Ok(handle) => {
                self.advance(RunState::Running);
                if self.options.streams == StreamMode::Piped {
                    handle.wait_with_output().map(|output| {
                        let status = output.status;
                        captured = Some(output);
                        status
                    })
                } else {
                    handle.wait()
                }
            }
            Err(e) => Err(e),
        };
        self.advance(RunState::Terminated);

        let elapsed = started.elapsed();
        match &result {
            Ok(status) => tracing::info!(
                %status,
                elapsed_ms = elapsed.as_millis() as u64,
                "Fixture command finished"
            ),
            Err(e) => tracing::debug!(
                error = %e,
                not_found = e.is_not_found(),
                "Fixture command failed"
            ),
        }

        RunReport {
            state: self.state,
            result,
            captured,
            elapsed,
        }
    }
}

/// Render an error with its full cause chain, one cause per line
pub fn format_diagnostic(err: &(dyn StdError + 'static)) -> String {
    let mut out = format!("Error: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(&format!("\n    caused by: {}", cause));
        source = cause.source();
    }
    out
}
