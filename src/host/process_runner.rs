//! Process Runner
//!
//! Launches an external executable as a child process and waits for it.
//! How the child's standard streams are wired is chosen per launch: they can
//! be inherited from the caller, piped for capture, or discarded.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Instant;

use serde::Deserialize;
use thiserror::Error;

/// Flags whose values are hidden whenever a command line is logged
const SENSITIVE_FLAGS: [&str; 5] = ["--token", "--api-key", "--key", "--cookie", "--password"];

/// Placeholder written in place of a sensitive value
pub const REDACTED: &str = "[REDACTED]";

/// Executable name followed by its positional arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
}

impl CommandSpec {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Build from a full argv vector.
    ///
    /// Returns `None` when the vector is empty or the program name is blank.
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut parts = argv.into_iter();
        let program = parts.next()?;
        if program.trim().is_empty() {
            return None;
        }
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Arguments with the values of sensitive flags replaced by [`REDACTED`]
    pub fn redacted_args(&self) -> Vec<String> {
        let mut result = Vec::with_capacity(self.args.len());
        let mut redact_next = false;
        for arg in &self.args {
            if redact_next {
                result.push(REDACTED.to_string());
                redact_next = false;
            } else if SENSITIVE_FLAGS.iter().any(|f| arg.starts_with(f)) {
                match arg.split_once('=') {
                    Some((flag, _)) => result.push(format!("{}={}", flag, REDACTED)),
                    None => {
                        result.push(arg.clone());
                        redact_next = true;
                    }
                }
            } else {
                result.push(arg.clone());
            }
        }
        result
    }
}

/// Displays the redacted command line, safe for logs
impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in self.redacted_args() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How the child's standard streams are connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Child reads and writes the caller's own stdin/stdout/stderr
    Inherit,
    /// stdout and stderr are captured, stdin is closed
    Piped,
    /// All three streams are connected to the null device
    Null,
}

impl StreamMode {
    fn stdio(self) -> (Stdio, Stdio, Stdio) {
        match self {
            StreamMode::Inherit => (Stdio::inherit(), Stdio::inherit(), Stdio::inherit()),
            StreamMode::Piped => (Stdio::null(), Stdio::piped(), Stdio::piped()),
            StreamMode::Null => (Stdio::null(), Stdio::null(), Stdio::null()),
        }
    }
}

/// Per-launch configuration
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Stream wiring for the child
    pub streams: StreamMode,
    /// Working directory, the caller's when unset
    pub working_directory: Option<PathBuf>,
}

impl LaunchOptions {
    pub fn new(streams: StreamMode) -> Self {
        Self {
            streams,
            working_directory: None,
        }
    }

    /// Pass-through of the caller's standard streams
    pub fn inherit() -> Self {
        Self::new(StreamMode::Inherit)
    }

    /// Capture stdout and stderr
    pub fn piped() -> Self {
        Self::new(StreamMode::Piped)
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }
}

/// Outcome reported when a child terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Normal exit with the given code
    Exited(i32),
    /// Terminated by a signal (Unix only)
    Signaled(i32),
    /// The platform reported neither a code nor a signal
    Unknown,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        matches!(self, ExitStatus::Exited(0))
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitStatus::Exited(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return ExitStatus::Exited(code);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return ExitStatus::Signaled(signal);
            }
        }
        ExitStatus::Unknown
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exit code {}", code),
            ExitStatus::Signaled(signal) => write!(f, "signal {}", signal),
            ExitStatus::Unknown => write!(f, "unknown exit status"),
        }
    }
}

/// Process runner errors
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The child could not be created: missing binary, permissions, or the
    /// OS refused to spawn
    #[error("failed to launch '{program}'")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },
    /// Waiting on a running child failed before it exited
    #[error("wait on child process {pid} was interrupted")]
    WaitInterrupted {
        pid: u32,
        #[source]
        source: io::Error,
    },
}

impl RunnerError {
    /// True when launch failed because the executable does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, RunnerError::Launch { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// Captured result of a child launched with [`StreamMode::Piped`]
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// A running child, owned by whoever launched it.
///
/// Waiting consumes the handle, so a child can only be waited on once.
#[derive(Debug)]
pub struct ChildProcessHandle {
    child: Child,
    command: CommandSpec,
    started: Instant,
}

impl ChildProcessHandle {
    /// OS process id of the child
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    /// Block until the child terminates
    pub fn wait(mut self) -> Result<ExitStatus, RunnerError> {
        let pid = self.child.id();
        let status = self
            .child
            .wait()
            .map_err(|source| RunnerError::WaitInterrupted { pid, source })?;
        let status = ExitStatus::from(status);

        tracing::debug!(
            pid,
            %status,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Child process terminated"
        );
        Ok(status)
    }

    /// Block until the child terminates, collecting any piped output.
    ///
    /// Streams that were not piped come back empty.
    pub fn wait_with_output(self) -> Result<CapturedOutput, RunnerError> {
        let pid = self.child.id();
        let started = self.started;
        let output = self
            .child
            .wait_with_output()
            .map_err(|source| RunnerError::WaitInterrupted { pid, source })?;
        let status = ExitStatus::from(output.status);

        tracing::debug!(
            pid,
            %status,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Child process terminated"
        );
        Ok(CapturedOutput {
            status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Launches external executables
#[derive(Debug, Default)]
pub struct ProcessRunner {
    /// Environment variables added on top of the inherited environment
    env_additions: BTreeMap<String, String>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable for every child this runner launches
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_additions.insert(key.into(), value.into());
        self
    }

    /// Add several environment variables
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env_additions.insert(k.into(), v.into());
        }
        self
    }

    /// Find a binary in PATH
    pub fn which(binary: &str) -> Option<PathBuf> {
        which::which(binary).ok()
    }

    fn resolve(program: &str) -> Result<PathBuf, RunnerError> {
        if !program.is_empty() && Path::new(program).is_file() {
            return Ok(PathBuf::from(program));
        }
        Self::which(program).ok_or_else(|| RunnerError::Launch {
            program: program.to_string(),
            source: io::Error::new(
                io::ErrorKind::NotFound,
                format!("executable '{}' not found on PATH", program),
            ),
        })
    }

    /// Start `command` as a child process
    pub fn launch(
        &self,
        command: CommandSpec,
        options: &LaunchOptions,
    ) -> Result<ChildProcessHandle, RunnerError> {
        let path = Self::resolve(command.program())?;

        let mut cmd = Command::new(&path);
        cmd.args(command.args());
        if let Some(dir) = &options.working_directory {
            cmd.current_dir(dir);
        }
        cmd.envs(&self.env_additions);

        let (stdin, stdout, stderr) = options.streams.stdio();
        cmd.stdin(stdin).stdout(stdout).stderr(stderr);

        tracing::debug!(
            %command,
            path = %path.display(),
            streams = ?options.streams,
            "Launching child process"
        );

        let child = cmd.spawn().map_err(|source| RunnerError::Launch {
            program: command.program().to_string(),
            source,
        })?;

        tracing::debug!(pid = child.id(), "Child process running");

        Ok(ChildProcessHandle {
            child,
            command,
            started: Instant::now(),
        })
    }

    /// Launch and wait in one step
    pub fn run(
        &self,
        command: CommandSpec,
        options: &LaunchOptions,
    ) -> Result<ExitStatus, RunnerError> {
        self.launch(command, options)?.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_argv() {
        let spec = CommandSpec::from_argv(vec!["xeol".into(), "-vv".into()]).unwrap();
        assert_eq!(spec.program(), "xeol");
        assert_eq!(spec.args(), &["-vv".to_string()]);

        assert!(CommandSpec::from_argv(vec![]).is_none());
        assert!(CommandSpec::from_argv(vec!["  ".into(), "x".into()]).is_none());
    }

    #[test]
    fn test_redacted_display() {
        let spec = CommandSpec::new(
            "scanner",
            ["--token", "abc123", "--api-key=xyz", "image:latest"],
        );
        let shown = spec.to_string();
        assert_eq!(
            shown,
            "scanner --token [REDACTED] --api-key=[REDACTED] image:latest"
        );
        assert!(!shown.contains("abc123"));
        assert!(!shown.contains("xyz"));
    }

    #[test]
    fn test_exit_status_display() {
        assert_eq!(ExitStatus::Exited(3).to_string(), "exit code 3");
        assert_eq!(ExitStatus::Signaled(9).to_string(), "signal 9");
        assert!(ExitStatus::Exited(0).success());
        assert!(!ExitStatus::Signaled(15).success());
        assert_eq!(ExitStatus::Signaled(15).code(), None);
    }

    #[test]
    fn test_launch_missing_binary() {
        let runner = ProcessRunner::new();
        let result = runner.launch(
            CommandSpec::new("does-not-exist-binary", Vec::<String>::new()),
            &LaunchOptions::inherit(),
        );

        let err = result.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("does-not-exist-binary"));
    }

    #[test]
    fn test_launch_empty_program() {
        let runner = ProcessRunner::new();
        let err = runner
            .launch(CommandSpec::new("", Vec::<String>::new()), &LaunchOptions::inherit())
            .unwrap_err();
        assert!(matches!(err, RunnerError::Launch { .. }));
    }

    #[test]
    fn test_runner_with_env() {
        let runner = ProcessRunner::new()
            .with_env("FOO", "bar")
            .with_envs([("BAZ", "qux")]);

        assert_eq!(runner.env_additions.get("FOO"), Some(&"bar".to_string()));
        assert_eq!(runner.env_additions.get("BAZ"), Some(&"qux".to_string()));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn sh(script: &str) -> CommandSpec {
            CommandSpec::new("sh", ["-c", script])
        }

        #[test]
        fn test_true_exits_zero() {
            let status = ProcessRunner::new()
                .run(CommandSpec::new("true", Vec::<String>::new()), &LaunchOptions::inherit())
                .unwrap();
            assert_eq!(status, ExitStatus::Exited(0));
        }

        #[test]
        fn test_false_exits_non_zero() {
            let status = ProcessRunner::new()
                .run(CommandSpec::new("false", Vec::<String>::new()), &LaunchOptions::inherit())
                .unwrap();
            assert!(!status.success());
            assert_ne!(status.code(), Some(0));
        }

        #[test]
        fn test_exit_code_preserved() {
            let status = ProcessRunner::new()
                .run(sh("exit 42"), &LaunchOptions::new(StreamMode::Null))
                .unwrap();
            assert_eq!(status, ExitStatus::Exited(42));
        }

        #[test]
        fn test_killed_by_signal() {
            let status = ProcessRunner::new()
                .run(sh("kill -9 $$"), &LaunchOptions::new(StreamMode::Null))
                .unwrap();
            assert_eq!(status, ExitStatus::Signaled(9));
        }

        #[test]
        fn test_piped_output_captured() {
            let handle = ProcessRunner::new()
                .launch(sh("echo out; echo err >&2"), &LaunchOptions::piped())
                .unwrap();
            assert!(handle.id() > 0);
            assert_eq!(handle.command().program(), "sh");

            let output = handle.wait_with_output().unwrap();
            assert!(output.status.success());
            assert_eq!(output.stdout_text(), "out\n");
            assert_eq!(output.stderr_text(), "err\n");
        }

        #[test]
        fn test_env_additions_reach_child() {
            let output = ProcessRunner::new()
                .with_env("SCANEXEC_TEST_VAR", "hello")
                .launch(sh("printf %s \"$SCANEXEC_TEST_VAR\""), &LaunchOptions::piped())
                .unwrap()
                .wait_with_output()
                .unwrap();
            assert_eq!(output.stdout_text(), "hello");
        }

        #[test]
        fn test_working_directory() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("marker.txt"), "x").unwrap();

            let status = ProcessRunner::new()
                .run(
                    sh("test -f marker.txt"),
                    &LaunchOptions::new(StreamMode::Null).in_dir(dir.path()),
                )
                .unwrap();
            assert!(status.success());
        }

        #[test]
        fn test_launch_by_path() {
            let Some(path) = ProcessRunner::which("true") else {
                return;
            };
            let program = path.to_string_lossy().into_owned();
            let status = ProcessRunner::new()
                .run(CommandSpec::new(program, Vec::<String>::new()), &LaunchOptions::inherit())
                .unwrap();
            assert!(status.success());
        }
    }
}
