//! Fixture configuration
//!
//! Loaded from TOML. Every field is optional; anything missing falls back to
//! the built-in scanner invocation.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::fixture::ExitPolicy;
use crate::host::{CommandSpec, LaunchOptions, StreamMode};

/// Scanner executable launched when nothing else is configured
pub const DEFAULT_PROGRAM: &str = "xeol";

/// Arguments passed to [`DEFAULT_PROGRAM`]
pub const DEFAULT_ARGS: [&str; 2] = ["registry:busybox:latest", "-vv"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("config: program must not be empty")]
    EmptyProgram,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureConfig {
    /// Executable name or path
    pub program: String,
    /// Positional arguments
    pub args: Vec<String>,
    /// Whether the child's outcome becomes the fixture's exit code
    pub exit_policy: ExitPolicy,
    /// Stream wiring for the child
    pub streams: StreamMode,
    /// Working directory for the child
    pub working_directory: Option<PathBuf>,
    /// Extra environment for the child
    pub env: BTreeMap<String, String>,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(|a| a.to_string()).collect(),
            exit_policy: ExitPolicy::Ignore,
            streams: StreamMode::Inherit,
            working_directory: None,
            env: BTreeMap::new(),
        }
    }
}

impl FixtureConfig {
    /// `<config_dir>/scanexec/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("scanexec").join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Load `explicit` if given, else the default path if it exists, else
    /// the built-in defaults
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }
        Ok(())
    }

    pub fn command_spec(&self) -> Result<CommandSpec, ConfigError> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.program.clone());
        argv.extend(self.args.iter().cloned());
        CommandSpec::from_argv(argv).ok_or(ConfigError::EmptyProgram)
    }

    pub fn launch_options(&self) -> LaunchOptions {
        let options = LaunchOptions::new(self.streams);
        match &self.working_directory {
            Some(dir) => options.in_dir(dir),
            None => options,
        }
    }
}
