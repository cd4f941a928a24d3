//! Command-line interface
//!
//! With no arguments the fixture runs its built-in scanner command. Flags only
//! tune logging, the configuration source and the exit policy.

use std::path::PathBuf;

use clap::Parser;

use crate::fixture::ExitPolicy;

/// Run an external scanner with inherited stdio and wait for it to exit
#[derive(Parser, Debug)]
#[command(name = "scanexec", version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit log lines as JSON
    #[arg(long)]
    pub json_output: bool,

    /// Path to a TOML config file
    #[arg(short, long, env = "SCANEXEC_CONFIG")]
    pub config: Option<PathBuf>,

    /// How the child's outcome maps onto this process's exit code
    #[arg(long, value_enum, env = "SCANEXEC_EXIT_POLICY")]
    pub exit_policy: Option<ExitPolicy>,

    /// Print the resolved command line and exit without launching it
    #[arg(long)]
    pub print_command: bool,
}

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    /// Child could not be started (propagate policy only)
    pub const LAUNCH_FAILED: i32 = 127;
    /// Wait on the child failed (propagate policy only)
    pub const WAIT_INTERRUPTED: i32 = 130;
}
