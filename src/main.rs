//! scanexec - runs an external scanner with inherited stdio and waits for it
//!
//! Integration harnesses use this binary to prove that a packaged artifact can
//! shell out to a named executable:
//! - `scanexec` runs `xeol registry:busybox:latest -vv`
//! - `scanexec --config fixture.toml` runs whatever the config names
//!
//! Launch and wait failures are printed and swallowed unless the exit policy
//! is `propagate`.

mod cli;
mod config;
mod fixture;
mod host;
mod logging;

use std::io::Write;

use anyhow::Context;
use clap::Parser;
use cli::{exit_codes, Cli};
use config::FixtureConfig;
use fixture::Fixture;
use host::CapturedOutput;

fn main() {
    let exit_code = run();
    std::process::exit(exit_code);
}

fn run() -> i32 {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose, cli.json_output) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:?}", e);
            return exit_codes::CONFIG_ERROR;
        }
    };
    let policy = cli.exit_policy.unwrap_or(config.exit_policy);

    let fixture = match Fixture::from_config(&config) {
        Ok(fixture) => fixture,
        Err(e) => {
            eprintln!("{}", fixture::format_diagnostic(&e));
            return exit_codes::CONFIG_ERROR;
        }
    };

    if cli.print_command {
        println!("{}", fixture.command());
        return exit_codes::SUCCESS;
    }

    let report = fixture.run();
    if let Some(captured) = &report.captured {
        replay(captured);
    }
    report.print_diagnostic();

    let exit_code = report.exit_code(policy);
    tracing::debug!(
        state = ?report.state,
        elapsed_ms = report.elapsed.as_millis() as u64,
        ?policy,
        exit_code,
        "Fixture done"
    );
    exit_code
}

fn load_config(cli: &Cli) -> anyhow::Result<FixtureConfig> {
    FixtureConfig::load_or_default(cli.config.as_deref())
        .context("failed to load fixture configuration")
}

/// Write piped child output back to our own streams once the child is gone
fn replay(captured: &CapturedOutput) {
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(&captured.stdout);
    let _ = stdout.flush();
    let _ = std::io::stderr().lock().write_all(&captured.stderr);
}
