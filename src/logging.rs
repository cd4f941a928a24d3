//! Logging configuration using tracing
//!
//! All log output goes to stderr so a child inheriting stdout writes to a
//! clean stream.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `--verbose` is set, or when `RUST_LOG` is absent
fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Initialize the logging system
pub fn init(verbose: bool, json: bool) -> anyhow::Result<()> {
    let filter = default_filter(verbose);

    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    installed.context("failed to install tracing subscriber")
}
