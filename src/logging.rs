//! Tracing subscriber setup.

use crate::cli::Cli;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset.
fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "simwatch=warn",
        1 => "simwatch=debug",
        _ => "simwatch=trace",
    }
}

fn env_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

/// Install the global subscriber. With `--log-file` logs go to that file; otherwise to
/// stderr, except in the TUI where stderr would draw over the alternate screen.
pub fn init(args: &Cli, interactive: bool) -> Result<()> {
    let filter = env_filter(args.verbose);

    if let Some(path) = args.log_file.as_deref() {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .try_init()
            .map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))?;
        return Ok(());
    }

    if interactive {
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))?;
    Ok(())
}
