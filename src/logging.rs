//! Tracing subscriber setup for the `mlists` binary.
//!
//! Priority (highest to lowest):
//!
//! 1. `MEETING_LISTS_LOG` env var (per-target directives)
//! 2. `RUST_LOG` env var
//! 3. `-v` / `-q` CLI flags
//! 4. `log_level` from the config file

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

pub const LOG_ENV: &str = "MEETING_LISTS_LOG";

/// Verbosity level derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }
}

/// Filter directives for the given flags and configured level.
pub fn build_env_filter(verbosity: Verbosity, configured_level: &str) -> EnvFilter {
    if let Ok(directives) = dotenvy::var(LOG_ENV)
        && let Ok(filter) = EnvFilter::try_new(&directives)
    {
        return filter;
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = match verbosity {
        Verbosity::Quiet => "error",
        Verbosity::Verbose => "debug",
        Verbosity::Normal => configured_level,
    };
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber writing to stderr. A second call is a no-op.
pub fn init_tracing(verbosity: Verbosity, configured_level: &str) {
    let filter = build_env_filter(verbosity, configured_level);
    let use_ansi = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_ansi)
        .with_target(true);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
