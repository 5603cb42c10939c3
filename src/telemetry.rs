//! Tracing subscriber setup for the `findsim` binary.
//!
//! Filter priority, highest first: `FINDSIM_LOG`, `RUST_LOG`, then the
//! `-v` / `-q` flags. Logs go to stderr so stdout only carries the summary.

use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable holding project specific filter directives.
pub const LOG_ENV: &str = "FINDSIM_LOG";

/// Verbosity level derived from CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// `-q`: errors only.
    Quiet,
    /// Default: progress and recoverable failures.
    Normal,
    /// `-v`: per-sample detail.
    Verbose,
}

impl Verbosity {
    /// Verbose wins when both flags are set.
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    fn directive(self) -> String {
        let crate_name = env!("CARGO_CRATE_NAME");
        match self {
            Self::Quiet => "error".to_string(),
            Self::Normal => format!("warn,{crate_name}=info"),
            Self::Verbose => format!("info,{crate_name}=debug"),
        }
    }
}

/// Installs the global subscriber. Call once, first thing in `main`.
pub fn init_subscriber(verbosity: Verbosity) {
    let stderr_is_tty = std::io::IsTerminal::is_terminal(&std::io::stderr());
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(stderr_is_tty)
        .with_target(verbosity == Verbosity::Verbose)
        .with_level(true);

    let registry = tracing_subscriber::registry().with(build_env_filter(verbosity));
    if verbosity == Verbosity::Verbose {
        registry.with(fmt_layer.with_timer(fmt::time::uptime())).init();
    } else {
        registry.with(fmt_layer.without_time().compact()).init();
    }
}

fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::try_new(verbosity.directive()).unwrap_or_else(|_| EnvFilter::new("warn"))
}
