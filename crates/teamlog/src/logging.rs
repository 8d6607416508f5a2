//! Logging setup for the `teamlog` binary.
//!
//! Log lines go to stderr so that table and JSON output on stdout stays
//! machine-readable. `RUST_LOG`, when set and valid, replaces the directive
//! derived from the command-line flags.

use tracing::Level;
use tracing_subscriber::{fmt, fmt::MakeWriter, prelude::*, EnvFilter};

/// How much the binary logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Info and above.
    #[default]
    Normal,
    /// Debug and above.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Map `-q` and the number of `-v` flags to a verbosity. `-q` wins.
    #[must_use]
    pub fn from_flags(quiet: bool, verbose: u8) -> Self {
        match (quiet, verbose) {
            (true, _) => Self::Quiet,
            (false, 0) => Self::Normal,
            (false, 1) => Self::Verbose,
            (false, _) => Self::Trace,
        }
    }

    /// The most detailed level emitted at this verbosity.
    #[must_use]
    pub fn level(self) -> Level {
        match self {
            Self::Quiet => Level::ERROR,
            Self::Normal => Level::INFO,
            Self::Verbose => Level::DEBUG,
            Self::Trace => Level::TRACE,
        }
    }

    /// Filter directive scoping the level to this crate's targets.
    #[must_use]
    pub fn directive(self) -> String {
        format!("teamlog={}", self.level())
    }
}

/// Build the filter, preferring a valid `RUST_LOG` over `verbosity`.
fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()))
}

/// Install the global subscriber, writing to stderr.
///
/// Only the first call in a process installs anything; later calls are
/// ignored.
///
/// # Examples
///
/// ```no_run
/// use teamlog::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    init_logging_to(verbosity, std::io::stderr);
}

/// Install the global subscriber with a custom writer.
pub fn init_logging_to<W>(verbosity: Verbosity, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::registry().with(env_filter(verbosity)).with(
        fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false),
    );

    let _ = subscriber.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 5), Verbosity::Trace);
        assert_eq!(Verbosity::from_flags(true, 2), Verbosity::Quiet);
    }

    #[test]
    fn test_directive_is_scoped_to_crate() {
        assert_eq!(Verbosity::Quiet.directive(), "teamlog=ERROR");
        assert_eq!(Verbosity::Normal.directive(), "teamlog=INFO");
        assert_eq!(Verbosity::Verbose.directive(), "teamlog=DEBUG");
        assert_eq!(Verbosity::Trace.directive(), "teamlog=TRACE");
    }

    #[test]
    fn test_directive_parses_as_filter() {
        for verbosity in [
            Verbosity::Quiet,
            Verbosity::Normal,
            Verbosity::Verbose,
            Verbosity::Trace,
        ] {
            assert!(EnvFilter::try_new(verbosity.directive()).is_ok());
        }
    }

    #[test]
    fn test_repeated_init_is_ignored() {
        init_logging_to(Verbosity::Verbose, fmt::TestWriter::new());
        init_logging(Verbosity::Quiet);
    }
}
