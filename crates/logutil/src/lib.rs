//! Utilities for logging.

use std::io;

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    HumanReadable,
    Json,
}

/// Map a verbosity count (e.g. from repeated `-v` flags) to a level.
pub fn level_for_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Configure the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_level` when set. Repeated calls
/// are ignored.
pub fn configure_global_logger<W>(default_level: Level, format: LogFormat, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_file(true)
        .with_line_number(true);

    let result = match format {
        LogFormat::HumanReadable => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    // Already configured, e.g. by another test in the same binary.
    let _ = result;
}

/// Initialize logging for tests.
///
/// Output goes through the test writer so it's only shown for failing tests.
pub fn init_test() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::DEBUG.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(env_filter)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}

/// Initialize logging to stderr with a verbosity count.
pub fn init(verbose: u8, format: LogFormat) {
    configure_global_logger(level_for_verbosity(verbose), format, io::stderr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(Level::WARN, level_for_verbosity(0));
        assert_eq!(Level::INFO, level_for_verbosity(1));
        assert_eq!(Level::DEBUG, level_for_verbosity(2));
        assert_eq!(Level::TRACE, level_for_verbosity(3));
        assert_eq!(Level::TRACE, level_for_verbosity(200));
    }

    #[test]
    fn init_test_twice() {
        init_test();
        init_test();
        tracing::debug!("still alive");
    }
}
