//! Logging setup for the binary

use tracing::Level;
use tracing_subscriber::fmt;

/// Maximum level for a run: debug output only when `verbose`
pub fn log_level(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install a stderr subscriber. Later calls keep the first subscriber.
pub fn init_logging(verbose: bool) {
    let _ = fmt()
        .with_max_level(log_level(verbose))
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(false), Level::INFO);
        assert_eq!(log_level(true), Level::DEBUG);
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(true);
        init_logging(false);
    }
}
