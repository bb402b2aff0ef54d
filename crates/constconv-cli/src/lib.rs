//! constconv command-line driver
//!
//! Turns command-line flags into parser and generator configuration and
//! runs the load template, parse, generate, write pipeline.

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::{default_output_file, detect_directory, parse_extra_data, Cli, Config};
pub use error::{CliError, CliResult, ConfigError};
pub use logging::{init_logging, log_level};
pub use pipeline::run;
