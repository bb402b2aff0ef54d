use std::path::PathBuf;

use constconv_generation::GenerationError;
use constconv_parsers::ParserError;
use thiserror::Error;

/// Invalid flag combinations and values
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid extraData: {pair}")]
    InvalidExtraData { pair: String },

    #[error("-tags option applies only to directories, not when files are specified")]
    TagsWithFiles,

    #[error("{}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of one pipeline stage
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("loading template output: {0}")]
    LoadTemplate(#[source] GenerationError),

    #[error("parsing output: {0}")]
    Parse(#[from] ParserError),

    #[error("generating output: {0}")]
    Generate(#[source] GenerationError),

    #[error("writing output: {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// Whether the output file was written with unformatted source
    pub fn wrote_unformatted(&self) -> bool {
        matches!(self, CliError::Generate(GenerationError::Format { .. }))
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
