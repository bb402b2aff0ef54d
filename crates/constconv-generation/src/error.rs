//! Error types for code generation

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during code generation
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The template file could not be read or has invalid syntax
    #[error("can't parse template file {}. err:{message}", path.display())]
    LoadTemplate {
        /// Template file as configured
        path: PathBuf,
        /// Reader or template parser message
        message: String,
    },

    /// `generate` was called before a template was loaded
    #[error("template is not loaded")]
    TemplateNotLoaded,

    /// There is no result to render
    #[error("no results to generate from")]
    NoResults,

    /// Template execution failed
    #[error("template execution failed: {0}")]
    Render(#[from] handlebars::RenderError),

    /// The rendered text is not valid Go source
    ///
    /// The rendered bytes are kept so the caller can still inspect them.
    #[error("internal error. format failed: {source}")]
    Format {
        /// Why formatting failed
        source: FormatError,
        /// Rendered output before formatting
        unformatted: Vec<u8>,
    },

    /// Serialization of the template data failed
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl GenerationError {
    /// The unformatted output carried by a [`GenerationError::Format`]
    pub fn unformatted(&self) -> Option<&[u8]> {
        match self {
            GenerationError::Format { unformatted, .. } => Some(unformatted),
            _ => None,
        }
    }
}

/// Go source that could not be formatted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct FormatError {
    /// 1-based line of the first syntax error
    pub line: usize,
    /// 1-based column of the first syntax error
    pub column: usize,
    /// Description of the error
    pub message: String,
}
