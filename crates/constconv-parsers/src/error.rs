//! Parser error types and results

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Position;

/// Parser operation errors
#[derive(Debug, Error)]
pub enum ParserError {
    #[error("-tags option applies only to directories, not when files are specified")]
    TagsWithFiles,

    #[error("load error: {count} packages found {packages:?}")]
    PackageCount { count: usize, packages: Vec<String> },

    #[error("load error: no buildable Go source files in {}", path.display())]
    NoGoFiles { path: PathBuf },

    #[error("load error: {message}")]
    Load { message: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tree-sitter error: {message}")]
    TreeSitter { message: String },

    #[error("unexpected typeName: {type_name}")]
    MalformedTypeName { type_name: String },

    #[error("no files found for inspecting")]
    NoFiles,

    #[error("inspection failed for type {type_name}: {errors}")]
    ScanSymbol {
        type_name: String,
        errors: SymbolErrors,
    },

    #[error("no values defined for type {type_name}")]
    NoValues { type_name: String },
}

impl ParserError {
    /// Whether this error happened while selecting or loading packages
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            ParserError::TagsWithFiles
                | ParserError::PackageCount { .. }
                | ParserError::NoGoFiles { .. }
                | ParserError::Load { .. }
                | ParserError::Io { .. }
                | ParserError::TreeSitter { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ParserError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for parser operations
pub type ParserResult<T> = std::result::Result<T, ParserError>;

/// A declared constant name without a resolvable symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolError {
    pub file: PathBuf,
    pub position: Position,
    pub name: String,
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: no value for constant {}",
            self.file.display(),
            self.position,
            self.name
        )
    }
}

impl std::error::Error for SymbolError {}

/// Symbol errors collected across the files scanned for one type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolErrors(pub Vec<SymbolError>);

impl SymbolErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolError> {
        self.0.iter()
    }
}

impl fmt::Display for SymbolErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", err)?;
        }
        Ok(())
    }
}

/// Warning severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Info,
    Warning,
}

impl fmt::Display for WarningSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningSeverity::Info => write!(f, "INFO"),
            WarningSeverity::Warning => write!(f, "WARN"),
        }
    }
}

/// Loader warnings (non-fatal issues)
#[derive(Debug, Clone)]
pub struct LoadWarning {
    pub message: String,
    pub file: Option<PathBuf>,
    pub position: Option<Position>,
    pub severity: WarningSeverity,
}

impl LoadWarning {
    /// Create a new loader warning
    pub fn new(message: impl Into<String>, severity: WarningSeverity) -> Self {
        Self {
            message: message.into(),
            file: None,
            position: None,
            severity,
        }
    }

    /// Attach the file and position the warning refers to
    pub fn at(mut self, file: impl Into<PathBuf>, position: Option<Position>) -> Self {
        self.file = Some(file.into());
        self.position = position;
        self
    }
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.severity)?;
        match (&self.file, &self.position) {
            (Some(file), Some(pos)) => write!(f, "{}:{}: ", file.display(), pos)?,
            (Some(file), None) => write!(f, "{}: ", file.display())?,
            _ => {}
        }
        f.write_str(&self.message)
    }
}
