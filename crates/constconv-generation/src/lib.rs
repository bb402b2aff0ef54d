#![warn(missing_docs)]

//! Code generation for constconv
//!
//! Renders the typed constants collected by `constconv-parsers` through a
//! user supplied handlebars template and lays the result out as canonical
//! Go source.

pub mod context;
pub mod error;
pub mod format;
pub mod generator;
pub mod helpers;

// Re-export public API
pub use context::{do_not_edit, ResultView, TemplateData, ValueView};
pub use error::{FormatError, GenerationError};
pub use format::format_source;
pub use generator::{Generator, GeneratorConfig};
pub use helpers::CaseTransform;
