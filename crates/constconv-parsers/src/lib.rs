//! # constconv parsers
//!
//! Loads one Go package (plus the packages it imports directly), evaluates
//! its package-level constants and collects every constant declared with a
//! requested type.
//!
//! ## Pipeline
//!
//! - **Loading**: [`loader::PackageLoader`] selects the source files of the
//!   primary package, honouring build constraints, and resolves its imports
//!   through `go.mod`, the module cache and `GOROOT`.
//! - **Syntax**: [`syntax`] parses each file with tree-sitter and lowers the
//!   top-level declarations into a small owned model.
//! - **Symbols**: [`symbols::SymbolStore`] holds the evaluated constants of
//!   every loaded package, produced by the constant evaluator in [`eval`].
//! - **Scanning**: [`scanner`] applies the grouped-constant type rule to each
//!   file and [`parser::Parser`] aggregates the results per requested type.

pub mod constant;
pub mod constraints;
pub mod error;
pub mod eval;
pub mod loader;
pub mod parser;
pub mod quote;
pub mod resolver;
pub mod scanner;
pub mod symbols;
pub mod syntax;
pub mod types;

pub use constant::{ConstValue, Rat};
pub use eval::BasicType;
pub use error::{
    LoadWarning, ParserError, ParserResult, SymbolError, SymbolErrors, WarningSeverity,
};
pub use loader::{LoadTarget, PackageLoader};
pub use parser::{Parser, ParserConfig};
pub use scanner::ScanSession;
pub use symbols::{Constant, LoadedFile, Package, PackageSource, SymbolStore};
pub use types::{Import, Kind, Position, TypeResult, Value};
