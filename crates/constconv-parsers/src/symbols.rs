//! Loaded packages and their evaluated constants

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::constant::ConstValue;
use crate::error::{LoadWarning, ParserResult};
use crate::eval::{evaluate_package, BasicType, FileScope};
use crate::syntax::{parse_source, SourceFile};
use crate::types::{Import, Position};

/// An evaluated package-level constant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constant {
    pub name: String,
    pub value: ConstValue,
    /// Underlying basic type when the constant is typed
    pub ty: Option<BasicType>,
    pub file: PathBuf,
    pub position: Position,
}

/// Parsed sources of one package before evaluation
#[derive(Debug, Clone)]
pub struct PackageSource {
    pub name: String,
    pub import_path: String,
    pub dir: Option<PathBuf>,
    pub files: Vec<SourceFile>,
}

impl PackageSource {
    /// Parse in-memory `(file name, source)` pairs into a package
    pub fn from_sources(import_path: &str, sources: &[(&str, &str)]) -> ParserResult<Self> {
        let files = sources
            .iter()
            .map(|(name, source)| parse_source(Path::new(name), source))
            .collect::<ParserResult<Vec<_>>>()?;
        let name = files
            .first()
            .map(|f| f.package_name.clone())
            .unwrap_or_default();
        Ok(Self {
            name,
            import_path: import_path.to_string(),
            dir: None,
            files,
        })
    }
}

/// A package with evaluated constants
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub import_path: String,
    pub dir: Option<PathBuf>,
    pub files: Vec<SourceFile>,
    constants: HashMap<String, Constant>,
    types: HashMap<String, BasicType>,
}

impl Package {
    fn evaluate(source: PackageSource, scopes: &[FileScope], deps: &[Package]) -> Self {
        let evaluated = evaluate_package(&source.files, scopes, deps);
        debug!(
            "Evaluated {} constants in package {} ({})",
            evaluated.constants.len(),
            source.name,
            source.import_path
        );
        Self {
            name: source.name,
            import_path: source.import_path,
            dir: source.dir,
            files: source.files,
            constants: evaluated.constants,
            types: evaluated.types,
        }
    }

    /// The package-level constant called `name`
    pub fn constant(&self, name: &str) -> Option<&Constant> {
        self.constants.get(name)
    }

    pub fn constants(&self) -> impl Iterator<Item = &Constant> {
        self.constants.values()
    }

    /// Underlying basic type of the type declared as `name`
    pub fn basic_type(&self, name: &str) -> Option<BasicType> {
        self.types.get(name).copied()
    }
}

/// A source file together with the package that owns it
#[derive(Debug, Clone, Copy)]
pub struct LoadedFile<'a> {
    pub package: &'a Package,
    pub file: &'a SourceFile,
}

/// The primary package, its direct imports and their constants
#[derive(Debug, Clone)]
pub struct SymbolStore {
    primary: Package,
    deps: Vec<Package>,
    warnings: Vec<LoadWarning>,
}

impl SymbolStore {
    /// Evaluate the dependencies, then the primary package against them.
    ///
    /// Dependencies are evaluated without their own imports.
    pub fn build(primary: PackageSource, deps: Vec<PackageSource>, warnings: Vec<LoadWarning>) -> Self {
        let deps: Vec<Package> = deps
            .into_iter()
            .map(|dep| {
                let scopes = vec![FileScope::default(); dep.files.len()];
                Package::evaluate(dep, &scopes, &[])
            })
            .collect();
        let scopes: Vec<FileScope> = primary.files.iter().map(|f| file_scope(f, &deps)).collect();
        let primary = Package::evaluate(primary, &scopes, &deps);
        Self {
            primary,
            deps,
            warnings,
        }
    }

    /// Build a store straight from in-memory sources
    pub fn from_sources(
        primary: &[(&str, &str)],
        deps: &[(&str, &[(&str, &str)])],
    ) -> ParserResult<Self> {
        let primary = PackageSource::from_sources("", primary)?;
        let deps = deps
            .iter()
            .map(|(path, sources)| PackageSource::from_sources(path, sources))
            .collect::<ParserResult<Vec<_>>>()?;
        Ok(Self::build(primary, deps, Vec::new()))
    }

    pub fn primary(&self) -> &Package {
        &self.primary
    }

    pub fn deps(&self) -> &[Package] {
        &self.deps
    }

    pub fn warnings(&self) -> &[LoadWarning] {
        &self.warnings
    }

    /// Every file, primary package first, then dependencies in import path
    /// order
    pub fn files(&self) -> impl Iterator<Item = LoadedFile<'_>> {
        std::iter::once(&self.primary)
            .chain(self.deps.iter())
            .flat_map(|package| {
                package
                    .files
                    .iter()
                    .map(move |file| LoadedFile { package, file })
            })
    }

    /// Import specs of all primary package files, in file order
    pub fn imports(&self) -> Vec<Import> {
        self.primary
            .files
            .iter()
            .flat_map(|f| f.imports.iter())
            .map(|imp| Import {
                name: imp.name.clone().unwrap_or_default(),
                path: imp.literal.clone(),
                comment: imp.comment.clone(),
                doc: imp.doc.clone(),
            })
            .collect()
    }
}

/// Map the local names a file uses for its imports onto loaded packages
fn file_scope(file: &SourceFile, deps: &[Package]) -> FileScope {
    let mut scope = FileScope::default();
    for import in &file.imports {
        let Some(index) = deps.iter().position(|d| d.import_path == import.path) else {
            continue;
        };
        match import.name.as_deref() {
            Some(".") => scope.dot_imports.push(index),
            Some("_") => {}
            Some(alias) => {
                scope.imports.insert(alias.to_string(), index);
            }
            None => {
                scope.imports.insert(deps[index].name.clone(), index);
            }
        }
    }
    scope
}
