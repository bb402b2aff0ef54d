//! Parser facade: load once, inspect every requested type

use tracing::{debug, info};

use crate::error::{ParserError, ParserResult, SymbolError, SymbolErrors};
use crate::loader::{LoadTarget, PackageLoader};
use crate::scanner::ScanSession;
use crate::symbols::SymbolStore;
use crate::types::{TypeResult, Value};

/// Parser configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParserConfig {
    /// Requested type names, `T` or `pkg.T`
    pub types: Vec<String>,
    /// Extra build tags (directory loading only)
    pub tags: Vec<String>,
    /// A directory or a list of `.go` files; empty means the current
    /// directory
    pub patterns: Vec<String>,
}

/// Split a requested type name into `(package, type)`.
///
/// A bare name belongs to the primary package. Names with more than one
/// dot or an empty component are rejected.
fn split_type_name<'a>(type_name: &'a str, primary: &'a str) -> ParserResult<(&'a str, &'a str)> {
    let parts: Vec<&str> = type_name.split('.').collect();
    match parts.as_slice() {
        [name] if !name.is_empty() => Ok((primary, *name)),
        [package, name] if !package.is_empty() && !name.is_empty() => Ok((*package, *name)),
        _ => Err(ParserError::MalformedTypeName {
            type_name: type_name.to_string(),
        }),
    }
}

/// Loads the configured package and collects the constants of each
/// requested type
#[derive(Debug)]
pub struct Parser {
    config: ParserConfig,
    store: Option<SymbolStore>,
    results: Vec<TypeResult>,
    base_package_name: String,
}

impl Parser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            store: None,
            results: Vec::new(),
            base_package_name: String::new(),
        }
    }

    /// Parser over an already loaded store
    pub fn with_store(config: ParserConfig, store: SymbolStore) -> Self {
        Self {
            store: Some(store),
            ..Self::new(config)
        }
    }

    /// Load the package (unless a store was supplied) and inspect every
    /// requested type in order. The first failing type aborts the parse.
    pub fn parse(&mut self) -> ParserResult<()> {
        if self.store.is_none() {
            let target = LoadTarget::from_patterns(&self.config.patterns)?;
            let loader = PackageLoader::new(self.config.tags.clone());
            self.store = Some(loader.load(&target)?);
        }
        let Some(store) = self.store.as_ref() else {
            return Err(ParserError::NoFiles);
        };

        self.base_package_name = store.primary().name.clone();
        let mut results = Vec::with_capacity(self.config.types.len());
        for type_name in &self.config.types {
            results.push(inspect(store, type_name)?);
        }
        if results.is_empty() {
            return Err(ParserError::NoValues {
                type_name: self.config.types.join(","),
            });
        }
        info!(
            "Collected {} values for {} types",
            results.iter().map(|r| r.values.len()).sum::<usize>(),
            results.len()
        );
        self.results = results;
        Ok(())
    }

    /// One result per requested type, in request order
    pub fn result_list(&self) -> &[TypeResult] {
        &self.results
    }

    /// Name of the primary package
    pub fn base_package_name(&self) -> &str {
        &self.base_package_name
    }

    pub fn store(&self) -> Option<&SymbolStore> {
        self.store.as_ref()
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }
}

/// Collect the constants of `type_name` from every file of its package
pub fn inspect(store: &SymbolStore, type_name: &str) -> ParserResult<TypeResult> {
    if store.files().next().is_none() {
        return Err(ParserError::NoFiles);
    }
    let (pkg_name, bare_name) = split_type_name(type_name, &store.primary().name)?;
    debug!("Inspecting type {} in package {}", bare_name, pkg_name);

    let mut values: Vec<Value> = Vec::new();
    let mut errors: Vec<SymbolError> = Vec::new();
    for file in store.files().filter(|f| f.package.name == pkg_name) {
        match ScanSession::new(file, bare_name).run() {
            Ok(found) => values.extend(found),
            Err(found) => errors.extend(found),
        }
    }

    if !errors.is_empty() {
        return Err(ParserError::ScanSymbol {
            type_name: type_name.to_string(),
            errors: SymbolErrors(errors),
        });
    }
    if values.is_empty() {
        return Err(ParserError::NoValues {
            type_name: type_name.to_string(),
        });
    }

    Ok(TypeResult {
        pkg_name: pkg_name.to_string(),
        type_name: bare_name.to_string(),
        rep_type_name: type_name.to_string(),
        values,
        imports: store.imports(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAYS: &str = "package days\n\nimport (\n\t\"os\"\n)\n\ntype DayOfWeek int32\n\nconst (\n\tSunday DayOfWeek = iota\n\tMonday\n\tTuesday\n)\n\nconst Mode os.FileMode = 0644\n";
    const OS: &str = "package os\n\ntype FileMode uint32\n\nconst (\n\tModeDir FileMode = 1 << (32 - 1 - iota)\n\tModeAppend\n)\n";

    fn parser(types: &[&str]) -> Parser {
        let store = SymbolStore::from_sources(&[("days.go", DAYS)], &[("os", &[("types.go", OS)])]).unwrap();
        let config = ParserConfig {
            types: types.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        };
        Parser::with_store(config, store)
    }

    #[test]
    fn test_split_type_name() {
        assert_eq!(split_type_name("T", "p").unwrap(), ("p", "T"));
        assert_eq!(split_type_name("os.FileMode", "p").unwrap(), ("os", "FileMode"));
        for bad in ["a.b.c", ".T", "os.", ""] {
            assert!(matches!(
                split_type_name(bad, "p"),
                Err(ParserError::MalformedTypeName { .. })
            ));
        }
    }

    #[test]
    fn test_parse_local_type() {
        let mut p = parser(&["DayOfWeek"]);
        p.parse().unwrap();
        assert_eq!(p.base_package_name(), "days");
        let result = &p.result_list()[0];
        assert_eq!(result.pkg_name, "days");
        assert_eq!(result.type_name, "DayOfWeek");
        assert_eq!(result.rep_type_name, "DayOfWeek");
        let names: Vec<_> = result.values.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Sunday", "Monday", "Tuesday"]);
        assert_eq!(result.imports.len(), 1);
        assert_eq!(result.imports[0].path, "\"os\"");
    }

    #[test]
    fn test_parse_qualified_type_reads_imported_package() {
        let mut p = parser(&["os.FileMode", "DayOfWeek"]);
        p.parse().unwrap();
        let result = &p.result_list()[0];
        assert_eq!(result.pkg_name, "os");
        assert_eq!(result.type_name, "FileMode");
        assert_eq!(result.rep_type_name, "os.FileMode");
        let names: Vec<_> = result.values.iter().map(|v| v.name.as_str()).collect();
        // Mode is declared in days, not in os
        assert_eq!(names, vec!["ModeDir", "ModeAppend"]);
        assert_eq!(p.result_list().len(), 2);
    }

    #[test]
    fn test_no_values() {
        let mut p = parser(&["Missing"]);
        match p.parse() {
            Err(ParserError::NoValues { type_name }) => assert_eq!(type_name, "Missing"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_no_types_requested() {
        let mut p = parser(&[]);
        assert!(matches!(p.parse(), Err(ParserError::NoValues { .. })));
    }
}
