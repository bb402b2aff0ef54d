//! Package loading
//!
//! Selects the source files of the primary package, parses them, loads the
//! packages they import directly and evaluates everything into a
//! [`SymbolStore`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::constraints::BuildContext;
use crate::error::{LoadWarning, ParserError, ParserResult, WarningSeverity};
use crate::resolver::ImportResolver;
use crate::symbols::{PackageSource, SymbolStore};
use crate::syntax::{parse_source, SourceFile};

/// What to load as the primary package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadTarget {
    /// All buildable files of one directory
    Directory(PathBuf),
    /// Exactly these files, build constraints ignored
    Files(Vec<PathBuf>),
}

impl LoadTarget {
    /// Interpret command line patterns: no pattern or a single directory
    /// selects a directory, otherwise every pattern must name a `.go` file
    pub fn from_patterns(patterns: &[String]) -> ParserResult<Self> {
        match patterns {
            [] => Ok(LoadTarget::Directory(PathBuf::from("."))),
            [single] if Path::new(single).is_dir() => Ok(LoadTarget::Directory(PathBuf::from(single))),
            _ => {
                if patterns.iter().all(|p| p.ends_with(".go")) {
                    return Ok(LoadTarget::Files(patterns.iter().map(PathBuf::from).collect()));
                }
                let dirs: Vec<&String> = patterns.iter().filter(|p| Path::new(p).is_dir()).collect();
                if dirs.len() > 1 {
                    return Err(ParserError::PackageCount {
                        count: dirs.len(),
                        packages: dirs.into_iter().cloned().collect(),
                    });
                }
                Err(ParserError::Load {
                    message: format!("cannot load patterns {:?}: expected a directory or .go files", patterns),
                })
            }
        }
    }

    /// Directory used to find `go.mod` and to name output files
    pub fn base_dir(&self) -> PathBuf {
        match self {
            LoadTarget::Directory(dir) => dir.clone(),
            LoadTarget::Files(files) => files
                .first()
                .and_then(|f| f.parent())
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// Loads a package and its direct imports
#[derive(Debug, Clone)]
pub struct PackageLoader {
    tags: Vec<String>,
    context: BuildContext,
    resolver: Option<ImportResolver>,
}

impl PackageLoader {
    /// Loader for the host platform with extra build tags
    pub fn new(tags: Vec<String>) -> Self {
        let context = BuildContext::host(&tags);
        Self {
            tags,
            context,
            resolver: None,
        }
    }

    /// Use a specific platform instead of the host
    pub fn with_context(mut self, context: BuildContext) -> Self {
        self.context = context;
        self
    }

    /// Use a specific import resolver instead of one built from the
    /// environment
    pub fn with_resolver(mut self, resolver: ImportResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn load(&self, target: &LoadTarget) -> ParserResult<SymbolStore> {
        let mut warnings = Vec::new();
        let files = match target {
            LoadTarget::Files(paths) => {
                if self.tags.iter().any(|t| !t.is_empty()) {
                    return Err(ParserError::TagsWithFiles);
                }
                paths
                    .iter()
                    .map(|path| read_and_parse(path))
                    .collect::<ParserResult<Vec<_>>>()?
            }
            LoadTarget::Directory(dir) => self.directory_files(dir, &mut warnings)?,
        };

        let base = target.base_dir();
        if files.is_empty() {
            return Err(ParserError::NoGoFiles { path: base });
        }

        let names: BTreeSet<&str> = files.iter().map(|f| f.package_name.as_str()).collect();
        if names.len() != 1 {
            return Err(ParserError::PackageCount {
                count: names.len(),
                packages: names.into_iter().map(str::to_string).collect(),
            });
        }
        for file in files.iter().filter(|f| f.has_errors) {
            warnings.push(
                LoadWarning::new("source contains syntax errors", WarningSeverity::Warning)
                    .at(&file.path, None),
            );
        }
        for warning in &warnings {
            warn!("{}", warning);
        }

        let resolver = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => ImportResolver::from_env(&base)?,
        };
        let import_path = resolver
            .module()
            .and_then(|m| {
                let rel = base.strip_prefix(&m.dir).ok()?;
                let rel = rel.to_string_lossy().replace('\\', "/");
                Some(if rel.is_empty() {
                    m.module.clone()
                } else {
                    format!("{}/{}", m.module, rel)
                })
            })
            .unwrap_or_default();

        let primary = PackageSource {
            name: files[0].package_name.clone(),
            import_path,
            dir: Some(base),
            files,
        };
        info!(
            "Loaded package {} ({} files)",
            primary.name,
            primary.files.len()
        );

        let (deps, import_warnings) = self.load_imports(&primary, &resolver);
        warnings.extend(import_warnings);
        Ok(SymbolStore::build(primary, deps, warnings))
    }

    /// Buildable files of `dir`, sorted by name
    fn directory_files(&self, dir: &Path, warnings: &mut Vec<LoadWarning>) -> ParserResult<Vec<SourceFile>> {
        let entries = fs::read_dir(dir).map_err(|e| ParserError::io(dir, e))?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut files = Vec::new();
        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".go")
                || name.ends_with("_test.go")
                || name.starts_with('_')
                || name.starts_with('.')
            {
                continue;
            }
            if !self.context.matches_file_name(name) {
                debug!("Skipping {}: file name constraint", name);
                continue;
            }
            let source = fs::read_to_string(&path).map_err(|e| ParserError::io(&path, e))?;
            match self.context.matches_source(&source) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Skipping {}: build constraints", name);
                    continue;
                }
                Err(e) => {
                    warnings.push(LoadWarning::new(e.to_string(), WarningSeverity::Warning).at(&path, None));
                    continue;
                }
            }
            files.push(parse_source(&path, &source)?);
        }
        Ok(files)
    }

    /// Load every package imported by the primary package
    fn load_imports(
        &self,
        primary: &PackageSource,
        resolver: &ImportResolver,
    ) -> (Vec<PackageSource>, Vec<LoadWarning>) {
        let mut warnings = Vec::new();
        let mut paths = BTreeSet::new();
        for file in &primary.files {
            for import in &file.imports {
                if import.path == "C" {
                    continue;
                }
                if paths.insert(import.path.clone()) {
                    if resolver.resolve(&import.path).is_none() {
                        let warning = LoadWarning::new(
                            format!("cannot resolve import {}", import.literal),
                            WarningSeverity::Warning,
                        )
                        .at(&file.path, Some(import.position));
                        warn!("{}", warning);
                        warnings.push(warning);
                    }
                }
            }
        }

        let mut deps = Vec::new();
        for path in paths {
            let Some(dir) = resolver.resolve(&path) else {
                continue;
            };
            let mut dep_warnings = Vec::new();
            let files = match self.directory_files(&dir, &mut dep_warnings) {
                Ok(files) => files,
                Err(e) => {
                    dep_warnings.push(LoadWarning::new(
                        format!("cannot load import \"{}\": {}", path, e),
                        WarningSeverity::Warning,
                    ));
                    Vec::new()
                }
            };
            let Some(name) = files.first().map(|f| f.package_name.clone()) else {
                dep_warnings.push(LoadWarning::new(
                    format!("no buildable Go source files for import \"{}\"", path),
                    WarningSeverity::Warning,
                ));
                for warning in &dep_warnings {
                    warn!("{}", warning);
                }
                warnings.extend(dep_warnings);
                continue;
            };
            let files: Vec<SourceFile> = files.into_iter().filter(|f| f.package_name == name).collect();
            debug!("Loaded import {} as package {} ({} files)", path, name, files.len());
            for warning in &dep_warnings {
                warn!("{}", warning);
            }
            warnings.extend(dep_warnings);
            deps.push(PackageSource {
                name,
                import_path: path,
                dir: Some(dir),
                files,
            });
        }
        (deps, warnings)
    }
}

fn read_and_parse(path: &Path) -> ParserResult<SourceFile> {
    let source = fs::read_to_string(path).map_err(|e| ParserError::io(path, e))?;
    parse_source(path, &source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::GoMod;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, source: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), source).unwrap();
    }

    fn loader(tags: &[&str]) -> PackageLoader {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        let context = BuildContext::new("linux", "amd64", &tags);
        PackageLoader::new(tags)
            .with_context(context)
            .with_resolver(ImportResolver::default())
    }

    #[test]
    fn test_directory_selection() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        write(dir, "a.go", "package days\n\nconst A = 1\n");
        write(dir, "a_test.go", "package days\n\nconst T = 1\n");
        write(dir, "_skip.go", "package days\n\nconst S = 1\n");
        write(dir, "b_windows.go", "package days\n\nconst W = 1\n");
        write(dir, "c.go", "//go:build extra\n\npackage days\n\nconst C = 1\n");
        write(dir, "notes.txt", "not go");

        let store = loader(&[]).load(&LoadTarget::Directory(dir.to_path_buf())).unwrap();
        let names: Vec<_> = store
            .primary()
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.go"]);

        let tagged = loader(&["extra"]).load(&LoadTarget::Directory(dir.to_path_buf())).unwrap();
        assert_eq!(tagged.primary().files.len(), 2);
        assert!(tagged.primary().constant("C").is_some());
    }

    #[test]
    fn test_primary_warnings_are_collected() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        write(dir, "a.go", "package days\n\nconst A = 1\n");
        write(dir, "b.go", "//go:build linux &&\n\npackage days\n\nconst B = 2\n");
        write(dir, "c.go", "package days\n\nconst C = (\n\nconst D = 4\n");

        let store = loader(&[]).load(&LoadTarget::Directory(dir.to_path_buf())).unwrap();
        let warnings = store.warnings();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].file.as_deref(), Some(dir.join("b.go").as_path()));
        assert!(warnings[0].message.contains("invalid build constraint"));
        assert_eq!(warnings[1].file.as_deref(), Some(dir.join("c.go").as_path()));
        assert_eq!(warnings[1].message, "source contains syntax errors");
        assert!(store.primary().constant("B").is_none());
        assert!(store.primary().constant("A").is_some());
    }

    #[test]
    fn test_explicit_files_bypass_constraints() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "c.go", "//go:build ignore\n\npackage days\n\nconst C = 1\n");
        let target = LoadTarget::Files(vec![tmp.path().join("c.go")]);
        let store = loader(&[]).load(&target).unwrap();
        assert!(store.primary().constant("C").is_some());
    }

    #[test]
    fn test_tags_with_files_is_rejected() {
        let target = LoadTarget::Files(vec![PathBuf::from("a.go")]);
        assert!(matches!(loader(&["x"]).load(&target), Err(ParserError::TagsWithFiles)));
    }

    #[test]
    fn test_package_count_and_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let err = loader(&[]).load(&LoadTarget::Directory(tmp.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ParserError::NoGoFiles { .. }));

        write(tmp.path(), "a.go", "package a\n");
        write(tmp.path(), "b.go", "package b\n");
        let err = loader(&[]).load(&LoadTarget::Directory(tmp.path().to_path_buf())).unwrap_err();
        match err {
            ParserError::PackageCount { count, packages } => {
                assert_eq!(count, 2);
                assert_eq!(packages, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error {}", other),
        }
    }

    #[test]
    fn test_imports_are_loaded_one_level() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("mod");
        write(&root, "go.mod", "module example.com/m\n");
        write(
            &root,
            "main.go",
            "package main\n\nimport (\n\t\"example.com/m/kinds\"\n\t\"example.com/missing\"\n)\n\nconst K = kinds.Big + 1\n",
        );
        write(
            &root.join("kinds"),
            "kinds.go",
            "package kinds\n\nimport \"example.com/m/deeper\"\n\nconst Big = 41\n\nconst Deep = deeper.X\n",
        );
        write(&root.join("deeper"), "deeper.go", "package deeper\n\nconst X = 1\n");

        let module = GoMod::parse(&root, "module example.com/m\n");
        let loader = loader(&[]).with_resolver(ImportResolver::new(Some(module), None, None, vec![]));
        let store = loader.load(&LoadTarget::Directory(root.clone())).unwrap();

        assert_eq!(store.primary().import_path, "example.com/m");
        assert_eq!(store.primary().constant("K").unwrap().value.display_string(), "42");
        assert_eq!(store.deps().len(), 1);
        assert_eq!(store.deps()[0].name, "kinds");
        // imports of imports are not followed
        assert_eq!(
            store.deps()[0].constant("Deep").unwrap().value.display_string(),
            "unknown"
        );
        assert_eq!(store.warnings().len(), 1);
        assert!(store.warnings()[0].message.contains("example.com/missing"));
    }

    #[test]
    fn test_from_patterns() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().to_string_lossy().to_string();
        assert_eq!(
            LoadTarget::from_patterns(&[]).unwrap(),
            LoadTarget::Directory(PathBuf::from("."))
        );
        assert_eq!(
            LoadTarget::from_patterns(&[dir.clone()]).unwrap(),
            LoadTarget::Directory(PathBuf::from(&dir))
        );
        let files = vec!["a.go".to_string(), "b.go".to_string()];
        assert_eq!(
            LoadTarget::from_patterns(&files).unwrap(),
            LoadTarget::Files(vec![PathBuf::from("a.go"), PathBuf::from("b.go")])
        );
        assert!(LoadTarget::from_patterns(&["./...".to_string()]).is_err());
        assert_eq!(
            LoadTarget::Files(vec![PathBuf::from("x/a.go")]).base_dir(),
            PathBuf::from("x")
        );
        assert_eq!(LoadTarget::Files(vec![PathBuf::from("a.go")]).base_dir(), PathBuf::from("."));
    }
}
