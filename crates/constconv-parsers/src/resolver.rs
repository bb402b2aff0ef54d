//! Import path resolution
//!
//! Maps an import path to the directory holding its sources, looking at the
//! standard library, the main module, `replace` directives, `vendor/`, the
//! module cache and finally `GOPATH/src`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ParserError, ParserResult};

/// A `replace` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub old: String,
    pub old_version: Option<String>,
    pub new: String,
    pub new_version: Option<String>,
}

impl Replace {
    /// The replacement is a directory rather than a module
    pub fn is_local(&self) -> bool {
        self.new.starts_with("./") || self.new.starts_with("../") || Path::new(&self.new).is_absolute()
    }
}

/// The parts of a `go.mod` file relevant to import resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoMod {
    /// Directory containing `go.mod`
    pub dir: PathBuf,
    pub module: String,
    pub requires: Vec<(String, String)>,
    pub replaces: Vec<Replace>,
}

impl GoMod {
    /// Find and read the `go.mod` governing `start`
    pub fn find(start: &Path) -> ParserResult<Option<GoMod>> {
        let mut dir = Some(start);
        while let Some(current) = dir {
            let candidate = current.join("go.mod");
            if candidate.is_file() {
                let text = fs::read_to_string(&candidate).map_err(|e| ParserError::io(&candidate, e))?;
                debug!("Using module file {}", candidate.display());
                return Ok(Some(GoMod::parse(current, &text)));
            }
            dir = current.parent();
        }
        Ok(None)
    }

    pub fn parse(dir: &Path, text: &str) -> GoMod {
        let mut module = String::new();
        let mut requires = Vec::new();
        let mut replaces = Vec::new();
        let mut block: Option<&str> = None;

        for raw in text.lines() {
            let line = strip_line_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            if let Some(verb) = block {
                if line == ")" {
                    block = None;
                    continue;
                }
                apply_directive(verb, line, &mut requires, &mut replaces);
                continue;
            }
            let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
            let rest = rest.trim();
            match verb {
                "module" => module = unquote_path(rest),
                "require" | "replace" if rest == "(" => block = Some(verb),
                "require" | "replace" => apply_directive(verb, rest, &mut requires, &mut replaces),
                "exclude" | "retract" | "tool" | "ignore" | "godebug" if rest == "(" => {
                    block = Some("skip")
                }
                _ => {}
            }
        }

        GoMod {
            dir: dir.to_path_buf(),
            module,
            requires,
            replaces,
        }
    }
}

fn strip_line_comment(line: &str) -> &str {
    match line.find("//") {
        Some(i) => &line[..i],
        None => line,
    }
}

fn unquote_path(s: &str) -> String {
    s.trim().trim_matches('"').trim_matches('`').to_string()
}

fn apply_directive(
    verb: &str,
    line: &str,
    requires: &mut Vec<(String, String)>,
    replaces: &mut Vec<Replace>,
) {
    match verb {
        "require" => {
            let mut fields = line.split_whitespace();
            if let (Some(path), Some(version)) = (fields.next(), fields.next()) {
                requires.push((unquote_path(path), version.to_string()));
            }
        }
        "replace" => {
            let Some((old, new)) = line.split_once("=>") else {
                return;
            };
            let mut old = old.split_whitespace();
            let mut new = new.split_whitespace();
            if let (Some(old_path), Some(new_path)) = (old.next(), new.next()) {
                replaces.push(Replace {
                    old: unquote_path(old_path),
                    old_version: old.next().map(str::to_string),
                    new: unquote_path(new_path),
                    new_version: new.next().map(str::to_string),
                });
            }
        }
        _ => {}
    }
}

/// Escape a module path or version for the module cache: each upper case
/// letter becomes `!` followed by its lower case form
pub fn escape_module_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            out.push('!');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// `prefix` is `path` or a leading path element sequence of it
fn path_within<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    if path == prefix {
        return Some("");
    }
    path.strip_prefix(prefix)?.strip_prefix('/')
}

/// Resolves import paths to package directories
#[derive(Debug, Clone, Default)]
pub struct ImportResolver {
    module: Option<GoMod>,
    goroot: Option<PathBuf>,
    mod_cache: Option<PathBuf>,
    gopath: Vec<PathBuf>,
}

impl ImportResolver {
    pub fn new(
        module: Option<GoMod>,
        goroot: Option<PathBuf>,
        mod_cache: Option<PathBuf>,
        gopath: Vec<PathBuf>,
    ) -> Self {
        Self {
            module,
            goroot,
            mod_cache,
            gopath,
        }
    }

    /// Resolver for packages under `dir`, configured from the environment
    pub fn from_env(dir: &Path) -> ParserResult<Self> {
        let module = GoMod::find(dir)?;
        let gopath: Vec<PathBuf> = match env::var_os("GOPATH") {
            Some(value) if !value.is_empty() => env::split_paths(&value).collect(),
            _ => home_dir().map(|h| vec![h.join("go")]).unwrap_or_default(),
        };
        let mod_cache = env::var_os("GOMODCACHE")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| gopath.first().map(|p| p.join("pkg").join("mod")));
        let goroot = env::var_os("GOROOT")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                ["/usr/local/go", "/usr/lib/go"]
                    .iter()
                    .map(PathBuf::from)
                    .find(|p| p.join("src").is_dir())
            });
        debug!(
            "Import resolver: module={:?} goroot={:?} mod_cache={:?}",
            module.as_ref().map(|m| &m.module),
            goroot,
            mod_cache
        );
        Ok(Self::new(module, goroot, mod_cache, gopath))
    }

    pub fn module(&self) -> Option<&GoMod> {
        self.module.as_ref()
    }

    /// Directory of the package imported as `path`, if it can be found
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        if path.is_empty() || path == "C" {
            return None;
        }
        let first = path.split('/').next().unwrap_or(path);
        if !first.contains('.') {
            if let Some(dir) = self.goroot.as_ref().map(|r| r.join("src").join(path)) {
                if dir.is_dir() {
                    return Some(dir);
                }
            }
        }
        if let Some(dir) = self.resolve_in_module(path) {
            return Some(dir);
        }
        self.gopath
            .iter()
            .map(|p| p.join("src").join(path))
            .find(|d| d.is_dir())
    }

    fn resolve_in_module(&self, path: &str) -> Option<PathBuf> {
        let module = self.module.as_ref()?;

        if !module.module.is_empty() {
            if let Some(rest) = path_within(path, &module.module) {
                return existing(module.dir.join(rest));
            }
        }

        let replace = module
            .replaces
            .iter()
            .filter(|r| path_within(path, &r.old).is_some())
            .max_by_key(|r| r.old.len());
        if let Some(replace) = replace {
            let rest = path_within(path, &replace.old).unwrap_or("");
            if replace.is_local() {
                return existing(module.dir.join(&replace.new).join(rest));
            }
            if let Some(version) = &replace.new_version {
                return self.cached(&replace.new, version, rest);
            }
        }

        if let Some(dir) = existing(module.dir.join("vendor").join(path)) {
            return Some(dir);
        }

        let (required, version) = module
            .requires
            .iter()
            .filter(|(m, _)| path_within(path, m).is_some())
            .max_by_key(|(m, _)| m.len())?;
        let rest = path_within(path, required).unwrap_or("");
        self.cached(required, version, rest)
    }

    fn cached(&self, module: &str, version: &str, rest: &str) -> Option<PathBuf> {
        let root = self.mod_cache.as_ref()?;
        let dir = root.join(format!(
            "{}@{}",
            escape_module_path(module),
            escape_module_path(version)
        ));
        existing(dir.join(rest))
    }
}

fn existing(dir: PathBuf) -> Option<PathBuf> {
    dir.is_dir().then_some(dir)
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .or_else(|| env::var_os("USERPROFILE"))
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GO_MOD: &str = "module example.com/days // main\n\ngo 1.21\n\nrequire (\n\tgithub.com/Foo/bar v1.2.3\n\tgolang.org/x/text v0.14.0 // indirect\n)\n\nrequire example.org/single v0.1.0\n\nreplace example.org/local => ../local\n";

    #[test]
    fn test_parse_go_mod() {
        let m = GoMod::parse(Path::new("/src/days"), GO_MOD);
        assert_eq!(m.module, "example.com/days");
        assert_eq!(
            m.requires,
            vec![
                ("github.com/Foo/bar".to_string(), "v1.2.3".to_string()),
                ("golang.org/x/text".to_string(), "v0.14.0".to_string()),
                ("example.org/single".to_string(), "v0.1.0".to_string()),
            ]
        );
        assert_eq!(m.replaces.len(), 1);
        assert!(m.replaces[0].is_local());
    }

    #[test]
    fn test_escape_module_path() {
        assert_eq!(escape_module_path("github.com/Foo/bar"), "github.com/!foo/bar");
        assert_eq!(escape_module_path("v1.0.0"), "v1.0.0");
    }

    #[test]
    fn test_resolution_order() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        let module_dir = root.join("work/days");
        let goroot = root.join("goroot");
        let cache = root.join("cache");
        for dir in [
            module_dir.join("sub"),
            module_dir.join("vendor/example.net/vend"),
            root.join("work/local/pkg"),
            goroot.join("src/os"),
            cache.join("github.com/!foo/bar@v1.2.3/inner"),
        ] {
            fs::create_dir_all(dir).unwrap();
        }
        let module = GoMod::parse(&module_dir, GO_MOD);
        let resolver = ImportResolver::new(Some(module), Some(goroot.clone()), Some(cache.clone()), vec![]);

        assert_eq!(resolver.resolve("os"), Some(goroot.join("src/os")));
        assert_eq!(resolver.resolve("example.com/days/sub"), Some(module_dir.join("sub")));
        assert_eq!(
            resolver.resolve("example.org/local/pkg"),
            Some(module_dir.join("../local").join("pkg"))
        );
        assert_eq!(
            resolver.resolve("example.net/vend"),
            Some(module_dir.join("vendor/example.net/vend"))
        );
        assert_eq!(
            resolver.resolve("github.com/Foo/bar/inner"),
            Some(cache.join("github.com/!foo/bar@v1.2.3/inner"))
        );
        assert_eq!(resolver.resolve("C"), None);
        assert_eq!(resolver.resolve("example.com/missing"), None);
        assert_eq!(resolver.resolve("unsafe"), None);
    }

    #[test]
    fn test_find_walks_up() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("go.mod"), "module example.com/m\n").unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();
        let found = GoMod::find(&nested).unwrap().unwrap();
        assert_eq!(found.module, "example.com/m");
        assert_eq!(found.dir, tmp.path());
    }
}
