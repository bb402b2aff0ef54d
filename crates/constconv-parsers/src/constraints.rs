//! Build constraint evaluation for directory loading
//!
//! Files are matched by their `_GOOS`/`_GOARCH` name suffixes and by the
//! `//go:build` (or legacy `// +build`) lines in their header.

use std::collections::BTreeSet;

use thiserror::Error;

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Newest `go1.N` release tag considered satisfied.
const GO_MINOR: u32 = 23;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid build constraint: {0}")]
pub struct ConstraintError(pub String);

/// Target platform and tags used to select files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
    pub tags: BTreeSet<String>,
}

impl BuildContext {
    /// Context for the host platform. `GOOS` and `GOARCH` environment
    /// variables take precedence over the detected values.
    pub fn host(tags: &[String]) -> Self {
        let goos = std::env::var("GOOS")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| go_os(std::env::consts::OS).to_string());
        let goarch = std::env::var("GOARCH")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| go_arch(std::env::consts::ARCH).to_string());
        Self::new(goos, goarch, tags)
    }

    pub fn new(goos: impl Into<String>, goarch: impl Into<String>, tags: &[String]) -> Self {
        Self {
            goos: goos.into(),
            goarch: goarch.into(),
            tags: tags.iter().filter(|t| !t.is_empty()).cloned().collect(),
        }
    }

    /// Whether a single build tag holds in this context
    pub fn satisfies(&self, tag: &str) -> bool {
        if self.tags.contains(tag) || tag == self.goos || tag == self.goarch || tag == "gc" {
            return true;
        }
        if tag == "unix" {
            return UNIX_OS.contains(&self.goos.as_str());
        }
        if self.goos == "android" && tag == "linux" {
            return true;
        }
        if self.goos == "illumos" && tag == "solaris" {
            return true;
        }
        if self.goos == "ios" && tag == "darwin" {
            return true;
        }
        if let Some(minor) = tag.strip_prefix("go1.") {
            return minor.parse::<u32>().is_ok_and(|m| m <= GO_MINOR);
        }
        false
    }

    /// Whether a file name's `_GOOS`, `_GOARCH` or `_GOOS_GOARCH` suffix
    /// matches this context
    pub fn matches_file_name(&self, name: &str) -> bool {
        let stem = name.split('.').next().unwrap_or(name);
        let Some(underscore) = stem.find('_') else {
            return true;
        };
        let parts: Vec<&str> = stem[underscore..].split('_').collect();
        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.satisfies(parts[n - 2]) && self.satisfies(parts[n - 1]);
        }
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) || KNOWN_ARCH.contains(&last) {
            return self.satisfies(last);
        }
        true
    }

    /// Whether the build constraint lines of `source` hold
    pub fn matches_source(&self, source: &str) -> Result<bool, ConstraintError> {
        let header = constraint_lines(source);
        if let Some(expr) = header.go_build {
            return Ok(parse_expr(&expr)?.eval(self));
        }
        for line in header.plus_build {
            if !self.matches_plus_build(&line) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// `// +build a,b !c`: OR of space separated terms, each an AND of
    /// comma separated, optionally negated, tags
    fn matches_plus_build(&self, line: &str) -> bool {
        line.split_whitespace().any(|term| {
            term.split(',').all(|tag| match tag.strip_prefix('!') {
                Some(tag) => !self.satisfies(tag),
                None => self.satisfies(tag),
            })
        })
    }
}

fn go_os(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

fn go_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

#[derive(Debug, Default)]
struct Header {
    go_build: Option<String>,
    plus_build: Vec<String>,
}

/// Constraint lines from the comment header that precedes the package clause
fn constraint_lines(source: &str) -> Header {
    let mut header = Header::default();
    let mut in_block = false;
    for line in source.lines() {
        let line = line.trim();
        if in_block {
            if line.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("//") {
            if let Some(expr) = rest.strip_prefix("go:build") {
                if header.go_build.is_none() && (expr.is_empty() || expr.starts_with([' ', '\t'])) {
                    header.go_build = Some(expr.trim().to_string());
                }
            } else if let Some(tags) = rest.trim_start().strip_prefix("+build") {
                if tags.is_empty() || tags.starts_with([' ', '\t']) {
                    header.plus_build.push(tags.trim().to_string());
                }
            }
            continue;
        }
        if line.starts_with("/*") {
            in_block = !line.contains("*/");
            continue;
        }
        break;
    }
    header
}

/// A `//go:build` expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    pub fn eval(&self, ctx: &BuildContext) -> bool {
        match self {
            Constraint::Tag(tag) => ctx.satisfies(tag),
            Constraint::Not(inner) => !inner.eval(ctx),
            Constraint::And(a, b) => a.eval(ctx) && b.eval(ctx),
            Constraint::Or(a, b) => a.eval(ctx) || b.eval(ctx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ConstraintError> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            ' ' | '\t' => {}
            '!' => tokens.push(Token::Not),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            '&' | '|' => {
                if chars.next().map(|(_, n)| n) != Some(c) {
                    return Err(ConstraintError(format!("unexpected {:?} in {:?}", c, expr)));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut end = i + c.len_utf8();
                while let Some(&(j, n)) = chars.peek() {
                    if n.is_alphanumeric() || n == '_' || n == '.' {
                        end = j + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Tag(expr[i..end].to_string()));
            }
            other => {
                return Err(ConstraintError(format!("unexpected {:?} in {:?}", other, expr)));
            }
        }
    }
    Ok(tokens)
}

/// Parse a `//go:build` expression (`||` binds weaker than `&&`)
pub fn parse_expr(expr: &str) -> Result<Constraint, ConstraintError> {
    let tokens = tokenize(expr)?;
    let mut parser = ExprParser { tokens, pos: 0 };
    let constraint = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return Err(ConstraintError(format!("unexpected tokens in {:?}", expr)));
    }
    Ok(constraint)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Result<Constraint, ConstraintError> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and()?;
            left = Constraint::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Constraint, ConstraintError> {
        let mut left = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.not()?;
            left = Constraint::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Constraint, ConstraintError> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Constraint::Not(Box::new(self.not()?)))
            }
            Some(Token::Open) => {
                self.pos += 1;
                let inner = self.or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(ConstraintError("missing )".to_string()));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Tag(tag)) => {
                self.pos += 1;
                Ok(Constraint::Tag(tag))
            }
            Some(other) => Err(ConstraintError(format!("unexpected {:?}", other))),
            None => Err(ConstraintError("unexpected end of expression".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linux(tags: &[&str]) -> BuildContext {
        let tags: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
        BuildContext::new("linux", "amd64", &tags)
    }

    #[test]
    fn test_expression_precedence() {
        let ctx = linux(&[]);
        assert!(parse_expr("linux && amd64 || windows").unwrap().eval(&ctx));
        assert!(!parse_expr("linux && (arm64 || windows)").unwrap().eval(&ctx));
        assert!(parse_expr("!windows && unix").unwrap().eval(&ctx));
        assert!(parse_expr("go1.18").unwrap().eval(&ctx));
        assert!(!parse_expr("go1.999").unwrap().eval(&ctx));
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(parse_expr("linux &&").is_err());
        assert!(parse_expr("(linux").is_err());
        assert!(parse_expr("linux & amd64").is_err());
    }

    #[test]
    fn test_user_tags() {
        let ctx = linux(&["integration"]);
        let source = "//go:build integration\n\npackage p\n";
        assert!(ctx.matches_source(source).unwrap());
        assert!(!linux(&[]).matches_source(source).unwrap());
    }

    #[test]
    fn test_go_build_wins_over_plus_build() {
        let source = "//go:build linux\n// +build windows\n\npackage p\n";
        assert!(linux(&[]).matches_source(source).unwrap());
    }

    #[test]
    fn test_legacy_plus_build() {
        let ctx = linux(&[]);
        assert!(ctx.matches_source("// +build darwin linux,amd64\n\npackage p\n").unwrap());
        assert!(!ctx.matches_source("// +build !linux\n\npackage p\n").unwrap());
        assert!(!ctx
            .matches_source("// +build linux\n// +build ignore\n\npackage p\n")
            .unwrap());
    }

    #[test]
    fn test_constraints_after_package_are_ignored() {
        let source = "// Package p.\npackage p\n\n//go:build ignore\n";
        assert!(linux(&[]).matches_source(source).unwrap());
    }

    #[test]
    fn test_file_name_suffixes() {
        let ctx = linux(&[]);
        assert!(ctx.matches_file_name("days.go"));
        assert!(ctx.matches_file_name("days_linux.go"));
        assert!(ctx.matches_file_name("days_linux_amd64.go"));
        assert!(!ctx.matches_file_name("days_windows.go"));
        assert!(!ctx.matches_file_name("days_linux_arm64.go"));
        assert!(ctx.matches_file_name("linux.go"));
        assert!(ctx.matches_file_name("day_of_week.go"));
    }
}
