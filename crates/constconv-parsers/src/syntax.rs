//! Go syntax: tree-sitter parsing and lowering of top-level declarations
//!
//! Only the parts of a file the constant pipeline needs survive lowering:
//! the package clause, imports with their comments, constant declarations
//! and type declarations. Everything else becomes [`Decl::Other`].

use std::path::{Path, PathBuf};

use tree_sitter::{Node, Parser as TSParser, Tree};

use crate::error::{ParserError, ParserResult};
use crate::quote::unquote;
use crate::types::Position;

/// Parse Go source into a tree-sitter tree
pub fn parse_tree(source: &str) -> ParserResult<Tree> {
    let mut parser = TSParser::new();
    parser
        .set_language(&tree_sitter_go::LANGUAGE.into())
        .map_err(|e| ParserError::TreeSitter {
            message: format!("Failed to set language: {}", e),
        })?;
    parser
        .parse(source, None)
        .ok_or_else(|| ParserError::TreeSitter {
            message: "Failed to parse source".to_string(),
        })
}

/// A parsed Go source file
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub package_name: String,
    pub imports: Vec<ImportDecl>,
    pub decls: Vec<Decl>,
    /// The tree contains error or missing nodes somewhere
    pub has_errors: bool,
}

/// One import spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    /// Explicit local name (`_`, `.` or an alias)
    pub name: Option<String>,
    /// Unquoted import path
    pub path: String,
    /// Path literal as written
    pub literal: String,
    pub doc: String,
    pub comment: String,
    pub position: Position,
}

/// A top-level declaration
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Const(ConstDecl),
    Type(Vec<TypeSpec>),
    Other { kind: String },
}

/// A `const` declaration, grouped or not
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub specs: Vec<ConstSpec>,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstSpec {
    pub names: Vec<Ident>,
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
    /// The spec itself did not parse cleanly
    pub has_error: bool,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub position: Position,
}

impl Ident {
    pub fn is_blank(&self) -> bool {
        self.name == "_"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub name: String,
    pub ty: TypeExpr,
    /// `type A = B`
    pub alias: bool,
}

/// The type part of a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// `T`
    Named(String),
    /// `pkg.T`
    Qualified { package: String, name: String },
    /// Anything else, kept as source text
    Other(String),
}

/// Expression forms that can appear in constant declarations
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(String),
    Float(String),
    Imag(String),
    Rune(String),
    Str(String),
    Bool(bool),
    Iota,
    Ident(String),
    Selector { operand: Box<Expr>, field: String },
    Paren(Box<Expr>),
    Unary { op: String, operand: Box<Expr> },
    Binary { op: String, left: Box<Expr>, right: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// Not a constant expression form; carries the node kind
    Unsupported(String),
}

/// Parse and lower one Go file
pub fn parse_source(path: &Path, source: &str) -> ParserResult<SourceFile> {
    let tree = parse_tree(source)?;
    let root = tree.root_node();
    let lowering = Lowering::new(source, root);

    let mut package_name = String::new();
    let mut imports = Vec::new();
    let mut decls = Vec::new();

    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        match child.kind() {
            "package_clause" => {
                let mut inner = child.walk();
                if let Some(ident) = child
                    .named_children(&mut inner)
                    .find(|n| n.kind() == "package_identifier")
                {
                    package_name = lowering.text(ident).to_string();
                };
            }
            "import_declaration" => lowering.lower_imports(child, &mut imports),
            "const_declaration" => decls.push(Decl::Const(lowering.lower_const_decl(child))),
            "type_declaration" => decls.push(Decl::Type(lowering.lower_type_decl(child))),
            "comment" => {}
            kind => decls.push(Decl::Other {
                kind: kind.to_string(),
            }),
        }
    }

    Ok(SourceFile {
        path: path.to_path_buf(),
        package_name,
        imports,
        decls,
        has_errors: root.has_error(),
    })
}

/// A comment with the layout facts needed for grouping
struct CommentInfo<'a> {
    text: &'a str,
    start_row: usize,
    end_row: usize,
    start_byte: usize,
    /// Nothing but whitespace precedes the comment on its line
    own_line: bool,
}

struct Lowering<'a> {
    source: &'a str,
    comments: Vec<CommentInfo<'a>>,
}

impl<'a> Lowering<'a> {
    fn new(source: &'a str, root: Node<'a>) -> Self {
        let mut comments = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "comment" {
                let line_start = source[..node.start_byte()].rfind('\n').map_or(0, |i| i + 1);
                comments.push(CommentInfo {
                    text: &source[node.start_byte()..node.end_byte()],
                    start_row: node.start_position().row,
                    end_row: node.end_position().row,
                    start_byte: node.start_byte(),
                    own_line: source[line_start..node.start_byte()].trim().is_empty(),
                });
                continue;
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'a>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        comments.sort_by_key(|c| c.start_byte);
        Self { source, comments }
    }

    fn text(&self, node: Node<'_>) -> &'a str {
        &self.source[node.start_byte()..node.end_byte()]
    }

    fn lower_imports(&self, decl: Node<'_>, imports: &mut Vec<ImportDecl>) {
        let mut cursor = decl.walk();
        for child in decl.named_children(&mut cursor) {
            match child.kind() {
                "import_spec" => imports.push(self.lower_import_spec(child, false)),
                "import_spec_list" => {
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        if spec.kind() == "import_spec" {
                            imports.push(self.lower_import_spec(spec, true));
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn lower_import_spec(&self, spec: Node<'_>, grouped: bool) -> ImportDecl {
        let name = spec
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string());
        let literal = spec
            .child_by_field_name("path")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let path = unquote(&literal).unwrap_or_default();
        let doc = if grouped {
            self.doc_comment(spec)
        } else {
            String::new()
        };
        ImportDecl {
            name,
            path,
            literal,
            doc,
            comment: self.line_comment(spec),
            position: spec.start_position().into(),
        }
    }

    /// The comment group ending on the line just above `node`.
    fn doc_comment(&self, node: Node<'_>) -> String {
        let row = node.start_position().row;
        let before = self
            .comments
            .iter()
            .take_while(|c| c.start_byte < node.start_byte())
            .collect::<Vec<_>>();
        let mut group: Vec<&str> = Vec::new();
        let mut next_row = row;
        for c in before.iter().rev() {
            if !c.own_line || c.end_row + 1 != next_row {
                break;
            }
            group.push(c.text);
            next_row = c.start_row;
        }
        group.reverse();
        comment_text(&group)
    }

    /// Comments starting on the line where `node` ends, after it.
    fn line_comment(&self, node: Node<'_>) -> String {
        let row = node.end_position().row;
        let group: Vec<&str> = self
            .comments
            .iter()
            .filter(|c| c.start_byte >= node.end_byte() && c.start_row == row)
            .map(|c| c.text)
            .collect();
        comment_text(&group)
    }

    fn lower_const_decl(&self, decl: Node<'_>) -> ConstDecl {
        let mut cursor = decl.walk();
        let specs = decl
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "const_spec")
            .map(|n| self.lower_const_spec(n))
            .collect();
        ConstDecl {
            specs,
            position: decl.start_position().into(),
        }
    }

    fn lower_const_spec(&self, spec: Node<'_>) -> ConstSpec {
        let mut cursor = spec.walk();
        let names = spec
            .children_by_field_name("name", &mut cursor)
            .filter(|n| n.kind() != ",")
            .map(|n| Ident {
                name: self.text(n).to_string(),
                position: n.start_position().into(),
            })
            .collect();
        let ty = spec.child_by_field_name("type").map(|n| self.lower_type(n));
        let values = spec
            .child_by_field_name("value")
            .map(|list| {
                let mut inner = list.walk();
                list.named_children(&mut inner)
                    .filter(|n| n.kind() != "comment")
                    .map(|n| self.lower_expr(n))
                    .collect()
            })
            .unwrap_or_default();
        ConstSpec {
            names,
            ty,
            values,
            has_error: spec.has_error(),
            position: spec.start_position().into(),
        }
    }

    fn lower_type_decl(&self, decl: Node<'_>) -> Vec<TypeSpec> {
        let mut cursor = decl.walk();
        decl.named_children(&mut cursor)
            .filter(|n| matches!(n.kind(), "type_spec" | "type_alias"))
            .filter_map(|n| {
                let name = self.text(n.child_by_field_name("name")?).to_string();
                let ty = self.lower_type(n.child_by_field_name("type")?);
                Some(TypeSpec {
                    name,
                    ty,
                    alias: n.kind() == "type_alias",
                })
            })
            .collect()
    }

    fn lower_type(&self, node: Node<'_>) -> TypeExpr {
        match node.kind() {
            "type_identifier" => TypeExpr::Named(self.text(node).to_string()),
            "qualified_type" => {
                match (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) {
                    (Some(package), Some(name)) => TypeExpr::Qualified {
                        package: self.text(package).to_string(),
                        name: self.text(name).to_string(),
                    },
                    _ => TypeExpr::Other(self.text(node).to_string()),
                }
            }
            "parenthesized_type" => match node.named_child(0) {
                Some(inner) => self.lower_type(inner),
                None => TypeExpr::Other(self.text(node).to_string()),
            },
            _ => TypeExpr::Other(self.text(node).to_string()),
        }
    }

    fn lower_expr(&self, node: Node<'_>) -> Expr {
        let text = self.text(node);
        match node.kind() {
            "int_literal" => Expr::Int(text.to_string()),
            "float_literal" => Expr::Float(text.to_string()),
            "imaginary_literal" => Expr::Imag(text.to_string()),
            "rune_literal" => Expr::Rune(text.to_string()),
            "interpreted_string_literal" | "raw_string_literal" => Expr::Str(text.to_string()),
            "true" => Expr::Bool(true),
            "false" => Expr::Bool(false),
            "iota" => Expr::Iota,
            "identifier" | "type_identifier" | "field_identifier" | "package_identifier" => {
                Expr::Ident(text.to_string())
            }
            "parenthesized_expression" | "parenthesized_type" => {
                match first_expr_child(node) {
                    Some(inner) => Expr::Paren(Box::new(self.lower_expr(inner))),
                    None => Expr::Unsupported(node.kind().to_string()),
                }
            }
            "unary_expression" => {
                match (
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("operand"),
                ) {
                    (Some(op), Some(operand)) => Expr::Unary {
                        op: self.text(op).to_string(),
                        operand: Box::new(self.lower_expr(operand)),
                    },
                    _ => Expr::Unsupported(node.kind().to_string()),
                }
            }
            "binary_expression" => {
                match (
                    node.child_by_field_name("left"),
                    node.child_by_field_name("operator"),
                    node.child_by_field_name("right"),
                ) {
                    (Some(left), Some(op), Some(right)) => Expr::Binary {
                        op: self.text(op).to_string(),
                        left: Box::new(self.lower_expr(left)),
                        right: Box::new(self.lower_expr(right)),
                    },
                    _ => Expr::Unsupported(node.kind().to_string()),
                }
            }
            "selector_expression" => {
                match (
                    node.child_by_field_name("operand"),
                    node.child_by_field_name("field"),
                ) {
                    (Some(operand), Some(field)) => Expr::Selector {
                        operand: Box::new(self.lower_expr(operand)),
                        field: self.text(field).to_string(),
                    },
                    _ => Expr::Unsupported(node.kind().to_string()),
                }
            }
            "qualified_type" => {
                match (
                    node.child_by_field_name("package"),
                    node.child_by_field_name("name"),
                ) {
                    (Some(package), Some(name)) => Expr::Selector {
                        operand: Box::new(Expr::Ident(self.text(package).to_string())),
                        field: self.text(name).to_string(),
                    },
                    _ => Expr::Unsupported(node.kind().to_string()),
                }
            }
            "call_expression" => {
                let func = node.child_by_field_name("function");
                let args = node.child_by_field_name("arguments");
                match (func, args) {
                    (Some(func), Some(args)) => {
                        let mut cursor = args.walk();
                        let args = args
                            .named_children(&mut cursor)
                            .filter(|n| n.kind() != "comment")
                            .map(|n| self.lower_expr(n))
                            .collect();
                        Expr::Call {
                            func: Box::new(self.lower_expr(func)),
                            args,
                        }
                    }
                    _ => Expr::Unsupported(node.kind().to_string()),
                }
            }
            "type_conversion_expression" => {
                match (
                    node.child_by_field_name("type"),
                    node.child_by_field_name("operand"),
                ) {
                    (Some(ty), Some(operand)) => Expr::Call {
                        func: Box::new(self.lower_expr(ty)),
                        args: vec![self.lower_expr(operand)],
                    },
                    _ => Expr::Unsupported(node.kind().to_string()),
                }
            }
            kind => Expr::Unsupported(kind.to_string()),
        }
    }
}

fn first_expr_child<'t>(node: Node<'t>) -> Option<Node<'t>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|n| n.kind() != "comment");
    found
}

/// Text of a comment group with comment markers removed.
///
/// Line comments lose `//` and one following space, block comments lose
/// their delimiters and tool directives such as `//go:build` are dropped.
/// Trailing spaces are trimmed, leading and trailing blank lines removed and
/// runs of blank lines collapsed. Non-empty results end in a newline.
pub fn comment_text(comments: &[&str]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for comment in comments {
        if let Some(body) = comment.strip_prefix("//") {
            if is_directive(body) {
                continue;
            }
            let body = body.strip_prefix(' ').unwrap_or(body);
            lines.push(body.to_string());
        } else if let Some(body) = comment.strip_prefix("/*") {
            let body = body.strip_suffix("*/").unwrap_or(body);
            lines.extend(body.split('\n').map(str::to_string));
        }
    }

    for line in lines.iter_mut() {
        let trimmed = line.trim_end().len();
        line.truncate(trimmed);
    }

    let mut out: Vec<&str> = Vec::new();
    for line in &lines {
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    if out.is_empty() {
        return String::new();
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}

fn is_directive(body: &str) -> bool {
    if body.starts_with("line ") || body.starts_with("extern ") || body.starts_with("export ") {
        return true;
    }
    // //tool:name form, e.g. //go:generate
    let Some(colon) = body.find(':') else {
        return false;
    };
    let (tool, rest) = body.split_at(colon);
    !tool.is_empty()
        && tool.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        && rest[1..].starts_with(|c: char| c.is_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> SourceFile {
        parse_source(Path::new("test.go"), source).unwrap()
    }

    #[test]
    fn test_package_and_decls() {
        let file = parse(
            "package days\n\ntype Day int32\n\nconst (\n\tMonday Day = iota\n\tTuesday\n)\n\nfunc f() {}\n",
        );
        assert_eq!(file.package_name, "days");
        assert!(!file.has_errors);
        assert_eq!(file.decls.len(), 3);
        match &file.decls[0] {
            Decl::Type(specs) => {
                assert_eq!(specs[0].name, "Day");
                assert_eq!(specs[0].ty, TypeExpr::Named("int32".to_string()));
            }
            other => panic!("unexpected decl {:?}", other),
        }
        match &file.decls[1] {
            Decl::Const(decl) => {
                assert_eq!(decl.specs.len(), 2);
                assert_eq!(decl.specs[0].names[0].name, "Monday");
                assert_eq!(decl.specs[0].ty, Some(TypeExpr::Named("Day".to_string())));
                assert_eq!(decl.specs[0].values, vec![Expr::Iota]);
                assert!(decl.specs[1].ty.is_none());
                assert!(decl.specs[1].values.is_empty());
            }
            other => panic!("unexpected decl {:?}", other),
        }
        assert!(matches!(file.decls[2], Decl::Other { .. }));
    }

    #[test]
    fn test_multi_name_spec_and_expressions() {
        let file = parse("package p\n\nconst a, _, c = 1 << 2, -x, os.ModeDir\n");
        let Decl::Const(decl) = &file.decls[0] else {
            panic!("expected const decl");
        };
        let spec = &decl.specs[0];
        let names: Vec<_> = spec.names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "_", "c"]);
        assert!(spec.names[1].is_blank());
        assert_eq!(spec.values.len(), 3);
        assert!(matches!(&spec.values[0], Expr::Binary { op, .. } if op == "<<"));
        assert!(matches!(&spec.values[1], Expr::Unary { op, .. } if op == "-"));
        assert!(matches!(&spec.values[2], Expr::Selector { field, .. } if field == "ModeDir"));
    }

    #[test]
    fn test_qualified_const_type() {
        let file = parse("package p\n\nimport \"os\"\n\nconst Mode os.FileMode = 0755\n");
        let Decl::Const(decl) = &file.decls[0] else {
            panic!("expected const decl");
        };
        assert_eq!(
            decl.specs[0].ty,
            Some(TypeExpr::Qualified {
                package: "os".to_string(),
                name: "FileMode".to_string()
            })
        );
    }

    #[test]
    fn test_import_comments() {
        let file = parse(
            "package p\n\nimport (\n\t// Formatting.\n\t\"fmt\"\n\tmr \"math/rand\" // random\n\t_ \"embed\"\n)\n",
        );
        assert_eq!(file.imports.len(), 3);
        assert_eq!(file.imports[0].path, "fmt");
        assert_eq!(file.imports[0].literal, "\"fmt\"");
        assert_eq!(file.imports[0].doc, "Formatting.\n");
        assert_eq!(file.imports[1].name.as_deref(), Some("mr"));
        assert_eq!(file.imports[1].comment, "random\n");
        assert_eq!(file.imports[1].doc, "");
        assert_eq!(file.imports[2].name.as_deref(), Some("_"));
    }

    #[test]
    fn test_syntax_errors_are_flagged() {
        let file = parse("package p\n\nconst (\n\tA = 1 +\n)\n");
        assert!(file.has_errors);
    }

    #[test]
    fn test_comment_text() {
        assert_eq!(comment_text(&["// hello", "//  world  "]), "hello\n world\n");
        assert_eq!(comment_text(&["/* block\n\n\n text */"]), " block\n\n text\n");
        assert_eq!(comment_text(&["//go:generate stringer"]), "");
        assert_eq!(comment_text(&[]), "");
    }
}
