//! Canonical layout of generated Go source
//!
//! The text is parsed with tree-sitter and printed again token by token,
//! following gofmt's layout rules:
//!
//! - line breaks are kept, runs of blank lines collapse to one and
//!   top-level declarations of different kinds or with doc comments are
//!   set apart by a blank line
//! - indentation is one tab per bracket level; `case` clauses sit at the
//!   level of their `switch` and labels are outdented
//! - spacing inside a line is derived from the tokens, with gofmt's
//!   precedence-dependent spacing of binary operators
//! - grouped imports are sorted and duplicates dropped
//! - const/var groups, struct fields, keyed elements and trailing comments
//!   are aligned in columns
//!
//! Text that does not parse is rejected with the position of the first
//! syntax error.

use std::collections::{HashMap, HashSet};

use constconv_parsers::quote::unquote;
use constconv_parsers::syntax::parse_tree;
use tree_sitter::{Node, Tree};

use crate::error::FormatError;

/// Nodes printed as one token
const ATOMIC: &[&str] = &[
    "comment",
    "interpreted_string_literal",
    "raw_string_literal",
    "rune_literal",
];

const CASE_CLAUSES: &[&str] = &[
    "expression_case",
    "default_case",
    "type_case",
    "communication_case",
];

/// Statements whose `{` does not indent the case clauses
const SWITCHES: &[&str] = &[
    "expression_switch_statement",
    "type_switch_statement",
    "select_statement",
];

const ASSIGN_OPS: &[&str] = &[
    "=", ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "&^=",
];

/// Format Go source
pub fn format_source(source: &str) -> Result<String, FormatError> {
    let tree = parse(source)?;
    let (source, tree) = match sort_imports(source, &tree) {
        Some(sorted) => {
            let tree = parse(&sorted)?;
            (sorted, tree)
        }
        None => (source.to_string(), tree),
    };

    let mut annotations = Annotations::new(&source);
    annotations.mark_operators(tree.root_node(), 1);
    annotations.mark_columns(tree.root_node());

    let separated = separated_rows(tree.root_node());
    let mut collector = Collector::new(&source, annotations);
    collector.collect(tree.root_node());
    Ok(print(&collector.tokens, &separated))
}

/// Rows of top-level declarations that gofmt separates by a blank line:
/// every declaration whose keyword differs from the previous one, and every
/// declaration with a doc comment. The blank goes above the doc comment.
fn separated_rows(root: Node<'_>) -> HashSet<usize> {
    let mut rows = HashSet::new();
    let mut prev: Option<&str> = None;
    let mut prev_end: Option<usize> = None;
    let mut doc_start: Option<(usize, usize)> = None;
    let mut cursor = root.walk();
    for node in root.named_children(&mut cursor) {
        let start = node.start_position().row;
        if node.kind() == "comment" {
            // trailing comment of the previous declaration
            if prev_end == Some(start) {
                continue;
            }
            doc_start = match doc_start {
                Some((first, last)) if last + 1 >= start => Some((first, node.end_position().row)),
                _ => Some((start, node.end_position().row)),
            };
            continue;
        }
        let doc = doc_start
            .take()
            .filter(|(_, last)| last + 1 == start)
            .map(|(first, _)| first);
        let keyword = match node.kind() {
            "method_declaration" => "function_declaration",
            kind => kind,
        };
        if let Some(prev) = prev {
            if prev != keyword || doc.is_some() {
                rows.insert(doc.unwrap_or(start));
            }
        }
        prev = Some(keyword);
        prev_end = Some(node.end_position().row);
    }
    rows
}

fn parse(source: &str) -> Result<Tree, FormatError> {
    let tree = parse_tree(source).map_err(|e| FormatError {
        line: 1,
        column: 1,
        message: e.to_string(),
    })?;
    if let Some(node) = first_error(tree.root_node()) {
        let position = node.start_position();
        let message = if node.is_missing() {
            format!("missing {}", node.kind())
        } else {
            let text = source.get(node.byte_range()).unwrap_or_default();
            let line = text.lines().next().unwrap_or_default();
            format!("unexpected {:?}", line)
        };
        return Err(FormatError {
            line: position.row + 1,
            column: position.column + 1,
            message,
        });
    }
    Ok(tree)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().find_map(first_error)
}

fn text_of<'s>(source: &'s str, node: Node<'_>) -> &'s str {
    source.get(node.byte_range()).unwrap_or_default()
}

fn precedence(op: &str) -> usize {
    match op {
        "*" | "/" | "%" | "<<" | ">>" | "&" | "&^" => 5,
        "+" | "-" | "|" | "^" => 4,
        "==" | "!=" | "<" | "<=" | ">" | ">=" => 3,
        "&&" => 2,
        "||" => 1,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// import sorting
// ---------------------------------------------------------------------------

struct ImportLine<'s> {
    key: (String, String),
    lines: Vec<&'s str>,
}

/// Sort each run of grouped imports. Returns `None` when nothing moved.
fn sort_imports(source: &str, tree: &Tree) -> Option<String> {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut replacements: Vec<(usize, usize, Vec<&str>)> = Vec::new();

    let root = tree.root_node();
    let mut cursor = root.walk();
    for decl in root.children(&mut cursor) {
        if decl.kind() != "import_declaration" {
            continue;
        }
        let mut inner = decl.walk();
        for list in decl.children(&mut inner) {
            if list.kind() == "import_spec_list" {
                if let Some(replacement) = sorted_import_list(source, &lines, list) {
                    replacements.push(replacement);
                }
            }
        }
    }

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    let mut next = 0;
    for (start, end, replacement) in replacements {
        out.extend_from_slice(&lines[next..start]);
        out.extend(replacement);
        next = end;
    }
    out.extend_from_slice(&lines[next..]);
    let sorted = out.join("\n");
    (sorted != source).then_some(sorted)
}

/// Rows strictly inside the parentheses, rebuilt with every run sorted
fn sorted_import_list<'s>(
    source: &str,
    lines: &[&'s str],
    list: Node<'_>,
) -> Option<(usize, usize, Vec<&'s str>)> {
    let open = list.start_position().row;
    let close = list.end_position().row;
    let mut keys: HashMap<usize, (String, String)> = HashMap::new();

    let mut cursor = list.walk();
    for spec in list.named_children(&mut cursor) {
        if spec.kind() != "import_spec" {
            continue;
        }
        let row = spec.start_position().row;
        // only one spec per row, on its own line inside the parens
        if row <= open || row >= close || spec.end_position().row != row || keys.contains_key(&row) {
            return None;
        }
        let path = spec
            .child_by_field_name("path")
            .map(|n| text_of(source, n))
            .unwrap_or_default();
        let path = unquote(path).unwrap_or_else(|_| path.to_string());
        let name = spec
            .child_by_field_name("name")
            .map(|n| text_of(source, n).to_string())
            .unwrap_or_default();
        keys.insert(row, (path, name));
    }

    let mut rebuilt: Vec<&'s str> = Vec::new();
    let mut run: Vec<ImportLine<'s>> = Vec::new();
    let mut pending: Vec<&'s str> = Vec::new();
    for (row, &line) in lines.iter().enumerate().take(close).skip(open + 1) {
        if line.trim().is_empty() {
            flush_run(&mut run, &mut pending, &mut rebuilt);
            rebuilt.push(line);
            continue;
        }
        match keys.remove(&row) {
            Some(key) => {
                let mut item = std::mem::take(&mut pending);
                item.push(line);
                run.push(ImportLine { key, lines: item });
            }
            // comments travel with the next import
            None => pending.push(line),
        }
    }
    flush_run(&mut run, &mut pending, &mut rebuilt);
    Some((open + 1, close, rebuilt))
}

fn flush_run<'s>(run: &mut Vec<ImportLine<'s>>, pending: &mut Vec<&'s str>, out: &mut Vec<&'s str>) {
    run.sort_by(|a, b| a.key.cmp(&b.key));
    run.dedup_by(|later, earlier| later.key == earlier.key);
    for item in run.drain(..) {
        out.extend(item.lines);
    }
    out.append(pending);
}

// ---------------------------------------------------------------------------
// annotations
// ---------------------------------------------------------------------------

struct Annotations<'s> {
    source: &'s str,
    /// Binary operators printed without surrounding blanks
    tight: HashSet<usize>,
    /// Slice colons printed with blanks next to their indices
    loose: HashSet<usize>,
    /// Column separators before the token starting at a byte offset
    breaks: HashMap<usize, usize>,
}

impl<'s> Annotations<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            tight: HashSet::new(),
            loose: HashSet::new(),
            breaks: HashMap::new(),
        }
    }

    fn operator<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("operator")
    }

    fn precedence_of(&self, node: Node<'_>) -> usize {
        self.operator(node)
            .map(|op| precedence(text_of(self.source, op)))
            .unwrap_or_default()
    }

    /// Which precedence levels appear in a chain of binary expressions
    fn walk_binary(&self, node: Node<'_>) -> (bool, bool, usize) {
        let prec = self.precedence_of(node);
        let mut has4 = prec == 4;
        let mut has5 = prec == 5;
        let mut max_problem = 0;

        if let Some(left) = node.child_by_field_name("left") {
            if left.kind() == "binary_expression" && self.precedence_of(left) >= prec {
                let (h4, h5, problem) = self.walk_binary(left);
                has4 |= h4;
                has5 |= h5;
                max_problem = max_problem.max(problem);
            }
        }

        if let Some(right) = node.child_by_field_name("right") {
            match right.kind() {
                "binary_expression" if self.precedence_of(right) > prec => {
                    let (h4, h5, problem) = self.walk_binary(right);
                    has4 |= h4;
                    has5 |= h5;
                    max_problem = max_problem.max(problem);
                }
                "unary_expression" => {
                    let op = self.operator(node).map(|n| text_of(self.source, n));
                    let unary = self.operator(right).map(|n| text_of(self.source, n));
                    if let (Some(op), Some(unary)) = (op, unary) {
                        // `a / *p` must not print as a comment opener
                        match (op, unary) {
                            ("/", "*") | ("&", "&") | ("&", "^") => max_problem = 5,
                            ("+", "+") | ("-", "-") => max_problem = max_problem.max(4),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
        (has4, has5, max_problem)
    }

    fn cutoff(&self, node: Node<'_>, depth: usize) -> usize {
        let (has4, has5, max_problem) = self.walk_binary(node);
        if max_problem > 0 {
            return max_problem + 1;
        }
        match (has4 && has5, depth == 1) {
            (true, true) => 5,
            (true, false) => 4,
            (false, true) => 6,
            (false, false) => 4,
        }
    }

    /// Decide blanks around every binary operator
    fn mark_operators(&mut self, node: Node<'_>, depth: usize) {
        let mut cursor = node.walk();
        match node.kind() {
            "binary_expression" => {
                let prec = self.precedence_of(node);
                if prec >= self.cutoff(node, depth) {
                    if let Some(op) = self.operator(node) {
                        self.tight.insert(op.id());
                    }
                }
                if let Some(left) = node.child_by_field_name("left") {
                    let same = left.kind() == "binary_expression" && self.precedence_of(left) == prec;
                    self.mark_operators(left, if same { depth } else { depth + 1 });
                }
                if let Some(right) = node.child_by_field_name("right") {
                    self.mark_operators(right, depth + 1);
                }
            }
            "parenthesized_expression" => {
                let inner = if depth > 1 { depth - 1 } else { depth };
                for child in node.named_children(&mut cursor) {
                    self.mark_operators(child, inner);
                }
            }
            "call_expression" => {
                let args = node.child_by_field_name("arguments");
                let multiple = args.is_some_and(|a| a.named_child_count() > 1);
                let depth = if multiple { depth + 1 } else { depth };
                if let Some(function) = node.child_by_field_name("function") {
                    self.mark_operators(function, depth);
                }
                if let Some(args) = args {
                    let mut inner = args.walk();
                    for arg in args.named_children(&mut inner) {
                        self.mark_operators(arg, depth);
                    }
                }
            }
            "slice_expression" => {
                let indices: Vec<Node<'_>> = ["start", "end", "capacity"]
                    .into_iter()
                    .filter_map(|field| node.child_by_field_name(field))
                    .collect();
                // `s[a+1 : b]` but `s[a+1:]` and `f(s[a+1:b], c)`
                if depth <= 1 && indices.len() > 1 && indices.iter().any(|i| i.kind() == "binary_expression") {
                    let colons: Vec<usize> = node
                        .children(&mut cursor)
                        .filter(|child| !child.is_named() && child.kind() == ":")
                        .map(|child| child.id())
                        .collect();
                    self.loose.extend(colons);
                }
                if let Some(operand) = node.child_by_field_name("operand") {
                    self.mark_operators(operand, depth);
                }
                for index in indices {
                    self.mark_operators(index, depth + 1);
                }
            }
            "index_expression" => {
                let operand = node.child_by_field_name("operand").map(|n| n.id());
                for child in node.named_children(&mut cursor) {
                    let d = if Some(child.id()) == operand { depth } else { depth + 1 };
                    self.mark_operators(child, d);
                }
            }
            "unary_expression" | "selector_expression" | "type_assertion_expression" => {
                for child in node.named_children(&mut cursor) {
                    self.mark_operators(child, depth);
                }
            }
            _ => {
                for child in node.named_children(&mut cursor) {
                    self.mark_operators(child, 1);
                }
            }
        }
    }

    fn set_break(&mut self, node: Node<'_>, count: usize) {
        self.breaks.insert(node.start_byte(), count);
    }

    fn trailing_comment<'t>(node: Node<'t>) -> Option<Node<'t>> {
        node.next_named_sibling()
            .filter(|n| n.kind() == "comment" && n.start_position().row == node.end_position().row)
    }

    /// Place column separators for aligned constructs
    fn mark_columns(&mut self, node: Node<'_>) {
        match node.kind() {
            "const_declaration" | "var_declaration" => self.value_spec_columns(node),
            "field_declaration_list" => self.field_columns(node),
            "literal_value" => self.keyed_element_columns(node),
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.mark_columns(child);
        }
    }

    fn value_spec_columns(&mut self, decl: Node<'_>) {
        let mut cursor = decl.walk();
        let container = decl
            .named_children(&mut cursor)
            .find(|n| n.kind() == "var_spec_list")
            .unwrap_or(decl);
        let mut inner = container.walk();
        let specs: Vec<Node<'_>> = container
            .named_children(&mut inner)
            .filter(|n| matches!(n.kind(), "const_spec" | "var_spec"))
            .collect();
        if specs.len() < 2 {
            return;
        }

        let keep = keep_type_column(&specs);
        for (spec, keep_type) in specs.iter().zip(keep) {
            let ty = spec.child_by_field_name("type");
            let value = spec.child_by_field_name("value");
            let mut spec_cursor = spec.walk();
            let assign = spec.children(&mut spec_cursor).find(|n| n.kind() == "=");

            let mut extra = 3;
            if ty.is_some() || keep_type {
                extra -= 1;
            }
            if let Some(ty) = ty {
                self.set_break(ty, 1);
            }
            if let (Some(assign), Some(_)) = (assign, value) {
                self.set_break(assign, if ty.is_none() && keep_type { 2 } else { 1 });
                extra -= 1;
            }
            if let Some(comment) = Self::trailing_comment(*spec) {
                self.set_break(comment, extra + 1);
            }
        }
    }

    fn field_columns(&mut self, list: Node<'_>) {
        if list.start_position().row == list.end_position().row {
            return;
        }
        let mut cursor = list.walk();
        let fields: Vec<Node<'_>> = list
            .named_children(&mut cursor)
            .filter(|n| n.kind() == "field_declaration")
            .collect();
        for field in fields {
            let named = field.child_by_field_name("name").is_some();
            let mut extra = if named { 1 } else { 2 };
            if named {
                if let Some(ty) = field.child_by_field_name("type") {
                    self.set_break(ty, 1);
                }
            }
            if let Some(tag) = field.child_by_field_name("tag") {
                self.set_break(tag, 1);
                extra = 0;
            }
            if let Some(comment) = Self::trailing_comment(field) {
                self.set_break(comment, extra + 1);
            }
        }
    }

    fn keyed_element_columns(&mut self, literal: Node<'_>) {
        let mut cursor = literal.walk();
        let elements: Vec<Node<'_>> = literal
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();
        if elements.len() < 2 {
            return;
        }
        let mut prev_row = literal.start_position().row;
        for element in elements {
            let row = element.start_position().row;
            if element.kind() == "keyed_element" && row > prev_row {
                let count = element.named_child_count();
                let value = count.checked_sub(1).and_then(|i| element.named_child(i as _));
                if let Some(value) = value.filter(|v| v.start_position().row == row && count > 1) {
                    self.set_break(value, 1);
                }
            }
            prev_row = element.end_position().row;
        }
    }
}

/// Whether each spec of a group keeps an (possibly empty) type column.
///
/// Within a run of specs with values the column is kept as soon as one
/// of them has a type.
fn keep_type_column(specs: &[Node<'_>]) -> Vec<bool> {
    let mut keep = vec![false; specs.len()];
    let mut run: Option<(usize, bool)> = None;
    for (i, spec) in specs.iter().enumerate() {
        let has_values = spec.child_by_field_name("value").is_some();
        let has_type = spec.child_by_field_name("type").is_some();
        run = match (run, has_values) {
            (None, true) => Some((i, has_type)),
            (Some((start, keep_type)), true) => Some((start, keep_type || has_type)),
            (Some((start, keep_type)), false) => {
                keep[start..i].iter_mut().for_each(|k| *k = keep_type);
                None
            }
            (None, false) => None,
        };
    }
    if let Some((start, keep_type)) = run {
        keep[start..].iter_mut().for_each(|k| *k = keep_type);
    }
    keep
}

// ---------------------------------------------------------------------------
// tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Plain,
    Comment,
    Open { indents: bool },
    Close,
    Binary { tight: bool },
    Unary,
}

#[derive(Debug, Clone)]
struct Token<'s> {
    text: &'s str,
    kind: &'static str,
    parent: &'static str,
    named: bool,
    start_row: usize,
    end_row: usize,
    role: Role,
    /// Fixed spacing against the previous token
    space_before: Option<bool>,
    /// Column separators before this token
    breaks: usize,
    /// Case clauses opened on earlier rows
    case_depth: usize,
    label: bool,
    /// Slice colon separated from its indices
    loose: bool,
}

impl Token<'_> {
    fn is_keyword(&self) -> bool {
        !self.named && !self.text.is_empty() && self.text.bytes().all(|b| b.is_ascii_lowercase())
    }

    fn continues_line(&self) -> bool {
        matches!(self.role, Role::Binary { .. }) || ASSIGN_OPS.contains(&self.text)
    }
}

struct Collector<'s> {
    source: &'s str,
    annotations: Annotations<'s>,
    cases: Vec<usize>,
    tokens: Vec<Token<'s>>,
}

impl<'s> Collector<'s> {
    fn new(source: &'s str, annotations: Annotations<'s>) -> Self {
        Self {
            source,
            annotations,
            cases: Vec::new(),
            tokens: Vec::new(),
        }
    }

    fn collect(&mut self, node: Node<'_>) {
        let is_case = CASE_CLAUSES.contains(&node.kind());
        if is_case {
            self.cases.push(node.start_position().row);
        }
        if node.child_count() == 0 || ATOMIC.contains(&node.kind()) {
            self.leaf(node);
        } else {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                self.collect(child);
            }
        }
        if is_case {
            self.cases.pop();
        }
    }

    fn leaf(&mut self, node: Node<'_>) {
        let text = text_of(self.source, node);
        // statement terminators and zero-width nodes
        if text.trim().is_empty() {
            return;
        }
        let kind = node.kind();
        let parent = node.parent();
        let parent_kind = parent.map(|p| p.kind()).unwrap_or_default();
        let start_row = node.start_position().row;
        let comment = kind == "comment";
        let text = if comment { text.trim_end() } else { text };

        let role = if comment {
            Role::Comment
        } else if node.is_named() {
            Role::Plain
        } else if matches!(text, "(" | "[" | "{") {
            Role::Open {
                indents: !(text == "{" && SWITCHES.contains(&parent_kind)),
            }
        } else if matches!(text, ")" | "]" | "}") {
            Role::Close
        } else if parent_kind == "binary_expression" {
            Role::Binary {
                tight: self.annotations.tight.contains(&node.id()),
            }
        } else if matches!(parent_kind, "unary_expression" | "pointer_type") {
            Role::Unary
        } else {
            Role::Plain
        };

        let mut breaks = self.annotations.breaks.remove(&node.start_byte()).unwrap_or_default();
        let after_code = self.tokens.last().is_some_and(|t| t.end_row == start_row);
        if comment && breaks == 0 && after_code && text.starts_with("//") {
            breaks = 1;
        }

        self.tokens.push(Token {
            text,
            kind,
            parent: parent_kind,
            named: node.is_named(),
            start_row,
            end_row: node.end_position().row,
            role,
            space_before: parent.and_then(|p| space_override(p, text)),
            breaks,
            case_depth: self.cases.iter().filter(|&&row| row < start_row).count(),
            label: parent_kind == "labeled_statement" && kind == "label_name",
            loose: self.annotations.loose.contains(&node.id()),
        });
    }
}

/// Spacing fixed by the surrounding construct rather than the token pair
fn space_override(parent: Node<'_>, text: &str) -> Option<bool> {
    let one_line = |n: Node<'_>| n.start_position().row == n.end_position().row;
    match (text, parent.kind()) {
        // `T{` but `k: {` for elided element types
        ("{", "literal_value") => parent
            .parent()
            .is_some_and(|owner| owner.kind() == "composite_literal")
            .then_some(false),
        // `struct{ x int }` but `struct {` when the fields span lines
        ("{", "field_declaration_list") | ("{", "interface_type") => Some(!one_line(parent)),
        ("(", "parameter_list") => {
            let owner = parent.parent()?;
            let is_field = |field: &str| owner.child_by_field_name(field).is_some_and(|n| n.id() == parent.id());
            // method receivers and result lists
            (is_field("receiver") || is_field("result")).then_some(true)
        }
        _ => None,
    }
}

fn space_between(a: &Token<'_>, b: &Token<'_>) -> bool {
    if let Some(space) = b.space_before {
        return space;
    }
    if a.role == Role::Comment || b.role == Role::Comment {
        return true;
    }
    if b.loose {
        return !matches!(a.text, "[" | ":");
    }
    if a.loose {
        return !matches!(b.text, "]" | ":");
    }
    if matches!(b.text, "," | ";" | ":" | "++" | "--") {
        return false;
    }
    if matches!(a.text, "," | ";") {
        return true;
    }
    if a.text == ":" {
        return a.parent != "slice_expression";
    }
    if a.kind == "dot" || b.kind == "dot" {
        return true;
    }
    if a.text == "." || b.text == "." {
        return false;
    }
    if matches!(a.text, "(" | "[") || matches!(b.text, ")" | "]") {
        return false;
    }
    if a.text == "{" {
        return b.text != "}" && a.parent != "literal_value";
    }
    if b.text == "{" {
        return !matches!(a.role, Role::Open { .. });
    }
    if b.text == "}" {
        return b.parent != "literal_value";
    }
    if let Role::Binary { tight } = a.role {
        return !tight;
    }
    if let Role::Binary { tight } = b.role {
        return !tight;
    }
    if a.role == Role::Unary {
        return false;
    }
    if ASSIGN_OPS.contains(&a.text) || ASSIGN_OPS.contains(&b.text) {
        return true;
    }
    if a.text == "<-" || b.text == "<-" {
        let chan_arrow = (a.text == "chan" && b.text == "<-") || (a.text == "<-" && b.text == "chan");
        return !chan_arrow;
    }
    if b.text == "..." {
        return b.parent != "variadic_argument";
    }
    if a.text == "..." {
        return false;
    }
    if b.text == "(" {
        return a.is_keyword() && a.text != "func";
    }
    if b.text == "[" {
        let indexing = matches!(
            b.parent,
            "index_expression" | "slice_expression" | "type_arguments" | "type_parameter_list"
        );
        return !(indexing || a.text == "map" || a.text == "]");
    }
    if a.text == "]" {
        return false;
    }
    true
}

// ---------------------------------------------------------------------------
// printing
// ---------------------------------------------------------------------------

struct Line {
    indent: usize,
    blank_before: bool,
    cells: Vec<String>,
}

fn print(tokens: &[Token<'_>], separated: &HashSet<usize>) -> String {
    let tokens: Vec<&Token<'_>> = tokens
        .iter()
        .enumerate()
        .filter(|(i, t)| !(t.text == ";" && ends_line(tokens, *i)))
        .map(|(_, t)| t)
        .collect();

    let mut rows: Vec<Vec<&Token<'_>>> = Vec::new();
    let mut blank: Vec<bool> = Vec::new();
    let mut prev_end: Option<usize> = None;
    for &token in &tokens {
        match prev_end {
            Some(end) if token.start_row <= end => {
                if let Some(row) = rows.last_mut() {
                    row.push(token);
                }
            }
            _ => {
                blank.push(prev_end.is_some_and(|end| {
                    token.start_row > end + 1 || separated.contains(&token.start_row)
                }));
                rows.push(vec![token]);
            }
        }
        prev_end = Some(token.end_row);
    }

    let indents = indentation(&rows);
    let lines: Vec<Line> = rows
        .iter()
        .zip(indents)
        .zip(blank)
        .map(|((row, indent), blank_before)| Line {
            indent,
            blank_before,
            cells: cells(row),
        })
        .collect();

    let mut out = String::new();
    let mut start = 0;
    while start < lines.len() {
        let mut end = start + 1;
        while end < lines.len() && !lines[end].blank_before && lines[end].indent == lines[start].indent {
            end += 1;
        }
        let block: Vec<Vec<String>> = lines[start..end].iter().map(|l| l.cells.clone()).collect();
        for (line, text) in lines[start..end].iter().zip(align(&block)) {
            if line.blank_before {
                out.push('\n');
            }
            out.extend(std::iter::repeat('\t').take(line.indent));
            out.push_str(text.trim_end());
            out.push('\n');
        }
        start = end;
    }
    out
}

/// A `;` followed by nothing but comments on its row
fn ends_line(tokens: &[Token<'_>], index: usize) -> bool {
    let row = tokens[index].end_row;
    tokens[index + 1..]
        .iter()
        .find(|t| t.role != Role::Comment || t.start_row > row)
        .map_or(true, |t| t.start_row > row)
}

fn indentation(rows: &[Vec<&Token<'_>>]) -> Vec<usize> {
    // open brackets: (row index, indents)
    let mut stack: Vec<(usize, bool)> = Vec::new();
    let mut continuation = false;
    let mut levels = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let leading = row.iter().take_while(|t| t.role == Role::Close).count();
        for _ in 0..leading {
            stack.pop();
        }

        let mut depth = 0;
        let mut last_row = None;
        for &(opened, indenting) in &stack {
            if indenting && last_row != Some(opened) {
                depth += 1;
                last_row = Some(opened);
            }
        }
        depth += row[0].case_depth;
        if continuation {
            depth += 1;
        }
        if row[0].label {
            depth = depth.saturating_sub(1);
        }
        levels.push(depth);

        for token in &row[leading..] {
            match token.role {
                Role::Open { indents } => stack.push((index, indents)),
                Role::Close => {
                    stack.pop();
                }
                _ => {}
            }
        }

        let opened_here = stack.last().is_some_and(|&(opened, _)| opened == index);
        continuation = !opened_here
            && row
                .iter()
                .rev()
                .find(|t| t.role != Role::Comment)
                .is_some_and(|t| t.continues_line());
    }
    levels
}

fn cells(row: &[&Token<'_>]) -> Vec<String> {
    let mut cells = vec![String::new()];
    for (i, token) in row.iter().enumerate() {
        if i > 0 {
            if token.breaks > 0 {
                cells.extend(std::iter::repeat(String::new()).take(token.breaks));
            } else if space_between(row[i - 1], token) {
                if let Some(cell) = cells.last_mut() {
                    cell.push(' ');
                }
            }
        }
        if let Some(cell) = cells.last_mut() {
            cell.push_str(token.text);
        }
    }
    cells
}

/// Elastic tabstops over a block of lines.
///
/// Every cell but the last of a line is terminated by a column separator.
/// A column is as wide as its widest cell plus one, for as long as
/// consecutive lines have a cell in it. Columns of empty cells vanish.
fn align(lines: &[Vec<String>]) -> Vec<String> {
    struct Table<'a> {
        lines: &'a [Vec<String>],
        widths: Vec<usize>,
        out: Vec<String>,
    }

    impl Table<'_> {
        fn columns(&self, line: usize) -> usize {
            self.lines[line].len().saturating_sub(1)
        }

        fn format(&mut self, mut line0: usize, line1: usize) {
            let column = self.widths.len();
            let mut this = line0;
            while this < line1 {
                if column >= self.columns(this) {
                    this += 1;
                    continue;
                }
                self.write_lines(line0, this);
                line0 = this;

                let mut width = 0;
                let mut discardable = true;
                while this < line1 && column < self.columns(this) {
                    let cell = self.lines[this][column].chars().count();
                    width = width.max(cell + 1);
                    discardable &= cell == 0;
                    this += 1;
                }
                self.widths.push(if discardable { 0 } else { width });
                self.format(line0, this);
                self.widths.pop();
                line0 = this;
            }
            self.write_lines(line0, line1);
        }

        fn write_lines(&mut self, line0: usize, line1: usize) {
            for line in &self.lines[line0..line1] {
                let mut text = String::new();
                for (j, cell) in line.iter().enumerate() {
                    text.push_str(cell);
                    if let Some(&width) = self.widths.get(j) {
                        let pad = width.saturating_sub(cell.chars().count());
                        text.extend(std::iter::repeat(' ').take(pad));
                    }
                }
                self.out.push(text);
            }
        }
    }

    let mut table = Table {
        lines,
        widths: Vec::new(),
        out: Vec::with_capacity(lines.len()),
    };
    table.format(0, lines.len());
    table.out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reindents_switch() {
        let src = "package days\n\nfunc (d DayOfWeek) String() string {\nswitch d {\n    case Sunday:\nreturn \"Sunday\"\n  default:\n      return \"DayOfWeek(\"+strconv.Itoa(int(d))+\")\"\n}\n}\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package days\n\nfunc (d DayOfWeek) String() string {\n\tswitch d {\n\tcase Sunday:\n\t\treturn \"Sunday\"\n\tdefault:\n\t\treturn \"DayOfWeek(\" + strconv.Itoa(int(d)) + \")\"\n\t}\n}\n"
        );
    }

    #[test]
    fn test_sorts_and_dedups_imports() {
        let src = "package p\n\nimport (\n\t\"strconv\"\n  \"fmt\"\n\t// random numbers\n\tmr \"math/rand\"\n\t\"fmt\"\n\n\t\"os\"\n\t\"errors\"\n)\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nimport (\n\t\"fmt\"\n\t// random numbers\n\tmr \"math/rand\"\n\t\"strconv\"\n\n\t\"errors\"\n\t\"os\"\n)\n"
        );
    }

    #[test]
    fn test_aligns_const_group() {
        let src = "package p\n\nconst (\nA Kind = 1 // a\nBcd Kind = 100 // b\n\nX = 1\nLonger = 2\n)\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nconst (\n\tA   Kind = 1   // a\n\tBcd Kind = 100 // b\n\n\tX      = 1\n\tLonger = 2\n)\n"
        );
    }

    #[test]
    fn test_aligns_keyed_elements_and_comments() {
        let src = "package p\n\nvar names = map[Day]string{\nSunday: \"Sunday\", // first\nWed: \"Wednesday\",\n}\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nvar names = map[Day]string{\n\tSunday: \"Sunday\", // first\n\tWed:    \"Wednesday\",\n}\n"
        );
    }

    #[test]
    fn test_aligns_struct_fields() {
        let src = "package p\n\ntype T struct {\nName string `json:\"name\"`\nID int `json:\"id\"`\n}\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\ntype T struct {\n\tName string `json:\"name\"`\n\tID   int    `json:\"id\"`\n}\n"
        );
    }

    #[test]
    fn test_binary_operator_spacing() {
        let src = "package p\n\nconst A = 1<<iota\nconst B = 1 << (32 - 1 - 2)\n\nvar c = a * b + d\nvar e = f(a * b + c, d)\nvar g = x[i + 1]\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nconst A = 1 << iota\nconst B = 1 << (32 - 1 - 2)\n\nvar c = a*b + d\nvar e = f(a*b+c, d)\nvar g = x[i+1]\n"
        );
    }

    #[test]
    fn test_blank_lines_and_semicolons() {
        let src = "\n\npackage p\n\n\n\nfunc f() {\n\n\tx := 1;\n\n\n\tg(x)\n\n}\n\n\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nfunc f() {\n\n\tx := 1\n\n\tg(x)\n\n}\n"
        );
    }

    #[test]
    fn test_declaration_spacing() {
        let src = "package p\n\nfunc  f(xs ...int)(int,error){return len( xs ),nil}\n\nvar x []*T\n\ntype E struct{}\n\nfunc g() { for i:=0;i<3;i++ { h(xs...) } }\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nfunc f(xs ...int) (int, error) { return len(xs), nil }\n\nvar x []*T\n\ntype E struct{}\n\nfunc g() { for i := 0; i < 3; i++ { h(xs...) } }\n"
        );
    }

    #[test]
    fn test_variadic_spread() {
        let src = "package p\n\nfunc f(b, c []byte) []byte { return append(b, c ...) }\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nfunc f(b, c []byte) []byte { return append(b, c...) }\n"
        );
    }

    #[test]
    fn test_slice_colon_spacing() {
        let src = "package p\n\nfunc f(s []int, a, b int) {\n\tx := s[a+1 : b]\n\ty := s[a:b]\n\tz := s[a+1:]\n\tw := s[: b-1 : 8]\n\tg(s[a+1:b], x)\n}\n";
        assert_eq!(format_source(src).unwrap(), src);

        let compact = "package p\n\nvar x = s[a+1:b]\n";
        assert_eq!(
            format_source(compact).unwrap(),
            "package p\n\nvar x = s[a+1 : b]\n"
        );
    }

    #[test]
    fn test_elided_composite_elements() {
        let src = "package p\n\nvar m = map[string][2]int{\"a\":{1,2}}\n\nvar g = [][]int{{1, 2},{3}}\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nvar m = map[string][2]int{\"a\": {1, 2}}\n\nvar g = [][]int{{1, 2}, {3}}\n"
        );
    }

    #[test]
    fn test_separates_declarations() {
        let src = "package p\nimport \"fmt\"\nvar a = 1\nvar b = 2 // two\n// C is documented.\nconst C = 3\nfunc f() {}\nfunc g() {}\n// H too.\nfunc H() { fmt.Println() }\n";
        assert_eq!(
            format_source(src).unwrap(),
            "package p\n\nimport \"fmt\"\n\nvar a = 1\nvar b = 2 // two\n\n// C is documented.\nconst C = 3\n\nfunc f() {}\nfunc g() {}\n\n// H too.\nfunc H() { fmt.Println() }\n"
        );
    }

    #[test]
    fn test_syntax_error_position() {
        let err = format_source("package p\n\nfunc {\n").unwrap_err();
        assert_eq!(err.line, 3);
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let src = "package p\n\nimport (\n\"os\"\n\"fmt\"\n)\n\nconst (\nA os.FileMode = 1 << iota // a\nB\n)\n\nfunc f(m os.FileMode) string {\nswitch {\ncase m&A != 0:\nreturn fmt.Sprint(m)\n}\nreturn \"\"\n}\n";
        let once = format_source(src).unwrap();
        assert_eq!(format_source(&once).unwrap(), once);
    }
}
