//! Result data model shared with the generator

use serde::{Deserialize, Serialize};

/// Position in source code (0-based)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Create a new position
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Create position at start of file
    pub fn zero() -> Self {
        Self::new(0, 0)
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1) // 1-based for display
    }
}

impl From<tree_sitter::Point> for Position {
    fn from(point: tree_sitter::Point) -> Self {
        Self::new(point.row, point.column)
    }
}

/// Kind of a resolved constant value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Unknown,
    Bool,
    String,
    Int,
    Float,
    Complex,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Unknown => "Unknown",
            Kind::Bool => "Bool",
            Kind::String => "String",
            Kind::Int => "Int",
            Kind::Float => "Float",
            Kind::Complex => "Complex",
        }
    }
}

impl std::fmt::Display for Kind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved constant of the requested type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Value {
    /// The declared identifier
    pub name: String,
    /// Default display form, possibly rounded or shortened
    pub str: String,
    /// Exact form
    pub exact_str: String,
    pub kind: Kind,
}

impl Value {
    pub fn is_bool(&self) -> bool {
        self.kind == Kind::Bool
    }

    pub fn is_string(&self) -> bool {
        self.kind == Kind::String
    }

    pub fn is_int(&self) -> bool {
        self.kind == Kind::Int
    }

    pub fn is_float(&self) -> bool {
        self.kind == Kind::Float
    }

    pub fn is_complex(&self) -> bool {
        self.kind == Kind::Complex
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.str)
    }
}

/// An import spec of the primary package
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Import {
    /// Local name: empty, `_`, `.` or an alias such as `mathrand`
    pub name: String,
    /// Path literal as written, quotes included, e.g. `"math/rand"`
    pub path: String,
    /// Trailing line comment text
    pub comment: String,
    /// Doc comment text
    pub doc: String,
}

/// Constants collected for one requested type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TypeResult {
    /// Package declaring the constants, e.g. `os` of `os.FileMode`
    pub pkg_name: String,
    /// Bare type name, e.g. `FileMode`
    pub type_name: String,
    /// Type name as requested, e.g. `os.FileMode`
    pub rep_type_name: String,
    /// Constants in declaration order
    pub values: Vec<Value>,
    /// Imports of the primary package
    pub imports: Vec<Import>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display_is_one_based() {
        assert_eq!(Position::new(0, 0).to_string(), "1:1");
        assert_eq!(Position::new(9, 4).to_string(), "10:5");
    }

    #[test]
    fn test_value_kind_predicates() {
        let value = Value {
            name: "A".to_string(),
            str: "1.5".to_string(),
            exact_str: "3/2".to_string(),
            kind: Kind::Float,
        };
        assert!(value.is_float());
        assert!(!value.is_int());
        assert_eq!(value.to_string(), "1.5");
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(Kind::Complex.to_string(), "Complex");
        assert_eq!(Kind::Unknown.as_str(), "Unknown");
    }
}
