//! Constant expression evaluation
//!
//! Every package-level constant of a package is evaluated eagerly with Go's
//! rules for untyped and typed constants: `iota`, implicit repetition of the
//! previous expression list, promotion between numeric kinds and conversion
//! to the declared type's underlying basic type. Anything that cannot be
//! evaluated (cycles, overflow, unsupported forms) yields
//! [`ConstValue::Unknown`].

use std::collections::HashMap;

use num_bigint::BigInt;
use num_traits::{One, Signed, ToPrimitive, Zero};
use tracing::trace;

use crate::constant::{parse_float_literal, parse_int_literal, ConstValue, Rat};
use crate::quote::{unquote_bytes, unquote_rune};
use crate::symbols::{Constant, Package};
use crate::syntax::{Decl, Expr, SourceFile, TypeExpr};
use crate::types::Position;

const MAX_TYPE_DEPTH: usize = 32;

/// Underlying basic type of a typed constant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    Bool,
    String,
    Int { bits: u32, signed: bool },
    Float32,
    Float64,
    Complex64,
    Complex128,
}

impl BasicType {
    /// The predeclared type called `name`
    pub fn predeclared(name: &str) -> Option<Self> {
        let ty = match name {
            "bool" => BasicType::Bool,
            "string" => BasicType::String,
            "int" | "int64" => BasicType::Int { bits: 64, signed: true },
            "int8" => BasicType::Int { bits: 8, signed: true },
            "int16" => BasicType::Int { bits: 16, signed: true },
            "int32" | "rune" => BasicType::Int { bits: 32, signed: true },
            "uint" | "uint64" | "uintptr" => BasicType::Int { bits: 64, signed: false },
            "uint8" | "byte" => BasicType::Int { bits: 8, signed: false },
            "uint16" => BasicType::Int { bits: 16, signed: false },
            "uint32" => BasicType::Int { bits: 32, signed: false },
            "float32" => BasicType::Float32,
            "float64" => BasicType::Float64,
            "complex64" => BasicType::Complex64,
            "complex128" => BasicType::Complex128,
            _ => return None,
        };
        Some(ty)
    }

    fn real_part(self) -> Option<Self> {
        match self {
            BasicType::Complex64 => Some(BasicType::Float32),
            BasicType::Complex128 => Some(BasicType::Float64),
            _ => None,
        }
    }

    fn complex_of(self) -> Option<Self> {
        match self {
            BasicType::Float32 => Some(BasicType::Complex64),
            BasicType::Float64 => Some(BasicType::Complex128),
            _ => None,
        }
    }
}

/// Convert `value` to a constant of type `to`.
///
/// Values that are not representable become `Unknown`. Explicit
/// conversions additionally allow integer to string (rune) conversion.
pub fn convert(value: &ConstValue, to: BasicType, explicit: bool) -> ConstValue {
    match to {
        BasicType::Bool => match value {
            ConstValue::Bool(b) => ConstValue::Bool(*b),
            _ => ConstValue::Unknown,
        },
        BasicType::String => match value {
            ConstValue::String(s) => ConstValue::String(s.clone()),
            ConstValue::Int(i) if explicit => ConstValue::String(rune_string(i).into_bytes()),
            _ => ConstValue::Unknown,
        },
        BasicType::Int { bits, signed } => match value.to_int() {
            Some(i) if int_in_range(&i, bits, signed) => ConstValue::Int(i),
            _ => ConstValue::Unknown,
        },
        BasicType::Float32 | BasicType::Float64 => value
            .to_rat()
            .and_then(|r| round_float(&r, to))
            .map(ConstValue::Float)
            .unwrap_or(ConstValue::Unknown),
        BasicType::Complex64 | BasicType::Complex128 => {
            let part = if to == BasicType::Complex64 {
                BasicType::Float32
            } else {
                BasicType::Float64
            };
            let parts = match value {
                ConstValue::Complex(re, im) => Some((re.clone(), im.clone())),
                other => other.to_rat().map(|r| (r, Rat::zero())),
            };
            parts
                .and_then(|(re, im)| Some(ConstValue::Complex(round_float(&re, part)?, round_float(&im, part)?)))
                .unwrap_or(ConstValue::Unknown)
        }
    }
}

fn round_float(r: &Rat, to: BasicType) -> Option<Rat> {
    let f = if to == BasicType::Float32 { r.to_f32() } else { r.to_f64() };
    Rat::from_f64(f)
}

fn int_in_range(i: &BigInt, bits: u32, signed: bool) -> bool {
    if signed {
        let limit = BigInt::one() << (bits as usize - 1);
        *i >= -limit.clone() && *i < limit
    } else {
        !i.is_negative() && *i < (BigInt::one() << bits as usize)
    }
}

fn rune_string(i: &BigInt) -> String {
    i.to_u32()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
        .to_string()
}

/// A value together with its type (`None` when untyped)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typed {
    pub value: ConstValue,
    pub ty: Option<BasicType>,
}

impl Typed {
    fn untyped(value: ConstValue) -> Self {
        Self { value, ty: None }
    }

    fn unknown() -> Self {
        Self::untyped(ConstValue::Unknown)
    }

    /// Wrap the result of an operation, converting it to `ty` when typed
    fn finish(value: Option<ConstValue>, ty: Option<BasicType>) -> Self {
        let value = value.unwrap_or(ConstValue::Unknown);
        let value = match ty {
            Some(basic) if value != ConstValue::Unknown => convert(&value, basic, false),
            _ => value,
        };
        Self { value, ty }
    }
}

/// Import scope of one file: local package names and dot imports, as
/// indices into the evaluated dependency packages
#[derive(Debug, Clone, Default)]
pub struct FileScope {
    pub imports: HashMap<String, usize>,
    pub dot_imports: Vec<usize>,
}

/// Result of evaluating one package
#[derive(Debug, Default)]
pub struct Evaluated {
    pub constants: HashMap<String, Constant>,
    pub types: HashMap<String, BasicType>,
}

/// Evaluate all package-level constants declared in `files`.
///
/// `scopes[i]` describes the imports of `files[i]`; `deps` are packages
/// already evaluated.
pub fn evaluate_package(files: &[SourceFile], scopes: &[FileScope], deps: &[Package]) -> Evaluated {
    let mut evaluator = PackageEvaluator::new(files, scopes, deps);
    let mut constants = HashMap::new();
    for k in 0..evaluator.entries.len() {
        let typed = evaluator.value_of(k);
        let entry = evaluator.entries[k];
        trace!("const {} = {:?}", entry.name, typed.value);
        constants.entry(entry.name.to_string()).or_insert_with(|| Constant {
            name: entry.name.to_string(),
            value: typed.value,
            ty: typed.ty,
            file: files[entry.file].path.clone(),
            position: entry.position,
        });
    }
    let names: Vec<&str> = evaluator.types.keys().copied().collect();
    let mut types = HashMap::new();
    for name in names {
        if let Some(basic) = evaluator.resolve_type(&TypeExpr::Named(name.to_string()), 0, 0) {
            types.insert(name.to_string(), basic);
        }
    }
    Evaluated { constants, types }
}

#[derive(Debug, Clone, Copy)]
struct Entry<'a> {
    name: &'a str,
    ty: Option<&'a TypeExpr>,
    expr: Option<&'a Expr>,
    iota: usize,
    file: usize,
    position: Position,
}

enum State {
    Pending,
    Active,
    Done(Typed),
}

struct PackageEvaluator<'a> {
    scopes: &'a [FileScope],
    deps: &'a [Package],
    types: HashMap<&'a str, (&'a TypeExpr, usize)>,
    entries: Vec<Entry<'a>>,
    index: HashMap<&'a str, usize>,
    states: Vec<State>,
}

impl<'a> PackageEvaluator<'a> {
    fn new(files: &'a [SourceFile], scopes: &'a [FileScope], deps: &'a [Package]) -> Self {
        let mut types = HashMap::new();
        let mut entries = Vec::new();

        for (fi, file) in files.iter().enumerate() {
            for decl in &file.decls {
                match decl {
                    Decl::Type(specs) => {
                        for spec in specs {
                            types.entry(spec.name.as_str()).or_insert((&spec.ty, fi));
                        }
                    }
                    Decl::Const(decl) => {
                        let mut last: Option<(Option<&'a TypeExpr>, &'a [Expr])> = None;
                        for (iota, spec) in decl.specs.iter().enumerate() {
                            if spec.has_error {
                                continue;
                            }
                            let (ty, values) = if spec.ty.is_none() && spec.values.is_empty() {
                                match last {
                                    Some(inherited) => inherited,
                                    None => (None, &[][..]),
                                }
                            } else {
                                let current = (spec.ty.as_ref(), spec.values.as_slice());
                                last = Some(current);
                                current
                            };
                            for (j, ident) in spec.names.iter().enumerate() {
                                if ident.is_blank() {
                                    continue;
                                }
                                entries.push(Entry {
                                    name: &ident.name,
                                    ty,
                                    expr: values.get(j),
                                    iota,
                                    file: fi,
                                    position: ident.position,
                                });
                            }
                        }
                    }
                    Decl::Other { .. } => {}
                }
            }
        }

        let mut index = HashMap::new();
        for (k, entry) in entries.iter().enumerate() {
            index.entry(entry.name).or_insert(k);
        }
        let states = entries.iter().map(|_| State::Pending).collect();
        Self {
            scopes,
            deps,
            types,
            entries,
            index,
            states,
        }
    }

    fn value_of(&mut self, k: usize) -> Typed {
        match &self.states[k] {
            State::Done(typed) => return typed.clone(),
            State::Active => {
                trace!("initialization cycle through {}", self.entries[k].name);
                return Typed::unknown();
            }
            State::Pending => {}
        }
        self.states[k] = State::Active;
        let entry = self.entries[k];
        let typed = match entry.expr {
            None => Typed::unknown(),
            Some(expr) => {
                let value = self.eval(expr, entry.file, Some(entry.iota));
                match entry.ty.and_then(|ty| self.resolve_type(ty, entry.file, 0)) {
                    Some(basic) => Typed {
                        value: convert(&value.value, basic, false),
                        ty: Some(basic),
                    },
                    None => value,
                }
            }
        };
        self.states[k] = State::Done(typed.clone());
        typed
    }

    fn dep(&self, file: usize, local: &str) -> Option<&'a Package> {
        let deps = self.deps;
        self.scopes
            .get(file)?
            .imports
            .get(local)
            .and_then(|&i| deps.get(i))
    }

    fn resolve_type(&self, ty: &TypeExpr, file: usize, depth: usize) -> Option<BasicType> {
        if depth > MAX_TYPE_DEPTH {
            return None;
        }
        match ty {
            TypeExpr::Named(name) => match self.types.get(name.as_str()) {
                Some(&(inner, fi)) => self.resolve_type(inner, fi, depth + 1),
                None => BasicType::predeclared(name),
            },
            TypeExpr::Qualified { package, name } => self.dep(file, package)?.basic_type(name),
            TypeExpr::Other(_) => None,
        }
    }

    /// The type named by the callee of a conversion, if it is one
    fn callee_type(&self, func: &Expr, file: usize) -> Option<BasicType> {
        match func {
            Expr::Paren(inner) => self.callee_type(inner, file),
            Expr::Ident(name) => self.resolve_type(&TypeExpr::Named(name.clone()), file, 0),
            Expr::Selector { operand, field } => match operand.as_ref() {
                Expr::Ident(package) => self.dep(file, package)?.basic_type(field),
                _ => None,
            },
            _ => None,
        }
    }

    fn eval(&mut self, expr: &Expr, file: usize, iota: Option<usize>) -> Typed {
        match expr {
            Expr::Int(lit) => Typed::untyped(
                parse_int_literal(lit)
                    .map(ConstValue::Int)
                    .unwrap_or(ConstValue::Unknown),
            ),
            Expr::Float(lit) => Typed::untyped(
                parse_float_literal(lit)
                    .map(ConstValue::Float)
                    .unwrap_or(ConstValue::Unknown),
            ),
            Expr::Imag(lit) => Typed::untyped(
                parse_imaginary(lit)
                    .map(|im| ConstValue::Complex(Rat::zero(), im))
                    .unwrap_or(ConstValue::Unknown),
            ),
            Expr::Rune(lit) => Typed::untyped(
                unquote_rune(lit)
                    .map(ConstValue::int)
                    .unwrap_or(ConstValue::Unknown),
            ),
            Expr::Str(lit) => Typed::untyped(
                unquote_bytes(lit)
                    .map(ConstValue::String)
                    .unwrap_or(ConstValue::Unknown),
            ),
            Expr::Bool(b) => Typed::untyped(ConstValue::Bool(*b)),
            Expr::Iota => Typed::untyped(
                iota.map(ConstValue::int).unwrap_or(ConstValue::Unknown),
            ),
            Expr::Ident(name) => self.lookup(name, file),
            Expr::Selector { operand, field } => match operand.as_ref() {
                Expr::Ident(package) => self
                    .dep(file, package)
                    .and_then(|dep| dep.constant(field))
                    .map(|c| Typed {
                        value: c.value.clone(),
                        ty: c.ty,
                    })
                    .unwrap_or_else(Typed::unknown),
                _ => Typed::unknown(),
            },
            Expr::Paren(inner) => self.eval(inner, file, iota),
            Expr::Unary { op, operand } => {
                let x = self.eval(operand, file, iota);
                unary(op, x)
            }
            Expr::Binary { op, left, right } => {
                let x = self.eval(left, file, iota);
                let y = self.eval(right, file, iota);
                binary(op, x, y)
            }
            Expr::Call { func, args } => self.call(func, args, file, iota),
            Expr::Unsupported(kind) => {
                trace!("unsupported constant expression {}", kind);
                Typed::unknown()
            }
        }
    }

    fn lookup(&mut self, name: &str, file: usize) -> Typed {
        if let Some(&k) = self.index.get(name) {
            return self.value_of(k);
        }
        match name {
            "true" => return Typed::untyped(ConstValue::Bool(true)),
            "false" => return Typed::untyped(ConstValue::Bool(false)),
            _ => {}
        }
        let deps = self.deps;
        self.scopes
            .get(file)
            .into_iter()
            .flat_map(|scope| scope.dot_imports.iter())
            .filter_map(|&i| deps.get(i)?.constant(name))
            .map(|c| Typed {
                value: c.value.clone(),
                ty: c.ty,
            })
            .next()
            .unwrap_or_else(Typed::unknown)
    }

    fn call(&mut self, func: &Expr, args: &[Expr], file: usize, iota: Option<usize>) -> Typed {
        if let Some(basic) = self.callee_type(func, file) {
            if args.len() != 1 {
                return Typed::unknown();
            }
            let x = self.eval(&args[0], file, iota);
            return Typed {
                value: convert(&x.value, basic, true),
                ty: Some(basic),
            };
        }
        let Expr::Ident(name) = func else {
            return Typed::unknown();
        };
        let values: Vec<Typed> = args.iter().map(|a| self.eval(a, file, iota)).collect();
        builtin(name, values)
    }
}

fn parse_imaginary(lit: &str) -> Option<Rat> {
    let body = lit.strip_suffix('i')?;
    let lower = body.to_ascii_lowercase();
    let prefixed = lower.starts_with("0x") || lower.starts_with("0b") || lower.starts_with("0o");
    if prefixed {
        if lower.starts_with("0x") && lower.contains('p') {
            return parse_float_literal(body);
        }
        return parse_int_literal(body).map(Rat::from_int);
    }
    // decimal, even with a leading zero
    parse_float_literal(body)
}

/// Bring both operands to their common type, if any
fn unify(x: &Typed, y: &Typed) -> (Option<BasicType>, ConstValue, ConstValue) {
    match x.ty.or(y.ty) {
        Some(ty) => (Some(ty), convert(&x.value, ty, false), convert(&y.value, ty, false)),
        None => (None, x.value.clone(), y.value.clone()),
    }
}

fn unary(op: &str, x: Typed) -> Typed {
    let value = match (op, &x.value) {
        ("-", v) => v.negate(),
        ("+", v) if v.is_numeric() => Some(v.clone()),
        ("!", ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        ("^", ConstValue::Int(i)) => Some(ConstValue::Int(match x.ty {
            Some(BasicType::Int { bits, signed: false }) => {
                let mask = (BigInt::one() << bits as usize) - 1;
                i ^ mask
            }
            _ => !i,
        })),
        _ => None,
    };
    Typed::finish(value, x.ty)
}

fn binary(op: &str, x: Typed, y: Typed) -> Typed {
    match op {
        "<<" | ">>" => Typed::finish(ConstValue::shift(op, &x.value, &y.value), x.ty),
        "==" | "!=" | "<" | "<=" | ">" | ">=" => {
            let (_, xv, yv) = unify(&x, &y);
            Typed::finish(ConstValue::compare(op, &xv, &yv).map(ConstValue::Bool), None)
        }
        _ => {
            let (ty, xv, yv) = unify(&x, &y);
            Typed::finish(ConstValue::binary(op, &xv, &yv), ty)
        }
    }
}

fn builtin(name: &str, args: Vec<Typed>) -> Typed {
    match (name, args.as_slice()) {
        ("len", [x]) => match &x.value {
            ConstValue::String(s) => Typed {
                value: ConstValue::int(s.len()),
                ty: Some(BasicType::Int { bits: 64, signed: true }),
            },
            _ => Typed::unknown(),
        },
        ("min" | "max", [first, rest @ ..]) => {
            let ty = args.iter().find_map(|a| a.ty);
            let pick = if name == "min" { "<" } else { ">" };
            let mut best = first.value.clone();
            for arg in rest {
                let (_, a, b) = unify(
                    &Typed { value: arg.value.clone(), ty },
                    &Typed { value: best.clone(), ty },
                );
                match ConstValue::compare(pick, &a, &b) {
                    Some(true) => best = arg.value.clone(),
                    Some(false) => {}
                    None => return Typed::unknown(),
                }
            }
            Typed::finish(Some(best), ty)
        }
        ("complex", [re, im]) => {
            let ty = re.ty.or(im.ty).and_then(BasicType::complex_of);
            let value = match (re.value.to_rat(), im.value.to_rat()) {
                (Some(a), Some(b)) if !matches!(re.value, ConstValue::Complex(..)) => {
                    Some(ConstValue::Complex(a, b))
                }
                _ => None,
            };
            Typed::finish(value, ty)
        }
        ("real" | "imag", [x]) => {
            let ty = x.ty.and_then(BasicType::real_part);
            let value = match &x.value {
                ConstValue::Int(i) if name == "real" => Some(ConstValue::Int(i.clone())),
                ConstValue::Int(_) => Some(ConstValue::Int(BigInt::zero())),
                ConstValue::Float(r) if name == "real" => Some(ConstValue::Float(r.clone())),
                ConstValue::Float(_) => Some(ConstValue::Int(BigInt::zero())),
                ConstValue::Complex(re, im) => {
                    Some(ConstValue::Float(if name == "real" { re.clone() } else { im.clone() }))
                }
                _ => None,
            };
            Typed::finish(value, ty)
        }
        _ => Typed::unknown(),
    }
}
