//! Collects the constants of one type from one file
//!
//! Within a constant block the type of the last spec with an explicit named
//! type is remembered. A spec with values but no type resets it, a bare spec
//! keeps it, and a spec with a qualified or composite type is passed over
//! without changing it. Every non-blank name of a spec whose remembered type
//! is the requested one becomes a [`Value`].

use tracing::trace;

use crate::error::SymbolError;
use crate::symbols::{Constant, LoadedFile};
use crate::syntax::{ConstDecl, Decl, TypeExpr};
use crate::types::Value;

/// One scan of one file for one type name
pub struct ScanSession<'a> {
    file: LoadedFile<'a>,
    type_name: &'a str,
    values: Vec<Value>,
    errors: Vec<SymbolError>,
}

impl<'a> ScanSession<'a> {
    pub fn new(file: LoadedFile<'a>, type_name: &'a str) -> Self {
        Self {
            file,
            type_name,
            values: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Scan the file. Stops at the first block with a constant that has no
    /// evaluated symbol.
    pub fn run(mut self) -> Result<Vec<Value>, Vec<SymbolError>> {
        let source = self.file.file;
        for decl in &source.decls {
            // const blocks are consumed whole; nothing else is entered
            let Decl::Const(block) = decl else {
                continue;
            };
            if !self.scan_block(block) {
                trace!("{}: scan stopped at a missing symbol", source.path.display());
                break;
            }
        }
        trace!(
            "{}: {} values of type {}",
            source.path.display(),
            self.values.len(),
            self.type_name
        );
        if self.errors.is_empty() {
            Ok(self.values)
        } else {
            Err(self.errors)
        }
    }

    /// Returns `false` when the file's scan must stop
    fn scan_block(&mut self, decl: &ConstDecl) -> bool {
        let mut remembered: Option<&str> = None;
        for spec in &decl.specs {
            match &spec.ty {
                Some(TypeExpr::Named(name)) => remembered = Some(name),
                Some(_) => continue,
                None if !spec.values.is_empty() => remembered = None,
                None => {}
            }
            if remembered != Some(self.type_name) {
                continue;
            }
            for ident in spec.names.iter().filter(|n| !n.is_blank()) {
                match self.file.package.constant(&ident.name) {
                    Some(constant) => self.values.push(value_of(constant)),
                    None => {
                        self.errors.push(SymbolError {
                            file: self.file.file.path.clone(),
                            position: ident.position,
                            name: ident.name.clone(),
                        });
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// The generator-facing view of an evaluated constant
pub fn value_of(constant: &Constant) -> Value {
    Value {
        name: constant.name.clone(),
        str: constant.value.display_string(),
        exact_str: constant.value.exact_string(),
        kind: constant.value.kind(),
    }
}
