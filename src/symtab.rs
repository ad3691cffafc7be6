//! Scoped symbol table. Declarations at deeper scopes shadow outer ones;
//! exiting a scope unlinks its entries from the live lookup chains but keeps
//! them in the table so the end-of-run dump can list every name the program
//! ever declared.

use crate::dbg::DebugLoc;
use crate::error::{SemError, SemErrorKind};
use crate::types::{TypeInfo, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Stable handle into the table. Entries are never removed, so an id stays
/// valid for the lifetime of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(usize);

/// Signature of a declared function.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncSig {
    pub params: Vec<TypeInfo>,
    pub ret: TypeInfo,
    pub unitary: bool,
    pub quantizable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub ty: TypeInfo,
    pub initialized: bool,
    /// Folded initializer elements, retained for constant-qualified variables
    /// so constant array references can be carved at compile time.
    pub const_elems: Option<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolInfo {
    Var(VarInfo),
    Func(FuncSig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolEntry {
    pub name: String,
    /// Scope depth at which the name was declared.
    pub depth: usize,
    /// Every line that declared or mentioned the name, in order.
    pub lines: Vec<usize>,
    pub info: SymbolInfo,
}

impl SymbolEntry {
    pub fn decl_line(&self) -> usize {
        self.lines.first().copied().unwrap_or(0)
    }

    pub fn is_function(&self) -> bool {
        matches!(self.info, SymbolInfo::Func(_))
    }
}

/// The table itself. `entries` is append-only; `chains` holds, per name, the
/// ids of the currently visible declarations with the innermost last.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    chains: HashMap<String, Vec<SymbolId>>,
    depth: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn entry(&self, id: SymbolId) -> &SymbolEntry {
        &self.entries[id.0]
    }

    pub fn entry_mut(&mut self, id: SymbolId) -> &mut SymbolEntry {
        &mut self.entries[id.0]
    }

    /// Declares `name` at the current scope depth. Fails if the innermost
    /// visible declaration of the same name is at the same depth, citing the
    /// original declaration line; a declaration at a shallower depth is
    /// shadowed instead.
    pub fn declare(
        &mut self,
        name: &str,
        line: usize,
        info: SymbolInfo,
        dbg: Option<DebugLoc>,
    ) -> Result<SymbolId, SemError> {
        if let Some(id) = self.lookup(name) {
            let prior = self.entry(id);
            if prior.depth == self.depth {
                return Err(SemErrorKind::Redeclared {
                    name: name.to_string(),
                    original_line: prior.decl_line(),
                }
                .at(dbg));
            }
        }
        let id = SymbolId(self.entries.len());
        self.entries.push(SymbolEntry {
            name: name.to_string(),
            depth: self.depth,
            lines: vec![line],
            info,
        });
        self.chains.entry(name.to_string()).or_default().push(id);
        trace!(name, line, depth = self.depth, "declared symbol");
        Ok(id)
    }

    /// Resolves a non-declaring mention of `name` to the innermost visible
    /// declaration and records the line, or fails `Undeclared`.
    pub fn resolve(
        &mut self,
        name: &str,
        line: usize,
        dbg: Option<DebugLoc>,
    ) -> Result<SymbolId, SemError> {
        match self.lookup(name) {
            Some(id) => {
                self.entries[id.0].lines.push(line);
                Ok(id)
            }
            None => Err(SemErrorKind::Undeclared(name.to_string()).at(dbg)),
        }
    }

    /// Innermost visible declaration of `name`, if any. Does not record a
    /// reference line.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.chains.get(name).and_then(|c| c.last().copied())
    }

    pub fn enter_scope(&mut self) {
        self.depth += 1;
        trace!(depth = self.depth, "entered scope");
    }

    /// Unlinks every entry declared at the exiting depth from the live chains
    /// (they stay in `entries` for the dump) and decrements the depth,
    /// floored at zero.
    pub fn exit_scope(&mut self) {
        let leaving = self.depth;
        for chain in self.chains.values_mut() {
            while let Some(&id) = chain.last() {
                if self.entries[id.0].depth == leaving && leaving > 0 {
                    chain.pop();
                } else {
                    break;
                }
            }
        }
        self.depth = self.depth.saturating_sub(1);
        trace!(depth = self.depth, "exited scope");
    }

    /// All entries ever created, shadowed and expired ones included, in
    /// declaration order.
    pub fn all_entries(&self) -> impl Iterator<Item = &SymbolEntry> {
        self.entries.iter()
    }
}

/// Fixed-field dump: name, qualifier, type with rank brackets, declaration
/// scope depth, reference lines. The field set and ordering are the
/// compatibility contract; widths are cosmetic.
impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<16} {:<10} {:<24} {:>5}  {}",
            "name", "qualifier", "type", "scope", "lines"
        )?;
        for entry in &self.entries {
            let (qual, ty) = match &entry.info {
                SymbolInfo::Var(v) => (v.ty.qual.to_string(), type_column(&v.ty)),
                SymbolInfo::Func(sig) => {
                    let params = sig
                        .params
                        .iter()
                        .map(type_column)
                        .collect::<Vec<_>>()
                        .join(", ");
                    (
                        sig.ret.qual.to_string(),
                        format!("({}) -> {}", params, type_column(&sig.ret)),
                    )
                }
            };
            let lines = entry
                .lines
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(
                f,
                "{:<16} {:<10} {:<24} {:>5}  {}",
                entry.name, qual, ty, entry.depth, lines
            )?;
        }
        Ok(())
    }
}

fn type_column(ty: &TypeInfo) -> String {
    let mut s = ty.prim.to_string();
    for d in &ty.dims {
        s.push_str(&format!("[{}]", d));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrimKind, Qualifier};

    fn var(qual: Qualifier) -> SymbolInfo {
        SymbolInfo::Var(VarInfo {
            ty: TypeInfo::scalar(qual, PrimKind::Signed),
            initialized: false,
            const_elems: None,
        })
    }

    #[test]
    fn test_redeclare_same_scope_cites_original_line() {
        let mut tab = SymbolTable::new();
        tab.declare("x", 3, var(Qualifier::Classical), None).unwrap();
        let err = tab
            .declare("x", 9, var(Qualifier::Classical), None)
            .unwrap_err();
        assert_eq!(
            err.kind,
            SemErrorKind::Redeclared {
                name: "x".to_string(),
                original_line: 3
            }
        );
    }

    #[test]
    fn test_shadowing_and_scope_exit() {
        let mut tab = SymbolTable::new();
        let outer = tab.declare("x", 1, var(Qualifier::Classical), None).unwrap();

        tab.enter_scope();
        let inner = tab.declare("x", 5, var(Qualifier::Quantum), None).unwrap();
        assert_ne!(outer, inner);
        assert_eq!(tab.resolve("x", 6, None).unwrap(), inner);

        tab.exit_scope();
        assert_eq!(tab.resolve("x", 8, None).unwrap(), outer);

        // Both declarations survive for the dump.
        assert_eq!(tab.all_entries().count(), 2);
    }

    #[test]
    fn test_undeclared() {
        let mut tab = SymbolTable::new();
        let err = tab.resolve("ghost", 2, None).unwrap_err();
        assert_eq!(err.kind, SemErrorKind::Undeclared("ghost".to_string()));
    }

    #[test]
    fn test_reference_lines_accumulate() {
        let mut tab = SymbolTable::new();
        let id = tab.declare("x", 1, var(Qualifier::Classical), None).unwrap();
        tab.resolve("x", 4, None).unwrap();
        tab.resolve("x", 7, None).unwrap();
        assert_eq!(tab.entry(id).lines, vec![1, 4, 7]);
    }

    #[test]
    fn test_exit_scope_floors_at_zero() {
        let mut tab = SymbolTable::new();
        tab.exit_scope();
        tab.exit_scope();
        assert_eq!(tab.depth(), 0);
        assert!(tab.declare("x", 1, var(Qualifier::Classical), None).is_ok());
    }

    #[test]
    fn test_dump_fields() {
        let mut tab = SymbolTable::new();
        tab.declare(
            "arr",
            2,
            SymbolInfo::Var(VarInfo {
                ty: TypeInfo::array(Qualifier::Constant, PrimKind::Unsigned, vec![3, 4]).unwrap(),
                initialized: true,
                const_elems: None,
            }),
            None,
        )
        .unwrap();
        tab.resolve("arr", 5, None).unwrap();
        let dump = tab.to_string();
        let line = dump.lines().nth(1).unwrap();
        assert!(line.starts_with("arr"));
        assert!(line.contains("constant"));
        assert!(line.contains("unsigned[3][4]"));
        assert!(line.contains("2, 5"));
    }
}
