//! Builder/verifier: one construction operation per node kind. Every
//! operation extracts the types of its already-built children, applies the
//! construct-specific rules (type, qualifier, shape, quantum legality), folds
//! on all-constant operands, and only then allocates the node. A failing
//! operation consumes everything it was handed, so no partially-built node
//! survives an error.

use crate::ast::{
    BinaryOpKind, Case, Expr, ExprKind, ReturnStyle, Stmt, StmtKind, UnaryOpKind,
};
use crate::dbg::DebugLoc;
use crate::error::{SemError, SemErrorKind};
use crate::symtab::{FuncSig, SymbolId, SymbolInfo, SymbolTable, VarInfo};
use crate::types::{result_prim, PrimKind, Qualifier, TypeInfo, Value};
use tracing::debug;

mod fold;

#[cfg(test)]
mod stmt_tests;

/// One compilation's worth of builder state: the symbol table plus nothing
/// else. Constructed once before any building and dropped wholesale at the
/// end of compilation or on the first error.
#[derive(Debug, Default)]
pub struct Session {
    symtab: SymbolTable,
}

impl Session {
    pub fn new() -> Self {
        debug!("starting compilation session");
        Session {
            symtab: SymbolTable::new(),
        }
    }

    pub fn symtab(&self) -> &SymbolTable {
        &self.symtab
    }

    pub fn enter_scope(&mut self) {
        self.symtab.enter_scope();
    }

    pub fn exit_scope(&mut self) {
        self.symtab.exit_scope();
    }

    // ----- Symbol registration (called by the grammar layer) -----

    pub fn declare_var(
        &mut self,
        name: &str,
        line: usize,
        ty: TypeInfo,
        dbg: Option<DebugLoc>,
    ) -> Result<SymbolId, SemError> {
        self.symtab.declare(
            name,
            line,
            SymbolInfo::Var(VarInfo {
                ty,
                initialized: false,
                const_elems: None,
            }),
            dbg,
        )
    }

    /// Declares a function parameter: a variable that is initialized from the
    /// moment its scope opens.
    pub fn declare_param(
        &mut self,
        name: &str,
        line: usize,
        ty: TypeInfo,
        dbg: Option<DebugLoc>,
    ) -> Result<SymbolId, SemError> {
        self.symtab.declare(
            name,
            line,
            SymbolInfo::Var(VarInfo {
                ty,
                initialized: true,
                const_elems: None,
            }),
            dbg,
        )
    }

    pub fn declare_func(
        &mut self,
        name: &str,
        line: usize,
        sig: FuncSig,
        dbg: Option<DebugLoc>,
    ) -> Result<SymbolId, SemError> {
        self.symtab.declare(name, line, SymbolInfo::Func(sig), dbg)
    }

    pub fn resolve(
        &mut self,
        name: &str,
        line: usize,
        dbg: Option<DebugLoc>,
    ) -> Result<SymbolId, SemError> {
        self.symtab.resolve(name, line, dbg)
    }

    // ----- Expressions -----

    /// A scalar literal handed over by the lexer.
    pub fn build_const(&self, val: Value, dbg: Option<DebugLoc>) -> Expr {
        let ty = TypeInfo::scalar(Qualifier::Constant, val.prim());
        Expr {
            kind: ExprKind::Const { elems: vec![val] },
            ty,
            quantizable: true,
            unitary: true,
            dbg,
        }
    }

    /// A constant array built from an initializer list. Every element must
    /// carry the given primitive type, and the list must fill the shape
    /// exactly.
    pub fn build_const_array(
        &self,
        elems: Vec<Value>,
        prim: PrimKind,
        dims: Vec<usize>,
        dbg: Option<DebugLoc>,
    ) -> Result<Expr, SemError> {
        let ty = TypeInfo::array(Qualifier::Constant, prim, dims).map_err(|k| k.at(dbg))?;
        if elems.len() != ty.elem_count() {
            return Err(SemErrorKind::MismatchedTypes {
                expected: format!("{} elements", ty.elem_count()),
                found: format!("{} elements", elems.len()),
            }
            .at(dbg));
        }
        if let Some(bad) = elems.iter().find(|v| v.prim() != prim) {
            return Err(SemErrorKind::MismatchedTypes {
                expected: prim.to_string(),
                found: bad.prim().to_string(),
            }
            .at(dbg));
        }
        Ok(Expr {
            kind: ExprKind::Const { elems },
            ty,
            quantizable: true,
            unitary: true,
            dbg,
        })
    }

    /// A (possibly partially indexed) variable reference. Constant entries
    /// indexed by constants are carved into a fresh constant node instead of
    /// a live reference.
    pub fn build_ref(
        &mut self,
        sym: SymbolId,
        indices: Vec<Expr>,
        dbg: Option<DebugLoc>,
    ) -> Result<Expr, SemError> {
        let entry = self.symtab.entry(sym);
        let name = entry.name.clone();
        let var = match &entry.info {
            SymbolInfo::Var(v) => v.clone(),
            SymbolInfo::Func(_) => return Err(SemErrorKind::NotAVariable(name).at(dbg)),
        };

        let rank = var.ty.rank();
        if indices.len() > rank {
            return Err(SemErrorKind::TooManyIndices {
                name,
                rank,
                given: indices.len(),
            }
            .at(dbg));
        }
        for idx in &indices {
            if idx.ty.is_quantum() {
                return Err(SemErrorKind::QuantumIndex.at(idx.dbg.or(dbg)));
            }
            if !idx.ty.prim.is_integer() || !idx.ty.is_scalar() {
                return Err(SemErrorKind::NonIntegerIndex {
                    found: idx.ty.to_string(),
                }
                .at(idx.dbg.or(dbg)));
            }
        }

        let rem_dims = var.ty.dims[indices.len()..].to_vec();

        if var.ty.is_constant() && indices.iter().all(|i| i.const_scalar().is_some()) {
            let elems = var
                .const_elems
                .as_ref()
                .ok_or_else(|| SemErrorKind::UninitializedVariable(name.clone()).at(dbg))?;
            let mut offset = 0usize;
            for (k, idx) in indices.iter().enumerate() {
                let bound = var.ty.dims[k];
                let v = match idx.const_scalar().and_then(Value::as_int) {
                    Some(v) => v,
                    None => {
                        return Err(SemErrorKind::NonIntegerIndex {
                            found: idx.ty.to_string(),
                        }
                        .at(dbg))
                    }
                };
                let i = match usize::try_from(v.clone()) {
                    Ok(i) if i < bound => i,
                    _ => {
                        return Err(SemErrorKind::IndexOutOfBounds {
                            level: k + 1,
                            value: v.to_string(),
                            bound,
                        }
                        .at(dbg))
                    }
                };
                let stride: usize = var.ty.dims[k + 1..].iter().product();
                offset += i * stride;
            }
            let span: usize = rem_dims.iter().product();
            let carved = elems[offset..offset + span].to_vec();
            let ty = TypeInfo {
                qual: Qualifier::Constant,
                prim: var.ty.prim,
                dims: rem_dims,
            };
            return Ok(Expr {
                kind: ExprKind::Const { elems: carved },
                ty,
                quantizable: true,
                unitary: true,
                dbg,
            });
        }

        // A constant entry indexed by a runtime value degrades to a classical
        // read; everything else keeps the entry's qualifier.
        let qual = if var.ty.is_constant() {
            Qualifier::Classical
        } else {
            var.ty.qual
        };
        let quantizable = !qual.is_quantum() && indices.iter().all(|i| i.quantizable);
        let unitary = indices.iter().all(|i| i.unitary);
        let ty = TypeInfo {
            qual,
            prim: var.ty.prim,
            dims: rem_dims,
        };
        Ok(Expr {
            kind: ExprKind::Ref { sym, indices },
            ty,
            quantizable,
            unitary,
            dbg,
        })
    }

    pub fn build_binary(
        &mut self,
        op: BinaryOpKind,
        lhs: Expr,
        rhs: Expr,
        dbg: Option<DebugLoc>,
    ) -> Result<Expr, SemError> {
        let prim = result_prim(op.category(), lhs.ty.prim, rhs.ty.prim).ok_or_else(|| {
            SemErrorKind::InvalidOperands {
                op: op.to_string(),
                left: lhs.ty.to_string(),
                right: rhs.ty.to_string(),
            }
            .at(dbg)
        })?;
        lhs.ty.same_shape(&rhs.ty).map_err(|k| k.at(dbg))?;

        let qual = Qualifier::propagate(lhs.ty.qual, rhs.ty.qual);
        if qual == Qualifier::Constant {
            if let (Some(le), Some(re)) = (lhs.const_elems(), rhs.const_elems()) {
                let elems = fold::fold_binary(op, prim, le, re).map_err(|k| k.at(dbg))?;
                let ty = TypeInfo {
                    qual: Qualifier::Constant,
                    prim,
                    dims: lhs.ty.dims.clone(),
                };
                return Ok(Expr {
                    kind: ExprKind::Const { elems },
                    ty,
                    quantizable: true,
                    unitary: true,
                    dbg,
                });
            }
        }

        let quantizable = lhs.quantizable && rhs.quantizable;
        let unitary = lhs.unitary && rhs.unitary;
        let ty = TypeInfo {
            qual,
            prim,
            dims: lhs.ty.dims.clone(),
        };
        Ok(Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            quantizable,
            unitary,
            dbg,
        })
    }

    pub fn build_unary(
        &mut self,
        op: UnaryOpKind,
        operand: Expr,
        dbg: Option<DebugLoc>,
    ) -> Result<Expr, SemError> {
        let legal = match op {
            UnaryOpKind::Not => operand.ty.prim == PrimKind::Bool,
            UnaryOpKind::BitNot => operand.ty.prim.is_integer(),
        };
        if !legal {
            return Err(SemErrorKind::InvalidOperand {
                op: op.to_string(),
                ty: operand.ty.to_string(),
            }
            .at(dbg));
        }

        if operand.ty.is_constant() {
            if let Some(elems) = operand.const_elems() {
                let folded = fold::fold_unary(op, elems).map_err(|k| k.at(dbg))?;
                let ty = operand.ty.clone();
                return Ok(Expr {
                    kind: ExprKind::Const { elems: folded },
                    ty,
                    quantizable: true,
                    unitary: true,
                    dbg,
                });
            }
        }

        let ty = operand.ty.clone();
        let quantizable = operand.quantizable;
        let unitary = operand.unitary;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            quantizable,
            unitary,
            dbg,
        })
    }

    pub fn build_call(
        &mut self,
        sym: SymbolId,
        args: Vec<Expr>,
        dbg: Option<DebugLoc>,
    ) -> Result<Expr, SemError> {
        let entry = self.symtab.entry(sym);
        let name = entry.name.clone();
        let sig = match &entry.info {
            SymbolInfo::Func(s) => s.clone(),
            SymbolInfo::Var(_) => return Err(SemErrorKind::NotAFunction(name).at(dbg)),
        };

        if args.len() != sig.params.len() {
            return Err(SemErrorKind::WrongArity {
                name,
                expected: sig.params.len(),
                found: args.len(),
            }
            .at(dbg));
        }

        // A quantum actual bound to a non-quantum parameter lifts the call
        // into quantum execution, which only a quantizable function survives.
        let mut quantized = false;
        for (i, (param, arg)) in sig.params.iter().zip(args.iter()).enumerate() {
            if !PrimKind::compatible(param.prim, arg.ty.prim) {
                return Err(SemErrorKind::MismatchedTypes {
                    expected: param.to_string(),
                    found: arg.ty.to_string(),
                }
                .at(arg.dbg.or(dbg)));
            }
            param.same_shape(&arg.ty).map_err(|k| k.at(arg.dbg.or(dbg)))?;
            if !Qualifier::matches(param.qual, arg.ty.qual) {
                if arg.ty.is_quantum() && !param.is_quantum() {
                    if !sig.quantizable {
                        return Err(SemErrorKind::CallNotQuantizable {
                            name,
                            param: i + 1,
                        }
                        .at(arg.dbg.or(dbg)));
                    }
                    quantized = true;
                } else {
                    return Err(SemErrorKind::QualifierMismatch {
                        expected: param.qual.to_string(),
                        found: arg.ty.qual.to_string(),
                    }
                    .at(arg.dbg.or(dbg)));
                }
            }
        }

        let (qual, unitary, quantizable) = if quantized {
            (Qualifier::Quantum, true, false)
        } else {
            (
                sig.ret.qual,
                sig.unitary && args.iter().all(|a| a.unitary),
                sig.quantizable && args.iter().all(|a| a.quantizable),
            )
        };
        let ty = TypeInfo {
            qual,
            prim: sig.ret.prim,
            dims: sig.ret.dims.clone(),
        };
        Ok(Expr {
            kind: ExprKind::Call { sym, args },
            ty,
            quantizable,
            unitary,
            dbg,
        })
    }

    /// A superposition-creating invocation: a specially-shaped unary bool
    /// function applied to a quantum reference.
    pub fn build_superpos_call(
        &mut self,
        sym: SymbolId,
        arg: Expr,
        dbg: Option<DebugLoc>,
    ) -> Result<Expr, SemError> {
        let entry = self.symtab.entry(sym);
        let name = entry.name.clone();
        let sig = match &entry.info {
            SymbolInfo::Func(s) => s.clone(),
            SymbolInfo::Var(_) => return Err(SemErrorKind::NotAFunction(name).at(dbg)),
        };

        let malformed = |reason: String| SemErrorKind::MalformedSuperposCall { reason }.at(dbg);

        if sig.params.len() != 1 {
            return Err(malformed(format!(
                "'{}' must take exactly one parameter, not {}",
                name,
                sig.params.len()
            )));
        }
        let param = &sig.params[0];
        let classical_bool =
            |t: &TypeInfo| t.qual == Qualifier::Classical && t.prim == PrimKind::Bool && t.is_scalar();
        if !classical_bool(param) {
            return Err(malformed(format!(
                "parameter of '{}' must be a classical scalar bool, not '{}'",
                name, param
            )));
        }
        if !classical_bool(&sig.ret) {
            return Err(malformed(format!(
                "'{}' must return a classical scalar bool, not '{}'",
                name, sig.ret
            )));
        }
        if sig.unitary || sig.quantizable {
            return Err(malformed(format!(
                "'{}' may not carry unitary or quantizable attributes",
                name
            )));
        }

        if !arg.is_reference() {
            return Err(malformed("argument must be a reference".to_string()));
        }
        if !arg.ty.is_quantum() {
            return Err(malformed(format!(
                "argument must be quantum-qualified, not {}",
                arg.ty.qual
            )));
        }
        if arg.ty.prim != param.prim || !arg.ty.is_scalar() {
            return Err(malformed(format!(
                "argument type '{}' does not match parameter type '{}'",
                arg.ty, param
            )));
        }

        Ok(Expr {
            kind: ExprKind::SuperposCall {
                sym,
                arg: Box::new(arg),
            },
            ty: TypeInfo::void(),
            quantizable: false,
            unitary: true,
            dbg,
        })
    }

    /// Measurement collapses a quantum reference; the result is classical
    /// with the operand's primitive type and shape.
    pub fn build_measure(
        &mut self,
        operand: Expr,
        dbg: Option<DebugLoc>,
    ) -> Result<Expr, SemError> {
        if !operand.is_reference() {
            return Err(SemErrorKind::NotAReference {
                context: "measurement operand".to_string(),
            }
            .at(dbg));
        }
        if !operand.ty.is_quantum() {
            return Err(SemErrorKind::NotQuantum {
                found: operand.ty.to_string(),
            }
            .at(dbg));
        }
        let ty = TypeInfo {
            qual: Qualifier::Classical,
            prim: operand.ty.prim,
            dims: operand.ty.dims.clone(),
        };
        Ok(Expr {
            kind: ExprKind::Measure {
                operand: Box::new(operand),
            },
            ty,
            quantizable: false,
            unitary: false,
            dbg,
        })
    }

    // ----- Statements -----

    /// A verified statement sequence. The first `break`, `continue`, or
    /// definitely-returning statement truncates the list; its style becomes
    /// the list's style.
    pub fn build_block(
        &mut self,
        stmts: Vec<Stmt>,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        let mut kept = Vec::new();
        let mut style = ReturnStyle::None;
        let mut merge = FlowMerge::new();
        let mut quantizable = true;
        let mut unitary = true;

        for (i, stmt) in stmts.into_iter().enumerate() {
            merge.add(&format!("statement {}", i + 1), &stmt, dbg)?;
            quantizable &= stmt.quantizable;
            unitary &= stmt.unitary;

            if stmt.is_jump() || stmt.ret == ReturnStyle::Definite {
                style = stmt.ret;
                kept.push(stmt);
                break; // remaining statements are unreachable and dropped
            }
            if stmt.ret == ReturnStyle::Conditional {
                style = ReturnStyle::Conditional;
            }
            kept.push(stmt);
        }

        let ret_ty = if style.reports() { merge.into_ty() } else { None };
        Ok(Stmt {
            kind: StmtKind::Block { stmts: kept },
            quantizable,
            unitary,
            ret: style,
            ret_ty,
            dbg,
        })
    }

    pub fn build_decl(&mut self, sym: SymbolId, dbg: Option<DebugLoc>) -> Result<Stmt, SemError> {
        let entry = self.symtab.entry(sym);
        let var = match &entry.info {
            SymbolInfo::Var(v) => v.clone(),
            SymbolInfo::Func(_) => {
                return Err(SemErrorKind::NotAVariable(entry.name.clone()).at(dbg))
            }
        };
        let quantum = var.ty.is_quantum();
        Ok(Stmt {
            kind: StmtKind::Decl { sym },
            quantizable: !quantum,
            unitary: !quantum,
            ret: ReturnStyle::None,
            ret_ty: None,
            dbg,
        })
    }

    /// Declaration with an initializer. Constant entries retain the folded
    /// elements so later constant references can be carved.
    pub fn build_def(
        &mut self,
        sym: SymbolId,
        init: Expr,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        let entry = self.symtab.entry(sym);
        let name = entry.name.clone();
        let var = match &entry.info {
            SymbolInfo::Var(v) => v.clone(),
            SymbolInfo::Func(_) => return Err(SemErrorKind::NotAVariable(name).at(dbg)),
        };

        if !PrimKind::compatible(var.ty.prim, init.ty.prim) {
            return Err(SemErrorKind::MismatchedTypes {
                expected: var.ty.to_string(),
                found: init.ty.to_string(),
            }
            .at(dbg));
        }
        var.ty.same_shape(&init.ty).map_err(|k| k.at(dbg))?;
        if init.ty.is_quantum() && !var.ty.is_quantum() {
            return Err(SemErrorKind::QualifierMismatch {
                expected: var.ty.qual.to_string(),
                found: init.ty.qual.to_string(),
            }
            .at(dbg));
        }

        let const_elems = if var.ty.is_constant() {
            match init.const_elems() {
                Some(elems) => Some(elems.to_vec()),
                None => return Err(SemErrorKind::NonConstantInitializer { name }.at(dbg)),
            }
        } else {
            None
        };

        if let SymbolInfo::Var(v) = &mut self.symtab.entry_mut(sym).info {
            v.initialized = true;
            if const_elems.is_some() {
                v.const_elems = const_elems;
            }
        }

        let quantum = var.ty.is_quantum();
        let quantizable = !quantum && init.quantizable;
        let unitary = !quantum && init.unitary;
        Ok(Stmt {
            kind: StmtKind::Def {
                sym,
                init: Box::new(init),
            },
            quantizable,
            unitary,
            ret: ReturnStyle::None,
            ret_ty: None,
            dbg,
        })
    }

    /// Verifies a function body against its declared signature: return flow,
    /// return type, and the unitary/quantizable attributes.
    pub fn build_func_def(
        &mut self,
        sym: SymbolId,
        body: Stmt,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        let entry = self.symtab.entry(sym);
        let name = entry.name.clone();
        let sig = match &entry.info {
            SymbolInfo::Func(s) => s.clone(),
            SymbolInfo::Var(_) => return Err(SemErrorKind::NotAFunction(name).at(dbg)),
        };

        if sig.ret.is_void() {
            if let Some(ret_ty) = &body.ret_ty {
                if !ret_ty.is_void() {
                    return Err(SemErrorKind::ReturnTypeMismatch {
                        expected: sig.ret.to_string(),
                        found: ret_ty.to_string(),
                    }
                    .at(dbg));
                }
            }
        } else {
            if body.ret != ReturnStyle::Definite {
                return Err(SemErrorKind::MissingReturn { name }.at(dbg));
            }
            match &body.ret_ty {
                Some(ret_ty)
                    if ret_ty.prim == sig.ret.prim
                        && ret_ty.dims == sig.ret.dims
                        && Qualifier::matches(ret_ty.qual, sig.ret.qual) => {}
                Some(ret_ty) => {
                    return Err(SemErrorKind::ReturnTypeMismatch {
                        expected: sig.ret.to_string(),
                        found: ret_ty.to_string(),
                    }
                    .at(dbg))
                }
                None => return Err(SemErrorKind::MissingReturn { name }.at(dbg)),
            }
        }

        if sig.unitary && !body.unitary {
            return Err(SemErrorKind::NonUnitaryBody { name }.at(dbg));
        }
        if sig.quantizable && !body.quantizable {
            return Err(SemErrorKind::NonQuantizableBody { name }.at(dbg));
        }

        debug!(func = %name, "verified function definition");
        Ok(Stmt {
            kind: StmtKind::FuncDef {
                sym,
                body: Box::new(body),
            },
            quantizable: sig.quantizable,
            unitary: sig.unitary,
            ret: ReturnStyle::None,
            ret_ty: None,
            dbg,
        })
    }

    pub fn build_expr_stmt(&mut self, expr: Expr, dbg: Option<DebugLoc>) -> Result<Stmt, SemError> {
        let quantizable = expr.quantizable;
        let unitary = expr.unitary;
        Ok(Stmt {
            kind: StmtKind::ExprStmt {
                expr: Box::new(expr),
            },
            quantizable,
            unitary,
            ret: ReturnStyle::None,
            ret_ty: None,
            dbg,
        })
    }

    /// `=` on a reference. A quantum target accepts exactly one assignment
    /// over its lifetime.
    pub fn build_assign(
        &mut self,
        target: Expr,
        value: Expr,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        let sym = match &target.kind {
            ExprKind::Ref { sym, .. } => *sym,
            _ => {
                return Err(SemErrorKind::NotAReference {
                    context: "assignment target".to_string(),
                }
                .at(dbg))
            }
        };
        let entry = self.symtab.entry(sym);
        let name = entry.name.clone();
        let var = match &entry.info {
            SymbolInfo::Var(v) => v.clone(),
            SymbolInfo::Func(_) => return Err(SemErrorKind::NotAVariable(name).at(dbg)),
        };

        if var.ty.is_constant() {
            return Err(SemErrorKind::NotAssignable(name).at(dbg));
        }
        if var.ty.is_quantum() && var.initialized {
            return Err(SemErrorKind::QuantumReassigned(name).at(dbg));
        }

        if !PrimKind::compatible(target.ty.prim, value.ty.prim) {
            return Err(SemErrorKind::MismatchedTypes {
                expected: target.ty.to_string(),
                found: value.ty.to_string(),
            }
            .at(dbg));
        }
        target.ty.same_shape(&value.ty).map_err(|k| k.at(dbg))?;
        if value.ty.is_quantum() && !target.ty.is_quantum() {
            return Err(SemErrorKind::QualifierMismatch {
                expected: target.ty.qual.to_string(),
                found: value.ty.qual.to_string(),
            }
            .at(dbg));
        }

        if let SymbolInfo::Var(v) = &mut self.symtab.entry_mut(sym).info {
            v.initialized = true;
        }

        let quantizable = target.quantizable && value.quantizable;
        let unitary = target.unitary && value.unitary;
        Ok(Stmt {
            kind: StmtKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            quantizable,
            unitary,
            ret: ReturnStyle::None,
            ret_ty: None,
            dbg,
        })
    }

    /// `if`/`else-if`/`else` chain. Branches governed by a quantum condition
    /// must be unitary and must not return.
    pub fn build_if(
        &mut self,
        cond: Expr,
        then_body: Stmt,
        elifs: Vec<(Expr, Stmt)>,
        else_body: Option<Stmt>,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        check_condition(&cond, dbg)?;
        for (c, _) in &elifs {
            check_condition(c, dbg)?;
        }

        // A quantum condition governs its own branch and everything after it
        // in the chain, including the else branch.
        let mut governed = cond.ty.is_quantum();
        check_governed(governed, "if branch", &then_body, dbg)?;
        for (i, (c, body)) in elifs.iter().enumerate() {
            governed |= c.ty.is_quantum();
            check_governed(governed, &format!("else-if branch {}", i + 1), body, dbg)?;
        }
        if let Some(body) = &else_body {
            check_governed(governed, "else branch", body, dbg)?;
        }

        let mut merge = FlowMerge::new();
        merge.add("if branch", &then_body, dbg)?;
        for (i, (_, body)) in elifs.iter().enumerate() {
            merge.add(&format!("else-if branch {}", i + 1), body, dbg)?;
        }
        if let Some(body) = &else_body {
            merge.add("else branch", body, dbg)?;
        }

        let all_definite = then_body.ret == ReturnStyle::Definite
            && elifs.iter().all(|(_, b)| b.ret == ReturnStyle::Definite)
            && else_body
                .as_ref()
                .map_or(false, |b| b.ret == ReturnStyle::Definite);
        let any_reports = then_body.ret.reports()
            || elifs.iter().any(|(_, b)| b.ret.reports())
            || else_body.as_ref().map_or(false, |b| b.ret.reports());
        let style = if all_definite {
            ReturnStyle::Definite
        } else if any_reports {
            ReturnStyle::Conditional
        } else {
            ReturnStyle::None
        };

        let mut quantizable = cond.quantizable && then_body.quantizable;
        let mut unitary = cond.unitary && then_body.unitary;
        for (c, b) in &elifs {
            quantizable &= c.quantizable && b.quantizable;
            unitary &= c.unitary && b.unitary;
        }
        if let Some(b) = &else_body {
            quantizable &= b.quantizable;
            unitary &= b.unitary;
        }

        let ret_ty = if style.reports() { merge.into_ty() } else { None };
        Ok(Stmt {
            kind: StmtKind::If {
                cond: Box::new(cond),
                then_body: Box::new(then_body),
                elifs,
                else_body: else_body.map(Box::new),
            },
            quantizable,
            unitary,
            ret: style,
            ret_ty,
            dbg,
        })
    }

    /// Wraps one `case` arm; validation that needs the scrutinee and the arm
    /// position happens in [`Session::build_switch`].
    pub fn build_case(&self, label: Option<Expr>, body: Stmt, dbg: Option<DebugLoc>) -> Case {
        Case {
            label: label.map(Box::new),
            body,
            dbg,
        }
    }

    pub fn build_switch(
        &mut self,
        scrutinee: Expr,
        cases: Vec<Case>,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        if !scrutinee.ty.prim.is_integer() || !scrutinee.ty.is_scalar() {
            return Err(SemErrorKind::MismatchedTypes {
                expected: "integer scalar".to_string(),
                found: scrutinee.ty.to_string(),
            }
            .at(dbg));
        }
        let quantum = scrutinee.ty.is_quantum();

        let mut seen: Vec<(usize, Value)> = Vec::new();
        let mut default_at: Option<usize> = None;
        let mut merge = FlowMerge::new();
        let mut all_definite = true;
        let mut any_reports = false;
        let mut quantizable = scrutinee.quantizable;
        let mut unitary = scrutinee.unitary;

        for (i, case) in cases.iter().enumerate() {
            let pos = i + 1; // diagnostics cite 1-indexed case positions
            let branch = match &case.label {
                Some(_) => format!("case {}", pos),
                None => "default case".to_string(),
            };

            match &case.label {
                Some(label) => {
                    if !label.ty.prim.is_integer() {
                        return Err(SemErrorKind::MismatchedTypes {
                            expected: scrutinee.ty.to_string(),
                            found: label.ty.to_string(),
                        }
                        .at(case.dbg.or(dbg)));
                    }
                    let val = match label.const_scalar() {
                        Some(v) => v.clone(),
                        None => {
                            return Err(
                                SemErrorKind::NonConstantCase { position: pos }.at(case.dbg.or(dbg))
                            )
                        }
                    };
                    if let Some((first, _)) =
                        seen.iter().find(|(_, v)| v.as_int() == val.as_int())
                    {
                        return Err(SemErrorKind::DuplicateCase {
                            value: val.to_string(),
                            first: *first,
                            second: pos,
                        }
                        .at(case.dbg.or(dbg)));
                    }
                    seen.push((pos, val));
                }
                None => {
                    if let Some(first) = default_at {
                        return Err(SemErrorKind::DuplicateDefault { first, second: pos }
                            .at(case.dbg.or(dbg)));
                    }
                    default_at = Some(pos);
                }
            }

            check_governed(quantum, &branch, &case.body, case.dbg.or(dbg))?;
            merge.add(&branch, &case.body, case.dbg.or(dbg))?;
            all_definite &= case.body.ret == ReturnStyle::Definite;
            any_reports |= case.body.ret.reports();
            quantizable &= case.body.quantizable;
            unitary &= case.body.unitary;
        }

        // Without an explicit default some value falls through, so a
        // would-be definite switch downgrades to conditional.
        let style = if all_definite && default_at.is_some() && !cases.is_empty() {
            ReturnStyle::Definite
        } else if any_reports {
            ReturnStyle::Conditional
        } else {
            ReturnStyle::None
        };

        let ret_ty = if style.reports() { merge.into_ty() } else { None };
        Ok(Stmt {
            kind: StmtKind::Switch {
                scrutinee: Box::new(scrutinee),
                cases,
            },
            quantizable,
            unitary,
            ret: style,
            ret_ty,
            dbg,
        })
    }

    pub fn build_while(
        &mut self,
        cond: Expr,
        body: Stmt,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        check_loop_condition(&cond, dbg)?;
        // Zero-trip possibility downgrades a definite body.
        let style = match body.ret {
            ReturnStyle::None => ReturnStyle::None,
            _ => ReturnStyle::Conditional,
        };
        let ret_ty = if style.reports() {
            body.ret_ty.clone()
        } else {
            None
        };
        let quantizable = cond.quantizable && body.quantizable;
        Ok(Stmt {
            kind: StmtKind::While {
                cond: Box::new(cond),
                body: Box::new(body),
            },
            quantizable,
            unitary: false,
            ret: style,
            ret_ty,
            dbg,
        })
    }

    pub fn build_do_while(
        &mut self,
        body: Stmt,
        cond: Expr,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        check_loop_condition(&cond, dbg)?;
        // The body always runs once, so its style survives.
        let style = body.ret;
        let ret_ty = body.ret_ty.clone();
        let quantizable = cond.quantizable && body.quantizable;
        Ok(Stmt {
            kind: StmtKind::DoWhile {
                body: Box::new(body),
                cond: Box::new(cond),
            },
            quantizable,
            unitary: false,
            ret: style,
            ret_ty,
            dbg,
        })
    }

    pub fn build_for(
        &mut self,
        init: Option<Stmt>,
        cond: Expr,
        step: Option<Stmt>,
        body: Stmt,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        check_loop_condition(&cond, dbg)?;
        let style = match body.ret {
            ReturnStyle::None => ReturnStyle::None,
            _ => ReturnStyle::Conditional,
        };
        let ret_ty = if style.reports() {
            body.ret_ty.clone()
        } else {
            None
        };
        let mut quantizable = cond.quantizable && body.quantizable;
        if let Some(s) = &init {
            quantizable &= s.quantizable;
        }
        if let Some(s) = &step {
            quantizable &= s.quantizable;
        }
        Ok(Stmt {
            kind: StmtKind::For {
                init: init.map(Box::new),
                cond: Box::new(cond),
                step: step.map(Box::new),
                body: Box::new(body),
            },
            quantizable,
            unitary: false,
            ret: style,
            ret_ty,
            dbg,
        })
    }

    /// Phase adjustment: rotates a quantum reference by a non-quantum,
    /// non-bool scalar amount.
    pub fn build_phase_adj(
        &mut self,
        target: Expr,
        amount: Expr,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        if !target.is_reference() {
            return Err(SemErrorKind::NotAReference {
                context: "phase adjustment target".to_string(),
            }
            .at(dbg));
        }
        if !target.ty.is_quantum() {
            return Err(SemErrorKind::NotQuantum {
                found: target.ty.to_string(),
            }
            .at(dbg));
        }
        if amount.ty.is_quantum() || !amount.ty.prim.is_integer() || !amount.ty.is_scalar() {
            return Err(SemErrorKind::BadPhaseOperand {
                found: amount.ty.to_string(),
            }
            .at(dbg));
        }
        let quantizable = false;
        let unitary = amount.unitary;
        Ok(Stmt {
            kind: StmtKind::PhaseAdj {
                target: Box::new(target),
                amount: Box::new(amount),
            },
            quantizable,
            unitary,
            ret: ReturnStyle::None,
            ret_ty: None,
            dbg,
        })
    }

    pub fn build_break(&mut self, dbg: Option<DebugLoc>) -> Result<Stmt, SemError> {
        Ok(jump_stmt(StmtKind::Break, dbg))
    }

    pub fn build_continue(&mut self, dbg: Option<DebugLoc>) -> Result<Stmt, SemError> {
        Ok(jump_stmt(StmtKind::Continue, dbg))
    }

    pub fn build_return(
        &mut self,
        val: Option<Expr>,
        dbg: Option<DebugLoc>,
    ) -> Result<Stmt, SemError> {
        let (ret_ty, quantizable, unitary) = match &val {
            Some(e) => (e.ty.clone(), e.quantizable, e.unitary),
            None => (TypeInfo::void(), true, true),
        };
        Ok(Stmt {
            kind: StmtKind::Return {
                val: val.map(Box::new),
            },
            quantizable,
            unitary,
            ret: ReturnStyle::Definite,
            ret_ty: Some(ret_ty),
            dbg,
        })
    }
}

// ----- Flow helpers -----

/// Accumulates the return type across reporting branches, failing when two
/// branches disagree in qualifier class, primitive type, rank, or any
/// dimension size.
struct FlowMerge {
    reported: Option<(String, TypeInfo)>,
}

impl FlowMerge {
    fn new() -> Self {
        FlowMerge { reported: None }
    }

    fn add(&mut self, branch: &str, stmt: &Stmt, dbg: Option<DebugLoc>) -> Result<(), SemError> {
        let ty = match &stmt.ret_ty {
            Some(ty) => ty,
            None => return Ok(()),
        };
        match &self.reported {
            None => {
                self.reported = Some((branch.to_string(), ty.clone()));
                Ok(())
            }
            Some((first, prev)) => match return_mismatch(prev, ty) {
                Some(attribute) => Err(SemErrorKind::InconsistentReturn {
                    first: first.clone(),
                    second: branch.to_string(),
                    attribute,
                }
                .at(dbg)),
                None => Ok(()),
            },
        }
    }

    fn into_ty(self) -> Option<TypeInfo> {
        self.reported.map(|(_, ty)| ty)
    }
}

fn return_mismatch(a: &TypeInfo, b: &TypeInfo) -> Option<String> {
    if !Qualifier::matches(a.qual, b.qual) {
        return Some("qualifier".to_string());
    }
    if a.prim != b.prim {
        return Some("primitive type".to_string());
    }
    if a.rank() != b.rank() {
        return Some("rank".to_string());
    }
    for (i, (l, r)) in a.dims.iter().zip(b.dims.iter()).enumerate() {
        if l != r {
            return Some(format!("dimension {}", i + 1));
        }
    }
    None
}

fn check_condition(cond: &Expr, dbg: Option<DebugLoc>) -> Result<(), SemError> {
    if cond.ty.prim != PrimKind::Bool || !cond.ty.is_scalar() {
        return Err(SemErrorKind::NonBoolCondition {
            found: cond.ty.to_string(),
        }
        .at(cond.dbg.or(dbg)));
    }
    Ok(())
}

fn check_loop_condition(cond: &Expr, dbg: Option<DebugLoc>) -> Result<(), SemError> {
    if cond.ty.is_quantum() {
        return Err(SemErrorKind::QuantumLoopCondition.at(cond.dbg.or(dbg)));
    }
    check_condition(cond, dbg)
}

/// Branches executed under a quantum condition must be unitary and must not
/// return on any path.
fn check_governed(
    governed: bool,
    branch: &str,
    body: &Stmt,
    dbg: Option<DebugLoc>,
) -> Result<(), SemError> {
    if !governed {
        return Ok(());
    }
    if !body.unitary {
        return Err(SemErrorKind::NonUnitaryBranch {
            branch: branch.to_string(),
        }
        .at(body.dbg.or(dbg)));
    }
    if body.ret.reports() {
        return Err(SemErrorKind::ReturnUnderQuantumCondition {
            branch: branch.to_string(),
        }
        .at(body.dbg.or(dbg)));
    }
    Ok(())
}

fn jump_stmt(kind: StmtKind, dbg: Option<DebugLoc>) -> Stmt {
    Stmt {
        kind,
        quantizable: true,
        unitary: false,
        ret: ReturnStyle::None,
        ret_ty: None,
        dbg,
    }
}
