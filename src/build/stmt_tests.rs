use super::Session;
use crate::ast::{ReturnStyle, StmtKind, Stmt};
use crate::error::SemErrorKind;
use crate::symtab::FuncSig;
use crate::types::{PrimKind, Qualifier, TypeInfo, Value};

fn classical(prim: PrimKind) -> TypeInfo {
    TypeInfo::scalar(Qualifier::Classical, prim)
}

fn quantum(prim: PrimKind) -> TypeInfo {
    TypeInfo::scalar(Qualifier::Quantum, prim)
}

fn true_cond(ses: &mut Session) -> crate::ast::Expr {
    ses.build_const(Value::Bool(true), None)
}

fn return_signed(ses: &mut Session, v: i64) -> Stmt {
    let e = ses.build_const(Value::signed(v), None);
    ses.build_return(Some(e), None).unwrap()
}

/// A statement that is legal everywhere a classical statement is, but not
/// unitary: measuring a fresh quantum variable.
fn measure_stmt(ses: &mut Session, name: &str) -> Stmt {
    let q = ses.declare_var(name, 1, quantum(PrimKind::Bool), None).unwrap();
    let q_ref = ses.build_ref(q, vec![], None).unwrap();
    let m = ses.build_measure(q_ref, None).unwrap();
    ses.build_expr_stmt(m, None).unwrap()
}

fn signed_fn_sig() -> FuncSig {
    FuncSig {
        params: vec![],
        ret: classical(PrimKind::Signed),
        unitary: false,
        quantizable: false,
    }
}

#[test]
fn test_block_truncates_after_definite_return() {
    let mut ses = Session::new();
    let ret = return_signed(&mut ses, 1);
    let dead = {
        let e = ses.build_const(Value::signed(2), None);
        ses.build_expr_stmt(e, None).unwrap()
    };
    let block = ses.build_block(vec![ret, dead], None).unwrap();
    assert_eq!(block.ret, ReturnStyle::Definite);
    match &block.kind {
        StmtKind::Block { stmts } => assert_eq!(stmts.len(), 1),
        other => panic!("expected a block, got {:?}", other),
    }
}

#[test]
fn test_block_truncates_at_break() {
    let mut ses = Session::new();
    let brk = ses.build_break(None).unwrap();
    let ret = return_signed(&mut ses, 1);
    let block = ses.build_block(vec![brk, ret], None).unwrap();
    // break becomes the list's style: nothing after it runs.
    assert_eq!(block.ret, ReturnStyle::None);
    assert_eq!(block.ret_ty, None);
    match &block.kind {
        StmtKind::Block { stmts } => assert_eq!(stmts.len(), 1),
        other => panic!("expected a block, got {:?}", other),
    }
}

#[test]
fn test_missing_return_then_fixed() {
    let mut ses = Session::new();
    let f = ses.declare_func("f", 1, signed_fn_sig(), None).unwrap();

    // if without else: only a conditional return.
    let cond = true_cond(&mut ses);
    let then_ret = return_signed(&mut ses, 1);
    let then_body = ses.build_block(vec![then_ret], None).unwrap();
    let partial = ses.build_if(cond, then_body, vec![], None, None).unwrap();
    assert_eq!(partial.ret, ReturnStyle::Conditional);
    let body = ses.build_block(vec![partial], None).unwrap();
    let err = ses.build_func_def(f, body, None).unwrap_err();
    assert_eq!(err.kind, SemErrorKind::MissingReturn { name: "f".to_string() });
    assert_eq!(
        err.to_string(),
        "function 'f' does not return in all branches"
    );

    // Adding the else branch makes every path return.
    let cond = true_cond(&mut ses);
    let then_ret = return_signed(&mut ses, 1);
    let then_body = ses.build_block(vec![then_ret], None).unwrap();
    let else_ret = return_signed(&mut ses, 2);
    let else_body = ses.build_block(vec![else_ret], None).unwrap();
    let full = ses
        .build_if(cond, then_body, vec![], Some(else_body), None)
        .unwrap();
    assert_eq!(full.ret, ReturnStyle::Definite);
    let body = ses.build_block(vec![full], None).unwrap();
    assert!(ses.build_func_def(f, body, None).is_ok());
}

#[test]
fn test_inconsistent_return_across_branches() {
    let mut ses = Session::new();
    let cond = true_cond(&mut ses);
    let then_ret = return_signed(&mut ses, 1);
    let then_body = ses.build_block(vec![then_ret], None).unwrap();
    let else_ret = {
        let e = ses.build_const(Value::Bool(true), None);
        ses.build_return(Some(e), None).unwrap()
    };
    let else_body = ses.build_block(vec![else_ret], None).unwrap();
    let err = ses
        .build_if(cond, then_body, vec![], Some(else_body), None)
        .unwrap_err();
    assert_eq!(
        err.kind,
        SemErrorKind::InconsistentReturn {
            first: "if branch".to_string(),
            second: "else branch".to_string(),
            attribute: "primitive type".to_string(),
        }
    );
}

#[test]
fn test_quantum_condition_requires_unitary_branch() {
    let mut ses = Session::new();
    let q = ses.declare_var("q", 1, quantum(PrimKind::Bool), None).unwrap();

    // Measuring inside the branch is fine under a classical condition.
    let body = measure_stmt(&mut ses, "m1");
    let body = ses.build_block(vec![body], None).unwrap();
    let cond = true_cond(&mut ses);
    assert!(ses.build_if(cond, body, vec![], None, None).is_ok());

    // The same branch under a quantum condition is rejected.
    let body = measure_stmt(&mut ses, "m2");
    let body = ses.build_block(vec![body], None).unwrap();
    let cond = ses.build_ref(q, vec![], None).unwrap();
    let err = ses.build_if(cond, body, vec![], None, None).unwrap_err();
    assert_eq!(
        err.kind,
        SemErrorKind::NonUnitaryBranch {
            branch: "if branch".to_string()
        }
    );
}

#[test]
fn test_return_under_quantum_condition() {
    let mut ses = Session::new();
    let q = ses.declare_var("q", 1, quantum(PrimKind::Bool), None).unwrap();
    let ret = return_signed(&mut ses, 1);
    let body = ses.build_block(vec![ret], None).unwrap();
    let cond = ses.build_ref(q, vec![], None).unwrap();
    let err = ses.build_if(cond, body, vec![], None, None).unwrap_err();
    assert_eq!(
        err.kind,
        SemErrorKind::ReturnUnderQuantumCondition {
            branch: "if branch".to_string()
        }
    );
}

#[test]
fn test_quantum_single_assignment() {
    let mut ses = Session::new();
    let q = ses.declare_var("q", 1, quantum(PrimKind::Bool), None).unwrap();

    let target = ses.build_ref(q, vec![], None).unwrap();
    let value = ses.build_const(Value::Bool(false), None);
    assert!(ses.build_assign(target, value, None).is_ok());

    let target = ses.build_ref(q, vec![], None).unwrap();
    let value = ses.build_const(Value::Bool(true), None);
    let err = ses.build_assign(target, value, None).unwrap_err();
    assert_eq!(err.kind, SemErrorKind::QuantumReassigned("q".to_string()));
}

#[test]
fn test_constant_entry_not_assignable() {
    let mut ses = Session::new();
    let arr = ses
        .declare_var(
            "arr",
            1,
            TypeInfo::array(Qualifier::Constant, PrimKind::Signed, vec![2]).unwrap(),
            None,
        )
        .unwrap();
    let init = ses
        .build_const_array(
            vec![Value::signed(1), Value::signed(2)],
            PrimKind::Signed,
            vec![2],
            None,
        )
        .unwrap();
    ses.build_def(arr, init, None).unwrap();
    let i = ses.declare_var("i", 2, classical(PrimKind::Signed), None).unwrap();

    // A runtime index keeps the constant entry a live reference, so the
    // assignment is caught by the entry's qualifier.
    let i_ref = ses.build_ref(i, vec![], None).unwrap();
    let target = ses.build_ref(arr, vec![i_ref], None).unwrap();
    let value = ses.build_const(Value::signed(9), None);
    let err = ses.build_assign(target, value, None).unwrap_err();
    assert_eq!(err.kind, SemErrorKind::NotAssignable("arr".to_string()));
}

#[test]
fn test_non_constant_initializer() {
    let mut ses = Session::new();
    let x = ses.declare_var("x", 1, classical(PrimKind::Signed), None).unwrap();
    let n = ses
        .declare_var("n", 2, TypeInfo::scalar(Qualifier::Constant, PrimKind::Signed), None)
        .unwrap();
    let x_ref = ses.build_ref(x, vec![], None).unwrap();
    let err = ses.build_def(n, x_ref, None).unwrap_err();
    assert_eq!(
        err.kind,
        SemErrorKind::NonConstantInitializer { name: "n".to_string() }
    );
}

#[test]
fn test_duplicate_switch_cases_cite_positions() {
    let mut ses = Session::new();
    let scrutinee = {
        let x = ses.declare_var("x", 1, classical(PrimKind::Signed), None).unwrap();
        ses.build_ref(x, vec![], None).unwrap()
    };
    let mut cases = Vec::new();
    for v in [1i64, 2, 1] {
        let label = ses.build_const(Value::signed(v), None);
        let body = ses.build_block(vec![], None).unwrap();
        cases.push(ses.build_case(Some(label), body, None));
    }
    let err = ses.build_switch(scrutinee, cases, None).unwrap_err();
    assert_eq!(
        err.kind,
        SemErrorKind::DuplicateCase {
            value: "1".to_string(),
            first: 1,
            second: 3
        }
    );
}

#[test]
fn test_switch_needs_default_to_be_definite() {
    let mut ses = Session::new();
    let x = ses.declare_var("x", 1, classical(PrimKind::Signed), None).unwrap();

    // All cases return, but without a default some value falls through.
    let scrutinee = ses.build_ref(x, vec![], None).unwrap();
    let mut cases = Vec::new();
    for v in [1i64, 2] {
        let label = ses.build_const(Value::signed(v), None);
        let ret = return_signed(&mut ses, v);
        let body = ses.build_block(vec![ret], None).unwrap();
        cases.push(ses.build_case(Some(label), body, None));
    }
    let sw = ses.build_switch(scrutinee, cases, None).unwrap();
    assert_eq!(sw.ret, ReturnStyle::Conditional);

    // An explicit default makes it definite.
    let scrutinee = ses.build_ref(x, vec![], None).unwrap();
    let mut cases = Vec::new();
    for v in [1i64, 2] {
        let label = ses.build_const(Value::signed(v), None);
        let ret = return_signed(&mut ses, v);
        let body = ses.build_block(vec![ret], None).unwrap();
        cases.push(ses.build_case(Some(label), body, None));
    }
    let ret = return_signed(&mut ses, 0);
    let body = ses.build_block(vec![ret], None).unwrap();
    cases.push(ses.build_case(None, body, None));
    let sw = ses.build_switch(scrutinee, cases, None).unwrap();
    assert_eq!(sw.ret, ReturnStyle::Definite);
}

#[test]
fn test_non_constant_case_label() {
    let mut ses = Session::new();
    let x = ses.declare_var("x", 1, classical(PrimKind::Signed), None).unwrap();
    let scrutinee = ses.build_ref(x, vec![], None).unwrap();
    let label = ses.build_ref(x, vec![], None).unwrap();
    let body = ses.build_block(vec![], None).unwrap();
    let case = ses.build_case(Some(label), body, None);
    let err = ses.build_switch(scrutinee, vec![case], None).unwrap_err();
    assert_eq!(err.kind, SemErrorKind::NonConstantCase { position: 1 });
}

#[test]
fn test_quantum_loop_condition_rejected() {
    let mut ses = Session::new();
    let q = ses.declare_var("q", 1, quantum(PrimKind::Bool), None).unwrap();
    let cond = ses.build_ref(q, vec![], None).unwrap();
    let body = ses.build_block(vec![], None).unwrap();
    let err = ses.build_while(cond, body, None).unwrap_err();
    assert_eq!(err.kind, SemErrorKind::QuantumLoopCondition);
}

#[test]
fn test_while_downgrades_do_while_keeps_return_style() {
    let mut ses = Session::new();

    let ret = return_signed(&mut ses, 1);
    let body = ses.build_block(vec![ret], None).unwrap();
    let cond = true_cond(&mut ses);
    let w = ses.build_while(cond, body, None).unwrap();
    // The body may never run.
    assert_eq!(w.ret, ReturnStyle::Conditional);

    let ret = return_signed(&mut ses, 1);
    let body = ses.build_block(vec![ret], None).unwrap();
    let cond = true_cond(&mut ses);
    let dw = ses.build_do_while(body, cond, None).unwrap();
    // The body runs at least once.
    assert_eq!(dw.ret, ReturnStyle::Definite);
}

#[test]
fn test_phase_adjustment() {
    let mut ses = Session::new();
    let q = ses.declare_var("q", 1, quantum(PrimKind::Bool), None).unwrap();
    let c = ses.declare_var("c", 2, classical(PrimKind::Bool), None).unwrap();

    let target = ses.build_ref(q, vec![], None).unwrap();
    let amount = ses.build_const(Value::signed(3), None);
    let adj = ses.build_phase_adj(target, amount, None).unwrap();
    assert!(adj.unitary);

    let target = ses.build_ref(q, vec![], None).unwrap();
    let amount = ses.build_const(Value::Bool(true), None);
    let err = ses.build_phase_adj(target, amount, None).unwrap_err();
    assert!(matches!(err.kind, SemErrorKind::BadPhaseOperand { .. }));

    let target = ses.build_ref(c, vec![], None).unwrap();
    let amount = ses.build_const(Value::signed(3), None);
    let err = ses.build_phase_adj(target, amount, None).unwrap_err();
    assert!(matches!(err.kind, SemErrorKind::NotQuantum { .. }));
}

#[test]
fn test_return_type_mismatch() {
    let mut ses = Session::new();
    let f = ses.declare_func("f", 1, signed_fn_sig(), None).unwrap();
    let ret = {
        let e = ses.build_const(Value::Bool(true), None);
        ses.build_return(Some(e), None).unwrap()
    };
    let body = ses.build_block(vec![ret], None).unwrap();
    let err = ses.build_func_def(f, body, None).unwrap_err();
    assert!(matches!(err.kind, SemErrorKind::ReturnTypeMismatch { .. }));
}

#[test]
fn test_declared_unitary_body_must_be_unitary() {
    let mut ses = Session::new();
    let f = ses
        .declare_func(
            "f",
            1,
            FuncSig {
                params: vec![],
                ret: classical(PrimKind::Void),
                unitary: true,
                quantizable: false,
            },
            None,
        )
        .unwrap();
    let stmt = measure_stmt(&mut ses, "m");
    let body = ses.build_block(vec![stmt], None).unwrap();
    let err = ses.build_func_def(f, body, None).unwrap_err();
    assert_eq!(err.kind, SemErrorKind::NonUnitaryBody { name: "f".to_string() });
}

#[test]
fn test_loops_are_not_unitary() {
    let mut ses = Session::new();
    let cond = true_cond(&mut ses);
    let body = ses.build_block(vec![], None).unwrap();
    let w = ses.build_while(cond, body, None).unwrap();
    assert!(!w.unitary);

    let q = ses.declare_var("q", 1, quantum(PrimKind::Bool), None).unwrap();
    let q_cond = ses.build_ref(q, vec![], None).unwrap();
    let branch = ses.build_block(vec![w], None).unwrap();
    let err = ses.build_if(q_cond, branch, vec![], None, None).unwrap_err();
    assert_eq!(
        err.kind,
        SemErrorKind::NonUnitaryBranch {
            branch: "if branch".to_string()
        }
    );
}

#[test]
fn test_void_function_accepts_bare_return() {
    let mut ses = Session::new();
    let f = ses
        .declare_func(
            "f",
            1,
            FuncSig {
                params: vec![],
                ret: classical(PrimKind::Void),
                unitary: false,
                quantizable: false,
            },
            None,
        )
        .unwrap();
    let ret = ses.build_return(None, None).unwrap();
    let body = ses.build_block(vec![ret], None).unwrap();
    assert!(ses.build_func_def(f, body, None).is_ok());
}
