//! Typed AST definitions for Quartz. Expression nodes carry their full
//! [`TypeInfo`] plus the derived circuit-legality flags; statement nodes carry
//! the flags plus a return-style classification used by the return-flow
//! analysis in the builder.
//!
//! Nodes are only ever produced by the [`Session`] builder operations, which
//! enforce every static rule before allocating; holding an `Expr` or `Stmt`
//! means the subtree underneath it already verified.
//!
//! [`Session`]: crate::build::Session

use crate::dbg::DebugLoc;
use crate::symtab::SymbolId;
use crate::types::{OpCategory, TypeInfo, Value};
use std::fmt;

// ----- Operators -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOpKind {
    // logical
    LogicalAnd,
    LogicalOr,
    // comparison
    Less,
    Greater,
    LessEq,
    GreaterEq,
    // equality
    Eq,
    NotEq,
    // integer arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // bitwise
    BitAnd,
    BitOr,
    BitXor,
}

impl BinaryOpKind {
    pub fn category(self) -> OpCategory {
        use BinaryOpKind::*;
        match self {
            LogicalAnd | LogicalOr => OpCategory::Logical,
            Less | Greater | LessEq | GreaterEq => OpCategory::Comparison,
            Eq | NotEq => OpCategory::Equality,
            Add | Sub | Mul | Div | Mod => OpCategory::Arith,
            BitAnd | BitOr | BitXor => OpCategory::Bitwise,
        }
    }

    pub fn symbol(self) -> &'static str {
        use BinaryOpKind::*;
        match self {
            LogicalAnd => "&&",
            LogicalOr => "||",
            Less => "<",
            Greater => ">",
            LessEq => "<=",
            GreaterEq => ">=",
            Eq => "==",
            NotEq => "!=",
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
        }
    }
}

impl fmt::Display for BinaryOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOpKind {
    BitNot,
    Not,
}

impl UnaryOpKind {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOpKind::BitNot => "~",
            UnaryOpKind::Not => "!",
        }
    }
}

impl fmt::Display for UnaryOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// ----- Return styles -----

/// Whether a statement (or statement sequence) returns on no paths, some
/// paths, or all paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStyle {
    None,
    Conditional,
    Definite,
}

impl ReturnStyle {
    pub fn reports(self) -> bool {
        self != ReturnStyle::None
    }
}

// ----- Expressions -----

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: TypeInfo,
    /// Eligible to be lifted into a superposition-creating context.
    pub quantizable: bool,
    /// Safe to execute reversibly inside a quantum-conditioned branch.
    pub unitary: bool,
    pub dbg: Option<DebugLoc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A folded compile-time constant. Scalars hold one element; constant
    /// arrays hold `ty.elem_count()` elements in row-major order.
    Const { elems: Vec<Value> },

    /// A (possibly partially indexed) reference to a declared variable.
    Ref {
        sym: SymbolId,
        indices: Vec<Expr>,
    },

    /// An ordinary function call.
    Call {
        sym: SymbolId,
        args: Vec<Expr>,
    },

    /// A superposition-creating call against a quantum reference.
    SuperposCall {
        sym: SymbolId,
        arg: Box<Expr>,
    },

    Binary {
        op: BinaryOpKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    Unary {
        op: UnaryOpKind,
        operand: Box<Expr>,
    },

    /// Collapses a quantum reference into a classical value of the same
    /// primitive type and shape.
    Measure { operand: Box<Expr> },
}

impl Expr {
    /// The folded elements, if this node is a compile-time constant.
    pub fn const_elems(&self) -> Option<&[Value]> {
        match &self.kind {
            ExprKind::Const { elems } => Some(elems),
            _ => None,
        }
    }

    /// The scalar constant value, if this node is a scalar constant.
    pub fn const_scalar(&self) -> Option<&Value> {
        match self.const_elems() {
            Some([v]) => Some(v),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self.kind, ExprKind::Ref { .. })
    }
}

// ----- Statements -----

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub quantizable: bool,
    pub unitary: bool,
    pub ret: ReturnStyle,
    /// Type returned on the reporting paths; `None` iff `ret` is `None`.
    pub ret_ty: Option<TypeInfo>,
    pub dbg: Option<DebugLoc>,
}

/// One arm of a `switch`. `label` is `None` for the default case; otherwise
/// it is a folded constant expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub label: Option<Box<Expr>>,
    pub body: Stmt,
    pub dbg: Option<DebugLoc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// A verified statement sequence, already truncated at the first
    /// `break`/`continue`/definitely-returning statement.
    Block { stmts: Vec<Stmt> },

    /// Declaration without an initializer.
    Decl { sym: SymbolId },

    /// Declaration with an initializer.
    Def { sym: SymbolId, init: Box<Expr> },

    FuncDef { sym: SymbolId, body: Box<Stmt> },

    /// An expression evaluated for its effect (calls, mostly).
    ExprStmt { expr: Box<Expr> },

    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },

    If {
        cond: Box<Expr>,
        then_body: Box<Stmt>,
        elifs: Vec<(Expr, Stmt)>,
        else_body: Option<Box<Stmt>>,
    },

    Switch {
        scrutinee: Box<Expr>,
        cases: Vec<Case>,
    },

    For {
        init: Option<Box<Stmt>>,
        cond: Box<Expr>,
        step: Option<Box<Stmt>>,
        body: Box<Stmt>,
    },

    While {
        cond: Box<Expr>,
        body: Box<Stmt>,
    },

    DoWhile {
        body: Box<Stmt>,
        cond: Box<Expr>,
    },

    /// Rotates the phase of a quantum reference by a classical amount.
    PhaseAdj {
        target: Box<Expr>,
        amount: Box<Expr>,
    },

    Break,
    Continue,

    Return { val: Option<Box<Expr>> },
}

impl Stmt {
    pub fn is_jump(&self) -> bool {
        matches!(self.kind, StmtKind::Break | StmtKind::Continue)
    }
}
