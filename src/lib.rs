//! Semantic core of the Quartz compiler: typed AST construction fused with
//! static verification for a hybrid quantum/classical imperative language.
//!
//! The grammar layer drives a [`build::Session`], calling one construction
//! operation per node kind as productions reduce. Each operation checks the
//! qualifier, type, shape and quantum-legality rules for its construct, folds
//! compile-time constants, and only then allocates the node, so an [`ast::Expr`]
//! or [`ast::Stmt`] in hand is proof its whole subtree verified. The first
//! violation aborts construction with a [`error::SemError`].

pub mod ast;
pub mod build;
pub mod dbg;
pub mod error;
pub mod symtab;
pub mod types;

pub use ast::{Expr, ExprKind, ReturnStyle, Stmt, StmtKind};
pub use build::Session;
pub use dbg::DebugLoc;
pub use error::{SemError, SemErrorKind};
pub use symtab::{FuncSig, SymbolId, SymbolTable};
pub use types::{PrimKind, Qualifier, TypeInfo, Value};
