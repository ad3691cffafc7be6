//! Structured semantic errors. Every builder operation fails with a
//! [`SemError`]: a kind carrying interpolated fields plus an optional source
//! location. Compilation is fail-fast, so the first error wins.

use crate::dbg::DebugLoc;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SemErrorKind {
    // Name resolution
    #[error("'{0}' is used but not declared in any enclosing scope")]
    Undeclared(String),
    #[error("'{name}' is already declared at this scope (first declared on line {original_line})")]
    Redeclared { name: String, original_line: usize },
    #[error("'{0}' names a function but is used as a variable")]
    NotAVariable(String),
    #[error("attempt to call '{0}', which is not a function")]
    NotAFunction(String),

    // Types and shapes
    #[error("value type '{found}' does not match the expected type '{expected}'")]
    MismatchedTypes { expected: String, found: String },
    #[error("expected a {expected} value but found a {found} value")]
    QualifierMismatch { expected: String, found: String },
    #[error("operand ranks differ: {left} vs {right}")]
    RankMismatch { left: usize, right: usize },
    #[error("operand sizes differ at dimension {dim}: {left} vs {right}")]
    ShapeMismatch { dim: usize, left: usize, right: usize },
    #[error("arrays may have at most {max} dimensions, but {rank} were declared")]
    RankLimitExceeded { rank: usize, max: usize },
    #[error("operator '{op}' cannot be applied to '{left}' and '{right}'")]
    InvalidOperands {
        op: String,
        left: String,
        right: String,
    },
    #[error("operator '{op}' cannot be applied to '{ty}'")]
    InvalidOperand { op: String, ty: String },
    #[error("condition must be a scalar bool, found '{found}'")]
    NonBoolCondition { found: String },
    #[error("'{0}' is referenced before it is given a value")]
    UninitializedVariable(String),

    // Array references
    #[error("'{name}' has rank {rank} but {given} indices were supplied")]
    TooManyIndices {
        name: String,
        rank: usize,
        given: usize,
    },
    #[error("array index must be an integer scalar, found '{found}'")]
    NonIntegerIndex { found: String },
    #[error("array indices may not be quantum-qualified")]
    QuantumIndex,
    #[error("index {value} is out of bounds at dimension {level} (size {bound})")]
    IndexOutOfBounds {
        level: usize,
        value: String,
        bound: usize,
    },

    // Compile-time arithmetic
    #[error("division/modulo by zero")]
    DivisionByZero,

    // Assignment
    #[error("{context} must be a reference")]
    NotAReference { context: String },
    #[error("'{0}' is constant-qualified and cannot be assigned")]
    NotAssignable(String),
    #[error("quantum variable '{0}' is already initialized and cannot be assigned again")]
    QuantumReassigned(String),
    #[error("'{name}' is constant-qualified, so its initializer must be a compile-time constant")]
    NonConstantInitializer { name: String },

    // Calls
    #[error("call supplies {found} arguments but '{name}' expects {expected}")]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },
    #[error("'{name}' is not quantizable, so it cannot bind a quantum value to parameter {param}")]
    CallNotQuantizable { name: String, param: usize },
    #[error("malformed superposition call: {reason}")]
    MalformedSuperposCall { reason: String },

    // Quantum legality
    #[error("{branch} is not unitary and cannot execute under a quantum condition")]
    NonUnitaryBranch { branch: String },
    #[error("{branch} returns, which is not allowed under a quantum condition")]
    ReturnUnderQuantumCondition { branch: String },
    #[error("loop conditions may not be quantum-qualified")]
    QuantumLoopCondition,
    #[error("phase adjustment operand must be a non-quantum integer scalar, found '{found}'")]
    BadPhaseOperand { found: String },
    #[error("expected a quantum-qualified reference, found '{found}'")]
    NotQuantum { found: String },

    // Control flow
    #[error("function '{name}' does not return in all branches")]
    MissingReturn { name: String },
    #[error("function returns '{found}' but '{expected}' was declared")]
    ReturnTypeMismatch { expected: String, found: String },
    #[error("{first} and {second} return values that differ in {attribute}")]
    InconsistentReturn {
        first: String,
        second: String,
        attribute: String,
    },
    #[error("case {position} label must be a compile-time constant")]
    NonConstantCase { position: usize },
    #[error("cases {first} and {second} share the constant value {value}")]
    DuplicateCase {
        value: String,
        first: usize,
        second: usize,
    },
    #[error("cases {first} and {second} are both default cases")]
    DuplicateDefault { first: usize, second: usize },
    #[error("function '{name}' is declared unitary but its body is not")]
    NonUnitaryBody { name: String },
    #[error("function '{name}' is declared quantizable but its body is not")]
    NonQuantizableBody { name: String },
}

impl SemErrorKind {
    /// Attaches a source location, producing the error value builders return.
    pub fn at(self, dbg: Option<DebugLoc>) -> SemError {
        SemError { kind: self, dbg }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SemError {
    pub kind: SemErrorKind,
    pub dbg: Option<DebugLoc>,
}

impl fmt::Display for SemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dbg {
            Some(loc) => write!(f, "line {}: {}", loc.line, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for SemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}
