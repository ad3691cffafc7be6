//! The Quartz type model: qualifiers, primitive types, array shapes and the
//! table-driven operator result rules. Everything here is pure and stateless;
//! the builder converts `None`/`Err` answers into typed [`SemError`]s.
//!
//! [`SemError`]: crate::error::SemError

use crate::error::SemErrorKind;
use dashu::integer::IBig;
use std::fmt;

/// Arrays are limited to three dimensions.
pub const MAX_RANK: usize = 3;

// ----- Qualifiers -----

/// Static attribute marking a value as a compile-time constant, a runtime
/// quantum value, or a runtime classical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualifier {
    Constant,
    Quantum,
    Classical,
}

impl Qualifier {
    /// True iff both are quantum or both are non-quantum. Constant and
    /// classical are the same class for this purpose.
    pub fn matches(a: Qualifier, b: Qualifier) -> bool {
        (a == Qualifier::Quantum) == (b == Qualifier::Quantum)
    }

    /// Qualifier of an operator result: constant only if both operands are
    /// constant, quantum if either is quantum, classical otherwise.
    pub fn propagate(a: Qualifier, b: Qualifier) -> Qualifier {
        match (a, b) {
            (Qualifier::Constant, Qualifier::Constant) => Qualifier::Constant,
            (Qualifier::Quantum, _) | (_, Qualifier::Quantum) => Qualifier::Quantum,
            _ => Qualifier::Classical,
        }
    }

    pub fn is_quantum(self) -> bool {
        self == Qualifier::Quantum
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Qualifier::Constant => "constant",
            Qualifier::Quantum => "quantum",
            Qualifier::Classical => "classical",
        };
        write!(f, "{}", s)
    }
}

// ----- Primitive types -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimKind {
    Void,
    Bool,
    Signed,
    Unsigned,
}

impl PrimKind {
    /// Whether a value of `found` may appear where `expected` is required.
    /// Bool only accepts bool, signed only signed, unsigned accepts signed or
    /// unsigned, void accepts nothing.
    pub fn compatible(expected: PrimKind, found: PrimKind) -> bool {
        match expected {
            PrimKind::Void => false,
            PrimKind::Bool => found == PrimKind::Bool,
            PrimKind::Signed => found == PrimKind::Signed,
            PrimKind::Unsigned => matches!(found, PrimKind::Signed | PrimKind::Unsigned),
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, PrimKind::Signed | PrimKind::Unsigned)
    }
}

impl fmt::Display for PrimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrimKind::Void => "void",
            PrimKind::Bool => "bool",
            PrimKind::Signed => "signed",
            PrimKind::Unsigned => "unsigned",
        };
        write!(f, "{}", s)
    }
}

// ----- Operator categories and result rules -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    Logical,
    Comparison,
    Equality,
    Arith,
    Bitwise,
}

/// Primitive type of a binary operator result, or `None` when the combination
/// is illegal. Callers turn `None` into an `InvalidOperands` error.
pub fn result_prim(cat: OpCategory, lhs: PrimKind, rhs: PrimKind) -> Option<PrimKind> {
    use PrimKind::*;
    match cat {
        OpCategory::Logical => match (lhs, rhs) {
            (Bool, Bool) => Some(Bool),
            _ => None,
        },
        OpCategory::Comparison => {
            if lhs.is_integer() && rhs.is_integer() && comparable(lhs, rhs) {
                Some(Bool)
            } else {
                None
            }
        }
        OpCategory::Equality => match (lhs, rhs) {
            (Bool, Bool) => Some(Bool),
            _ if lhs.is_integer() && rhs.is_integer() && comparable(lhs, rhs) => Some(Bool),
            _ => None,
        },
        OpCategory::Arith | OpCategory::Bitwise => match (lhs, rhs) {
            (Signed, Signed) => Some(Signed),
            (Unsigned, Signed) | (Unsigned, Unsigned) => Some(Unsigned),
            _ => None,
        },
    }
}

fn comparable(lhs: PrimKind, rhs: PrimKind) -> bool {
    PrimKind::compatible(lhs, rhs) || PrimKind::compatible(rhs, lhs)
}

// ----- TypeInfo -----

/// Full static type of an expression or declaration: qualifier, primitive
/// type and per-dimension array sizes. Scalars have an empty `dims`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub qual: Qualifier,
    pub prim: PrimKind,
    pub dims: Vec<usize>,
}

impl TypeInfo {
    pub fn scalar(qual: Qualifier, prim: PrimKind) -> Self {
        TypeInfo {
            qual,
            prim,
            dims: Vec::new(),
        }
    }

    pub fn array(qual: Qualifier, prim: PrimKind, dims: Vec<usize>) -> Result<Self, SemErrorKind> {
        if dims.len() > MAX_RANK {
            return Err(SemErrorKind::RankLimitExceeded {
                rank: dims.len(),
                max: MAX_RANK,
            });
        }
        Ok(TypeInfo { qual, prim, dims })
    }

    pub fn void() -> Self {
        TypeInfo::scalar(Qualifier::Classical, PrimKind::Void)
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn is_scalar(&self) -> bool {
        self.dims.is_empty()
    }

    pub fn is_quantum(&self) -> bool {
        self.qual.is_quantum()
    }

    pub fn is_constant(&self) -> bool {
        self.qual == Qualifier::Constant
    }

    pub fn is_void(&self) -> bool {
        self.prim == PrimKind::Void
    }

    /// Number of scalar elements: the product of all dimension sizes.
    pub fn elem_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Exact rank and per-dimension equality. Operators never coerce shape,
    /// so any difference is a hard failure naming the offending dimension
    /// (1-indexed in diagnostics).
    pub fn same_shape(&self, other: &TypeInfo) -> Result<(), SemErrorKind> {
        if self.rank() != other.rank() {
            return Err(SemErrorKind::RankMismatch {
                left: self.rank(),
                right: other.rank(),
            });
        }
        for (i, (l, r)) in self.dims.iter().zip(other.dims.iter()).enumerate() {
            if l != r {
                return Err(SemErrorKind::ShapeMismatch {
                    dim: i + 1,
                    left: *l,
                    right: *r,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.qual, self.prim)?;
        for d in &self.dims {
            write!(f, "[{}]", d)?;
        }
        Ok(())
    }
}

// ----- Compile-time values -----

/// A folded constant. The tag always matches the primitive type of the node
/// carrying it. Integers are arbitrary precision so constant arithmetic never
/// wraps before codegen decides on a machine width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Signed(IBig),
    Unsigned(IBig),
}

impl Value {
    pub fn prim(&self) -> PrimKind {
        match self {
            Value::Bool(_) => PrimKind::Bool,
            Value::Signed(_) => PrimKind::Signed,
            Value::Unsigned(_) => PrimKind::Unsigned,
        }
    }

    pub fn signed(v: i64) -> Self {
        Value::Signed(IBig::from(v))
    }

    pub fn unsigned(v: u64) -> Self {
        Value::Unsigned(IBig::from(v))
    }

    /// The integer payload, regardless of signedness tag.
    pub fn as_int(&self) -> Option<&IBig> {
        match self {
            Value::Signed(v) | Value::Unsigned(v) => Some(v),
            Value::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Signed(v) | Value::Unsigned(v) => write!(f, "{}", v),
        }
    }
}
