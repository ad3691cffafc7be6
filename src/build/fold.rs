//! Compile-time constant evaluation. Folding happens elementwise, so scalar
//! constants and whole constant arrays follow the same path. Integer values
//! are arbitrary-precision `IBig`s; bitwise operations use the two's
//! complement semantics dashu defines for signed big integers.

use crate::ast::{BinaryOpKind, UnaryOpKind};
use crate::error::SemErrorKind;
use crate::types::{OpCategory, PrimKind, Value};
use dashu::integer::IBig;

/// Folds `lhs op rhs` elementwise. Shapes were already verified equal, and
/// `prim` is the primitive type of the result as decided by the result-rule
/// table.
pub(crate) fn fold_binary(
    op: BinaryOpKind,
    prim: PrimKind,
    lhs: &[Value],
    rhs: &[Value],
) -> Result<Vec<Value>, SemErrorKind> {
    lhs.iter()
        .zip(rhs.iter())
        .map(|(a, b)| fold_binary_scalar(op, prim, a, b))
        .collect()
}

fn fold_binary_scalar(
    op: BinaryOpKind,
    prim: PrimKind,
    a: &Value,
    b: &Value,
) -> Result<Value, SemErrorKind> {
    match op.category() {
        OpCategory::Logical => {
            let (x, y) = bool_operands(op, a, b)?;
            let out = match op {
                BinaryOpKind::LogicalAnd => x && y,
                BinaryOpKind::LogicalOr => x || y,
                _ => return Err(invalid(op, a, b)),
            };
            Ok(Value::Bool(out))
        }

        OpCategory::Comparison => {
            let (x, y) = int_operands(op, a, b)?;
            let out = match op {
                BinaryOpKind::Less => x < y,
                BinaryOpKind::Greater => x > y,
                BinaryOpKind::LessEq => x <= y,
                BinaryOpKind::GreaterEq => x >= y,
                _ => return Err(invalid(op, a, b)),
            };
            Ok(Value::Bool(out))
        }

        OpCategory::Equality => {
            let eq = match (a, b) {
                (Value::Bool(x), Value::Bool(y)) => x == y,
                _ => {
                    let (x, y) = int_operands(op, a, b)?;
                    x == y
                }
            };
            let out = match op {
                BinaryOpKind::Eq => eq,
                BinaryOpKind::NotEq => !eq,
                _ => return Err(invalid(op, a, b)),
            };
            Ok(Value::Bool(out))
        }

        OpCategory::Arith => {
            let (x, y) = int_operands(op, a, b)?;
            let zero = IBig::from(0u8);
            let out = match op {
                BinaryOpKind::Add => x.clone() + y.clone(),
                BinaryOpKind::Sub => x.clone() - y.clone(),
                BinaryOpKind::Mul => x.clone() * y.clone(),
                BinaryOpKind::Div => {
                    if *y == zero {
                        return Err(SemErrorKind::DivisionByZero);
                    }
                    x.clone() / y.clone()
                }
                BinaryOpKind::Mod => {
                    if *y == zero {
                        return Err(SemErrorKind::DivisionByZero);
                    }
                    x.clone() % y.clone()
                }
                _ => return Err(invalid(op, a, b)),
            };
            wrap_int(prim, out)
        }

        OpCategory::Bitwise => {
            let (x, y) = int_operands(op, a, b)?;
            let out = match op {
                BinaryOpKind::BitAnd => x.clone() & y.clone(),
                BinaryOpKind::BitOr => x.clone() | y.clone(),
                BinaryOpKind::BitXor => x.clone() ^ y.clone(),
                _ => return Err(invalid(op, a, b)),
            };
            wrap_int(prim, out)
        }
    }
}

/// Folds a unary operator elementwise. The result keeps the operand's
/// primitive type.
pub(crate) fn fold_unary(op: UnaryOpKind, elems: &[Value]) -> Result<Vec<Value>, SemErrorKind> {
    elems
        .iter()
        .map(|v| match (op, v) {
            (UnaryOpKind::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnaryOpKind::BitNot, Value::Signed(x)) => Ok(Value::Signed(!x.clone())),
            (UnaryOpKind::BitNot, Value::Unsigned(x)) => Ok(Value::Unsigned(!x.clone())),
            _ => Err(SemErrorKind::InvalidOperand {
                op: op.to_string(),
                ty: v.prim().to_string(),
            }),
        })
        .collect()
}

fn bool_operands(
    op: BinaryOpKind,
    a: &Value,
    b: &Value,
) -> Result<(bool, bool), SemErrorKind> {
    match (a.as_bool(), b.as_bool()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(invalid(op, a, b)),
    }
}

fn int_operands<'v>(
    op: BinaryOpKind,
    a: &'v Value,
    b: &'v Value,
) -> Result<(&'v IBig, &'v IBig), SemErrorKind> {
    match (a.as_int(), b.as_int()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(invalid(op, a, b)),
    }
}

fn wrap_int(prim: PrimKind, v: IBig) -> Result<Value, SemErrorKind> {
    match prim {
        PrimKind::Signed => Ok(Value::Signed(v)),
        PrimKind::Unsigned => Ok(Value::Unsigned(v)),
        _ => Err(SemErrorKind::InvalidOperand {
            op: "fold".to_string(),
            ty: prim.to_string(),
        }),
    }
}

fn invalid(op: BinaryOpKind, a: &Value, b: &Value) -> SemErrorKind {
    SemErrorKind::InvalidOperands {
        op: op.to_string(),
        left: a.prim().to_string(),
        right: b.prim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_arith() {
        let out = fold_binary(
            BinaryOpKind::Add,
            PrimKind::Signed,
            &[Value::signed(3)],
            &[Value::signed(4)],
        )
        .unwrap();
        assert_eq!(out, vec![Value::signed(7)]);
    }

    #[test]
    fn test_fold_division_by_zero() {
        for op in [BinaryOpKind::Div, BinaryOpKind::Mod] {
            let err = fold_binary(op, PrimKind::Signed, &[Value::signed(1)], &[Value::signed(0)])
                .unwrap_err();
            assert_eq!(err, SemErrorKind::DivisionByZero);
        }
    }

    #[test]
    fn test_fold_comparisons() {
        let out = fold_binary(
            BinaryOpKind::LessEq,
            PrimKind::Bool,
            &[Value::signed(3)],
            &[Value::signed(3)],
        )
        .unwrap();
        assert_eq!(out, vec![Value::Bool(true)]);

        let out = fold_binary(
            BinaryOpKind::Less,
            PrimKind::Bool,
            &[Value::signed(4)],
            &[Value::signed(3)],
        )
        .unwrap();
        assert_eq!(out, vec![Value::Bool(false)]);
    }

    #[test]
    fn test_fold_elementwise() {
        let out = fold_binary(
            BinaryOpKind::Mul,
            PrimKind::Unsigned,
            &[Value::unsigned(1), Value::unsigned(2), Value::unsigned(3)],
            &[Value::unsigned(5), Value::unsigned(6), Value::unsigned(7)],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![Value::unsigned(5), Value::unsigned(12), Value::unsigned(21)]
        );
    }

    #[test]
    fn test_fold_unary() {
        assert_eq!(
            fold_unary(UnaryOpKind::Not, &[Value::Bool(false)]).unwrap(),
            vec![Value::Bool(true)]
        );
        assert_eq!(
            fold_unary(UnaryOpKind::BitNot, &[Value::signed(0)]).unwrap(),
            vec![Value::signed(-1)]
        );
    }
}
