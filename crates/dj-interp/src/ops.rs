//! Primitive conversions and Java arithmetic on runtime values.

use dj_core::PrimitiveType;
use dj_syntax::ast::{BinaryOp, UnaryOp};

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpError {
    DivideByZero,
    /// Operands the checker should have rejected.
    BadOperands,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Num {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

fn rank(value: &Value) -> Option<u8> {
    Some(match value {
        Value::Byte(_) | Value::Short(_) | Value::Char(_) | Value::Int(_) => 0,
        Value::Long(_) => 1,
        Value::Float(_) => 2,
        Value::Double(_) => 3,
        _ => return None,
    })
}

fn at_rank(value: &Value, rank: u8) -> Option<Num> {
    Some(match rank {
        0 => Num::Int(value.as_int()?),
        1 => Num::Long(value.as_i64()?),
        2 => Num::Float(match value {
            Value::Float(f) => *f,
            other => other.as_i64()? as f32,
        }),
        _ => Num::Double(value.as_f64()?),
    })
}

/// Binary numeric promotion of two primitive operands.
fn promote(a: &Value, b: &Value) -> Option<(Num, Num)> {
    let r = rank(a)?.max(rank(b)?);
    Some((at_rank(a, r)?, at_rank(b, r)?))
}

fn promote_one(a: &Value) -> Option<Num> {
    at_rank(a, rank(a)?)
}

fn num_value(n: Num) -> Value {
    match n {
        Num::Int(v) => Value::Int(v),
        Num::Long(v) => Value::Long(v),
        Num::Float(v) => Value::Float(v),
        Num::Double(v) => Value::Double(v),
    }
}

/// Widening or narrowing primitive conversion, as performed by casts and assignments.
pub(crate) fn convert_primitive(value: &Value, to: PrimitiveType) -> Option<Value> {
    if to == PrimitiveType::Boolean {
        return value.as_bool().map(Value::Boolean);
    }
    Some(match value {
        Value::Float(f) => from_f64(f64::from(*f), to),
        Value::Double(d) => from_f64(*d, to),
        other => from_i64(other.as_i64()?, to),
    })
}

fn from_i64(v: i64, to: PrimitiveType) -> Value {
    match to {
        PrimitiveType::Byte => Value::Byte(v as i8),
        PrimitiveType::Short => Value::Short(v as i16),
        PrimitiveType::Char => Value::Char(v as u16),
        PrimitiveType::Int => Value::Int(v as i32),
        PrimitiveType::Long => Value::Long(v),
        PrimitiveType::Float => Value::Float(v as f32),
        PrimitiveType::Double => Value::Double(v as f64),
        PrimitiveType::Boolean => Value::Boolean(v != 0),
    }
}

// Float to integral conversions go through `int` (or `long`) with saturation, NaN becoming 0.
fn from_f64(v: f64, to: PrimitiveType) -> Value {
    match to {
        PrimitiveType::Byte => Value::Byte(v as i32 as i8),
        PrimitiveType::Short => Value::Short(v as i32 as i16),
        PrimitiveType::Char => Value::Char(v as i32 as u16),
        PrimitiveType::Int => Value::Int(v as i32),
        PrimitiveType::Long => Value::Long(v as i64),
        PrimitiveType::Float => Value::Float(v as f32),
        PrimitiveType::Double => Value::Double(v),
        PrimitiveType::Boolean => Value::Boolean(v != 0.0),
    }
}

/// Evaluates a strict (non short-circuit) binary operator on primitive operands.
pub(crate) fn binary(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, OpError> {
    use BinaryOp::*;
    match op {
        Mul | Div | Rem | Add | Sub => {
            let (x, y) = promote(a, b).ok_or(OpError::BadOperands)?;
            arithmetic(op, x, y).map(num_value)
        }
        Shl | Shr | UShr => {
            let distance = b.as_i64().ok_or(OpError::BadOperands)?;
            match promote_one(a).ok_or(OpError::BadOperands)? {
                Num::Int(v) => {
                    let d = (distance & 31) as u32;
                    Ok(Value::Int(match op {
                        Shl => v.wrapping_shl(d),
                        Shr => v.wrapping_shr(d),
                        _ => ((v as u32) >> d) as i32,
                    }))
                }
                Num::Long(v) => {
                    let d = (distance & 63) as u32;
                    Ok(Value::Long(match op {
                        Shl => v.wrapping_shl(d),
                        Shr => v.wrapping_shr(d),
                        _ => ((v as u64) >> d) as i64,
                    }))
                }
                _ => Err(OpError::BadOperands),
            }
        }
        Lt | Gt | Le | Ge => {
            let (x, y) = promote(a, b).ok_or(OpError::BadOperands)?;
            let ordering = match (x, y) {
                (Num::Int(x), Num::Int(y)) => x.partial_cmp(&y),
                (Num::Long(x), Num::Long(y)) => x.partial_cmp(&y),
                (Num::Float(x), Num::Float(y)) => x.partial_cmp(&y),
                (Num::Double(x), Num::Double(y)) => x.partial_cmp(&y),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Boolean(false));
            };
            Ok(Value::Boolean(match op {
                Lt => ordering.is_lt(),
                Gt => ordering.is_gt(),
                Le => ordering.is_le(),
                _ => ordering.is_ge(),
            }))
        }
        Eq | Ne => {
            let equal = primitive_eq(a, b).ok_or(OpError::BadOperands)?;
            Ok(Value::Boolean(equal == (op == Eq)))
        }
        BitAnd | BitOr | BitXor => {
            if let (Some(x), Some(y)) = (a.as_bool(), b.as_bool()) {
                return Ok(Value::Boolean(match op {
                    BitAnd => x & y,
                    BitOr => x | y,
                    _ => x ^ y,
                }));
            }
            match promote(a, b).ok_or(OpError::BadOperands)? {
                (Num::Int(x), Num::Int(y)) => Ok(Value::Int(match op {
                    BitAnd => x & y,
                    BitOr => x | y,
                    _ => x ^ y,
                })),
                (Num::Long(x), Num::Long(y)) => Ok(Value::Long(match op {
                    BitAnd => x & y,
                    BitOr => x | y,
                    _ => x ^ y,
                })),
                _ => Err(OpError::BadOperands),
            }
        }
        And | Or => match (a.as_bool(), b.as_bool()) {
            (Some(x), Some(y)) => Ok(Value::Boolean(if op == And { x && y } else { x || y })),
            _ => Err(OpError::BadOperands),
        },
    }
}

fn arithmetic(op: BinaryOp, x: Num, y: Num) -> Result<Num, OpError> {
    use BinaryOp::*;
    Ok(match (x, y) {
        (Num::Int(x), Num::Int(y)) => Num::Int(match op {
            Add => x.wrapping_add(y),
            Sub => x.wrapping_sub(y),
            Mul => x.wrapping_mul(y),
            Div if y == 0 => return Err(OpError::DivideByZero),
            Div => x.wrapping_div(y),
            Rem if y == 0 => return Err(OpError::DivideByZero),
            _ => x.wrapping_rem(y),
        }),
        (Num::Long(x), Num::Long(y)) => Num::Long(match op {
            Add => x.wrapping_add(y),
            Sub => x.wrapping_sub(y),
            Mul => x.wrapping_mul(y),
            Div if y == 0 => return Err(OpError::DivideByZero),
            Div => x.wrapping_div(y),
            Rem if y == 0 => return Err(OpError::DivideByZero),
            _ => x.wrapping_rem(y),
        }),
        (Num::Float(x), Num::Float(y)) => Num::Float(match op {
            Add => x + y,
            Sub => x - y,
            Mul => x * y,
            Div => x / y,
            _ => x % y,
        }),
        (Num::Double(x), Num::Double(y)) => Num::Double(match op {
            Add => x + y,
            Sub => x - y,
            Mul => x * y,
            Div => x / y,
            _ => x % y,
        }),
        _ => return Err(OpError::BadOperands),
    })
}

/// `==` on two primitives: numeric comparison after promotion, or boolean equality.
pub(crate) fn primitive_eq(a: &Value, b: &Value) -> Option<bool> {
    if let (Some(x), Some(y)) = (a.as_bool(), b.as_bool()) {
        return Some(x == y);
    }
    Some(match promote(a, b)? {
        (Num::Int(x), Num::Int(y)) => x == y,
        (Num::Long(x), Num::Long(y)) => x == y,
        (Num::Float(x), Num::Float(y)) => x == y,
        (Num::Double(x), Num::Double(y)) => x == y,
        _ => return None,
    })
}

/// `+x`, `-x`, `~x` and `!x`.
pub(crate) fn unary(op: UnaryOp, value: &Value) -> Result<Value, OpError> {
    if op == UnaryOp::Not {
        return value
            .as_bool()
            .map(|b| Value::Boolean(!b))
            .ok_or(OpError::BadOperands);
    }
    let n = promote_one(value).ok_or(OpError::BadOperands)?;
    Ok(num_value(match (op, n) {
        (UnaryOp::Minus, Num::Int(v)) => Num::Int(v.wrapping_neg()),
        (UnaryOp::Minus, Num::Long(v)) => Num::Long(v.wrapping_neg()),
        (UnaryOp::Minus, Num::Float(v)) => Num::Float(-v),
        (UnaryOp::Minus, Num::Double(v)) => Num::Double(-v),
        (UnaryOp::BitNot, Num::Int(v)) => Num::Int(!v),
        (UnaryOp::BitNot, Num::Long(v)) => Num::Long(!v),
        (UnaryOp::Plus, n) => n,
        _ => return Err(OpError::BadOperands),
    }))
}

/// `value + delta`, converted back to the type of `value` as `++`/`--` do.
pub(crate) fn step(value: &Value, delta: i32) -> Result<Value, OpError> {
    let kind = value.primitive_type().ok_or(OpError::BadOperands)?;
    let sum = binary(BinaryOp::Add, value, &Value::Int(delta))?;
    convert_primitive(&sum, kind).ok_or(OpError::BadOperands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn integer_arithmetic_wraps_and_traps_division_by_zero() {
        assert_eq!(
            binary(BinaryOp::Add, &Value::Int(i32::MAX), &Value::Int(1)),
            Ok(Value::Int(i32::MIN))
        );
        assert_eq!(
            binary(BinaryOp::Div, &Value::Int(i32::MIN), &Value::Int(-1)),
            Ok(Value::Int(i32::MIN))
        );
        assert_eq!(
            binary(BinaryOp::Rem, &Value::Long(5), &Value::Int(0)),
            Err(OpError::DivideByZero)
        );
        assert_eq!(binary(BinaryOp::Rem, &Value::Int(-7), &Value::Int(3)), Ok(Value::Int(-1)));
    }

    #[test]
    fn promotion_follows_the_ladder() {
        assert_eq!(binary(BinaryOp::Div, &Value::Int(7), &Value::Long(2)), Ok(Value::Long(3)));
        assert_eq!(
            binary(BinaryOp::Div, &Value::Long(7), &Value::Float(2.0)),
            Ok(Value::Float(3.5))
        );
        assert_eq!(
            binary(BinaryOp::Mul, &Value::Char(2), &Value::Double(1.5)),
            Ok(Value::Double(3.0))
        );
        assert_eq!(
            binary(BinaryOp::Add, &Value::Char('a' as u16), &Value::Int(1)),
            Ok(Value::Int(98))
        );
        assert_eq!(binary(BinaryOp::Div, &Value::Double(1.0), &Value::Int(0)), Ok(Value::Double(f64::INFINITY)));
    }

    #[test]
    fn shifts_mask_their_distance() {
        assert_eq!(binary(BinaryOp::Shl, &Value::Int(1), &Value::Int(33)), Ok(Value::Int(2)));
        assert_eq!(binary(BinaryOp::UShr, &Value::Int(-1), &Value::Int(28)), Ok(Value::Int(15)));
        assert_eq!(binary(BinaryOp::Shr, &Value::Long(-8), &Value::Int(1)), Ok(Value::Long(-4)));
    }

    #[test]
    fn comparisons_with_nan_are_false() {
        let nan = Value::Double(f64::NAN);
        assert_eq!(binary(BinaryOp::Lt, &nan, &Value::Int(1)), Ok(Value::Boolean(false)));
        assert_eq!(binary(BinaryOp::Eq, &nan, &nan), Ok(Value::Boolean(false)));
        assert_eq!(binary(BinaryOp::Ne, &nan, &nan), Ok(Value::Boolean(true)));
    }

    #[test]
    fn narrowing_conversions_truncate() {
        assert_eq!(convert_primitive(&Value::Int(300), PrimitiveType::Byte), Some(Value::Byte(44)));
        assert_eq!(convert_primitive(&Value::Double(1e20), PrimitiveType::Int), Some(Value::Int(i32::MAX)));
        assert_eq!(convert_primitive(&Value::Double(f64::NAN), PrimitiveType::Long), Some(Value::Long(0)));
        assert_eq!(convert_primitive(&Value::Int(65), PrimitiveType::Char), Some(Value::Char(65)));
        assert_eq!(step(&Value::Byte(127), 1), Ok(Value::Byte(-128)));
    }
}
