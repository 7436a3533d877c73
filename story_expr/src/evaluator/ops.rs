//! Operator semantics for the evaluator.

use crate::compiler::{BinaryOp, UnaryOp};
use crate::value::Value;

pub(crate) fn apply_unary(op: UnaryOp, value: &Value) -> Value {
    match op {
        UnaryOp::Not => Value::Bool(!value.truthy()),
        UnaryOp::Negate => Value::Number(-value.to_number()),
        UnaryOp::Plus => Value::Number(value.to_number()),
        UnaryOp::BitNot => Value::Number(!to_int32(value.to_number()) as f64),
    }
}

/// Apply a strict (non short-circuiting) binary operator.
pub(crate) fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Mul => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Div => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Rem => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Pow => Value::Number(left.to_number().powf(right.to_number())),

        BinaryOp::Eq => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEq => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),

        BinaryOp::Lt => compare(left, right, |o| o.is_lt()),
        BinaryOp::Gt => compare(left, right, |o| o.is_gt()),
        BinaryOp::LtEq => compare(left, right, |o| o.is_le()),
        BinaryOp::GtEq => compare(left, right, |o| o.is_ge()),

        BinaryOp::BitOr => int_op(left, right, |a, b| a | b),
        BinaryOp::BitXor => int_op(left, right, |a, b| a ^ b),
        BinaryOp::BitAnd => int_op(left, right, |a, b| a & b),
        BinaryOp::Shl => int_op(left, right, |a, b| a.wrapping_shl(b as u32 & 31)),
        BinaryOp::Shr => int_op(left, right, |a, b| a >> (b as u32 & 31)),
        BinaryOp::UShr => {
            let a = to_int32(left.to_number()) as u32;
            let b = to_int32(right.to_number()) as u32 & 31;
            Value::Number((a >> b) as f64)
        }

        // Short-circuit operators are handled by the evaluator; this arm
        // only sees already-evaluated operands.
        BinaryOp::And => {
            if left.truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        BinaryOp::Or => {
            if left.truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
        BinaryOp::Coalesce => {
            if left.is_nullish() {
                right.clone()
            } else {
                left.clone()
            }
        }
    }
}

fn add(left: &Value, right: &Value) -> Value {
    let stringy = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if stringy(left) || stringy(right) {
        Value::String(format!("{}{}", left, right))
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

fn compare(left: &Value, right: &Value, test: fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (left, right) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => left.to_number().partial_cmp(&right.to_number()),
    };
    Value::Bool(ordering.map(test).unwrap_or(false))
}

fn int_op(left: &Value, right: &Value, op: fn(i32, i32) -> i32) -> Value {
    let a = to_int32(left.to_number());
    let b = to_int32(right.to_number());
    Value::Number(op(a, b) as f64)
}

/// Truncate to a signed 32-bit integer with wraparound; NaN and infinities give 0.
pub(crate) fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u64 as u32 as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_concatenates_strings() {
        assert_eq!(
            apply_binary(BinaryOp::Add, &"gold: ".into(), &5.into()),
            Value::string("gold: 5")
        );
        assert_eq!(
            apply_binary(BinaryOp::Add, &2.into(), &Value::Bool(true)),
            Value::Number(3.0)
        );
        assert!(apply_binary(BinaryOp::Add, &1.into(), &Value::Undefined)
            .as_number()
            .unwrap()
            .is_nan());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            apply_binary(BinaryOp::Lt, &"apple".into(), &"banana".into()),
            Value::Bool(true)
        );
        assert_eq!(
            apply_binary(BinaryOp::GtEq, &"10".into(), &9.into()),
            Value::Bool(true)
        );
        assert_eq!(
            apply_binary(BinaryOp::Lt, &Value::Undefined, &1.into()),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(apply_binary(BinaryOp::BitOr, &5.into(), &2.into()), Value::Number(7.0));
        assert_eq!(apply_binary(BinaryOp::Shl, &1.into(), &33.into()), Value::Number(2.0));
        assert_eq!(
            apply_binary(BinaryOp::UShr, &(-1).into(), &28.into()),
            Value::Number(15.0)
        );
        assert_eq!(apply_unary(UnaryOp::BitNot, &5.into()), Value::Number(-6.0));
        assert_eq!(to_int32(4_294_967_297.0), 1);
        assert_eq!(to_int32(f64::NAN), 0);
    }

    #[test]
    fn test_remainder_and_power() {
        assert_eq!(apply_binary(BinaryOp::Rem, &(-7).into(), &3.into()), Value::Number(-1.0));
        assert_eq!(apply_binary(BinaryOp::Pow, &2.into(), &10.into()), Value::Number(1024.0));
    }
}
