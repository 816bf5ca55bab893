//! Binary operator semantics over [`FieldValue`].
//!
//! Every operator is total over the value union: incompatible operands produce a
//! [`FieldValue::Error`] instead of failing the evaluation.

use crate::rill::sql::ast::BinaryOperator;
use crate::rill::sql::execution::types::FieldValue;
use chrono::{DateTime, TimeZone, Utc};

use BinaryOperator::*;

pub const DIVIDED_BY_ZERO: &str = "divided by zero";

/// Apply a non short-circuit binary operator to two evaluated operands.
///
/// Nulls: `=`, `<=` and `>=` are true only when both sides are null, `!=` is the inverse,
/// `<` and `>` are false and every other operator yields null.
pub fn simple_data_eval(
    lhs: &FieldValue,
    rhs: &FieldValue,
    op: BinaryOperator,
    integer_float_division: bool,
) -> FieldValue {
    if lhs.is_null() || rhs.is_null() {
        let both = lhs.is_null() && rhs.is_null();
        return match op {
            Eq | Lte | Gte => FieldValue::Boolean(both),
            Neq => FieldValue::Boolean(!both),
            Lt | Gt => FieldValue::Boolean(false),
            _ => FieldValue::Null,
        };
    }

    match (lhs, rhs) {
        (FieldValue::Boolean(l), FieldValue::Boolean(r)) => bool_eval(*l, *r, op)
            .unwrap_or_else(|| invalid_op_error(lhs, op, rhs)),
        (FieldValue::Float(l), _) => match rhs.to_f64() {
            Some(r) => float_eval(*l, r, op).unwrap_or_else(|| invalid_op_error(lhs, op, rhs)),
            None => invalid_op_error(lhs, op, rhs),
        },
        (FieldValue::Integer(l), FieldValue::Float(r)) => {
            float_eval(*l as f64, *r, op).unwrap_or_else(|| invalid_op_error(lhs, op, rhs))
        }
        (FieldValue::Integer(l), FieldValue::Integer(r)) => {
            int_eval(*l, *r, op, integer_float_division)
                .unwrap_or_else(|| invalid_op_error(lhs, op, rhs))
        }
        (FieldValue::Integer(l), FieldValue::UInteger(r)) => {
            signed_unsigned_eval(*l, *r, op).unwrap_or_else(|| invalid_op_error(lhs, op, rhs))
        }
        (FieldValue::UInteger(l), FieldValue::Float(r)) => {
            float_eval(*l as f64, *r, op).unwrap_or_else(|| invalid_op_error(lhs, op, rhs))
        }
        (FieldValue::UInteger(l), FieldValue::Integer(r)) => {
            unsigned_signed_eval(*l, *r, op).unwrap_or_else(|| invalid_op_error(lhs, op, rhs))
        }
        (FieldValue::UInteger(l), FieldValue::UInteger(r)) => {
            uint_eval(*l, *r, op).unwrap_or_else(|| invalid_op_error(lhs, op, rhs))
        }
        (FieldValue::String(l), FieldValue::String(r)) => {
            compare_eval(l.cmp(r), op).unwrap_or_else(|| invalid_op_error(lhs, op, rhs))
        }
        (FieldValue::Timestamp(l), _) => match to_time(rhs) {
            Some(r) => compare_eval(l.cmp(&r), op).unwrap_or_else(|| invalid_op_error(lhs, op, rhs)),
            None => invalid_op_error(lhs, op, rhs),
        },
        _ => invalid_op_error(lhs, op, rhs),
    }
}

/// `invalid operation int64(1) + string(a)`
pub fn invalid_op_error(lhs: &FieldValue, op: BinaryOperator, rhs: &FieldValue) -> FieldValue {
    FieldValue::Error(format!(
        "invalid operation {}({}) {} {}({})",
        lhs.type_name(),
        lhs,
        op.symbol(),
        rhs.type_name(),
        rhs
    ))
}

fn divided_by_zero() -> Option<FieldValue> {
    Some(FieldValue::error(DIVIDED_BY_ZERO))
}

fn bool_eval(l: bool, r: bool, op: BinaryOperator) -> Option<FieldValue> {
    let v = match op {
        And | BitAnd => l && r,
        Or | BitOr => l || r,
        BitXor | Neq => l != r,
        Eq => l == r,
        _ => return None,
    };
    Some(FieldValue::Boolean(v))
}

fn compare_eval(ord: std::cmp::Ordering, op: BinaryOperator) -> Option<FieldValue> {
    use std::cmp::Ordering::*;
    let v = match op {
        Eq => ord == Equal,
        Neq => ord != Equal,
        Lt => ord == Less,
        Lte => ord != Greater,
        Gt => ord == Greater,
        Gte => ord != Less,
        _ => return None,
    };
    Some(FieldValue::Boolean(v))
}

fn float_eval(l: f64, r: f64, op: BinaryOperator) -> Option<FieldValue> {
    match op {
        Eq => Some(FieldValue::Boolean(l == r)),
        Neq => Some(FieldValue::Boolean(l != r)),
        Lt => Some(FieldValue::Boolean(l < r)),
        Lte => Some(FieldValue::Boolean(l <= r)),
        Gt => Some(FieldValue::Boolean(l > r)),
        Gte => Some(FieldValue::Boolean(l >= r)),
        Add => Some(FieldValue::Float(l + r)),
        Sub => Some(FieldValue::Float(l - r)),
        Mul => Some(FieldValue::Float(l * r)),
        Div if r == 0.0 => divided_by_zero(),
        Div => Some(FieldValue::Float(l / r)),
        Mod if r == 0.0 => divided_by_zero(),
        Mod => Some(FieldValue::Float(l % r)),
        _ => None,
    }
}

fn int_eval(l: i64, r: i64, op: BinaryOperator, integer_float_division: bool) -> Option<FieldValue> {
    match op {
        Add => Some(FieldValue::Integer(l.wrapping_add(r))),
        Sub => Some(FieldValue::Integer(l.wrapping_sub(r))),
        Mul => Some(FieldValue::Integer(l.wrapping_mul(r))),
        Div if r == 0 => divided_by_zero(),
        Div if integer_float_division => Some(FieldValue::Float(l as f64 / r as f64)),
        Div => Some(FieldValue::Integer(l.wrapping_div(r))),
        Mod if r == 0 => divided_by_zero(),
        Mod => Some(FieldValue::Integer(l.wrapping_rem(r))),
        BitAnd => Some(FieldValue::Integer(l & r)),
        BitOr => Some(FieldValue::Integer(l | r)),
        BitXor => Some(FieldValue::Integer(l ^ r)),
        _ => compare_eval(l.cmp(&r), op),
    }
}

fn uint_eval(l: u64, r: u64, op: BinaryOperator) -> Option<FieldValue> {
    match op {
        Add => Some(FieldValue::UInteger(l.wrapping_add(r))),
        Sub => Some(FieldValue::UInteger(l.wrapping_sub(r))),
        Mul => Some(FieldValue::UInteger(l.wrapping_mul(r))),
        Div if r == 0 => divided_by_zero(),
        Div => Some(FieldValue::UInteger(l / r)),
        Mod if r == 0 => divided_by_zero(),
        Mod => Some(FieldValue::UInteger(l % r)),
        BitAnd => Some(FieldValue::UInteger(l & r)),
        BitOr => Some(FieldValue::UInteger(l | r)),
        BitXor => Some(FieldValue::UInteger(l ^ r)),
        _ => compare_eval(l.cmp(&r), op),
    }
}

/// Signed left operand, unsigned right. A negative left side is below every unsigned value.
fn signed_unsigned_eval(l: i64, r: u64, op: BinaryOperator) -> Option<FieldValue> {
    if l < 0 {
        match op {
            Eq => return Some(FieldValue::Boolean(false)),
            Neq | Lt | Lte => return Some(FieldValue::Boolean(true)),
            Gt | Gte => return Some(FieldValue::Boolean(false)),
            _ => {}
        }
    }
    uint_eval(l as u64, r, op)
}

/// Unsigned left operand, signed right. Every unsigned value is above a negative right side.
fn unsigned_signed_eval(l: u64, r: i64, op: BinaryOperator) -> Option<FieldValue> {
    if r < 0 {
        match op {
            Eq => return Some(FieldValue::Boolean(false)),
            Neq | Gt | Gte => return Some(FieldValue::Boolean(true)),
            Lt | Lte => return Some(FieldValue::Boolean(false)),
            _ => {}
        }
    }
    uint_eval(l, r as u64, op)
}

/// Timestamps compare against other timestamps or epoch milliseconds.
pub(crate) fn to_time(v: &FieldValue) -> Option<DateTime<Utc>> {
    match v {
        FieldValue::Timestamp(t) => Some(*t),
        FieldValue::Integer(ms) => Utc.timestamp_millis_opt(*ms).single(),
        FieldValue::UInteger(ms) => i64::try_from(*ms)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        FieldValue::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        _ => None,
    }
}

/// Equality used by CASE subjects, analytic change detection and IN sets.
pub fn values_equal(lhs: &FieldValue, rhs: &FieldValue) -> bool {
    match (lhs, rhs) {
        (FieldValue::Array(a), FieldValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (FieldValue::Map(a), FieldValue::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).map(|w| values_equal(v, w)).unwrap_or(false))
        }
        (FieldValue::Null, FieldValue::Null) => true,
        _ => matches!(
            simple_data_eval(lhs, rhs, Eq, false),
            FieldValue::Boolean(true)
        ),
    }
}
