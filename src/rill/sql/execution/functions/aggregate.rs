//! Aggregate built-ins.
//!
//! Inside an aggregate context every argument arrives as an array holding one value per
//! member row. Outside one (a plain row) the argument is a single value and is treated
//! as a one-element list.

use super::registry::{BuiltinFunctionDef, FunctionCategory, FunctionHandler};
use super::runtime::FuncCallContext;
use super::validation::{validate_deduplicate, validate_one_arg, validate_one_number_arg, ValidateFn};
use crate::rill::sql::ast::FuncType;
use crate::rill::sql::execution::types::FieldValue;
use std::collections::HashSet;

const fn aggregate(name: &'static str, handler: FunctionHandler, validator: ValidateFn) -> BuiltinFunctionDef {
    BuiltinFunctionDef::new(
        name,
        FunctionCategory::Aggregate,
        FuncType::Aggregate,
        handler,
        validator,
    )
}

pub(super) static FUNCTIONS: &[BuiltinFunctionDef] = &[
    aggregate("avg", avg, validate_one_number_arg),
    aggregate("count", count, validate_one_arg),
    aggregate("max", max, validate_one_number_arg),
    aggregate("min", min, validate_one_number_arg),
    aggregate("sum", sum, validate_one_number_arg),
    aggregate("collect", collect, validate_one_arg),
    aggregate("deduplicate", deduplicate, validate_deduplicate),
];

/// Per-member values of argument `i`.
fn values(args: &[FieldValue], i: usize) -> &[FieldValue] {
    match args.get(i) {
        Some(FieldValue::Array(a)) => a,
        Some(v) => std::slice::from_ref(v),
        None => &[],
    }
}

fn first_valid(vals: &[FieldValue]) -> Option<&FieldValue> {
    vals.iter().find(|v| !v.is_null())
}

/// Total of the non-null values, typed after the first of them.
enum Total {
    /// No non-null value at all
    Missing,
    Int(i64),
    Float(f64),
}

fn total(name: &str, vals: &[FieldValue]) -> Result<(Total, usize), FieldValue> {
    let invalid = |v: &FieldValue| {
        FieldValue::error(format!(
            "run {} function error: found invalid arg {}({})",
            name,
            v.type_name(),
            v
        ))
    };
    let mut count = 0;
    match first_valid(vals) {
        None => Ok((Total::Missing, 0)),
        Some(FieldValue::Integer(_)) | Some(FieldValue::UInteger(_)) => {
            let mut t: i64 = 0;
            for v in vals.iter().filter(|v| !v.is_null()) {
                let i = match v {
                    FieldValue::Integer(i) => *i,
                    FieldValue::UInteger(u) => i64::try_from(*u).map_err(|_| invalid(v))?,
                    other => return Err(invalid(other)),
                };
                t = t.wrapping_add(i);
                count += 1;
            }
            Ok((Total::Int(t), count))
        }
        Some(FieldValue::Float(_)) => {
            let mut t = 0.0;
            for v in vals.iter().filter(|v| !v.is_null()) {
                t += v.to_f64().ok_or_else(|| invalid(v))?;
                count += 1;
            }
            Ok((Total::Float(t), count))
        }
        Some(other) => Err(invalid(other)),
    }
}

fn avg(_: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    match total("avg", values(args, 0)) {
        Ok((Total::Missing, _)) | Ok((_, 0)) => FieldValue::Integer(0),
        Ok((Total::Int(t), c)) => FieldValue::Integer(t / c as i64),
        Ok((Total::Float(t), c)) => FieldValue::Float(t / c as f64),
        Err(e) => e,
    }
}

/// Zero over no rows, null over rows that are all null.
fn sum(_: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    let vals = values(args, 0);
    match total("sum", vals) {
        Ok((Total::Missing, _)) if vals.is_empty() => FieldValue::Integer(0),
        Ok((Total::Missing, _)) => FieldValue::Null,
        Ok((Total::Int(t), _)) => FieldValue::Integer(t),
        Ok((Total::Float(t), _)) => FieldValue::Float(t),
        Err(e) => e,
    }
}

fn count(_: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    FieldValue::Integer(values(args, 0).iter().filter(|v| !v.is_null()).count() as i64)
}

/// Shared body of max and min. `pick` gets the ordering of a candidate against the current best.
fn extreme(name: &str, args: &[FieldValue], pick: fn(std::cmp::Ordering) -> bool) -> FieldValue {
    let vals = values(args, 0);
    if vals.is_empty() {
        return FieldValue::error(format!("run {} function error: empty data", name));
    }
    let Some(first) = first_valid(vals) else {
        return FieldValue::Null;
    };
    let mismatch = |v: &FieldValue| {
        FieldValue::error(format!(
            "run {} function error: found invalid arg {}({})",
            name,
            v.type_name(),
            v
        ))
    };
    let mut best = first.clone();
    for v in vals.iter().filter(|v| !v.is_null()) {
        let ord = if first.is_numeric() && v.is_numeric() {
            v.to_f64()
                .zip(best.to_f64())
                .and_then(|(a, b)| a.partial_cmp(&b))
        } else {
            match (v, &best) {
                (FieldValue::String(a), FieldValue::String(b)) => Some(a.cmp(b)),
                _ => None,
            }
        };
        match ord {
            Some(o) if pick(o) => best = v.clone(),
            Some(_) => {}
            None => return mismatch(v),
        }
    }
    best
}

fn max(_: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    extreme("max", args, |o| o == std::cmp::Ordering::Greater)
}

fn min(_: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    extreme("min", args, |o| o == std::cmp::Ordering::Less)
}

fn collect(_: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    FieldValue::Array(values(args, 0).to_vec())
}

/// `deduplicate(rows, keys, all)`; the row list is the implicit wildcard argument.
fn deduplicate(_: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    let (rows, keys) = (values(args, 0), values(args, 1));
    let all = first_valid(values(args, 2)).and_then(FieldValue::as_bool);
    let Some(all) = all else {
        return FieldValue::error("Invalid argument type found.");
    };
    if rows.len() != keys.len() {
        return FieldValue::error("Invalid argument type found.");
    }
    let mut seen = HashSet::new();
    let mut result = Vec::new();
    for (i, key) in keys.iter().enumerate() {
        if seen.insert(key.to_string()) && (all || i == keys.len() - 1) {
            result.push(rows[i].clone());
        }
    }
    if all {
        FieldValue::Array(result)
    } else {
        result.pop().unwrap_or(FieldValue::Null)
    }
}
