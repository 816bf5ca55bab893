//! Analytic and column-producing built-ins.
//!
//! Analytic functions get two trailing arguments appended by the evaluator: the
//! eligibility flag computed from `OVER (WHEN ...)` and the partition key. A tuple that
//! is not eligible reads the history without updating it.

use super::registry::{BuiltinFunctionDef, FunctionCategory, FunctionHandler};
use super::runtime::FuncCallContext;
use super::validation::{
    validate_changed_col, validate_changed_cols, validate_had_changed, validate_lag,
    validate_latest, ValidateFn,
};
use crate::rill::sql::ast::FuncType;
use crate::rill::sql::execution::expression::operators::values_equal;
use crate::rill::sql::execution::types::FieldValue;
use std::collections::HashMap;

const fn analytic(name: &'static str, handler: FunctionHandler, validator: ValidateFn) -> BuiltinFunctionDef {
    BuiltinFunctionDef::new(
        name,
        FunctionCategory::Analytic,
        FuncType::Analytic,
        handler,
        validator,
    )
}

pub(super) static FUNCTIONS: &[BuiltinFunctionDef] = &[
    analytic("lag", lag, validate_lag),
    analytic("latest", latest, validate_latest),
    analytic("changed_col", changed_col, validate_changed_col),
    analytic("had_changed", had_changed, validate_had_changed),
    BuiltinFunctionDef::new(
        "changed_cols",
        FunctionCategory::Cols,
        FuncType::Cols,
        changed_cols,
        validate_changed_cols,
    ),
];

/// User arguments, eligibility and partition key of an analytic call.
struct AnalyticArgs<'a> {
    args: &'a [FieldValue],
    eligible: bool,
    key: &'a str,
}

fn split_analytic(args: &[FieldValue]) -> Result<AnalyticArgs<'_>, FieldValue> {
    match args {
        [rest @ .., FieldValue::Boolean(eligible), FieldValue::String(key)] => Ok(AnalyticArgs {
            args: rest,
            eligible: *eligible,
            key,
        }),
        _ => Err(FieldValue::error(
            "analytic function expects the eligibility flag and partition key as its last arguments",
        )),
    }
}

fn ignore_null_arg(v: Option<&FieldValue>) -> Result<bool, FieldValue> {
    match v {
        Some(FieldValue::Boolean(b)) => Ok(*b),
        Some(other) => Err(FieldValue::error(format!(
            "first arg is not a bool but got {}",
            other
        ))),
        None => Err(FieldValue::error("first arg is not a bool but got null")),
    }
}

/// `lag(expr [, offset [, default]])`: the value `offset` eligible tuples back.
fn lag(ctx: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    let a = match split_analytic(args) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if !(1..=3).contains(&a.args.len()) {
        return FieldValue::error(format!(
            "expect one two or three args but got {}",
            a.args.len()
        ));
    }
    let size = match a.args.get(1) {
        None => 1,
        Some(v) => match v.to_i64().and_then(|i| usize::try_from(i).ok()) {
            Some(s) => s,
            None => {
                return FieldValue::error(format!(
                    "error converting second arg {} to int",
                    v
                ))
            }
        },
    };
    let default = a.args.get(2).cloned().unwrap_or(FieldValue::Null);
    let mut queue = match ctx.get_state(a.key) {
        Some(FieldValue::Array(q)) => q,
        _ => vec![default; size],
    };
    if queue.is_empty() {
        return FieldValue::Null;
    }
    if !a.eligible {
        return queue[0].clone();
    }
    let head = queue.remove(0);
    queue.push(a.args[0].clone());
    ctx.put_state(a.key, FieldValue::Array(queue));
    head
}

/// `latest(expr [, default])`: the last non-null value seen.
fn latest(ctx: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    let a = match split_analytic(args) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if a.args.len() != 1 && a.args.len() != 2 {
        return FieldValue::error(format!(
            "expect one or two args but got {}",
            a.args.len()
        ));
    }
    let v = &a.args[0];
    if !a.eligible || v.is_null() {
        return ctx
            .get_state(a.key)
            .or_else(|| a.args.get(1).cloned())
            .unwrap_or(FieldValue::Null);
    }
    ctx.put_state(a.key, v.clone());
    v.clone()
}

/// `changed_col(ignoreNull, expr)`: the value when it differs from the previous one.
fn changed_col(ctx: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    let a = match split_analytic(args) {
        Ok(a) => a,
        Err(e) => return e,
    };
    let ignore_null = match ignore_null_arg(a.args.first()) {
        Ok(b) => b,
        Err(e) => return e,
    };
    let v = a.args.get(1).cloned().unwrap_or(FieldValue::Null);
    if !a.eligible || (ignore_null && v.is_null()) {
        return FieldValue::Null;
    }
    let last = ctx.get_state(a.key).unwrap_or(FieldValue::Null);
    if values_equal(&v, &last) {
        return FieldValue::Null;
    }
    ctx.put_state(a.key, v.clone());
    v
}

/// `had_changed(ignoreNull, expr...)`: true when any of the values changed.
fn had_changed(ctx: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    let a = match split_analytic(args) {
        Ok(a) => a,
        Err(e) => return e,
    };
    if a.args.len() <= 1 {
        return FieldValue::error(format!(
            "expect more than one arg but got {}",
            a.args.len()
        ));
    }
    let ignore_null = match ignore_null_arg(a.args.first()) {
        Ok(b) => b,
        Err(e) => return e,
    };
    if !a.eligible {
        return FieldValue::Boolean(false);
    }
    let mut changed = false;
    for (i, v) in a.args.iter().enumerate().skip(1) {
        if ignore_null && v.is_null() {
            continue;
        }
        let k = format!("{}{}", a.key, i);
        let last = ctx.get_state(&k).unwrap_or(FieldValue::Null);
        if !values_equal(v, &last) {
            changed = true;
            ctx.put_state(&k, v.clone());
        }
    }
    FieldValue::Boolean(changed)
}

/// `changed_cols(prefix, ignoreNull, cols...)`: the columns whose value changed, named
/// `<prefix><column>`. The trailing argument is the name list supplied by the evaluator.
fn changed_cols(ctx: &FuncCallContext<'_>, args: &[FieldValue]) -> FieldValue {
    let Some((FieldValue::Array(names), values)) = args.split_last() else {
        return FieldValue::error(format!(
            "the last arg is not the key list but got {}",
            args.last().unwrap_or(&FieldValue::Null)
        ));
    };
    if values.len() <= 2 {
        return FieldValue::error(format!(
            "expect more than two args but got {}",
            values.len()
        ));
    }
    let prefix = match &values[0] {
        FieldValue::String(s) => s.as_str(),
        other => {
            return FieldValue::error(format!("first arg is not a string but got {}", other))
        }
    };
    let ignore_null = match &values[1] {
        FieldValue::Boolean(b) => *b,
        other => {
            return FieldValue::error(format!("second arg is not a bool but got {}", other))
        }
    };
    let mut result = HashMap::new();
    for (i, v) in values.iter().enumerate().skip(2) {
        if ignore_null && v.is_null() {
            continue;
        }
        let name = names.get(i).and_then(FieldValue::as_str).unwrap_or_default();
        let last = ctx.get_state(name).unwrap_or(FieldValue::Null);
        if !values_equal(v, &last) {
            ctx.put_state(name, v.clone());
            result.insert(format!("{}{}", prefix, name), v.clone());
        }
    }
    if result.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Map(result)
    }
}
