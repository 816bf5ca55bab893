//! Scalar and set-returning built-ins: math, string, conversion and misc.

use super::registry::{BuiltinFunctionDef, FunctionCategory};
use super::runtime::FuncCallContext;
use super::validation::*;
use crate::rill::sql::ast::FuncType;
use crate::rill::sql::execution::types::FieldValue;
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Compiled patterns for `regexp_matches`
static REGEX_CACHE: OnceLock<Mutex<HashMap<String, Arc<Regex>>>> = OnceLock::new();

/// Upper bound of cached patterns; the cache is cleared when it is reached.
const MAX_REGEX_CACHE_SIZE: usize = 1000;

fn cached_regex(pattern: &str) -> Result<Arc<Regex>, FieldValue> {
    let cache = REGEX_CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = guard.get(pattern) {
        return Ok(Arc::clone(re));
    }
    let re = Regex::new(pattern)
        .map(Arc::new)
        .map_err(|e| FieldValue::error(format!("invalid regular expression '{}': {}", pattern, e)))?;
    if guard.len() >= MAX_REGEX_CACHE_SIZE {
        guard.clear();
    }
    guard.insert(pattern.to_string(), Arc::clone(&re));
    Ok(re)
}

type Ctx<'a> = FuncCallContext<'a>;

const fn scalar(
    name: &'static str,
    category: FunctionCategory,
    handler: super::registry::FunctionHandler,
    validator: ValidateFn,
) -> BuiltinFunctionDef {
    BuiltinFunctionDef::new(name, category, FuncType::Scalar, handler, validator)
}

use FunctionCategory::{Math, Other, String as Str, Window};

pub(super) static FUNCTIONS: &[BuiltinFunctionDef] = &[
    scalar("abs", Math, abs, validate_one_number_arg),
    scalar("ceil", Math, ceil, validate_one_number_arg),
    scalar("floor", Math, floor, validate_one_number_arg),
    scalar("round", Math, round, validate_one_number_arg),
    scalar("sqrt", Math, sqrt, validate_one_number_arg),
    scalar("exp", Math, exp, validate_one_number_arg),
    scalar("ln", Math, ln, validate_one_number_arg),
    scalar("log", Math, log10, validate_one_number_arg),
    scalar("sign", Math, sign, validate_one_number_arg),
    scalar("power", Math, power, validate_two_number_args),
    scalar("mod", Math, modulo, validate_two_number_args),
    scalar("bitand", Math, bitand, validate_two_int_args),
    scalar("bitor", Math, bitor, validate_two_int_args),
    scalar("bitxor", Math, bitxor, validate_two_int_args),
    scalar("bitnot", Math, bitnot, validate_one_int_arg),
    scalar("concat", Str, concat, validate_concat),
    scalar("lower", Str, lower, validate_one_str_arg),
    scalar("upper", Str, upper, validate_one_str_arg),
    scalar("length", Str, length, validate_one_str_arg),
    scalar("trim", Str, trim, validate_one_str_arg),
    scalar("ltrim", Str, ltrim, validate_one_str_arg),
    scalar("rtrim", Str, rtrim, validate_one_str_arg),
    scalar("substring", Str, substring, validate_substring),
    scalar("startswith", Str, startswith, validate_two_str_args),
    scalar("endswith", Str, endswith, validate_two_str_args),
    scalar("indexof", Str, indexof, validate_two_str_args),
    scalar("regexp_matches", Str, regexp_matches, validate_two_str_args),
    scalar("split_value", Str, split_value, validate_split_value),
    scalar("cast", Other, cast, validate_cast),
    scalar("coalesce", Other, coalesce, validate_coalesce),
    scalar("isnull", Other, isnull, validate_one_arg),
    scalar("meta", Other, first_arg, validate_meta),
    scalar("mqtt", Other, first_arg, validate_mqtt),
    scalar("now", Other, now, validate_no_arg),
    scalar("tstamp", Other, tstamp, validate_no_arg),
    // answered by the window range in the valuer chain; reaching dispatch means no window
    scalar("window_start", Window, null, validate_no_arg),
    scalar("window_end", Window, null, validate_no_arg),
    scalar("event_time", Window, null, validate_no_arg),
    scalar("window_trigger", Window, null, validate_no_arg),
    BuiltinFunctionDef::new(
        "unnest",
        FunctionCategory::SetReturning,
        FuncType::Srf,
        unnest,
        validate_one_arg,
    ),
];

fn arg(args: &[FieldValue], i: usize) -> &FieldValue {
    args.get(i).unwrap_or(&FieldValue::Null)
}

fn float_arg(args: &[FieldValue], i: usize) -> Result<f64, FieldValue> {
    arg(args, i)
        .to_f64()
        .ok_or_else(|| FieldValue::error("only float64 & int type are supported"))
}

fn int_arg(args: &[FieldValue], i: usize) -> Result<i64, FieldValue> {
    let v = arg(args, i);
    v.to_i64()
        .ok_or_else(|| FieldValue::error(format!("cannot convert {}({}) to int", v.type_name(), v)))
}

/// Integer operand of the bitwise functions. Floats are rejected even when whole.
fn bit_arg(v: &FieldValue) -> Option<i64> {
    match v {
        FieldValue::Integer(i) => Some(*i),
        FieldValue::UInteger(u) => i64::try_from(*u).ok(),
        _ => None,
    }
}

/// String view of any value. Null is the empty string.
fn to_string_always(v: &FieldValue) -> String {
    match v {
        FieldValue::Null => String::new(),
        FieldValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn unary_float(args: &[FieldValue], f: fn(f64) -> f64) -> FieldValue {
    match float_arg(args, 0) {
        Ok(v) => FieldValue::Float(f(v)),
        Err(e) => e,
    }
}

fn abs(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    match arg(args, 0) {
        FieldValue::Integer(i) => FieldValue::Integer(i.wrapping_abs()),
        FieldValue::UInteger(u) => FieldValue::UInteger(*u),
        FieldValue::Float(f) => FieldValue::Float(f.abs()),
        _ => FieldValue::error("only float64 & int type are supported"),
    }
}

fn ceil(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    unary_float(args, f64::ceil)
}

fn floor(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    unary_float(args, f64::floor)
}

fn round(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    unary_float(args, f64::round)
}

fn sqrt(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    unary_float(args, f64::sqrt)
}

fn exp(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    unary_float(args, f64::exp)
}

fn ln(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    unary_float(args, f64::ln)
}

fn log10(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    unary_float(args, f64::log10)
}

fn sign(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    match float_arg(args, 0) {
        Ok(v) if v > 0.0 => FieldValue::Integer(1),
        Ok(v) if v < 0.0 => FieldValue::Integer(-1),
        Ok(_) => FieldValue::Integer(0),
        Err(e) => e,
    }
}

fn power(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    match (float_arg(args, 0), float_arg(args, 1)) {
        (Ok(x), Ok(y)) => FieldValue::Float(x.powf(y)),
        (Err(e), _) | (_, Err(e)) => e,
    }
}

/// Floating point remainder with the sign of the dividend.
fn modulo(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    match (float_arg(args, 0), float_arg(args, 1)) {
        (Ok(x), Ok(y)) => FieldValue::Float(x % y),
        (Err(e), _) | (_, Err(e)) => e,
    }
}

fn bit_binary(args: &[FieldValue], f: fn(i64, i64) -> i64) -> FieldValue {
    match (bit_arg(arg(args, 0)), bit_arg(arg(args, 1))) {
        (Some(a), Some(b)) => FieldValue::Integer(f(a, b)),
        _ => FieldValue::error("Expect int type for both operands."),
    }
}

fn bitand(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    bit_binary(args, |a, b| a & b)
}

fn bitor(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    bit_binary(args, |a, b| a | b)
}

fn bitxor(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    bit_binary(args, |a, b| a ^ b)
}

fn bitnot(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    match bit_arg(arg(args, 0)) {
        Some(a) => FieldValue::Integer(!a),
        None => FieldValue::error("Expect int type for operand."),
    }
}

fn concat(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    FieldValue::String(args.iter().map(to_string_always).collect())
}

/// Apply `f` to the string form of the first argument. Null stays null.
fn map_str(args: &[FieldValue], f: impl FnOnce(&str) -> String) -> FieldValue {
    match arg(args, 0) {
        FieldValue::Null => FieldValue::Null,
        v => FieldValue::String(f(&to_string_always(v))),
    }
}

fn lower(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    map_str(args, str::to_lowercase)
}

fn upper(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    map_str(args, str::to_uppercase)
}

fn trim(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    map_str(args, |s| s.trim().to_string())
}

fn ltrim(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    map_str(args, |s| s.trim_start().to_string())
}

fn rtrim(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    map_str(args, |s| s.trim_end().to_string())
}

fn length(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    FieldValue::Integer(to_string_always(arg(args, 0)).chars().count() as i64)
}

/// Character-indexed substring. Indexes past the end are clamped.
fn substring(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    if arg(args, 0).is_null() {
        return FieldValue::Null;
    }
    let s: Vec<char> = to_string_always(arg(args, 0)).chars().collect();
    let start = match int_arg(args, 1) {
        Ok(v) if v < 0 => return FieldValue::error("start index must be a positive number"),
        Ok(v) => v as usize,
        Err(e) => return e,
    };
    let end = if args.len() > 2 {
        match int_arg(args, 2) {
            Ok(v) if v < 0 => return FieldValue::error("end index must be a positive number"),
            Ok(v) if (v as usize) < start => {
                return FieldValue::error("start index must be smaller than end index")
            }
            Ok(v) => (v as usize).min(s.len()),
            Err(e) => return e,
        }
    } else {
        s.len()
    };
    if start > s.len() {
        return FieldValue::String(String::new());
    }
    FieldValue::String(s[start..end].iter().collect())
}

/// Two string operands, or `on_null` when either is null.
fn str_pair(args: &[FieldValue], on_null: FieldValue, f: impl FnOnce(&str, &str) -> FieldValue) -> FieldValue {
    let (a, b) = (arg(args, 0), arg(args, 1));
    if a.is_null() || b.is_null() {
        return on_null;
    }
    f(&to_string_always(a), &to_string_always(b))
}

fn startswith(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    str_pair(args, FieldValue::Boolean(false), |a, b| {
        FieldValue::Boolean(a.starts_with(b))
    })
}

fn endswith(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    str_pair(args, FieldValue::Boolean(false), |a, b| {
        FieldValue::Boolean(a.ends_with(b))
    })
}

/// Character position of the first occurrence, -1 when absent.
fn indexof(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    str_pair(args, FieldValue::Integer(-1), |a, b| match a.find(b) {
        Some(byte_idx) => FieldValue::Integer(a[..byte_idx].chars().count() as i64),
        None => FieldValue::Integer(-1),
    })
}

fn regexp_matches(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    str_pair(args, FieldValue::Boolean(false), |s, pattern| {
        match cached_regex(pattern) {
            Ok(re) => FieldValue::Boolean(re.is_match(s)),
            Err(e) => e,
        }
    })
}

fn split_value(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    let index = match int_arg(args, 2) {
        Ok(i) => i,
        Err(e) => return e,
    };
    str_pair(args, FieldValue::Null, |s, sep| {
        let parts: Vec<&str> = s.split(sep).collect();
        match usize::try_from(index).ok().and_then(|i| parts.get(i)) {
            Some(p) => FieldValue::String(p.to_string()),
            None => FieldValue::error(format!(
                "{} out of index array (size = {})",
                index,
                parts.len()
            )),
        }
    })
}

fn cast(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    let v = arg(args, 0);
    if v.is_null() {
        return FieldValue::Null;
    }
    let unsupported = || FieldValue::error("Not supported type conversion.");
    match arg(args, 1).as_str() {
        Some("bigint") => match v {
            FieldValue::Integer(_) => v.clone(),
            FieldValue::UInteger(u) => i64::try_from(*u)
                .map(FieldValue::Integer)
                .unwrap_or_else(|_| unsupported()),
            FieldValue::Float(f) => FieldValue::Integer(f.trunc() as i64),
            FieldValue::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => FieldValue::Integer(i),
                Err(e) => FieldValue::error(format!("cannot parse \"{}\" as bigint: {}", s, e)),
            },
            FieldValue::Boolean(b) => FieldValue::Integer(i64::from(*b)),
            _ => unsupported(),
        },
        Some("float") => match v {
            FieldValue::Integer(_) | FieldValue::UInteger(_) | FieldValue::Float(_) => {
                v.to_f64().map(FieldValue::Float).unwrap_or_else(unsupported)
            }
            FieldValue::String(s) => match s.trim().parse::<f64>() {
                Ok(f) => FieldValue::Float(f),
                Err(e) => FieldValue::error(format!("cannot parse \"{}\" as float: {}", s, e)),
            },
            FieldValue::Boolean(b) => FieldValue::Float(if *b { 1.0 } else { 0.0 }),
            _ => unsupported(),
        },
        Some("string") => match v {
            FieldValue::Bytes(b) => match std::str::from_utf8(b) {
                Ok(s) => FieldValue::String(s.to_string()),
                Err(e) => FieldValue::error(format!(
                    "Not supported type conversion, got error {}.",
                    e
                )),
            },
            FieldValue::Timestamp(t) => FieldValue::String(t.to_rfc3339()),
            other => FieldValue::String(to_string_always(other)),
        },
        Some("boolean") => match v {
            FieldValue::Boolean(_) => v.clone(),
            FieldValue::Integer(_) | FieldValue::UInteger(_) | FieldValue::Float(_) => {
                FieldValue::Boolean(v.to_f64().is_some_and(|f| f != 0.0))
            }
            FieldValue::String(s) => match s.trim().to_lowercase().as_str() {
                "1" | "t" | "true" => FieldValue::Boolean(true),
                "0" | "f" | "false" => FieldValue::Boolean(false),
                _ => FieldValue::error(format!("cannot parse \"{}\" as boolean", s)),
            },
            _ => unsupported(),
        },
        Some(_) => FieldValue::error("Unknow type, only support bigint, float, string and boolean."),
        None => FieldValue::error("Expect string type for the 2nd parameter."),
    }
}

fn coalesce(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    args.iter()
        .find(|a| !a.is_null())
        .cloned()
        .unwrap_or(FieldValue::Null)
}

fn isnull(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    FieldValue::Boolean(arg(args, 0).is_null())
}

fn first_arg(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    arg(args, 0).clone()
}

fn now(_: &Ctx<'_>, _args: &[FieldValue]) -> FieldValue {
    FieldValue::Timestamp(Utc::now())
}

fn tstamp(_: &Ctx<'_>, _args: &[FieldValue]) -> FieldValue {
    FieldValue::Integer(Utc::now().timestamp_millis())
}

fn null(_: &Ctx<'_>, _args: &[FieldValue]) -> FieldValue {
    FieldValue::Null
}

/// Returns the array unchanged; the project step expands it into rows.
fn unnest(_: &Ctx<'_>, args: &[FieldValue]) -> FieldValue {
    match arg(args, 0) {
        v @ FieldValue::Array(_) => v.clone(),
        FieldValue::Null => FieldValue::Null,
        other => FieldValue::error(format!(
            "the argument for unnest should be array, got {}",
            other.type_name()
        )),
    }
}
