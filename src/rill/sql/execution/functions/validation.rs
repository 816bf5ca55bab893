//! Parse-time argument checks for built-in functions.
//!
//! Validators only look at literal arguments. A field reference or nested call can
//! produce any type, so it is accepted here and checked when the function runs.

use crate::rill::sql::ast::{BinaryOperator, Expr};
use crate::rill::sql::error::{SqlError, SqlResult};

/// Signature shared by every built-in validator.
pub type ValidateFn = fn(&str, &[Expr]) -> SqlResult<()>;

/// `Expect <type> type for <n> parameter of function <name>.` with a 1-based `n`.
pub fn produce_err_info(name: &str, index: usize, expect: &str) -> SqlError {
    SqlError::validation_error(format!(
        "Expect {} type for {} parameter of function {}.",
        expect,
        index + 1,
        name
    ))
}

pub fn validate_len(name: &str, expected: usize, args: &[Expr]) -> SqlResult<()> {
    if args.len() != expected {
        return Err(SqlError::validation_error(format!(
            "The arguments for {} should be {}.",
            name, expected
        )));
    }
    Ok(())
}

/// Literal that can never be a number.
fn not_number(e: &Expr) -> bool {
    e.is_string_literal() || e.is_time_literal() || e.is_boolean_literal()
}

/// Literal that can never be an integer.
fn not_int(e: &Expr) -> bool {
    e.is_float_literal() || not_number(e)
}

/// Literal that can never be a string.
fn not_string(e: &Expr) -> bool {
    e.is_numeric_literal() || e.is_time_literal() || e.is_boolean_literal()
}

/// Literal that can never be a boolean.
fn not_bool(e: &Expr) -> bool {
    e.is_numeric_literal() || e.is_time_literal() || e.is_string_literal()
}

pub fn validate_any(_name: &str, _args: &[Expr]) -> SqlResult<()> {
    Ok(())
}

pub fn validate_no_arg(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 0, args)
}

pub fn validate_one_arg(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 1, args)
}

pub fn validate_one_number_arg(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 1, args)?;
    if not_number(&args[0]) {
        return Err(produce_err_info(name, 0, "number - float or int"));
    }
    Ok(())
}

pub fn validate_two_number_args(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 2, args)?;
    for (i, a) in args.iter().enumerate() {
        if not_number(a) {
            return Err(produce_err_info(name, i, "number - float or int"));
        }
    }
    Ok(())
}

pub fn validate_one_int_arg(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 1, args)?;
    if not_int(&args[0]) {
        return Err(produce_err_info(name, 0, "int"));
    }
    Ok(())
}

pub fn validate_two_int_args(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 2, args)?;
    for (i, a) in args.iter().enumerate() {
        if not_int(a) {
            return Err(produce_err_info(name, i, "int"));
        }
    }
    Ok(())
}

pub fn validate_one_str_arg(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 1, args)?;
    if not_string(&args[0]) {
        return Err(produce_err_info(name, 0, "string"));
    }
    Ok(())
}

pub fn validate_two_str_args(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 2, args)?;
    for (i, a) in args.iter().enumerate() {
        if not_string(a) {
            return Err(produce_err_info(name, i, "string"));
        }
    }
    Ok(())
}

pub fn validate_concat(name: &str, args: &[Expr]) -> SqlResult<()> {
    if args.is_empty() {
        return Err(SqlError::validation_error(format!(
            "The arguments for {} should be at least one.",
            name
        )));
    }
    for (i, a) in args.iter().enumerate() {
        if not_string(a) {
            return Err(produce_err_info(name, i, "string"));
        }
    }
    Ok(())
}

pub fn validate_substring(name: &str, args: &[Expr]) -> SqlResult<()> {
    if args.len() != 2 && args.len() != 3 {
        return Err(SqlError::validation_error(
            "the arguments for substring should be 2 or 3",
        ));
    }
    if not_string(&args[0]) {
        return Err(produce_err_info(name, 0, "string"));
    }
    for (i, a) in args.iter().enumerate().skip(1) {
        if not_int(a) {
            return Err(produce_err_info(name, i, "int"));
        }
    }
    if let Expr::Integer(start) = &args[1] {
        if *start < 0 {
            return Err(SqlError::validation_error(
                "The start index should not be a nagtive integer.",
            ));
        }
        if let Some(Expr::Integer(end)) = args.get(2) {
            if end < start {
                return Err(SqlError::validation_error(
                    "The end index should be larger than start index.",
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_split_value(name: &str, args: &[Expr]) -> SqlResult<()> {
    if args.len() != 3 {
        return Err(SqlError::validation_error(
            "the arguments for split_value should be 3",
        ));
    }
    for i in 0..2 {
        if not_string(&args[i]) {
            return Err(produce_err_info(name, i, "string"));
        }
    }
    if not_int(&args[2]) {
        return Err(produce_err_info(name, 2, "int"));
    }
    if let Expr::Integer(idx) = &args[2] {
        if *idx < 0 {
            return Err(SqlError::validation_error(
                "The index should not be a nagtive integer.",
            ));
        }
    }
    Ok(())
}

/// Target types accepted by `cast`.
pub const CAST_TYPES: [&str; 4] = ["bigint", "float", "string", "boolean"];

pub fn validate_cast(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 2, args)?;
    match &args[1] {
        Expr::String(t) if !CAST_TYPES.contains(&t.as_str()) => Err(SqlError::validation_error(
            "Expect one of following value for the 2nd parameter: bigint, float, string, boolean.",
        )),
        Expr::String(_) => Ok(()),
        _ => Err(produce_err_info(name, 1, "string")),
    }
}

pub fn validate_coalesce(name: &str, args: &[Expr]) -> SqlResult<()> {
    if args.is_empty() {
        return Err(SqlError::validation_error(format!(
            "The arguments for {} should be at least one.",
            name
        )));
    }
    Ok(())
}

/// `meta(key)` or `meta(key->path...)`.
pub fn validate_meta(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 1, args)?;
    let mut expr = &args[0];
    loop {
        match expr {
            Expr::MetaRef(_) => return Ok(()),
            Expr::Binary {
                op: BinaryOperator::Arrow,
                lhs,
                ..
            } => expr = lhs,
            _ => return Err(produce_err_info(name, 0, "meta reference")),
        }
    }
}

pub fn validate_mqtt(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 1, args)?;
    match &args[0] {
        Expr::MetaRef(m) => {
            let key = m.name.to_lowercase();
            if key != "topic" && key != "messageid" {
                return Err(SqlError::validation_error(
                    "Parameter of mqtt function can be only topic or messageid.",
                ));
            }
            Ok(())
        }
        _ => Err(produce_err_info(name, 0, "meta reference")),
    }
}

pub fn validate_deduplicate(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 2, args)?;
    if !args[1].is_boolean_literal() {
        return Err(produce_err_info(name, 1, "bool"));
    }
    Ok(())
}

pub fn validate_lag(name: &str, args: &[Expr]) -> SqlResult<()> {
    let l = args.len();
    if !(1..=3).contains(&l) {
        return Err(SqlError::validation_error(format!(
            "expect one two or three args but got {}",
            l
        )));
    }
    if l >= 2 {
        if not_int(&args[1]) || args[1].is_field_ref() {
            return Err(produce_err_info(name, 1, "int"));
        }
        if let Expr::Integer(offset) = &args[1] {
            if *offset < 0 {
                return Err(SqlError::validation_error(
                    "the index should not be a nagtive integer",
                ));
            }
        }
    }
    Ok(())
}

pub fn validate_latest(_name: &str, args: &[Expr]) -> SqlResult<()> {
    let l = args.len();
    if l != 1 && l != 2 {
        return Err(SqlError::validation_error(format!(
            "expect one or two args but got {}",
            l
        )));
    }
    Ok(())
}

pub fn validate_changed_col(name: &str, args: &[Expr]) -> SqlResult<()> {
    validate_len(name, 2, args)?;
    if not_bool(&args[0]) {
        return Err(produce_err_info(name, 0, "boolean"));
    }
    Ok(())
}

pub fn validate_had_changed(name: &str, args: &[Expr]) -> SqlResult<()> {
    if args.len() <= 1 {
        return Err(SqlError::validation_error(format!(
            "expect more than one arg but got {}",
            args.len()
        )));
    }
    if not_bool(&args[0]) {
        return Err(produce_err_info(name, 0, "bool"));
    }
    Ok(())
}

pub fn validate_changed_cols(name: &str, args: &[Expr]) -> SqlResult<()> {
    if args.len() <= 2 {
        return Err(SqlError::validation_error(format!(
            "expect more than two args but got {}",
            args.len()
        )));
    }
    if not_string(&args[0]) {
        return Err(produce_err_info(name, 0, "string"));
    }
    if not_bool(&args[1]) {
        return Err(produce_err_info(name, 1, "bool"));
    }
    Ok(())
}
