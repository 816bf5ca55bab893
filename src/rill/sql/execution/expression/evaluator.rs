//! Expression evaluator.
//!
//! [`ValuerEval`] walks an [`Expr`] against a [`Valuer`] chain and produces a
//! [`FieldValue`]. Evaluation is total: type mismatches, bad indexes and failed calls
//! come back as [`FieldValue::Error`], and any node that sees an error from a child
//! returns it unchanged.

use super::operators::{simple_data_eval, values_equal};
use super::valuer::Valuer;
use crate::rill::config::EngineConfig;
use crate::rill::sql::ast::{
    BetweenExpr, BinaryOperator, Call, CaseExpr, Expr, FieldRef, FuncType, LikePattern,
    LikeRegex, ValueSetExpr, Wildcard,
};
use crate::rill::sql::error::{SqlError, SqlResult};
use crate::rill::sql::execution::row::message_value;
use crate::rill::sql::execution::types::FieldValue;

/// Functions answered by the window or tuple in the valuer chain instead of the
/// function runtime.
pub const IMPLICIT_VALUE_FUNCS: [&str; 4] = ["window_start", "window_end", "event_time", "window_trigger"];

pub fn is_implicit_value_func(name: &str) -> bool {
    IMPLICIT_VALUE_FUNCS.contains(&name)
}

/// Partition key used by analytic calls without `PARTITION BY`.
pub const DEFAULT_PARTITION_KEY: &str = "self";

/// Evaluate `expr` against `valuer` with default settings.
pub fn eval(expr: &Expr, valuer: &dyn Valuer) -> FieldValue {
    ValuerEval::new(valuer).eval(expr)
}

/// Tree-walking evaluator bound to one valuer chain.
#[derive(Clone, Copy)]
pub struct ValuerEval<'a> {
    pub valuer: &'a dyn Valuer,
    /// Integer `/` integer yields a float
    pub integer_float_division: bool,
    /// Case-insensitive key fallback for `->` navigation
    pub ignore_case: bool,
}

impl<'a> ValuerEval<'a> {
    pub fn new(valuer: &'a dyn Valuer) -> Self {
        Self {
            valuer,
            integer_float_division: false,
            ignore_case: true,
        }
    }

    pub fn with_config(valuer: &'a dyn Valuer, config: &EngineConfig) -> Self {
        Self {
            valuer,
            integer_float_division: config.integer_float_division,
            ignore_case: config.ignore_case,
        }
    }

    /// Same settings, different chain.
    pub fn rebind<'b>(&self, valuer: &'b dyn Valuer) -> ValuerEval<'b> {
        ValuerEval {
            valuer,
            integer_float_division: self.integer_float_division,
            ignore_case: self.ignore_case,
        }
    }

    /// Evaluate and surface an error value as [`SqlError::ExecutionError`].
    pub fn evaluate_to_result(&self, expr: &Expr) -> SqlResult<FieldValue> {
        match self.eval(expr) {
            FieldValue::Error(msg) => Err(SqlError::execution_error(msg, None)),
            v => Ok(v),
        }
    }

    pub fn eval(&self, expr: &Expr) -> FieldValue {
        match expr {
            Expr::Integer(i) => FieldValue::Integer(*i),
            Expr::Number(n) => FieldValue::Float(*n),
            Expr::String(s) => FieldValue::String(s.clone()),
            Expr::Boolean(b) => FieldValue::Boolean(*b),
            Expr::Time(_) | Expr::Window(_) => FieldValue::Null,
            Expr::Paren(inner) => self.eval(inner),
            Expr::FieldRef(f) => self.eval_field_ref(f),
            Expr::MetaRef(m) => self
                .valuer
                .meta(&m.name, m.stream.as_table())
                .unwrap_or(FieldValue::Null),
            Expr::JsonFieldRef(name) => self.valuer.value(name, "").unwrap_or(FieldValue::Null),
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Index(index) => self.eval(index),
            Expr::Colon { .. } => FieldValue::Null,
            Expr::Call(call) => self.eval_call(call),
            Expr::Case(case) => self.eval_case(case),
            Expr::Wildcard(w) => self.eval_wildcard(w),
            Expr::ValueSet(set) => self.eval_value_set(set),
            Expr::Between(b) => {
                let lower = self.eval(&b.lower);
                if lower.is_error() {
                    return lower;
                }
                let higher = self.eval(&b.higher);
                if higher.is_error() {
                    return higher;
                }
                FieldValue::Array(vec![lower, higher])
            }
            Expr::Like(like) => self.eval(&like.expr),
            Expr::ColFuncField(f) => self.eval(&f.expr),
        }
    }

    fn eval_field_ref(&self, f: &FieldRef) -> FieldValue {
        if !f.is_alias() {
            return self
                .valuer
                .value(&f.name, f.stream.as_table())
                .unwrap_or(FieldValue::Null);
        }
        if let Some(v) = self.valuer.alias_value(&f.name) {
            return v;
        }
        match &f.alias {
            Some(alias) => {
                let v = self.eval(&alias.expression);
                self.valuer.append_alias(&f.name, v.clone());
                v
            }
            None => self.valuer.value(&f.name, "").unwrap_or(FieldValue::Null),
        }
    }

    fn eval_binary(&self, op: BinaryOperator, lhs: &Expr, rhs: &Expr) -> FieldValue {
        let l = self.eval(lhs);
        if l.is_error() {
            return l;
        }
        match op {
            BinaryOperator::And if l == FieldValue::Boolean(false) => return l,
            BinaryOperator::Or if l == FieldValue::Boolean(true) => return l,
            BinaryOperator::Arrow | BinaryOperator::Dot => return self.eval_json_expr(l, op, rhs),
            BinaryOperator::Subset => return self.eval_subset(l, rhs),
            BinaryOperator::In | BinaryOperator::NotIn => return self.eval_in(l, op, rhs),
            BinaryOperator::Between | BinaryOperator::NotBetween => {
                return self.eval_between(l, op, rhs)
            }
            BinaryOperator::Like | BinaryOperator::NotLike => return self.eval_like(l, op, rhs),
            _ => {}
        }
        let r = self.eval(rhs);
        if r.is_error() {
            return r;
        }
        simple_data_eval(&l, &r, op, self.integer_float_division)
    }

    fn eval_json_expr(&self, l: FieldValue, op: BinaryOperator, rhs: &Expr) -> FieldValue {
        match l {
            FieldValue::Null => FieldValue::Null,
            FieldValue::Map(m) => match rhs {
                Expr::JsonFieldRef(name) => {
                    message_value(&m, name, self.ignore_case).unwrap_or(FieldValue::Null)
                }
                _ => FieldValue::error("the right expression is not a field reference node"),
            },
            other => {
                log::trace!("{} applied to {}", op, other.type_name());
                FieldValue::error(format!(
                    "the result {} is not a map",
                    other
                ))
            }
        }
    }

    fn eval_subset(&self, l: FieldValue, rhs: &Expr) -> FieldValue {
        let arr = match l {
            FieldValue::Null => return FieldValue::Null,
            FieldValue::Array(a) => a,
            other => {
                return FieldValue::error(format!(
                    "{} is an invalid operation for {}",
                    BinaryOperator::Subset.symbol(),
                    other.type_name()
                ))
            }
        };
        let len = arr.len() as i64;
        match rhs {
            Expr::Index(index) => {
                let mut i = match self.eval_int(index, "index") {
                    Ok(i) => i,
                    Err(e) => return e,
                };
                if i < 0 {
                    if i + len < 0 {
                        return FieldValue::error(format!("out of index: {} of {}", i, len));
                    }
                    i += len;
                } else if i >= len {
                    return FieldValue::error(format!("out of index: {} of {}", i, len));
                }
                arr[i as usize].clone()
            }
            Expr::Colon { start, end } => {
                let mut s = match self.eval_int(start, "colon start") {
                    Ok(i) => i,
                    Err(e) => return e,
                };
                let mut e = match self.eval_int(end, "colon end") {
                    Ok(i) => i,
                    Err(e) => return e,
                };
                if s < 0 {
                    if s + len < 0 {
                        return FieldValue::error(format!("out of index: {} of {}", s, len));
                    }
                    s += len;
                } else if s >= len {
                    return FieldValue::error(format!(
                        "start value is out of index: {} of {}",
                        s, len
                    ));
                }
                if e == Expr::OPEN_END {
                    e = len;
                } else if e < 0 {
                    if e + len < 0 {
                        return FieldValue::error(format!("out of index: {} of {}", e, len));
                    }
                    e += len;
                    if s > e {
                        return FieldValue::error(format!(
                            "start cannot be greater than end. start:{}  end:{}",
                            s, e
                        ));
                    }
                } else if e > len {
                    return FieldValue::error(format!("end value is out of index: {} of {}", e, len));
                } else if s >= e {
                    return FieldValue::error(format!(
                        "start cannot be greater than end. start:{}  end:{}",
                        s, e
                    ));
                }
                FieldValue::Array(arr[s as usize..e as usize].to_vec())
            }
            other => FieldValue::error(format!("invalid evaluation result - {:?}", other)),
        }
    }

    fn eval_int(&self, expr: &Expr, what: &str) -> Result<i64, FieldValue> {
        let v = self.eval(expr);
        match v {
            FieldValue::Error(_) => Err(v),
            FieldValue::Integer(i) => Ok(i),
            FieldValue::UInteger(u) => i64::try_from(u)
                .map_err(|_| FieldValue::error(format!("{} {} is not int", what, u))),
            other => Err(FieldValue::error(format!("{} {} is not int", what, other))),
        }
    }

    fn eval_value_set(&self, set: &ValueSetExpr) -> FieldValue {
        if let Some(array_expr) = &set.array_expr {
            return match self.eval(array_expr) {
                v @ (FieldValue::Array(_) | FieldValue::Error(_) | FieldValue::Null) => v,
                other => FieldValue::error(format!(
                    "the right operand of IN must be an array, but found {}",
                    other.type_name()
                )),
            };
        }
        let mut values = Vec::with_capacity(set.literal_exprs.len());
        for e in &set.literal_exprs {
            let v = self.eval(e);
            if v.is_error() {
                return v;
            }
            values.push(v);
        }
        FieldValue::Array(values)
    }

    fn eval_in(&self, l: FieldValue, op: BinaryOperator, rhs: &Expr) -> FieldValue {
        let negate = op == BinaryOperator::NotIn;
        if l.is_null() {
            return FieldValue::Boolean(false);
        }
        let set = match rhs {
            Expr::ValueSet(set) => self.eval_value_set(set),
            other => self.eval(other),
        };
        let items = match set {
            FieldValue::Error(_) => return set,
            FieldValue::Null => Vec::new(),
            FieldValue::Array(items) => items,
            other => {
                return FieldValue::error(format!(
                    "the right operand of {} must be an array, but found {}",
                    op,
                    other.type_name()
                ))
            }
        };
        let found = items.iter().any(|item| values_equal(&l, item));
        FieldValue::Boolean(found != negate)
    }

    fn eval_between(&self, l: FieldValue, op: BinaryOperator, rhs: &Expr) -> FieldValue {
        let (lower, higher) = match rhs {
            Expr::Between(BetweenExpr { lower, higher }) => {
                let lo = self.eval(lower);
                if lo.is_error() {
                    return lo;
                }
                let hi = self.eval(higher);
                if hi.is_error() {
                    return hi;
                }
                (lo, hi)
            }
            other => {
                return FieldValue::error(format!(
                    "{} expects a lower and higher bound, but found {:?}",
                    op, other
                ))
            }
        };
        if l.is_null() || lower.is_null() || higher.is_null() {
            return FieldValue::Boolean(false);
        }
        let ge = simple_data_eval(&l, &lower, BinaryOperator::Gte, self.integer_float_division);
        let ge = match ge {
            FieldValue::Boolean(b) => b,
            other => return other,
        };
        let le = simple_data_eval(&l, &higher, BinaryOperator::Lte, self.integer_float_division);
        let le = match le {
            FieldValue::Boolean(b) => b,
            other => return other,
        };
        let inside = ge && le;
        FieldValue::Boolean(if op == BinaryOperator::NotBetween { !inside } else { inside })
    }

    fn eval_like(&self, l: FieldValue, op: BinaryOperator, rhs: &Expr) -> FieldValue {
        let negate = op == BinaryOperator::NotLike;
        let s = match &l {
            FieldValue::Null => return FieldValue::Boolean(false),
            FieldValue::String(s) => s.as_str(),
            other => {
                return FieldValue::error(format!(
                    "LIKE operator left operand expects string, but found {}",
                    other
                ))
            }
        };
        let matched = match rhs {
            Expr::Like(LikePattern {
                pattern: Some(compiled),
                ..
            }) => compiled.is_match(s),
            Expr::Like(LikePattern { expr, pattern: None }) => match self.compile_like(expr) {
                Ok(re) => re.is_match(s),
                Err(e) => return e,
            },
            other => match self.compile_like(other) {
                Ok(re) => re.is_match(s),
                Err(e) => return e,
            },
        };
        FieldValue::Boolean(matched != negate)
    }

    fn compile_like(&self, expr: &Expr) -> Result<LikeRegex, FieldValue> {
        match self.eval(expr) {
            FieldValue::String(p) => LikeRegex::compile(&p)
                .map_err(|e| FieldValue::error(format!("invalid LIKE pattern {}: {}", p, e))),
            err @ FieldValue::Error(_) => Err(err),
            other => Err(FieldValue::error(format!(
                "LIKE operator right operand expects string, but found {}",
                other
            ))),
        }
    }

    fn eval_case(&self, case: &CaseExpr) -> FieldValue {
        let wrap = |e: String| FieldValue::error(format!("evaluate case expression error: {}", e));
        match &case.value {
            Some(value) => {
                let subject = self.eval(value);
                if let FieldValue::Error(e) = subject {
                    return wrap(e);
                }
                for w in &case.when_clauses {
                    let wv = self.eval(&w.expr);
                    match simple_data_eval(&subject, &wv, BinaryOperator::Eq, self.integer_float_division) {
                        FieldValue::Error(e) => return wrap(e),
                        FieldValue::Boolean(true) => return self.eval(&w.result),
                        _ => {}
                    }
                }
            }
            None => {
                for w in &case.when_clauses {
                    match self.eval(&w.expr) {
                        FieldValue::Error(e) => return wrap(e),
                        FieldValue::Boolean(true) => return self.eval(&w.result),
                        _ => {}
                    }
                }
            }
        }
        match &case.else_clause {
            Some(e) => self.eval(e),
            None => FieldValue::Null,
        }
    }

    fn eval_wildcard(&self, w: &Wildcard) -> FieldValue {
        let stream = w.stream.as_deref().unwrap_or("");
        let mut m = match self.valuer.as_wildcarder().and_then(|wc| wc.all(stream)) {
            Some(m) => m,
            None => return FieldValue::Null,
        };
        for name in &w.except {
            m.remove(name);
        }
        for field in &w.replace {
            let v = self.eval(&field.expr);
            if v.is_error() {
                return v;
            }
            m.insert(field.output_name().to_string(), v);
        }
        FieldValue::Map(m)
    }

    fn eval_call(&self, call: &Call) -> FieldValue {
        if is_implicit_value_func(&call.name) {
            return self
                .valuer
                .as_func_valuer()
                .and_then(|f| f.func_value(&call.name))
                .unwrap_or(FieldValue::Null);
        }
        if let Some(cached) = &call.cached_field {
            if let Some(v) = self.valuer.alias_value(cached) {
                return v;
            }
        }
        let Some(call_valuer) = self.valuer.as_call_valuer() else {
            return FieldValue::Null;
        };

        let args = match call.func_type {
            FuncType::Aggregate => self.aggregate_args(call),
            FuncType::Cols => self.cols_args(call),
            _ => self.scalar_args(&call.args),
        };
        let mut args = match args {
            Ok(args) => args,
            Err(e) => return e,
        };
        if call.func_type == FuncType::Analytic {
            let eligible = match &call.when_expr {
                Some(when) => match self.eval(when) {
                    FieldValue::Boolean(b) => b,
                    err @ FieldValue::Error(_) => return err,
                    _ => false,
                },
                None => true,
            };
            args.push(FieldValue::Boolean(eligible));
            match self.partition_key(call) {
                Ok(key) => args.push(FieldValue::String(key)),
                Err(e) => return e,
            }
        }

        let v = call_valuer.call(&call.name, call.func_id, &args);
        if let Some(cached) = &call.cached_field {
            self.valuer.append_alias(cached, v.clone());
        }
        v
    }

    fn scalar_args(&self, exprs: &[Expr]) -> Result<Vec<FieldValue>, FieldValue> {
        let mut args = Vec::with_capacity(exprs.len());
        for e in exprs {
            let v = self.eval(e);
            if v.is_error() {
                return Err(v);
            }
            args.push(v);
        }
        Ok(args)
    }

    /// Each argument becomes the list of its values over every member row.
    fn aggregate_args(&self, call: &Call) -> Result<Vec<FieldValue>, FieldValue> {
        let Some(agg) = self.valuer.as_aggregate_call_valuer() else {
            return self.scalar_args(&call.args);
        };
        let data = agg.all_tuples();
        let single = agg.single_call_valuer();
        Ok(call
            .args
            .iter()
            .map(|arg| FieldValue::Array(data.aggregate_eval(arg, single, self)))
            .collect())
    }

    /// Values in argument order followed by one array of their column names. A wildcard
    /// argument contributes every column of the row, ordered by name.
    fn cols_args(&self, call: &Call) -> Result<Vec<FieldValue>, FieldValue> {
        let mut values = Vec::with_capacity(call.args.len() + 1);
        let mut names = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            let (name, expr) = match arg {
                Expr::ColFuncField(f) => (f.name.as_str(), f.expr.as_ref()),
                other => ("", other),
            };
            let v = self.eval(expr);
            if v.is_error() {
                return Err(v);
            }
            match (expr, v) {
                (Expr::Wildcard(_), FieldValue::Map(m)) => {
                    let mut keys: Vec<String> = m.keys().cloned().collect();
                    keys.sort();
                    for k in keys {
                        if let Some(v) = m.get(&k) {
                            values.push(v.clone());
                        }
                        names.push(FieldValue::String(k));
                    }
                }
                (_, v) => {
                    values.push(v);
                    names.push(FieldValue::String(name.to_string()));
                }
            }
        }
        values.push(FieldValue::Array(names));
        Ok(values)
    }

    fn partition_key(&self, call: &Call) -> Result<String, FieldValue> {
        let Some(partition) = &call.partition else {
            return Ok(DEFAULT_PARTITION_KEY.to_string());
        };
        let mut key = String::new();
        for e in &partition.exprs {
            let v = self.eval(e);
            if v.is_error() {
                return Err(v);
            }
            key.push_str(&v.to_string());
        }
        Ok(key)
    }
}
