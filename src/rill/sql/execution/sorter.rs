//! ORDER BY over a collection.
//!
//! Every sort key is evaluated once per row before any comparison. The first non-null
//! value of a key fixes the type that the rest of that column must be compatible with.

use crate::rill::config::EngineConfig;
use crate::rill::sql::ast::{BinaryOperator, SortField};
use crate::rill::sql::error::{SqlError, SqlResult};
use crate::rill::sql::execution::collection::Collection;
use crate::rill::sql::execution::expression::evaluator::ValuerEval;
use crate::rill::sql::execution::expression::operators::{simple_data_eval, to_time};
use crate::rill::sql::execution::expression::valuer::{MultiValuer, Valuer};
use crate::rill::sql::execution::types::FieldValue;
use std::cmp::Ordering;

/// Multi-key sorter. Keys are compared in order until one discriminates.
#[derive(Debug, Clone)]
pub struct MultiSorter {
    fields: Vec<SortField>,
    integer_float_division: bool,
    ignore_case: bool,
}

impl MultiSorter {
    pub fn new(fields: Vec<SortField>) -> Self {
        Self {
            fields,
            integer_float_division: false,
            ignore_case: true,
        }
    }

    pub fn with_config(fields: Vec<SortField>, config: &EngineConfig) -> Self {
        Self {
            fields,
            integer_float_division: config.integer_float_division,
            ignore_case: config.ignore_case,
        }
    }

    /// Sort `data` in place. `fv` is appended to every row's valuer chain, usually the
    /// function valuer of the operator.
    pub fn sort(&self, data: &mut dyn Collection, fv: &dyn Valuer) -> SqlResult<()> {
        let keys = self.load_keys(&*data, fv)?;
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| self.compare(&keys[a], &keys[b]));
        apply_order(data, &order);
        Ok(())
    }

    fn load_keys(&self, data: &dyn Collection, fv: &dyn Valuer) -> SqlResult<Vec<Vec<FieldValue>>> {
        let mut types: Vec<Option<&'static str>> = vec![None; self.fields.len()];
        let mut keys = Vec::with_capacity(data.len());
        for i in 0..data.len() {
            let row = data
                .index(i)
                .ok_or_else(|| SqlError::execution_error(format!("row {} out of range", i), None))?;
            let chain = MultiValuer::new(vec![row.as_valuer(), fv]);
            let ev = ValuerEval {
                valuer: &chain,
                integer_float_division: self.integer_float_division,
                ignore_case: self.ignore_case,
            };
            let mut row_keys = Vec::with_capacity(self.fields.len());
            for (j, field) in self.fields.iter().enumerate() {
                let v = ev.evaluate_to_result(&field.field_expr)?;
                if types[j].is_none() && !v.is_null() {
                    types[j] = Some(v.type_name());
                }
                if let Some(expected) = types[j] {
                    check_compatible(expected, &v)?;
                }
                row_keys.push(v);
            }
            keys.push(row_keys);
        }
        Ok(keys)
    }

    fn compare(&self, p: &[FieldValue], q: &[FieldValue]) -> Ordering {
        for (field, (vp, vq)) in self.fields.iter().zip(p.iter().zip(q)) {
            match (vp.is_null(), vq.is_null()) {
                (true, true) => continue,
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                _ => {}
            }
            let ord = if self.less(vp, vq) {
                Ordering::Less
            } else if self.less(vq, vp) {
                Ordering::Greater
            } else {
                continue;
            };
            return if field.ascending { ord } else { ord.reverse() };
        }
        Ordering::Equal
    }

    fn less(&self, a: &FieldValue, b: &FieldValue) -> bool {
        matches!(
            simple_data_eval(a, b, BinaryOperator::Lt, self.integer_float_division),
            FieldValue::Boolean(true)
        )
    }
}

fn check_compatible(expected: &'static str, v: &FieldValue) -> SqlResult<()> {
    let ok = match v {
        FieldValue::Null => true,
        _ => match expected {
            "int64" | "uint64" | "float64" => v.is_numeric(),
            "bool" => matches!(v, FieldValue::Boolean(_)),
            "string" => matches!(v, FieldValue::String(_)),
            "timestamp" => to_time(v).is_some(),
            _ => false,
        },
    };
    if ok {
        return Ok(());
    }
    log::warn!(
        "incompatible types for comparison: {} and {}",
        expected,
        v.type_name()
    );
    Err(SqlError::type_error(expected, v.type_name(), None))
}

/// Rearrange `data` so that position `k` holds the row that was at `order[k]`.
fn apply_order(data: &mut dyn Collection, order: &[usize]) {
    let mut at: Vec<usize> = (0..order.len()).collect();
    let mut pos: Vec<usize> = (0..order.len()).collect();
    for (k, &want) in order.iter().enumerate() {
        let p = pos[want];
        if p != k {
            data.swap(k, p);
            let displaced = at[k];
            at[k] = want;
            at[p] = displaced;
            pos[want] = k;
            pos[displaced] = p;
        }
    }
}
