// Shared helpers for the unit tests

pub use rillstream::rill::config::EngineConfig;
pub use rillstream::rill::sql::ast::{BinaryOperator, Expr, FieldRef, SelectStatement, StreamName};
pub use rillstream::rill::sql::error::SqlError;
pub use rillstream::rill::sql::execution::expression::{MultiAggregateValuer, MultiValuer, Valuer, ValuerEval};
pub use rillstream::rill::sql::execution::functions::{FunctionResolver, FunctionValuer};
pub use rillstream::rill::sql::execution::row::{CollectionRow, Row, Tuple, TupleRow};
pub use rillstream::rill::sql::execution::types::{message_from_json, FieldValue, Message};
pub use rillstream::rill::sql::StreamingSqlParser;
pub use serde_json::json;
pub use std::sync::Arc;

/// Parse a SELECT statement with the default parser, panicking on error.
pub fn parse(sql: &str) -> SelectStatement {
    StreamingSqlParser::new()
        .parse(sql)
        .unwrap_or_else(|e| panic!("failed to parse {}: {}", sql, e))
}

/// Parse error message (without category prefix) for `sql`.
pub fn parse_err(sql: &str) -> String {
    match StreamingSqlParser::new().parse(sql) {
        Ok(stmt) => panic!("expected {} to fail, got {:?}", sql, stmt),
        Err(e) => e.message(),
    }
}

/// A row of stream `demo` built from a JSON object.
pub fn demo_tuple(value: serde_json::Value) -> Tuple {
    Tuple::new("demo", message_from_json(&value), 0)
}

pub fn tuple_at(emitter: &str, value: serde_json::Value, timestamp: i64) -> Tuple {
    Tuple::new(emitter, message_from_json(&value), timestamp)
}

/// Evaluate `expr` against a plain row followed by the function valuer.
pub fn eval_row(expr: &Expr, row: &dyn Valuer, functions: &FunctionValuer) -> FieldValue {
    let chain = MultiValuer::new(vec![row, functions]);
    ValuerEval::new(&chain).eval(expr)
}

/// Evaluate `expr` in aggregate context over `group`.
pub fn eval_group(expr: &Expr, group: &dyn CollectionRow, functions: &FunctionValuer) -> FieldValue {
    let chain = MultiAggregateValuer::new(
        group.as_aggregate_data(),
        functions,
        vec![group.as_row().as_valuer(), functions],
    );
    ValuerEval::new(&chain).eval(expr)
}

/// Evaluate the WHERE clause of `stmt`; absent conditions pass.
pub fn passes(stmt: &SelectStatement, row: &dyn Valuer, functions: &FunctionValuer) -> bool {
    match &stmt.condition {
        Some(cond) => eval_row(cond, row, functions) == FieldValue::Boolean(true),
        None => true,
    }
}
