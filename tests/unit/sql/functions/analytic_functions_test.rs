// Analytic functions keep history across successive rows of one operator
use crate::unit::common::*;

/// One operator instance: a parsed statement plus the function state it owns.
struct Operator {
    stmt: SelectStatement,
    functions: FunctionValuer,
}

impl Operator {
    fn new(sql: &str) -> Self {
        Self {
            stmt: parse(sql),
            functions: FunctionValuer::with_resolver(Arc::new(FunctionResolver::new())),
        }
    }

    /// Project every field for `row`.
    fn project(&self, row: &Tuple) -> Vec<FieldValue> {
        self.stmt
            .fields
            .iter()
            .map(|f| eval_row(&f.expr, row, &self.functions))
            .collect()
    }

    fn feed(&self, rows: &[serde_json::Value]) -> Vec<Vec<FieldValue>> {
        rows.iter()
            .map(|v| self.project(&demo_tuple(v.clone())))
            .collect()
    }
}

fn column(results: &[Vec<FieldValue>], i: usize) -> Vec<FieldValue> {
    results.iter().map(|r| r[i].clone()).collect()
}

#[test]
fn test_lag_over_successive_rows() {
    let op = Operator::new("SELECT lag(t), lag(t, 2, -1), t - lag(t) FROM demo");
    let out = op.feed(&[json!({"t": 10}), json!({"t": 12}), json!({"t": 15})]);
    assert_eq!(
        column(&out, 0),
        vec![FieldValue::Null, FieldValue::Integer(10), FieldValue::Integer(12)]
    );
    assert_eq!(
        column(&out, 1),
        vec![FieldValue::Integer(-1), FieldValue::Integer(-1), FieldValue::Integer(10)]
    );
    // each call site has its own history
    assert_eq!(
        column(&out, 2),
        vec![FieldValue::Null, FieldValue::Integer(2), FieldValue::Integer(3)]
    );
}

#[test]
fn test_lag_partitioned() {
    let op = Operator::new("SELECT lag(t) OVER (PARTITION BY device) FROM demo");
    let out = op.feed(&[
        json!({"device": "a", "t": 1}),
        json!({"device": "b", "t": 2}),
        json!({"device": "a", "t": 3}),
        json!({"device": "b", "t": 4}),
    ]);
    assert_eq!(
        column(&out, 0),
        vec![
            FieldValue::Null,
            FieldValue::Null,
            FieldValue::Integer(1),
            FieldValue::Integer(2),
        ]
    );
}

#[test]
fn test_when_condition_controls_history() {
    let op = Operator::new("SELECT lag(t) OVER (WHEN t > 10), latest(t) OVER (WHEN t > 10) FROM demo");
    let out = op.feed(&[
        json!({"t": 20}),
        json!({"t": 5}),
        json!({"t": 30}),
        json!({"t": 1}),
    ]);
    // rows failing WHEN read the history without updating it
    assert_eq!(
        column(&out, 0),
        vec![
            FieldValue::Null,
            FieldValue::Integer(20),
            FieldValue::Integer(20),
            FieldValue::Integer(30),
        ]
    );
    assert_eq!(
        column(&out, 1),
        vec![
            FieldValue::Integer(20),
            FieldValue::Integer(20),
            FieldValue::Integer(30),
            FieldValue::Integer(30),
        ]
    );
}

#[test]
fn test_memo_prevents_double_update_on_one_row() {
    let op = Operator::new("SELECT lag(t) AS prev, prev FROM demo");
    let first = demo_tuple(json!({"t": 1}));
    assert_eq!(op.project(&first), vec![FieldValue::Null, FieldValue::Null]);

    let second = demo_tuple(json!({"t": 2}));
    let expr = &op.stmt.fields[0].expr;
    assert_eq!(eval_row(expr, &second, &op.functions), FieldValue::Integer(1));
    // evaluating the same call again on the same row reuses the stored result
    assert_eq!(eval_row(expr, &second, &op.functions), FieldValue::Integer(1));
    assert_eq!(
        eval_row(&op.stmt.fields[1].expr, &second, &op.functions),
        FieldValue::Integer(1)
    );

    let third = demo_tuple(json!({"t": 3}));
    assert_eq!(eval_row(expr, &third, &op.functions), FieldValue::Integer(2));
}

#[test]
fn test_changed_col_and_had_changed() {
    let op = Operator::new("SELECT changed_col(true, t), had_changed(true, t, h) FROM demo");
    let out = op.feed(&[
        json!({"t": 1, "h": 5}),
        json!({"t": 1, "h": 5}),
        json!({"t": 1, "h": 6}),
        json!({"t": 2}),
    ]);
    assert_eq!(
        column(&out, 0),
        vec![
            FieldValue::Integer(1),
            FieldValue::Null,
            FieldValue::Null,
            FieldValue::Integer(2),
        ]
    );
    assert_eq!(
        column(&out, 1),
        vec![
            FieldValue::Boolean(true),
            FieldValue::Boolean(false),
            FieldValue::Boolean(true),
            FieldValue::Boolean(true),
        ]
    );
}

#[test]
fn test_changed_cols() {
    let op = Operator::new("SELECT changed_cols(\"c_\", true, a, b) FROM demo");
    let out = op.feed(&[
        json!({"a": 1, "b": 2}),
        json!({"a": 1, "b": 3}),
        json!({"a": 1, "b": 3}),
        json!({"a": 1}),
    ]);
    match &out[0][0] {
        FieldValue::Map(m) => {
            assert_eq!(m.len(), 2);
            assert_eq!(m["c_a"], FieldValue::Integer(1));
            assert_eq!(m["c_b"], FieldValue::Integer(2));
        }
        other => panic!("Expected map, got {:?}", other),
    }
    match &out[1][0] {
        FieldValue::Map(m) => {
            assert_eq!(m.len(), 1);
            assert_eq!(m["c_b"], FieldValue::Integer(3));
        }
        other => panic!("Expected map, got {:?}", other),
    }
    assert_eq!(out[2][0], FieldValue::Null);
    // null b is ignored rather than reported as a change
    assert_eq!(out[3][0], FieldValue::Null);
}

#[test]
fn test_changed_cols_with_wildcard() {
    let op = Operator::new("SELECT changed_cols(\"\", false, *) FROM demo");
    let out = op.feed(&[json!({"a": 1, "b": 2}), json!({"a": 1, "b": 4})]);
    match &out[1][0] {
        FieldValue::Map(m) => {
            assert_eq!(m.len(), 1);
            assert_eq!(m["b"], FieldValue::Integer(4));
        }
        other => panic!("Expected map, got {:?}", other),
    }
}

#[test]
fn test_separate_operators_do_not_share_state() {
    let sql = "SELECT lag(t) FROM demo";
    let a = Operator::new(sql);
    let b = Operator::new(sql);
    a.feed(&[json!({"t": 1})]);
    let out = b.feed(&[json!({"t": 2})]);
    assert_eq!(out[0][0], FieldValue::Null);
}
