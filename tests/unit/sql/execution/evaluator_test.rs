// End-to-end evaluation of parsed expressions against single rows
use crate::unit::common::*;
use rillstream::rill::sql::execution::types::Metadata;

struct Fixture {
    functions: FunctionValuer,
}

impl Fixture {
    fn new() -> Self {
        Self {
            functions: FunctionValuer::with_resolver(Arc::new(FunctionResolver::new())),
        }
    }

    /// Evaluate every select field of `sql` against `row`.
    fn fields(&self, sql: &str, row: &Tuple) -> Vec<FieldValue> {
        let stmt = parse(sql);
        stmt.fields
            .iter()
            .map(|f| eval_row(&f.expr, row, &self.functions))
            .collect()
    }

    fn field(&self, sql: &str, row: &Tuple) -> FieldValue {
        self.fields(sql, row).remove(0)
    }
}

fn ints(v: &[i64]) -> FieldValue {
    FieldValue::Array(v.iter().map(|i| FieldValue::Integer(*i)).collect())
}

#[test]
fn test_where_and_projection() {
    let fx = Fixture::new();
    let stmt = parse("SELECT temperature * 2 AS doubled, humidity FROM demo WHERE temperature > 20");

    let hot = demo_tuple(json!({"temperature": 25, "humidity": 60.5}));
    let cold = demo_tuple(json!({"temperature": 15, "humidity": 40.0}));
    assert!(passes(&stmt, &hot, &fx.functions));
    assert!(!passes(&stmt, &cold, &fx.functions));

    assert_eq!(eval_row(&stmt.fields[0].expr, &hot, &fx.functions), FieldValue::Integer(50));
    assert_eq!(eval_row(&stmt.fields[1].expr, &hot, &fx.functions), FieldValue::Float(60.5));
}

#[test]
fn test_divided_by_zero_is_contained() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"a": 7, "b": 0}));
    let values = fx.fields("SELECT a / b AS bad, a + 1 AS ok, abs(a / b) FROM demo", &row);

    assert_eq!(values[0], FieldValue::error("divided by zero"));
    // sibling fields are unaffected
    assert_eq!(values[1], FieldValue::Integer(8));
    // errors propagate through calls unchanged
    assert_eq!(values[2], FieldValue::error("divided by zero"));

    let stmt = parse("SELECT a FROM demo WHERE a % b = 1");
    let chain = MultiValuer::new(vec![&row, &fx.functions]);
    let err = ValuerEval::new(&chain)
        .evaluate_to_result(stmt.condition.as_ref().unwrap())
        .unwrap_err();
    assert_eq!(err, SqlError::execution_error("divided by zero", None));
}

#[test]
fn test_integer_division_setting() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"a": 7, "b": 2}));
    let stmt = parse("SELECT a / b FROM demo");
    assert_eq!(eval_row(&stmt.fields[0].expr, &row, &fx.functions), FieldValue::Integer(3));

    let config = EngineConfig {
        integer_float_division: true,
        ..EngineConfig::default()
    };
    let chain = MultiValuer::new(vec![&row, &fx.functions]);
    assert_eq!(
        ValuerEval::with_config(&chain, &config).eval(&stmt.fields[0].expr),
        FieldValue::Float(3.5)
    );
}

#[test]
fn test_array_index_and_slices() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"a": [1, 2, 3, 4, 5]}));
    let values = fx.fields(
        "SELECT a[0], a[-1], a[:2], a[4:], a[-1:], a[0:-1], a[:], a[1:3] FROM demo",
        &row,
    );
    assert_eq!(values[0], FieldValue::Integer(1));
    assert_eq!(values[1], FieldValue::Integer(5));
    assert_eq!(values[2], ints(&[1, 2]));
    assert_eq!(values[3], ints(&[5]));
    assert_eq!(values[4], ints(&[5]));
    assert_eq!(values[5], ints(&[1, 2, 3, 4]));
    assert_eq!(values[6], ints(&[1, 2, 3, 4, 5]));
    assert_eq!(values[7], ints(&[2, 3]));
}

#[test]
fn test_index_errors() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"a": [1, 2, 3, 4, 5], "s": "text"}));
    assert_eq!(fx.field("SELECT a[5] FROM demo", &row), FieldValue::error("out of index: 5 of 5"));
    assert_eq!(fx.field("SELECT a[-6] FROM demo", &row), FieldValue::error("out of index: -6 of 5"));
    assert_eq!(
        fx.field("SELECT a[3:1] FROM demo", &row),
        FieldValue::error("start cannot be greater than end. start:3  end:1")
    );
    assert_eq!(
        fx.field("SELECT a[1:9] FROM demo", &row),
        FieldValue::error("end value is out of index: 9 of 5")
    );
    assert!(fx.field("SELECT s[0] FROM demo", &row).is_error());
    // missing arrays are null, not errors
    assert_eq!(fx.field("SELECT missing[0] FROM demo", &row), FieldValue::Null);
}

#[test]
fn test_arrow_navigation() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"s": {"x": 1, "inner": {"y": "deep"}}, "n": 3}));
    let values = fx.fields("SELECT s->x, s->inner->y, s->missing, n->x FROM demo", &row);
    assert_eq!(values[0], FieldValue::Integer(1));
    assert_eq!(values[1], FieldValue::from("deep"));
    assert_eq!(values[2], FieldValue::Null);
    assert_eq!(
        values[3],
        FieldValue::error("the result 3 is not a map")
    );
}

#[test]
fn test_like_matching() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"name": "abc", "n": 1, "p": "a%"}));
    let stmt = parse(
        "SELECT name LIKE \"a%\", name LIKE \"_b_\", name LIKE \"%d\", name NOT LIKE \"%d\", \
         missing LIKE \"a%\", name LIKE p, n LIKE \"1\" FROM demo",
    );
    let values: Vec<FieldValue> = stmt
        .fields
        .iter()
        .map(|f| eval_row(&f.expr, &row, &fx.functions))
        .collect();
    assert_eq!(values[0], FieldValue::Boolean(true));
    assert_eq!(values[1], FieldValue::Boolean(true));
    assert_eq!(values[2], FieldValue::Boolean(false));
    assert_eq!(values[3], FieldValue::Boolean(true));
    assert_eq!(values[4], FieldValue::Boolean(false));
    // pattern taken from a column at run time
    assert_eq!(values[5], FieldValue::Boolean(true));
    assert!(values[6].is_error());
}

#[test]
fn test_in_and_between() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"a": 2, "f": 2.0, "arr": [1, 2, 3], "s": "x"}));
    let values = fx.fields(
        "SELECT a IN (1, 2, 3), f IN (2), a NOT IN arr, missing IN (1), s IN (1, \"x\"), \
         a BETWEEN 1 AND 3, a NOT BETWEEN 1 AND 3, missing BETWEEN 1 AND 3 FROM demo",
        &row,
    );
    assert_eq!(
        values,
        vec![
            FieldValue::Boolean(true),
            FieldValue::Boolean(true),
            FieldValue::Boolean(false),
            FieldValue::Boolean(false),
            FieldValue::Boolean(true),
            FieldValue::Boolean(true),
            FieldValue::Boolean(false),
            FieldValue::Boolean(false),
        ]
    );
}

#[test]
fn test_case_evaluation() {
    let fx = Fixture::new();
    let sql = "SELECT CASE WHEN t > 30 THEN \"hot\" WHEN t > 20 THEN \"warm\" ELSE \"cold\" END, \
               CASE code WHEN 1 THEN \"one\" END FROM demo";
    let warm = fx.fields(sql, &demo_tuple(json!({"t": 25, "code": 1})));
    assert_eq!(warm, vec![FieldValue::from("warm"), FieldValue::from("one")]);
    let cold = fx.fields(sql, &demo_tuple(json!({"t": 5, "code": 2})));
    assert_eq!(cold, vec![FieldValue::from("cold"), FieldValue::Null]);
}

#[test]
fn test_null_handling() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"a": 1, "n": null}));
    let values = fx.fields("SELECT n + 1, n = missing, a > n, missing FROM demo", &row);
    assert_eq!(
        values,
        vec![
            FieldValue::Null,
            FieldValue::Boolean(true),
            FieldValue::Boolean(false),
            FieldValue::Null,
        ]
    );
}

#[test]
fn test_short_circuit_hides_rhs_errors() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"a": 1, "b": 0}));
    let stmt = parse("SELECT a FROM demo WHERE a > 5 AND a / b > 1");
    assert!(!passes(&stmt, &row, &fx.functions));
    let stmt = parse("SELECT a FROM demo WHERE a = 1 OR a / b > 1");
    assert!(passes(&stmt, &row, &fx.functions));
}

#[test]
fn test_key_lookup_ignores_case_by_default() {
    let fx = Fixture::new();
    let row = demo_tuple(json!({"Temperature": 21}));
    assert_eq!(fx.field("SELECT temperature FROM demo", &row), FieldValue::Integer(21));

    let strict = Tuple::new(
        "demo",
        message_from_json(&json!({"Temperature": 21})),
        0,
    )
    .with_ignore_case(false);
    assert_eq!(fx.field("SELECT temperature FROM demo", &strict), FieldValue::Null);
}

#[test]
fn test_meta_and_event_time() {
    let fx = Fixture::new();
    let mut metadata = Metadata::new();
    metadata.insert("topic".to_string(), FieldValue::from("sensors/1"));
    let row = Tuple::new("demo", message_from_json(&json!({"a": 1})), 1_650_000_000_000)
        .with_metadata(metadata);
    let values = fx.fields("SELECT meta(topic), meta(missing), event_time() FROM demo", &row);
    assert_eq!(values[0], FieldValue::from("sensors/1"));
    assert_eq!(values[1], FieldValue::Null);
    assert_eq!(values[2], FieldValue::Integer(1_650_000_000_000));
}

#[test]
fn test_chain_without_functions_yields_null_for_calls() {
    let row = demo_tuple(json!({"a": -1}));
    let stmt = parse("SELECT abs(a) FROM demo");
    assert_eq!(ValuerEval::new(&row).eval(&stmt.fields[0].expr), FieldValue::Null);
}
