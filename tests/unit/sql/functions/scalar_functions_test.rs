// Scalar built-ins invoked through parsed SQL
use crate::unit::common::*;

fn select(sql: &str, row: serde_json::Value) -> Vec<FieldValue> {
    let stmt = parse(sql);
    let fv = FunctionValuer::with_resolver(Arc::new(FunctionResolver::new()));
    let row = demo_tuple(row);
    stmt.fields
        .iter()
        .map(|f| eval_row(&f.expr, &row, &fv))
        .collect()
}

#[test]
fn test_string_functions() {
    let values = select(
        "SELECT concat(first, \" \", last, n), lower(first), upper(last), length(last), \
         substring(last, 1, 3), substring(last, 2), trim(pad) FROM demo",
        json!({"first": "Ada", "last": "Lovelace", "n": 1, "pad": "  x "}),
    );
    assert_eq!(
        values,
        vec![
            FieldValue::from("Ada Lovelace1"),
            FieldValue::from("ada"),
            FieldValue::from("LOVELACE"),
            FieldValue::Integer(8),
            FieldValue::from("ov"),
            FieldValue::from("velace"),
            FieldValue::from("x"),
        ]
    );
}

#[test]
fn test_substring_is_char_indexed() {
    let values = select(
        "SELECT substring(s, 1, 3), indexof(s, \"ü\"), substring(s, 10) FROM demo",
        json!({"s": "grüße"}),
    );
    assert_eq!(values[0], FieldValue::from("rü"));
    assert_eq!(values[1], FieldValue::Integer(2));
    assert_eq!(values[2], FieldValue::from(""));
}

#[test]
fn test_null_inputs() {
    let values = select(
        "SELECT lower(missing), concat(missing, \"x\"), substring(missing, 0), coalesce(missing, other, 3) FROM demo",
        json!({"other": null}),
    );
    assert_eq!(
        values,
        vec![
            FieldValue::Null,
            FieldValue::from("x"),
            FieldValue::Null,
            FieldValue::Integer(3),
        ]
    );
}

#[test]
fn test_cast() {
    let values = select(
        "SELECT cast(s, \"bigint\"), cast(f, \"bigint\"), cast(i, \"float\"), cast(i, \"string\"), \
         cast(b, \"boolean\"), cast(bad, \"bigint\"), cast(missing, \"float\") FROM demo",
        json!({"s": " 42 ", "f": 3.9, "i": 7, "b": "true", "bad": "x1"}),
    );
    assert_eq!(values[0], FieldValue::Integer(42));
    assert_eq!(values[1], FieldValue::Integer(3));
    assert_eq!(values[2], FieldValue::Float(7.0));
    assert_eq!(values[3], FieldValue::from("7"));
    assert_eq!(values[4], FieldValue::Boolean(true));
    match &values[5] {
        FieldValue::Error(msg) => assert!(msg.starts_with("cannot parse \"x1\" as bigint")),
        other => panic!("Expected error, got {:?}", other),
    }
    assert_eq!(values[6], FieldValue::Null);

    assert_eq!(
        parse_err("SELECT cast(a, \"datetime\") FROM demo"),
        "Expect one of following value for the 2nd parameter: bigint, float, string, boolean."
    );
    assert_eq!(
        parse_err("SELECT cast(a, b) FROM demo"),
        "Expect string type for 2 parameter of function cast."
    );
}

#[test]
fn test_regexp_matches() {
    let values = select(
        "SELECT regexp_matches(id, \"^dev-[0-9]+$\"), regexp_matches(id, \"^x\"), regexp_matches(id, p) FROM demo",
        json!({"id": "dev-42", "p": "("}),
    );
    assert_eq!(values[0], FieldValue::Boolean(true));
    assert_eq!(values[1], FieldValue::Boolean(false));
    assert!(values[2].is_error());
}

#[test]
fn test_math_functions() {
    let values = select(
        "SELECT abs(n), abs(f), round(f), power(2, 10), mod(7, 2), sign(n), bitand(6, 3) FROM demo",
        json!({"n": -3, "f": -2.5}),
    );
    assert_eq!(
        values,
        vec![
            FieldValue::Integer(3),
            FieldValue::Float(2.5),
            FieldValue::Float(-3.0),
            FieldValue::Float(1024.0),
            FieldValue::Float(1.0),
            FieldValue::Integer(-1),
            FieldValue::Integer(2),
        ]
    );
}

#[test]
fn test_math_errors() {
    let values = select("SELECT abs(s), sqrt(missing) FROM demo", json!({"s": "x"}));
    assert_eq!(values[0], FieldValue::error("only float64 & int type are supported"));
    assert_eq!(values[1], FieldValue::error("only float64 & int type are supported"));

    assert_eq!(
        parse_err("SELECT abs(\"x\") FROM demo"),
        "Expect number - float or int type for 1 parameter of function abs."
    );
    assert_eq!(
        parse_err("SELECT bitand(1.5, 1) FROM demo"),
        "Expect int type for 1 parameter of function bitand."
    );
}

#[test]
fn test_isnull_and_split_value() {
    let values = select(
        "SELECT isnull(missing), isnull(a), split_value(path, \"/\", 1), split_value(path, \"/\", 9) FROM demo",
        json!({"a": 1, "path": "a/b/c"}),
    );
    assert_eq!(values[0], FieldValue::Boolean(true));
    assert_eq!(values[1], FieldValue::Boolean(false));
    assert_eq!(values[2], FieldValue::from("b"));
    assert_eq!(values[3], FieldValue::error("9 out of index array (size = 3)"));
}
